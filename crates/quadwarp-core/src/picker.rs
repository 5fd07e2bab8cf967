//! Click-driven corner collection, independent of any UI toolkit.
//!
//! A front end forwards pointer positions in its own display space; the
//! picker maps them to image pixels and emits an ordered [`Quad`] once four
//! corners are in.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::quad::{order_corners, Quad};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PickError {
    #[error("four corners already picked; reset before picking again")]
    AlreadyComplete,
    #[error("point ({x:.1}, {y:.1}) lies outside the {width}x{height} image")]
    OutOfBounds {
        x: f32,
        y: f32,
        width: u32,
        height: u32,
    },
    #[error("display size must be positive (got {width}x{height})")]
    InvalidDisplay { width: f32, height: f32 },
    #[error("point ({x}, {y}) is not a finite coordinate")]
    NonFinite { x: f32, y: f32 },
}

/// How an image is laid out on screen: drawn at `display_w x display_h`
/// starting at `(offset_x, offset_y)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisplayMapping {
    pub image_w: u32,
    pub image_h: u32,
    pub display_w: f32,
    pub display_h: f32,
    #[serde(default)]
    pub offset_x: f32,
    #[serde(default)]
    pub offset_y: f32,
}

impl DisplayMapping {
    /// Image shown at native size.
    pub fn identity(image_w: u32, image_h: u32) -> Self {
        Self {
            image_w,
            image_h,
            display_w: image_w as f32,
            display_h: image_h as f32,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn scaled(image_w: u32, image_h: u32, display_w: f32, display_h: f32) -> Self {
        Self {
            display_w,
            display_h,
            ..Self::identity(image_w, image_h)
        }
    }

    pub fn to_image(&self, p: Point2<f32>) -> Result<Point2<f32>, PickError> {
        if !(self.display_w > 0.0 && self.display_h > 0.0) {
            return Err(PickError::InvalidDisplay {
                width: self.display_w,
                height: self.display_h,
            });
        }
        let sx = self.image_w as f32 / self.display_w;
        let sy = self.image_h as f32 / self.display_h;
        Ok(Point2::new(
            (p.x - self.offset_x) * sx,
            (p.y - self.offset_y) * sy,
        ))
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PickState {
    /// Number of corners still missing.
    NeedMore(usize),
    Complete(Quad),
}

#[derive(Clone, Debug)]
pub struct CornerPicker {
    mapping: DisplayMapping,
    points: Vec<Point2<f32>>,
    quad: Option<Quad>,
}

impl CornerPicker {
    pub fn new(mapping: DisplayMapping) -> Self {
        Self {
            mapping,
            points: Vec::with_capacity(4),
            quad: None,
        }
    }

    /// Record a click given in display coordinates.
    pub fn push(&mut self, display_pt: Point2<f32>) -> Result<PickState, PickError> {
        if self.quad.is_some() {
            return Err(PickError::AlreadyComplete);
        }
        let p = self.mapping.to_image(display_pt)?;
        if !(p.x.is_finite() && p.y.is_finite()) {
            return Err(PickError::NonFinite {
                x: display_pt.x,
                y: display_pt.y,
            });
        }
        let (w, h) = (self.mapping.image_w, self.mapping.image_h);
        if p.x < 0.0 || p.y < 0.0 || p.x > w as f32 || p.y > h as f32 {
            return Err(PickError::OutOfBounds {
                x: p.x,
                y: p.y,
                width: w,
                height: h,
            });
        }

        self.points.push(p);
        log::debug!("picked corner {} at ({:.1}, {:.1})", self.points.len(), p.x, p.y);

        if self.points.len() < 4 {
            return Ok(PickState::NeedMore(4 - self.points.len()));
        }
        let pts = [self.points[0], self.points[1], self.points[2], self.points[3]];
        let quad = order_corners(pts);
        self.quad = Some(quad);
        Ok(PickState::Complete(quad))
    }

    /// Image-space points in pick order.
    pub fn points(&self) -> &[Point2<f32>] {
        &self.points
    }

    pub fn quad(&self) -> Option<Quad> {
        self.quad
    }

    pub fn mapping(&self) -> &DisplayMapping {
        &self.mapping
    }

    pub fn reset(&mut self) {
        self.points.clear();
        self.quad = None;
    }
}
