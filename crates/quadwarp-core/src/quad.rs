//! Corner ordering and quadrilateral sanity checks.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QuadError {
    #[error("corner ordering assigned input point #{index} to more than one corner")]
    DuplicateCorner { index: usize },
    #[error("corners do not form a convex quadrilateral")]
    NotConvex,
    #[error("quadrilateral area {area:.1} px² is below the minimum {min_area:.1} px²")]
    Degenerate { area: f32, min_area: f32 },
    #[error("corner coordinates must be finite")]
    NonFinite,
}

/// Four image points in clockwise order starting at the top-left.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    pub top_left: Point2<f32>,
    pub top_right: Point2<f32>,
    pub bottom_right: Point2<f32>,
    pub bottom_left: Point2<f32>,
}

/// Input indices chosen for each corner by [`order_corners_indexed`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CornerAssignment {
    pub top_left: usize,
    pub top_right: usize,
    pub bottom_right: usize,
    pub bottom_left: usize,
}

impl CornerAssignment {
    /// Index of the first input point used for two corners, if any.
    pub fn duplicate(&self) -> Option<usize> {
        let idx = [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ];
        (0..4).find_map(|a| ((a + 1)..4).find(|&b| idx[a] == idx[b]).map(|_| idx[a]))
    }
}

// Strict comparison: on ties the later point wins.
fn pick(points: &[Point2<f32>; 4], better: impl Fn(&Point2<f32>, &Point2<f32>) -> bool) -> usize {
    (1..4).fold(0, |best, i| {
        if better(&points[best], &points[i]) {
            best
        } else {
            i
        }
    })
}

/// Sum/difference ordering, returning which input fed each corner.
///
/// - top-left: min `x + y`
/// - top-right: max `x - y`
/// - bottom-right: max `x + y`
/// - bottom-left: max `y - x`
pub fn order_corners_indexed(points: &[Point2<f32>; 4]) -> CornerAssignment {
    CornerAssignment {
        top_left: pick(points, |p, c| p.x + p.y < c.x + c.y),
        top_right: pick(points, |p, c| p.x - p.y > c.x - c.y),
        bottom_right: pick(points, |p, c| p.x + p.y > c.x + c.y),
        bottom_left: pick(points, |p, c| p.y - p.x > c.y - c.x),
    }
}

/// Order four points given in any sequence into a [`Quad`].
///
/// The heuristic is not guaranteed to be a bijection for strongly rotated
/// inputs; call [`Quad::validate`] before using the result.
pub fn order_corners(points: [Point2<f32>; 4]) -> Quad {
    let a = order_corners_indexed(&points);
    Quad {
        top_left: points[a.top_left],
        top_right: points[a.top_right],
        bottom_right: points[a.bottom_right],
        bottom_left: points[a.bottom_left],
    }
}

/// Like [`order_corners`] but fails if any input point was used twice.
pub fn order_corners_strict(points: [Point2<f32>; 4]) -> Result<Quad, QuadError> {
    let a = order_corners_indexed(&points);
    if let Some(index) = a.duplicate() {
        return Err(QuadError::DuplicateCorner { index });
    }
    Ok(order_corners(points))
}

#[inline]
fn cross(o: Point2<f32>, a: Point2<f32>, b: Point2<f32>) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

impl Quad {
    pub fn from_array(pts: [Point2<f32>; 4]) -> Self {
        Self {
            top_left: pts[0],
            top_right: pts[1],
            bottom_right: pts[2],
            bottom_left: pts[3],
        }
    }

    /// Corners as `[TL, TR, BR, BL]`.
    pub fn to_array(&self) -> [Point2<f32>; 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }

    /// Shoelace area in px².
    pub fn area(&self) -> f32 {
        let p = self.to_array();
        let twice: f32 = (0..4)
            .map(|i| {
                let (a, b) = (p[i], p[(i + 1) % 4]);
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice.abs() * 0.5
    }

    /// Edge lengths `[top, right, bottom, left]`.
    pub fn edge_lengths(&self) -> [f32; 4] {
        let p = self.to_array();
        std::array::from_fn(|i| nalgebra::distance(&p[i], &p[(i + 1) % 4]))
    }

    pub fn is_convex(&self) -> bool {
        let p = self.to_array();
        let signs: Vec<f32> = (0..4)
            .map(|i| cross(p[i], p[(i + 1) % 4], p[(i + 2) % 4]))
            .collect();
        signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
    }

    /// Reject quads that cannot produce a meaningful rectification.
    pub fn validate(&self, min_area: f32) -> Result<(), QuadError> {
        if !self
            .to_array()
            .iter()
            .all(|p| p.x.is_finite() && p.y.is_finite())
        {
            return Err(QuadError::NonFinite);
        }
        let area = self.area();
        if area < min_area {
            return Err(QuadError::Degenerate { area, min_area });
        }
        if !self.is_convex() {
            return Err(QuadError::NotConvex);
        }
        Ok(())
    }

    /// Output size whose aspect ratio follows the mean opposite-edge lengths,
    /// scaled so the longer side equals `max_side`.
    pub fn suggested_size(&self, max_side: u32) -> (u32, u32) {
        let [top, right, bottom, left] = self.edge_lengths();
        let w = 0.5 * (top + bottom);
        let h = 0.5 * (left + right);
        let long = w.max(h);
        if long <= f32::EPSILON {
            return (max_side.max(1), max_side.max(1));
        }
        let s = max_side as f32 / long;
        (
            ((w * s).round() as u32).max(1),
            ((h * s).round() as u32).max(1),
        )
    }
}
