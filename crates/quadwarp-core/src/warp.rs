use nalgebra::Point2;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::homography::{perspective_transform, Homography};
use crate::image::{sample_pixel, Image, ImageView, Interpolation};
use crate::quad::{Quad, QuadError};

/// Side of the square output used when nothing else is requested.
pub const DEFAULT_OUTPUT_SIDE: u32 = 500;

/// Minimum quad area, in px², accepted by [`WarpParams::default`].
pub const DEFAULT_MIN_QUAD_AREA: f32 = 16.0;

/// Largest output accepted by [`OutputSize::resolve`] (64 Mpx, 256 MiB as RGBA).
pub const MAX_OUTPUT_PIXELS: u64 = 8192 * 8192;

#[derive(thiserror::Error, Debug)]
pub enum WarpError {
    #[error(transparent)]
    Quad(#[from] QuadError),
    #[error(
        "invalid output size {width}x{height} (sides must be positive, at most {max} pixels in total)",
        max = MAX_OUTPUT_PIXELS
    )]
    InvalidOutputSize { width: u32, height: u32 },
    #[error("homography estimation failed")]
    HomographyFailed,
    #[error("homography not invertible")]
    NonInvertible,
}

/// Size of the rectified output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputSize {
    Square(u32),
    Fixed { width: u32, height: u32 },
    /// Follow the quad's aspect ratio; the longer side gets `max_side` px.
    FromQuad { max_side: u32 },
}

impl Default for OutputSize {
    fn default() -> Self {
        OutputSize::Square(DEFAULT_OUTPUT_SIDE)
    }
}

impl OutputSize {
    /// Concrete `(width, height)` for `quad`. Zero sides and outputs above
    /// [`MAX_OUTPUT_PIXELS`] are rejected.
    pub fn resolve(&self, quad: &Quad) -> Result<(u32, u32), WarpError> {
        let (width, height) = match *self {
            OutputSize::Square(side) => (side, side),
            OutputSize::Fixed { width, height } => (width, height),
            OutputSize::FromQuad { max_side } => {
                if max_side == 0 {
                    (0, 0)
                } else {
                    quad.suggested_size(max_side)
                }
            }
        };
        let pixels = u64::from(width) * u64::from(height);
        if pixels == 0 || pixels > MAX_OUTPUT_PIXELS {
            return Err(WarpError::InvalidOutputSize { width, height });
        }
        Ok((width, height))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WarpParams {
    #[serde(default)]
    pub output_size: OutputSize,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default = "default_min_quad_area")]
    pub min_quad_area: f32,
}

fn default_min_quad_area() -> f32 {
    DEFAULT_MIN_QUAD_AREA
}

impl Default for WarpParams {
    fn default() -> Self {
        Self {
            output_size: OutputSize::default(),
            interpolation: Interpolation::default(),
            min_quad_area: DEFAULT_MIN_QUAD_AREA,
        }
    }
}

#[derive(Clone, Debug)]
pub struct RectifiedView {
    pub image: Image,
    pub quad: Quad,
    pub h_img_from_rect: Homography,
    pub h_rect_from_img: Homography,
}

impl RectifiedView {
    /// Map a point in rectified pixel coordinates back into the source image.
    pub fn rect_to_img(&self, p: Point2<f32>) -> Point2<f32> {
        self.h_img_from_rect.apply(p)
    }

    pub fn img_to_rect(&self, p: Point2<f32>) -> Point2<f32> {
        self.h_rect_from_img.apply(p)
    }
}

/// Warp into a `out_w x out_h` image: every destination pixel center is mapped
/// to the source through `h_img_from_rect` and sampled there.
///
/// # Panics
///
/// Panics if `out_w` or `out_h` is zero. [`rectify_quad`] sizes its output
/// through [`OutputSize::resolve`], which also caps it at [`MAX_OUTPUT_PIXELS`].
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(src, h_img_from_rect), fields(width = src.width, height = src.height))
)]
pub fn warp_perspective(
    src: &ImageView<'_>,
    h_img_from_rect: Homography,
    out_w: usize,
    out_h: usize,
    interp: Interpolation,
) -> Image {
    assert!(
        out_w > 0 && out_h > 0,
        "warp output must be non-empty (got {out_w}x{out_h})"
    );
    let c = src.channels;
    let mut out = vec![0u8; out_w * out_h * c];

    for (y, row) in out.chunks_exact_mut(out_w * c).enumerate() {
        for (x, px) in row.chunks_exact_mut(c).enumerate() {
            let pr = Point2::new(x as f32 + 0.5, y as f32 + 0.5);
            let pi = h_img_from_rect.apply(pr);
            // Source pixel centers sit at integer + 0.5.
            sample_pixel(src, pi.x - 0.5, pi.y - 0.5, interp, px);
        }
    }

    Image {
        width: out_w,
        height: out_h,
        channels: c,
        data: out,
    }
}

/// Rectify the region bounded by `quad` into an axis-aligned image.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(src, quad, params), fields(width = src.width, height = src.height))
)]
pub fn rectify_quad(
    src: &ImageView<'_>,
    quad: &Quad,
    params: &WarpParams,
) -> Result<RectifiedView, WarpError> {
    quad.validate(params.min_quad_area)?;
    let (out_w, out_h) = params.output_size.resolve(quad)?;

    let pair = perspective_transform(&quad.to_array(), out_w as f32, out_h as f32)
        .ok_or(WarpError::HomographyFailed)?;
    if pair.h_img_from_rect.h.try_inverse().is_none() {
        return Err(WarpError::NonInvertible);
    }

    log::debug!(
        "rectifying {}x{} source into {}x{} ({:?})",
        src.width,
        src.height,
        out_w,
        out_h,
        params.interpolation
    );

    let image = warp_perspective(
        src,
        pair.h_img_from_rect,
        out_w as usize,
        out_h as usize,
        params.interpolation,
    );

    Ok(RectifiedView {
        image,
        quad: *quad,
        h_img_from_rect: pair.h_img_from_rect,
        h_rect_from_img: pair.h_rect_from_img,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::homography_from_4pt;

    fn p(x: f32, y: f32) -> Point2<f32> {
        Point2::new(x, y)
    }

    /// Draw a quadrilateral "page" filled with 200 on a dark 40 background.
    fn synthetic_page(w: usize, h: usize, quad: &Quad) -> Image {
        let mut img = Image::new_blank(w, h, 1).unwrap();
        let corners = quad.to_array();
        for y in 0..h {
            for x in 0..w {
                let q = p(x as f32 + 0.5, y as f32 + 0.5);
                let inside = (0..4).all(|i| {
                    let a = corners[i];
                    let b = corners[(i + 1) % 4];
                    (b.x - a.x) * (q.y - a.y) - (b.y - a.y) * (q.x - a.x) >= 0.0
                });
                img.data[y * w + x] = if inside { 200 } else { 40 };
            }
        }
        img
    }

    #[test]
    fn identity_warp_reproduces_source() {
        let data: Vec<u8> = (0..16 * 8 * 3).map(|i| (i % 251) as u8).collect();
        let src = Image::from_raw(16, 8, 3, data).unwrap();
        let out = warp_perspective(&src.view(), Homography::identity(), 16, 8, Interpolation::Bilinear);
        assert_eq!(out, src);
        let out = warp_perspective(&src.view(), Homography::identity(), 16, 8, Interpolation::Nearest);
        assert_eq!(out, src);
    }

    #[test]
    fn rectified_interior_is_page_colored() {
        let quad = Quad::from_array([p(60.0, 40.0), p(260.0, 70.0), p(250.0, 230.0), p(40.0, 200.0)]);
        let src = synthetic_page(300, 260, &quad);

        let params = WarpParams {
            output_size: OutputSize::Square(100),
            ..WarpParams::default()
        };
        let view = rectify_quad(&src.view(), &quad, &params).expect("rectify");
        assert_eq!((view.image.width, view.image.height), (100, 100));

        // Everything but a thin border is inside the page.
        for y in 3..97 {
            for x in 3..97 {
                assert_eq!(view.image.pixel(x, y)[0], 200, "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn rectangle_corners_map_back_to_quad() {
        let quad = Quad::from_array([p(112.0, 64.0), p(410.0, 90.0), p(430.0, 380.0), p(80.0, 350.0)]);
        let src = Image::new_blank(500, 450, 4).unwrap();
        let params = WarpParams {
            output_size: OutputSize::Fixed {
                width: 300,
                height: 200,
            },
            ..WarpParams::default()
        };
        let view = rectify_quad(&src.view(), &quad, &params).unwrap();
        let rect = [p(0.0, 0.0), p(300.0, 0.0), p(300.0, 200.0), p(0.0, 200.0)];
        for (r, q) in rect.iter().zip(quad.to_array()) {
            let back = view.rect_to_img(*r);
            assert!((back.x - q.x).abs() < 1e-3 && (back.y - q.y).abs() < 1e-3);
            let fwd = view.img_to_rect(q);
            assert!((fwd.x - r.x).abs() < 1e-3 && (fwd.y - r.y).abs() < 1e-3);
        }
        assert_eq!(view.image.channels, 4);
    }

    #[test]
    fn region_outside_source_is_transparent() {
        // Quad hangs off the left edge of a fully opaque white image.
        let src = Image::from_raw(100, 100, 4, vec![255; 100 * 100 * 4]).unwrap();
        let quad = Quad::from_array([p(-100.0, 0.0), p(100.0, 0.0), p(100.0, 100.0), p(-100.0, 100.0)]);
        let params = WarpParams {
            output_size: OutputSize::Fixed {
                width: 200,
                height: 100,
            },
            ..WarpParams::default()
        };
        let view = rectify_quad(&src.view(), &quad, &params).unwrap();
        assert_eq!(view.image.pixel(10, 50), &[0, 0, 0, 0]);
        assert_eq!(view.image.pixel(150, 50), &[255, 255, 255, 255]);
    }

    #[test]
    fn from_quad_size_and_errors() {
        let quad = Quad::from_array([p(0.0, 0.0), p(400.0, 0.0), p(400.0, 100.0), p(0.0, 100.0)]);
        assert_eq!(
            OutputSize::FromQuad { max_side: 800 }.resolve(&quad).unwrap(),
            (800, 200)
        );
        assert!(matches!(
            OutputSize::Square(0).resolve(&quad),
            Err(WarpError::InvalidOutputSize { .. })
        ));

        let src = Image::new_blank(10, 10, 1).unwrap();
        let flat = Quad::from_array([p(0.0, 0.0), p(5.0, 0.0), p(9.0, 0.0), p(2.0, 0.0)]);
        assert!(matches!(
            rectify_quad(&src.view(), &flat, &WarpParams::default()),
            Err(WarpError::Quad(QuadError::Degenerate { .. }))
        ));
    }

    #[test]
    fn oversized_outputs_are_rejected_before_warping() {
        let src = Image::new_blank(64, 64, 4).unwrap();
        let quad = Quad::from_array([p(4.0, 4.0), p(60.0, 6.0), p(58.0, 60.0), p(6.0, 58.0)]);

        for output_size in [
            OutputSize::Square(u32::MAX),
            OutputSize::Square(100_000),
            OutputSize::Fixed {
                width: 1,
                height: u32::MAX,
            },
            OutputSize::FromQuad { max_side: u32::MAX },
        ] {
            let params = WarpParams {
                output_size,
                ..WarpParams::default()
            };
            assert!(
                matches!(
                    rectify_quad(&src.view(), &quad, &params),
                    Err(WarpError::InvalidOutputSize { .. })
                ),
                "{output_size:?}"
            );
        }

        assert_eq!(
            OutputSize::Fixed {
                width: 8192,
                height: 8192
            }
            .resolve(&quad)
            .unwrap(),
            (8192, 8192)
        );
        assert!(OutputSize::Fixed {
            width: 8193,
            height: 8192
        }
        .resolve(&quad)
        .is_err());
    }

    #[test]
    #[should_panic(expected = "non-empty")]
    fn warp_perspective_panics_on_empty_output() {
        let src = Image::new_blank(4, 4, 1).unwrap();
        warp_perspective(&src.view(), Homography::identity(), 0, 4, Interpolation::Nearest);
    }

    #[test]
    fn warp_agrees_with_explicit_homography() {
        let quad = Quad::from_array([p(10.0, 10.0), p(90.0, 20.0), p(80.0, 90.0), p(20.0, 80.0)]);
        let rect = [p(0.0, 0.0), p(50.0, 0.0), p(50.0, 50.0), p(0.0, 50.0)];
        let h = homography_from_4pt(&rect, &quad.to_array()).unwrap();
        let src = synthetic_page(100, 100, &quad);
        let params = WarpParams {
            output_size: OutputSize::Square(50),
            ..WarpParams::default()
        };
        let view = rectify_quad(&src.view(), &quad, &params).unwrap();
        let direct = warp_perspective(&src.view(), h, 50, 50, Interpolation::Bilinear);
        let max_diff = view
            .image
            .data
            .iter()
            .zip(&direct.data)
            .map(|(a, b)| a.abs_diff(*b))
            .max()
            .unwrap_or(0);
        assert!(max_diff <= 1, "max diff {max_diff}");
    }
}
