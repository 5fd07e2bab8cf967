//! Core geometry for four-point perspective rectification.
//!
//! Given a photo of a document or whiteboard and four user-marked corners,
//! this crate orders the corners, solves the quad-to-rectangle homography,
//! resamples the region into an axis-aligned image and optionally cuts the
//! result into a grid of tiles.
//!
//! The crate is purely geometric: it works on raw 8-bit buffers
//! ([`ImageView`] / [`Image`]) and does not depend on any image codec.
//!
//! ```
//! use nalgebra::Point2;
//! use quadwarp_core::{order_corners, rectify_quad, Image, OutputSize, WarpParams};
//!
//! let src = Image::new_blank(640, 480, 4).unwrap();
//! let quad = order_corners([
//!     Point2::new(600.0, 40.0),
//!     Point2::new(20.0, 30.0),
//!     Point2::new(30.0, 450.0),
//!     Point2::new(610.0, 460.0),
//! ]);
//! let params = WarpParams {
//!     output_size: OutputSize::Square(200),
//!     ..WarpParams::default()
//! };
//! let view = rectify_quad(&src.view(), &quad, &params).unwrap();
//! assert_eq!((view.image.width, view.image.height), (200, 200));
//! ```

mod grid;
mod homography;
mod image;
mod logger;
mod picker;
mod quad;
mod warp;

pub use grid::{grid_cells, slice_grid, GridCell, GridError, GridSpec, Tile};
pub use homography::{homography_from_4pt, perspective_transform, Homography, PerspectivePair};
pub use image::{sample_bilinear, sample_pixel, Image, ImageError, ImageView, Interpolation};
pub use picker::{CornerPicker, DisplayMapping, PickError, PickState};
pub use quad::{
    order_corners, order_corners_indexed, order_corners_strict, CornerAssignment, Quad, QuadError,
};
pub use warp::{
    rectify_quad, warp_perspective, OutputSize, RectifiedView, WarpError, WarpParams,
    DEFAULT_MIN_QUAD_AREA, DEFAULT_OUTPUT_SIDE, MAX_OUTPUT_PIXELS,
};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{filter_directive, init_with_level, level_from_verbosity};
