//! Rectify photographed documents and whiteboards from four marked corners.
//!
//! This crate provides:
//! - re-exports of the geometric core (`quadwarp-core`)
//! - input loading with content sniffing and an upload size limit
//! - PNG/JPEG export and zip packaging of grid tiles
//! - JSON config/report types and an end-to-end [`pipeline::run_warp`]
//! - (feature `cli`) the `quadwarp` command-line tool
//!
//! ## Quickstart
//!
//! ```no_run
//! use quadwarp::io::WarpConfig;
//! use quadwarp::pipeline::run_warp;
//! use quadwarp::core::GridSpec;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut cfg = WarpConfig::new("whiteboard.jpg");
//! cfg.corners = Some([[812.0, 95.0], [64.0, 120.0], [40.0, 700.0], [840.0, 690.0]]);
//! cfg.output_path = Some("whiteboard_rect.png".into());
//! cfg.grid = Some(GridSpec::new(2, 2));
//!
//! let outcome = run_warp(&cfg)?;
//! println!("tiles: {}", outcome.tiles.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `quadwarp::core`: corner ordering, homographies, warping, grid slicing.
//! - `quadwarp::load`: format sniffing, size limit, decoding to RGBA.
//! - `quadwarp::export`: image encoding and tile archives.
//! - `quadwarp::io`: `WarpConfig` / `WarpReport` JSON.
//! - `quadwarp::pipeline`: the load → rectify → export run.

pub use quadwarp_core as core;

pub use quadwarp_core::{
    order_corners, rectify_quad, slice_grid, GridSpec, Homography, Image, OutputSize, Quad,
    RectifiedView, Tile, WarpParams,
};

pub mod export;
pub mod io;
pub mod load;
pub mod pipeline;
