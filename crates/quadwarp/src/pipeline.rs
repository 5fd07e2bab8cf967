//! End-to-end rectification: load → pick corners → rectify → save → slice → zip.

use std::{path::Path, time::Instant};

use nalgebra::Point2;
use quadwarp_core::{
    order_corners_strict, rectify_quad, slice_grid, CornerPicker, GridError, GridSpec, Image,
    PickError, PickState, Quad, QuadError, RectifiedView, Tile, WarpError,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::export::{check_tile_prefix, save_image, save_tiles_zip, ArchiveOptions, ExportError};
use crate::io::{ArchiveInfo, RectifiedInfo, WarpConfig, WarpReport};
use crate::load::{load_image_path, LoadError, LoadedImage};

/// Errors produced by the end-to-end pipeline.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("four corner points are required")]
    MissingCorners,
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Pick(#[from] PickError),
    #[error(transparent)]
    Quad(#[from] QuadError),
    #[error(transparent)]
    Warp(#[from] WarpError),
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Everything a run produced, in memory and on disk.
#[derive(Debug)]
pub struct WarpOutcome {
    pub report: WarpReport,
    pub rectified: RectifiedView,
    pub tiles: Vec<Tile>,
}

fn ms_since(t: Instant) -> u64 {
    t.elapsed().as_millis() as u64
}

/// Feed corner clicks through a [`CornerPicker`] and return the ordered quad.
///
/// Fails if fewer than four points are given or the ordering heuristic
/// assigns one point to two corners.
pub fn pick_quad(
    picker: &mut CornerPicker,
    clicks: &[[f32; 2]],
) -> Result<Quad, PipelineError> {
    let mut last = PickState::NeedMore(4);
    for &[x, y] in clicks {
        last = picker.push(Point2::new(x, y))?;
    }
    let PickState::Complete(_) = last else {
        return Err(PipelineError::MissingCorners);
    };
    let pts = picker.points();
    Ok(order_corners_strict([pts[0], pts[1], pts[2], pts[3]])?)
}

/// Rectify an already loaded image with the settings in `cfg`.
///
/// Nothing is written to disk.
pub fn rectify_loaded(
    loaded: &LoadedImage,
    cfg: &WarpConfig,
    report: &mut WarpReport,
) -> Result<RectifiedView, PipelineError> {
    let corners = cfg.corners.ok_or(PipelineError::MissingCorners)?;

    let mut picker = CornerPicker::new(cfg.display_mapping(loaded.width(), loaded.height()));
    let quad = pick_quad(&mut picker, &corners)?;
    report.picked_points = picker.points().iter().map(|p| [p.x, p.y]).collect();
    report.quad = Some(quad);
    log::info!(
        "ordered corners TL=({:.1},{:.1}) TR=({:.1},{:.1}) BR=({:.1},{:.1}) BL=({:.1},{:.1})",
        quad.top_left.x,
        quad.top_left.y,
        quad.top_right.x,
        quad.top_right.y,
        quad.bottom_right.x,
        quad.bottom_right.y,
        quad.bottom_left.x,
        quad.bottom_left.y
    );

    Ok(rectify_quad(&loaded.image.view(), &quad, &cfg.warp_params())?)
}

/// Slice `image` and write the tiles into a zip at `path`.
pub fn export_grid(
    image: &Image,
    grid: GridSpec,
    path: &Path,
    opts: &ArchiveOptions,
) -> Result<(Vec<Tile>, Vec<String>), PipelineError> {
    let tiles = slice_grid(image, grid)?;
    let names = save_tiles_zip(path, &tiles, Some(image), opts)?;
    Ok((tiles, names))
}

fn run_stages(cfg: &WarpConfig, report: &mut WarpReport) -> Result<WarpOutcome, PipelineError> {
    let t_total = Instant::now();
    if cfg.grid.is_some() {
        check_tile_prefix(&cfg.tile_prefix)?;
    }

    let t = Instant::now();
    let loaded = load_image_path(&cfg.image_path, &cfg.load_options())?;
    report.timings_ms.load = ms_since(t);
    report.input_format = Some(loaded.format);
    report.input_size = Some([loaded.width(), loaded.height()]);

    let t = Instant::now();
    let rectified = rectify_loaded(&loaded, cfg, report)?;
    report.timings_ms.rectify = ms_since(t);
    log::info!(
        "rectified to {}x{} in {} ms",
        rectified.image.width,
        rectified.image.height,
        report.timings_ms.rectify
    );

    let t = Instant::now();
    let out_path = cfg.output_path();
    let format = cfg.export_format();
    save_image(&rectified.image, &out_path, format)?;
    report.timings_ms.save = ms_since(t);
    report.rectified = Some(RectifiedInfo {
        path: out_path.to_string_lossy().into_owned(),
        width: rectified.image.width,
        height: rectified.image.height,
        format,
        h_img_from_rect: rectified.h_img_from_rect,
    });

    let mut tiles = Vec::new();
    if let (Some(grid), Some(zip_path)) = (cfg.grid, cfg.archive_path()) {
        let opts = ArchiveOptions {
            prefix: cfg.tile_prefix.clone(),
            format,
            include_full: cfg.archive_full,
        };

        let t = Instant::now();
        tiles = slice_grid(&rectified.image, grid)?;
        report.timings_ms.slice = Some(ms_since(t));

        let t = Instant::now();
        let full = cfg.archive_full.then_some(&rectified.image);
        let entries = save_tiles_zip(&zip_path, &tiles, full, &opts)?;
        report.timings_ms.archive = Some(ms_since(t));
        report.archive = Some(ArchiveInfo {
            path: zip_path.to_string_lossy().into_owned(),
            grid,
            entries,
        });
    }

    report.timings_ms.total = ms_since(t_total);
    Ok(WarpOutcome {
        report: report.clone(),
        rectified,
        tiles,
    })
}

/// Run the full pipeline described by `cfg`.
///
/// When `cfg.report_path` is set the report is written even on failure, with
/// the error message recorded in it.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(cfg), fields(image = %cfg.image_path))
)]
pub fn run_warp(cfg: &WarpConfig) -> Result<WarpOutcome, PipelineError> {
    let mut report = WarpReport::new(cfg);
    let res = run_stages(cfg, &mut report);

    if let Err(err) = &res {
        log::error!("rectification failed: {err}");
        report.set_error(err);
    }
    if let Some(path) = cfg.report_path.as_ref() {
        match report.write_json(path) {
            Ok(()) => log::info!("wrote report to {path}"),
            Err(err) => log::warn!("failed to write report {path}: {err}"),
        }
    }
    res
}
