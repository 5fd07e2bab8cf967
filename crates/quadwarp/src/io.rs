//! JSON configuration and report helpers.

use std::{
    fs,
    path::{Path, PathBuf},
};

use quadwarp_core::{
    DisplayMapping, GridSpec, Homography, Interpolation, OutputSize, Quad, WarpParams,
    DEFAULT_MIN_QUAD_AREA,
};
use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;
use crate::load::{InputFormat, LoadOptions, DEFAULT_MAX_INPUT_BYTES};

/// Output name used when the config does not give one.
pub const DEFAULT_OUTPUT_NAME: &str = "warpedPerspective.png";

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn default_max_input_bytes() -> u64 {
    DEFAULT_MAX_INPUT_BYTES
}

fn default_min_quad_area() -> f32 {
    DEFAULT_MIN_QUAD_AREA
}

fn default_tile_prefix() -> String {
    "tile".to_string()
}

/// Configuration for one rectification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpConfig {
    pub image_path: String,
    /// Four corner points in any order. Interpreted in display space when
    /// `display` is set, otherwise in image pixels.
    #[serde(default)]
    pub corners: Option<[[f32; 2]; 4]>,
    /// Display size the corners were picked at, as `[width, height]`.
    #[serde(default)]
    pub display: Option<[f32; 2]>,
    #[serde(default)]
    pub output_path: Option<String>,
    #[serde(default)]
    pub output_size: OutputSize,
    #[serde(default)]
    pub interpolation: Interpolation,
    #[serde(default)]
    pub export_format: Option<ExportFormat>,
    #[serde(default)]
    pub grid: Option<GridSpec>,
    #[serde(default)]
    pub archive_path: Option<String>,
    #[serde(default = "default_tile_prefix")]
    pub tile_prefix: String,
    /// Store the full rectified image in the archive next to the tiles.
    #[serde(default)]
    pub archive_full: bool,
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: u64,
    #[serde(default = "default_min_quad_area")]
    pub min_quad_area: f32,
    #[serde(default)]
    pub report_path: Option<String>,
}

impl WarpConfig {
    pub fn new(image_path: impl Into<String>) -> Self {
        Self {
            image_path: image_path.into(),
            corners: None,
            display: None,
            output_path: None,
            output_size: OutputSize::default(),
            interpolation: Interpolation::default(),
            export_format: None,
            grid: None,
            archive_path: None,
            tile_prefix: default_tile_prefix(),
            archive_full: false,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            min_quad_area: DEFAULT_MIN_QUAD_AREA,
            report_path: None,
        }
    }

    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Resolve the rectified image path.
    pub fn output_path(&self) -> PathBuf {
        self.output_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_NAME))
    }

    /// Explicit format, else inferred from the output extension, else PNG.
    pub fn export_format(&self) -> ExportFormat {
        self.export_format
            .or_else(|| ExportFormat::from_path(&self.output_path()))
            .unwrap_or_default()
    }

    /// Archive path; defaults to the output path with a `.zip` extension when
    /// a grid is requested.
    pub fn archive_path(&self) -> Option<PathBuf> {
        match (&self.archive_path, self.grid) {
            (Some(p), _) => Some(PathBuf::from(p)),
            (None, Some(_)) => Some(self.output_path().with_extension("zip")),
            (None, None) => None,
        }
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            max_bytes: self.max_input_bytes,
        }
    }

    pub fn warp_params(&self) -> WarpParams {
        WarpParams {
            output_size: self.output_size,
            interpolation: self.interpolation,
            min_quad_area: self.min_quad_area,
        }
    }

    /// Display mapping for an image of the given size.
    pub fn display_mapping(&self, image_w: u32, image_h: u32) -> DisplayMapping {
        match self.display {
            Some([dw, dh]) => DisplayMapping::scaled(image_w, image_h, dw, dh),
            None => DisplayMapping::identity(image_w, image_h),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingsMs {
    pub load: u64,
    pub rectify: u64,
    pub save: u64,
    #[serde(default)]
    pub slice: Option<u64>,
    #[serde(default)]
    pub archive: Option<u64>,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifiedInfo {
    pub path: String,
    pub width: usize,
    pub height: usize,
    pub format: ExportFormat,
    pub h_img_from_rect: Homography,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveInfo {
    pub path: String,
    pub grid: GridSpec,
    pub entries: Vec<String>,
}

/// Summary of a rectification run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpReport {
    pub image_path: String,
    #[serde(default)]
    pub input_format: Option<InputFormat>,
    #[serde(default)]
    pub input_size: Option<[u32; 2]>,
    /// Corner points in image pixels, in the order they were given.
    #[serde(default)]
    pub picked_points: Vec<[f32; 2]>,
    #[serde(default)]
    pub quad: Option<Quad>,
    #[serde(default)]
    pub rectified: Option<RectifiedInfo>,
    #[serde(default)]
    pub archive: Option<ArchiveInfo>,
    #[serde(default)]
    pub timings_ms: TimingsMs,
    #[serde(default)]
    pub error: Option<String>,
}

impl WarpReport {
    pub fn new(cfg: &WarpConfig) -> Self {
        Self {
            image_path: cfg.image_path.clone(),
            input_format: None,
            input_size: None,
            picked_points: Vec::new(),
            quad: None,
            rectified: None,
            archive: None,
            timings_ms: TimingsMs::default(),
            error: None,
        }
    }

    /// Record a failure.
    pub fn set_error(&mut self, err: &dyn std::error::Error) {
        self.error = Some(err.to_string());
    }

    /// Load a report from JSON on disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), IoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: WarpConfig = serde_json::from_str(r#"{ "image_path": "board.jpg" }"#).unwrap();
        assert_eq!(cfg, WarpConfig::new("board.jpg"));
        assert_eq!(cfg.output_path(), PathBuf::from("warpedPerspective.png"));
        assert_eq!(cfg.output_size, OutputSize::Square(500));
        assert_eq!(cfg.max_input_bytes, 5 * 1024 * 1024);
        assert_eq!(cfg.export_format(), ExportFormat::Png);
        assert!(cfg.archive_path().is_none());
    }

    #[test]
    fn full_config_parses() {
        let raw = r#"{
            "image_path": "wb.png",
            "corners": [[10, 10], [300, 12], [290, 200], [5, 210]],
            "display": [640, 480],
            "output_path": "out/wb.jpg",
            "output_size": { "fixed": { "width": 800, "height": 600 } },
            "interpolation": "nearest",
            "grid": { "rows": 2, "cols": 3 },
            "min_quad_area": 100.0
        }"#;
        let cfg: WarpConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(
            cfg.output_size,
            OutputSize::Fixed {
                width: 800,
                height: 600
            }
        );
        assert_eq!(cfg.interpolation, Interpolation::Nearest);
        assert_eq!(cfg.export_format(), ExportFormat::jpeg());
        assert_eq!(cfg.archive_path(), Some(PathBuf::from("out/wb.zip")));
        let p = cfg
            .display_mapping(1280, 960)
            .to_image(nalgebra::Point2::new(10.0, 10.0))
            .unwrap();
        assert_eq!(p, nalgebra::Point2::new(20.0, 20.0));
        assert_eq!(cfg.warp_params().min_quad_area, 100.0);
    }

    #[test]
    fn config_and_report_survive_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = WarpConfig::new("in.png");
        cfg.grid = Some(GridSpec::new(3, 3));
        let cfg_path = dir.path().join("cfg.json");
        cfg.write_json(&cfg_path).unwrap();
        assert_eq!(WarpConfig::load_json(&cfg_path).unwrap(), cfg);

        let mut report = WarpReport::new(&cfg);
        report.input_format = Some(InputFormat::Jpeg);
        report.set_error(&std::io::Error::other("boom"));
        let report_path = dir.path().join("report.json");
        report.write_json(&report_path).unwrap();
        let back = WarpReport::load_json(&report_path).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.error.as_deref(), Some("boom"));
    }
}
