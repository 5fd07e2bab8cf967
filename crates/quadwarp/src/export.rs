//! Encoding rectified images and packing grid tiles into zip archives.

use std::{
    fs,
    io::{Cursor, Seek, Write},
    path::Path,
    str::FromStr,
};

use image::{codecs::jpeg::JpegEncoder, ImageFormat};
use quadwarp_core::{GridCell, Image, Tile};
use serde::{Deserialize, Serialize};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use crate::load::from_core_image;

/// JPEG quality used when none is given.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(thiserror::Error, Debug)]
pub enum ExportError {
    #[error("failed to encode image: {0}")]
    Encode(#[from] image::ImageError),
    #[error("unsupported raster layout ({channels} channels)")]
    Layout { channels: usize },
    #[error("zip archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("invalid tile prefix {0:?}: must be non-empty without path separators or '..'")]
    InvalidPrefix(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExportFormat {
    #[default]
    Png,
    Jpeg {
        #[serde(default = "default_quality")]
        quality: u8,
    },
}

fn default_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}

impl ExportFormat {
    pub fn jpeg() -> Self {
        ExportFormat::Jpeg {
            quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg { .. } => "jpg",
        }
    }

    /// Pick a format from a file extension, if it names one.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        ext.parse().ok()
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ExportFormat::Png),
            "jpg" | "jpeg" => Ok(ExportFormat::jpeg()),
            other => Err(format!("unknown export format '{other}' (expected png or jpeg)")),
        }
    }
}

/// Encode a core raster. JPEG output drops alpha.
pub fn encode_image(img: &Image, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    let dynimg = from_core_image(img).ok_or(ExportError::Layout {
        channels: img.channels,
    })?;
    let mut buf = Cursor::new(Vec::new());
    match format {
        ExportFormat::Png => dynimg.write_to(&mut buf, ImageFormat::Png)?,
        ExportFormat::Jpeg { quality } => {
            let rgb = dynimg.to_rgb8();
            let enc = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
            rgb.write_with_encoder(enc)?;
        }
    }
    Ok(buf.into_inner())
}

pub fn save_image(img: &Image, path: impl AsRef<Path>, format: ExportFormat) -> Result<(), ExportError> {
    let path = path.as_ref();
    let bytes = encode_image(img, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    log::info!(
        "wrote {}x{} {} to {}",
        img.width,
        img.height,
        format.extension(),
        path.display()
    );
    Ok(())
}

fn digits(n: u32) -> usize {
    n.max(1).to_string().len()
}

/// `{prefix}_r{row}_c{col}.{ext}`, zero-padded to the widest index in the grid.
pub fn tile_file_name(prefix: &str, cell: &GridCell, rows: u32, cols: u32, ext: &str) -> String {
    let rw = digits(rows.saturating_sub(1));
    let cw = digits(cols.saturating_sub(1));
    format!(
        "{prefix}_r{:0rw$}_c{:0cw$}.{ext}",
        cell.row,
        cell.col,
        rw = rw,
        cw = cw
    )
}

/// Entry names must stay at the archive root.
pub fn check_tile_prefix(prefix: &str) -> Result<(), ExportError> {
    if prefix.is_empty() || prefix.contains(['/', '\\']) || prefix.contains("..") {
        return Err(ExportError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ArchiveOptions {
    /// Entry name stem; tiles are `{prefix}_rR_cC.ext`.
    pub prefix: String,
    pub format: ExportFormat,
    /// Also store the full rectified image as `{prefix}.ext`.
    pub include_full: bool,
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            prefix: "tile".to_string(),
            format: ExportFormat::Png,
            include_full: false,
        }
    }
}

/// Write `tiles` (row-major) and optionally `full` into a zip archive.
///
/// Returns the entry names in the order they were written.
pub fn write_tiles_zip<W: Write + Seek>(
    writer: W,
    tiles: &[Tile],
    full: Option<&Image>,
    opts: &ArchiveOptions,
) -> Result<Vec<String>, ExportError> {
    check_tile_prefix(&opts.prefix)?;
    // Encoded PNG/JPEG data does not shrink further; store entries as-is.
    let entry_opts = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Stored)
        .unix_permissions(0o644);
    let ext = opts.format.extension();
    let rows = tiles.iter().map(|t| t.cell.row + 1).max().unwrap_or(1);
    let cols = tiles.iter().map(|t| t.cell.col + 1).max().unwrap_or(1);

    let mut zip = ZipWriter::new(writer);
    let mut names = Vec::with_capacity(tiles.len() + 1);

    if let (true, Some(img)) = (opts.include_full, full) {
        let name = format!("{}.{ext}", opts.prefix);
        zip.start_file(name.as_str(), entry_opts)?;
        zip.write_all(&encode_image(img, opts.format)?)?;
        names.push(name);
    }

    for tile in tiles {
        let name = tile_file_name(&opts.prefix, &tile.cell, rows, cols, ext);
        zip.start_file(name.as_str(), entry_opts)?;
        zip.write_all(&encode_image(&tile.image, opts.format)?)?;
        log::debug!("archived {name} ({}x{})", tile.image.width, tile.image.height);
        names.push(name);
    }

    zip.finish()?;
    Ok(names)
}

/// Create `path` and write the archive into it.
pub fn save_tiles_zip(
    path: impl AsRef<Path>,
    tiles: &[Tile],
    full: Option<&Image>,
    opts: &ArchiveOptions,
) -> Result<Vec<String>, ExportError> {
    let path = path.as_ref();
    check_tile_prefix(&opts.prefix)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let file = fs::File::create(path)?;
    let names = write_tiles_zip(file, tiles, full, opts)?;
    log::info!("wrote {} entries to {}", names.len(), path.display());
    Ok(names)
}
