//! Input acceptance: size limit, content sniffing and decoding.

use std::{fmt, fs, path::Path};

use image::{ImageFormat, RgbaImage};
use quadwarp_core::Image;
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Upload limit applied when the caller does not choose one (5 MiB).
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 5 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum LoadError {
    #[error("input is empty")]
    Empty,
    #[error("input is {size} bytes, larger than the {max} byte limit")]
    TooLarge { size: u64, max: u64 },
    #[error("unsupported input format (expected PNG or JPEG)")]
    UnsupportedFormat,
    #[error(
        "HEIC/HEIF input is not supported; convert it to JPEG first \
         (e.g. `heif-convert photo.heic photo.jpg` or `sips -s format jpeg`)"
    )]
    HeicNotSupported,
    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("decoded image has invalid size: {0}")]
    Raster(#[from] quadwarp_core::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Container format detected from the leading bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    Png,
    Jpeg,
    Heic,
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputFormat::Png => "png",
            InputFormat::Jpeg => "jpeg",
            InputFormat::Heic => "heic",
        })
    }
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const HEIF_BRANDS: [&[u8; 4]; 8] = [
    b"heic", b"heix", b"hevc", b"hevx", b"mif1", b"msf1", b"heim", b"heis",
];

/// Sniff the container format. Extensions and MIME types are not trusted.
pub fn sniff_format(bytes: &[u8]) -> Option<InputFormat> {
    if bytes.starts_with(&PNG_SIGNATURE) {
        return Some(InputFormat::Png);
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(InputFormat::Jpeg);
    }
    // ISO-BMFF: [size:4]["ftyp"][major brand:4]...
    if bytes.len() >= 12 && &bytes[4..8] == b"ftyp" {
        let brand = &bytes[8..12];
        if HEIF_BRANDS.iter().any(|b| b.as_slice() == brand) {
            return Some(InputFormat::Heic);
        }
    }
    None
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub max_bytes: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_INPUT_BYTES,
        }
    }
}

/// A decoded input, normalized to RGBA8.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    pub format: InputFormat,
    pub byte_len: u64,
    pub image: Image,
}

impl LoadedImage {
    pub fn width(&self) -> u32 {
        self.image.width as u32
    }

    pub fn height(&self) -> u32 {
        self.image.height as u32
    }
}

fn check_size(size: u64, opts: &LoadOptions) -> Result<(), LoadError> {
    if size == 0 {
        return Err(LoadError::Empty);
    }
    if size > opts.max_bytes {
        return Err(LoadError::TooLarge {
            size,
            max: opts.max_bytes,
        });
    }
    Ok(())
}

/// Validate and decode an in-memory upload.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "info", skip(bytes, opts), fields(len = bytes.len()))
)]
pub fn load_image_bytes(bytes: &[u8], opts: &LoadOptions) -> Result<LoadedImage, LoadError> {
    check_size(bytes.len() as u64, opts)?;

    let format = sniff_format(bytes).ok_or(LoadError::UnsupportedFormat)?;
    let codec = match format {
        InputFormat::Png => ImageFormat::Png,
        InputFormat::Jpeg => ImageFormat::Jpeg,
        InputFormat::Heic => return Err(LoadError::HeicNotSupported),
    };

    let decoded = image::load_from_memory_with_format(bytes, codec)?;
    let image = to_core_image(&decoded.to_rgba8())?;
    log::info!(
        "loaded {} input {}x{} ({} bytes)",
        format,
        image.width,
        image.height,
        bytes.len()
    );

    Ok(LoadedImage {
        format,
        byte_len: bytes.len() as u64,
        image,
    })
}

/// Validate and decode an image file. The size limit is checked before the
/// file is read.
pub fn load_image_path(path: impl AsRef<Path>, opts: &LoadOptions) -> Result<LoadedImage, LoadError> {
    let path = path.as_ref();
    check_size(fs::metadata(path)?.len(), opts)?;
    let bytes = fs::read(path)?;
    load_image_bytes(&bytes, opts)
}

/// Copy an `image::RgbaImage` into the core raster type.
pub fn to_core_image(img: &RgbaImage) -> Result<Image, quadwarp_core::ImageError> {
    Image::from_raw(
        img.width() as usize,
        img.height() as usize,
        4,
        img.as_raw().clone(),
    )
}

/// Convert a core raster into an `image::DynamicImage` of matching layout.
pub fn from_core_image(img: &Image) -> Option<image::DynamicImage> {
    let (w, h) = (img.width as u32, img.height as u32);
    let data = img.data.clone();
    match img.channels {
        1 => image::GrayImage::from_raw(w, h, data).map(image::DynamicImage::ImageLuma8),
        2 => image::GrayAlphaImage::from_raw(w, h, data).map(image::DynamicImage::ImageLumaA8),
        3 => image::RgbImage::from_raw(w, h, data).map(image::DynamicImage::ImageRgb8),
        4 => RgbaImage::from_raw(w, h, data).map(image::DynamicImage::ImageRgba8),
        _ => None,
    }
}
