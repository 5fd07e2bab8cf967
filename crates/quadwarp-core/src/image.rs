use serde::{Deserialize, Serialize};

/// Errors produced when building raster containers from raw buffers.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    #[error("invalid image dimensions (width={width}, height={height})")]
    InvalidDimensions { width: usize, height: usize },
    #[error("invalid image buffer length (expected {expected} bytes, got {got})")]
    InvalidBuffer { expected: usize, got: usize },
    #[error("unsupported channel count {0} (expected 1..=4)")]
    UnsupportedChannels(usize),
    #[error("crop {width}x{height}+{x}+{y} exceeds image bounds")]
    CropOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },
}

fn expected_len(width: usize, height: usize, channels: usize) -> Result<usize, ImageError> {
    if !(1..=4).contains(&channels) {
        return Err(ImageError::UnsupportedChannels(channels));
    }
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidDimensions { width, height });
    }
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(channels))
        .ok_or(ImageError::InvalidDimensions { width, height })
}

/// Borrowed 8-bit raster, row-major with interleaved channels.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: &'a [u8], // len = w*h*channels
}

impl<'a> ImageView<'a> {
    pub fn new(
        width: usize,
        height: usize,
        channels: usize,
        data: &'a [u8],
    ) -> Result<Self, ImageError> {
        let expected = expected_len(width, height, channels)?;
        if data.len() != expected {
            return Err(ImageError::InvalidBuffer {
                expected,
                got: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &'a [u8] {
        let i = (y * self.width + x) * self.channels;
        &self.data[i..i + self.channels]
    }
}

/// Owned 8-bit raster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub data: Vec<u8>,
}

impl Image {
    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        ImageView::new(width, height, channels, &data)?;
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// All-zero image (black, and fully transparent for 2/4 channels).
    pub fn new_blank(width: usize, height: usize, channels: usize) -> Result<Self, ImageError> {
        let len = expected_len(width, height, channels)?;
        Ok(Self {
            width,
            height,
            channels,
            data: vec![0u8; len],
        })
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            width: self.width,
            height: self.height,
            channels: self.channels,
            data: &self.data,
        }
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let i = (y * self.width + x) * self.channels;
        &self.data[i..i + self.channels]
    }

    /// Copy out the `width x height` region whose top-left corner is `(x, y)`.
    pub fn crop(&self, x: usize, y: usize, width: usize, height: usize) -> Result<Image, ImageError> {
        let fits = x
            .checked_add(width)
            .zip(y.checked_add(height))
            .is_some_and(|(r, b)| r <= self.width && b <= self.height);
        if !fits || width == 0 || height == 0 {
            return Err(ImageError::CropOutOfBounds {
                x,
                y,
                width,
                height,
            });
        }

        let c = self.channels;
        let row_bytes = width * c;
        let mut data = Vec::with_capacity(row_bytes * height);
        for row in y..y + height {
            let start = (row * self.width + x) * c;
            data.extend_from_slice(&self.data[start..start + row_bytes]);
        }
        Ok(Image {
            width,
            height,
            channels: c,
            data,
        })
    }
}

/// Resampling kernel used when warping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

#[inline]
fn get_sample(src: &ImageView<'_>, x: i32, y: i32, ch: usize) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[(y as usize * src.width + x as usize) * src.channels + ch]
}

/// Bilinear sample of one channel. `(x, y)` uses pixel-center-at-integer
/// convention; samples outside the image read as 0.
#[inline]
pub fn sample_bilinear(src: &ImageView<'_>, x: f32, y: f32, ch: usize) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_sample(src, x0, y0, ch) as f32;
    let p10 = get_sample(src, x0 + 1, y0, ch) as f32;
    let p01 = get_sample(src, x0, y0 + 1, ch) as f32;
    let p11 = get_sample(src, x0 + 1, y0 + 1, ch) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

/// Sample every channel at `(x, y)` into `out` (len = channels).
#[inline]
pub fn sample_pixel(src: &ImageView<'_>, x: f32, y: f32, interp: Interpolation, out: &mut [u8]) {
    match interp {
        Interpolation::Nearest => {
            let xi = x.round() as i32;
            let yi = y.round() as i32;
            for (ch, o) in out.iter_mut().enumerate() {
                *o = get_sample(src, xi, yi, ch);
            }
        }
        Interpolation::Bilinear => {
            for (ch, o) in out.iter_mut().enumerate() {
                *o = sample_bilinear(src, x, y, ch).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}
