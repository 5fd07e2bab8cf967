//! Split a rectified image into a `rows x cols` grid of tiles.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::image::{Image, ImageError};

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid must have at least one row and one column (got {rows}x{cols})")]
    Empty { rows: u32, cols: u32 },
    #[error("{rows}x{cols} grid is finer than the {width}x{height} image")]
    TooFine {
        rows: u32,
        cols: u32,
        width: usize,
        height: usize,
    },
    #[error("invalid grid spec '{0}' (expected ROWSxCOLS, e.g. 3x4)")]
    Parse(String),
    #[error(transparent)]
    Crop(#[from] ImageError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: u32,
    pub cols: u32,
}

impl GridSpec {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    pub fn single() -> Self {
        Self::new(1, 1)
    }

    pub fn tile_count(&self) -> usize {
        self.rows as usize * self.cols as usize
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

impl FromStr for GridSpec {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse_err = || GridError::Parse(s.to_string());
        let (r, c) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(parse_err)?;
        let rows = r.trim().parse().map_err(|_| parse_err())?;
        let cols = c.trim().parse().map_err(|_| parse_err())?;
        Ok(Self { rows, cols })
    }
}

/// Pixel rectangle of one grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridCell {
    pub row: u32,
    pub col: u32,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

#[derive(Clone, Debug)]
pub struct Tile {
    pub cell: GridCell,
    pub image: Image,
}

// Boundary k of n over `len` pixels.
#[inline]
fn split(k: usize, n: usize, len: usize) -> usize {
    k * len / n
}

/// Cell rectangles for `spec` over a `width x height` image, row-major.
///
/// Boundaries sit at `floor(k * len / n)`, so cells tile the image exactly and
/// neighbouring sizes differ by at most one pixel.
pub fn grid_cells(width: usize, height: usize, spec: GridSpec) -> Result<Vec<GridCell>, GridError> {
    let GridSpec { rows, cols } = spec;
    if rows == 0 || cols == 0 {
        return Err(GridError::Empty { rows, cols });
    }
    let (nr, nc) = (rows as usize, cols as usize);
    if nr > height || nc > width {
        return Err(GridError::TooFine {
            rows,
            cols,
            width,
            height,
        });
    }

    let mut cells = Vec::with_capacity(spec.tile_count());
    for r in 0..nr {
        let y0 = split(r, nr, height);
        let y1 = split(r + 1, nr, height);
        for c in 0..nc {
            let x0 = split(c, nc, width);
            let x1 = split(c + 1, nc, width);
            cells.push(GridCell {
                row: r as u32,
                col: c as u32,
                x: x0,
                y: y0,
                width: x1 - x0,
                height: y1 - y0,
            });
        }
    }
    Ok(cells)
}

/// Crop every grid cell out of `image`.
pub fn slice_grid(image: &Image, spec: GridSpec) -> Result<Vec<Tile>, GridError> {
    let cells = grid_cells(image.width, image.height, spec)?;
    log::debug!(
        "slicing {}x{} image into {} tiles",
        image.width,
        image.height,
        cells.len()
    );
    cells
        .into_iter()
        .map(|cell| {
            let tile = image.crop(cell.x, cell.y, cell.width, cell.height)?;
            Ok(Tile { cell, image: tile })
        })
        .collect()
}
