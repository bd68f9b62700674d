//! Fixed-size raster addressed by integer cell coordinates.

use crate::{Result, VoronoiError};

/// Grid dimensions. Cells are stored row-major: index `y * width + x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid {
    width: u32,
    height: u32,
}

impl Grid {
    /// Create a grid, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(VoronoiError::Config { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Always false: a grid has at least one cell
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Larger of the two dimensions, which drives the step sequence
    pub fn extent(&self) -> u32 {
        self.width.max(self.height)
    }

    /// Whether `(x, y)` addresses a cell of this grid
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Row-major index of an in-bounds cell
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// Cell coordinates of a row-major index
    #[inline]
    pub fn coords(&self, index: usize) -> (u32, u32) {
        let w = self.width as usize;
        ((index % w) as u32, (index / w) as u32)
    }

    /// Map normalized `[0, 1)` coordinates to a cell. Values outside that
    /// range map outside the grid and are left for seed validation to reject.
    pub fn from_normalized(&self, u: f64, v: f64) -> (i64, i64) {
        let scale = |t: f64, n: u32| -> i64 {
            if t.is_finite() {
                (t * n as f64).floor() as i64
            } else {
                -1
            }
        };
        (scale(u, self.width), scale(v, self.height))
    }
}
