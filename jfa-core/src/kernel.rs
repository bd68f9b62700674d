//! The per-pass jump flooding update rule.

use std::str::FromStr;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{Buffer, Cell, Grid};

/// How a candidate neighbour's distance is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DistanceMode {
    /// Distance to the owning seed's recorded position (geometrically exact)
    #[default]
    Canonical,
    /// Distance to the neighbour cell's raster position
    Sampled,
}

impl FromStr for DistanceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "canonical" | "exact" => Ok(Self::Canonical),
            "sampled" | "raster" => Ok(Self::Sampled),
            _ => Err(format!(
                "unknown distance mode '{}' (expected canonical or sampled)",
                s
            )),
        }
    }
}

impl std::fmt::Display for DistanceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Canonical => "canonical",
            Self::Sampled => "sampled",
        })
    }
}

/// A single jump flooding pass: read one buffer, write the other.
pub trait PassKernel {
    fn apply(&self, read: &Buffer, write: &mut Buffer, step: u32);
}

/// CPU implementation of the pass, parallel over rows when the `parallel`
/// feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuKernel {
    pub mode: DistanceMode,
    /// Force the sequential path even when Rayon is available
    pub sequential: bool,
}

const OFFSETS: [(i64, i64); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

#[inline]
fn euclid(x: u32, y: u32, tx: u32, ty: u32) -> f32 {
    let dx = x as f64 - tx as f64;
    let dy = y as f64 - ty as f64;
    (dx * dx + dy * dy).sqrt() as f32
}

/// Strict ordering on `(distance, owner)`. Equal distances go to the lower
/// owner index so the winner does not depend on examination order.
#[inline]
fn beats(candidate: &Cell, best: &Cell) -> bool {
    !best.occupied
        || candidate.distance < best.distance
        || (candidate.distance == best.distance && candidate.owner < best.owner)
}

impl CpuKernel {
    pub fn new(mode: DistanceMode) -> Self {
        Self {
            mode,
            sequential: false,
        }
    }

    pub fn sequential(mode: DistanceMode) -> Self {
        Self {
            mode,
            sequential: true,
        }
    }

    /// Best known owner for cell `(x, y)` after looking `step` cells away
    #[inline]
    fn resolve(&self, grid: Grid, read: &[Cell], x: u32, y: u32, step: u32) -> Cell {
        let mut best = read[grid.index(x, y)];
        let step = step as i64;

        for (i, j) in OFFSETS {
            let qx = x as i64 + i * step;
            let qy = y as i64 + j * step;
            if !grid.contains(qx, qy) {
                continue;
            }
            let (qx, qy) = (qx as u32, qy as u32);
            let q = &read[grid.index(qx, qy)];
            if !q.occupied {
                continue;
            }

            let distance = match self.mode {
                DistanceMode::Canonical => euclid(x, y, q.origin[0], q.origin[1]),
                DistanceMode::Sampled => euclid(x, y, qx, qy),
            };
            let candidate = Cell {
                occupied: true,
                owner: q.owner,
                origin: q.origin,
                distance,
            };
            if beats(&candidate, &best) {
                best = candidate;
            }
        }
        best
    }

    fn fill_row(&self, grid: Grid, read: &[Cell], y: u32, row: &mut [Cell], step: u32) {
        for (x, out) in row.iter_mut().enumerate() {
            *out = self.resolve(grid, read, x as u32, y, step);
        }
    }
}

impl PassKernel for CpuKernel {
    fn apply(&self, read: &Buffer, write: &mut Buffer, step: u32) {
        let grid = read.grid();
        debug_assert_eq!(grid, write.grid());
        let width = grid.width() as usize;
        let src = read.cells();
        let dst = write.cells_mut();

        #[cfg(feature = "parallel")]
        {
            if !self.sequential {
                dst.par_chunks_mut(width)
                    .enumerate()
                    .for_each(|(y, row)| self.fill_row(grid, src, y as u32, row, step));
                return;
            }
        }

        for (y, row) in dst.chunks_mut(width).enumerate() {
            self.fill_row(grid, src, y as u32, row, step);
        }
    }
}
