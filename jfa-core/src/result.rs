//! Read-only view of a converged buffer.

use crate::seed::SeedPoint;
use crate::{Buffer, Cell, Grid, Rgb, Rgba};

/// Result of a jump flooding run.
///
/// Borrows the engine's front buffer and seed list; payloads are resolved
/// through each cell's owner index.
#[derive(Debug)]
pub struct VoronoiResult<'a, P> {
    buffer: &'a Buffer,
    seeds: &'a [SeedPoint<P>],
    passes: usize,
}

impl<'a, P> Clone for VoronoiResult<'a, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, P> Copy for VoronoiResult<'a, P> {}

impl<'a, P> VoronoiResult<'a, P> {
    /// View `buffer` as the outcome of `passes` passes over `seeds`.
    /// Cells whose owner index has no seed read as unreached.
    pub fn new(buffer: &'a Buffer, seeds: &'a [SeedPoint<P>], passes: usize) -> Self {
        Self {
            buffer,
            seeds,
            passes,
        }
    }

    pub fn grid(&self) -> Grid {
        self.buffer.grid()
    }

    pub fn width(&self) -> u32 {
        self.grid().width()
    }

    pub fn height(&self) -> u32 {
        self.grid().height()
    }

    /// Number of passes that produced this result
    pub fn passes(&self) -> usize {
        self.passes
    }

    pub fn buffer(&self) -> &'a Buffer {
        self.buffer
    }

    /// All cells (row-major order)
    pub fn cells(&self) -> &'a [Cell] {
        self.buffer.cells()
    }

    pub fn cell(&self, x: u32, y: u32) -> &'a Cell {
        self.buffer.get(x, y)
    }

    pub fn seeds(&self) -> &'a [SeedPoint<P>] {
        self.seeds
    }

    /// Payload of the seed nearest to `(x, y)`, if any seed reached it
    pub fn payload(&self, x: u32, y: u32) -> Option<&'a P> {
        self.payload_of(self.cell(x, y))
    }

    fn payload_of(&self, cell: &Cell) -> Option<&'a P> {
        let seeds = self.seeds;
        cell.owner()
            .and_then(|owner| seeds.get(owner as usize))
            .map(|seed| &seed.payload)
    }

    /// Owner index for each cell (row-major), -1 where unoccupied
    pub fn owners(&self) -> Vec<i32> {
        self.cells()
            .iter()
            .map(|c| c.owner().map_or(-1, |o| o as i32))
            .collect()
    }

    /// Distance label for each cell (row-major), 0 where unoccupied
    pub fn distances(&self) -> Vec<f32> {
        self.cells()
            .iter()
            .map(|c| if c.occupied { c.distance } else { 0.0 })
            .collect()
    }

    /// Area (cell count) of each seed's region
    pub fn areas(&self) -> Vec<u32> {
        let mut areas = vec![0u32; self.seeds.len()];
        for owner in self.cells().iter().filter_map(Cell::owner) {
            if let Some(area) = areas.get_mut(owner as usize) {
                *area += 1;
            }
        }
        areas
    }

    /// Render to an RGB image, coloring each cell by its owner's payload
    pub fn render(&self, mut color_of: impl FnMut(&P) -> Rgb, background: Rgb) -> image::RgbImage {
        let colors: Vec<Rgb> = self.seeds.iter().map(|s| color_of(&s.payload)).collect();
        let grid = self.grid();
        image::RgbImage::from_fn(grid.width(), grid.height(), |x, y| {
            let color = self
                .cell(x, y)
                .owner()
                .and_then(|o| colors.get(o as usize).copied())
                .unwrap_or(background);
            image::Rgb(color)
        })
    }
}

impl<'a> VoronoiResult<'a, Rgba> {
    /// Flat RGBA pixels (row-major, 4 bytes per cell) for canvas upload
    pub fn render_rgba(&self, background: Rgba) -> Vec<u8> {
        let mut pixels = Vec::with_capacity(self.cells().len() * 4);
        for cell in self.cells() {
            let color = self.payload_of(cell).copied().unwrap_or(background);
            pixels.extend_from_slice(&color);
        }
        pixels
    }
}
