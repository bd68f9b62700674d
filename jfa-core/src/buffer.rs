//! Cell buffers and the seed field that fills the first one.

use crate::seed::{self, SeedPoint};
use crate::{Grid, Result};

/// One raster cell: which seed it believes is nearest, and how far away.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    /// Whether any seed has reached this cell yet
    pub occupied: bool,
    /// Index of the owning seed in the engine's seed list
    pub owner: u32,
    /// Grid position of the owning seed
    pub origin: [u32; 2],
    /// Euclidean distance used when the owner was adopted
    pub distance: f32,
}

impl Cell {
    /// Unoccupied cell. Fields other than `occupied` are zeroed so that
    /// buffers compare bit-identically.
    pub const EMPTY: Cell = Cell {
        occupied: false,
        owner: 0,
        origin: [0, 0],
        distance: 0.0,
    };

    /// A seed sitting on its own cell
    pub fn seed(owner: u32, x: u32, y: u32) -> Self {
        Self {
            occupied: true,
            owner,
            origin: [x, y],
            distance: 0.0,
        }
    }

    /// Owner index, if occupied
    pub fn owner(&self) -> Option<u32> {
        self.occupied.then_some(self.owner)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// A `width x height` array of cells in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Buffer {
    grid: Grid,
    cells: Vec<Cell>,
}

impl Buffer {
    /// Allocate an all-unoccupied buffer
    pub fn new(grid: Grid) -> Self {
        Self {
            grid,
            cells: vec![Cell::EMPTY; grid.len()],
        }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut [Cell] {
        &mut self.cells
    }

    pub fn get(&self, x: u32, y: u32) -> &Cell {
        &self.cells[self.grid.index(x, y)]
    }

    /// Reset every cell to unoccupied, keeping the allocation
    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Number of occupied cells
    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.occupied).count()
    }
}

/// Build the initial buffer from `seeds`.
///
/// Every seed cell becomes occupied with distance 0. When several seeds land
/// on the same cell, the last one in `seeds` wins.
pub fn initialize<P>(grid: Grid, seeds: &[SeedPoint<P>]) -> Result<Buffer> {
    let mut buffer = Buffer::new(grid);
    initialize_into(seeds, &mut buffer)?;
    Ok(buffer)
}

/// Like [`initialize`], but rewrites an existing buffer in place.
/// On error the buffer is left untouched.
pub fn initialize_into<P>(seeds: &[SeedPoint<P>], buffer: &mut Buffer) -> Result<()> {
    let grid = buffer.grid;
    seed::validate(&grid, seeds)?;

    buffer.clear();
    for (i, s) in seeds.iter().enumerate() {
        let (x, y) = (s.x as u32, s.y as u32);
        buffer.cells[grid.index(x, y)] = Cell::seed(i as u32, x, y);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VoronoiError;

    #[test]
    fn test_initialize_marks_seed_cells() {
        let grid = Grid::new(4, 4).unwrap();
        let seeds = vec![SeedPoint::new(0, 0, "A"), SeedPoint::new(3, 2, "B")];
        let buffer = initialize(grid, &seeds).unwrap();

        assert_eq!(buffer.occupied_count(), 2);
        assert_eq!(*buffer.get(0, 0), Cell::seed(0, 0, 0));
        assert_eq!(*buffer.get(3, 2), Cell::seed(1, 3, 2));
        assert_eq!(*buffer.get(1, 1), Cell::EMPTY);
    }

    #[test]
    fn test_last_duplicate_wins() {
        let grid = Grid::new(4, 4).unwrap();
        let seeds = vec![
            SeedPoint::new(2, 2, "first"),
            SeedPoint::new(2, 2, "second"),
        ];
        let buffer = initialize(grid, &seeds).unwrap();
        assert_eq!(buffer.occupied_count(), 1);
        assert_eq!(buffer.get(2, 2).owner(), Some(1));
    }

    #[test]
    fn test_empty_seed_list() {
        let grid = Grid::new(3, 5).unwrap();
        let buffer = initialize::<()>(grid, &[]).unwrap();
        assert_eq!(buffer.occupied_count(), 0);
        assert_eq!(buffer.cells().len(), 15);
    }

    #[test]
    fn test_out_of_bounds_leaves_buffer_untouched() {
        let grid = Grid::new(4, 4).unwrap();
        let mut buffer = initialize(grid, &[SeedPoint::new(1, 1, 'a')]).unwrap();
        let before = buffer.clone();

        let err = initialize_into(&[SeedPoint::new(0, 4, 'b')], &mut buffer).unwrap_err();
        assert!(matches!(err, VoronoiError::OutOfBounds { index: 0, .. }));
        assert_eq!(buffer, before);
    }
}
