//! Step sizes and the double-buffered pass driver.
//!
//! [`PingPongScheduler`] owns two buffers that alternate between "read" and
//! "write" roles. Each pass reads the front buffer in full and writes the
//! back buffer in full; the roles then swap, so a pass never observes its
//! own output.

use std::time::Instant;

use crate::seed::SeedPoint;
use crate::{buffer, Buffer, Grid, PassKernel, Result};

/// Strictly halving step sizes ending at 1.
///
/// The first step is the smallest power of two covering half the grid's
/// larger dimension, so `2 * first - 1 >= extent - 1` and a seed can reach
/// every cell. Pass count is `ceil(log2(extent / 2)) + 1`, and 1 for a
/// single-cell extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSequence {
    next: u32,
}

impl StepSequence {
    pub fn for_grid(grid: &Grid) -> Self {
        Self::for_extent(grid.extent())
    }

    pub fn for_extent(extent: u32) -> Self {
        let half = extent.div_ceil(2).max(1);
        Self {
            next: half.next_power_of_two(),
        }
    }

    /// First (largest) step size
    pub fn first(&self) -> u32 {
        self.next
    }

    /// Number of passes the sequence yields
    pub fn passes(&self) -> usize {
        if self.next == 0 {
            0
        } else {
            self.next.trailing_zeros() as usize + 1
        }
    }
}

impl Iterator for StepSequence {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.next == 0 {
            return None;
        }
        let step = self.next;
        self.next /= 2;
        Some(step)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.passes();
        (n, Some(n))
    }
}

impl ExactSizeIterator for StepSequence {}

/// Double-buffered pass driver.
///
/// Both buffers are allocated once and reused by every run.
#[derive(Debug, Clone)]
pub struct PingPongScheduler {
    buffers: [Buffer; 2],
    /// Index of the buffer holding the latest complete state
    front: usize,
    passes: usize,
}

impl PingPongScheduler {
    pub fn new(grid: Grid) -> Self {
        Self {
            buffers: [Buffer::new(grid), Buffer::new(grid)],
            front: 0,
            passes: 0,
        }
    }

    pub fn grid(&self) -> Grid {
        self.buffers[0].grid()
    }

    /// Fill the front buffer from `seeds`, discarding any previous state
    pub fn seed<P>(&mut self, seeds: &[SeedPoint<P>]) -> Result<()> {
        buffer::initialize_into(seeds, &mut self.buffers[self.front])?;
        self.passes = 0;
        Ok(())
    }

    /// Latest complete buffer
    pub fn front(&self) -> &Buffer {
        &self.buffers[self.front]
    }

    /// Passes executed since the last [`seed`](Self::seed)
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Borrow (read, write) without aliasing
    fn split(&mut self) -> (&Buffer, &mut Buffer) {
        let [a, b] = &mut self.buffers;
        if self.front == 0 {
            (a, b)
        } else {
            (b, a)
        }
    }

    /// Write the back buffer with `fill`, then make it the front.
    /// Used by backends that run passes outside of [`PassKernel`].
    pub fn swap_in(
        &mut self,
        passes: usize,
        fill: impl FnOnce(&Buffer, &mut Buffer) -> Result<()>,
    ) -> Result<()> {
        let (read, write) = self.split();
        fill(read, write)?;
        self.front ^= 1;
        self.passes += passes;
        Ok(())
    }

    /// Run every step of the sequence over the seeded front buffer
    pub fn run<K: PassKernel + ?Sized>(&mut self, kernel: &K) -> &Buffer {
        let steps = StepSequence::for_grid(&self.grid());
        log::debug!(
            "jump flooding {:?}: {} passes starting at step {}",
            self.grid(),
            steps.passes(),
            steps.first()
        );

        for step in steps {
            let started = Instant::now();
            let (read, write) = self.split();
            kernel.apply(read, write, step);
            self.front ^= 1;
            self.passes += 1;
            log::trace!("pass step={} took {:?}", step, started.elapsed());
        }

        self.front()
    }
}
