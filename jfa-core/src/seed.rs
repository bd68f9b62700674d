//! Seed points and seeded random scene generation.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::{Grid, Result, Rgba, VoronoiError};

/// A labelled grid location whose payload propagates outward.
///
/// Coordinates are signed so that out-of-range input (negative or past the
/// edge) survives until validation and is reported rather than clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPoint<P> {
    pub x: i64,
    pub y: i64,
    pub payload: P,
}

impl<P> SeedPoint<P> {
    pub fn new(x: i64, y: i64, payload: P) -> Self {
        Self { x, y, payload }
    }

    /// Create from normalized `[0, 1)` coordinates on `grid`
    pub fn normalized(u: f64, v: f64, grid: &Grid, payload: P) -> Self {
        let (x, y) = grid.from_normalized(u, v);
        Self { x, y, payload }
    }

    /// Cell coordinates, if the seed lies inside `grid`
    pub fn cell(&self, grid: &Grid) -> Option<(u32, u32)> {
        grid.contains(self.x, self.y)
            .then_some((self.x as u32, self.y as u32))
    }
}

/// Check every seed against the grid. Reports the first offending index.
pub(crate) fn validate<P>(grid: &Grid, seeds: &[SeedPoint<P>]) -> Result<()> {
    match seeds.iter().position(|s| !grid.contains(s.x, s.y)) {
        Some(index) => Err(VoronoiError::OutOfBounds {
            index,
            x: seeds[index].x,
            y: seeds[index].y,
            width: grid.width(),
            height: grid.height(),
        }),
        None => Ok(()),
    }
}

/// Scatter `count` seeds uniformly over `grid` with random RGBA payloads.
///
/// Deterministic for a given `rng_seed`. Payloads may be black or fully
/// transparent; occupancy never depends on the payload value.
pub fn random_seeds(count: usize, grid: &Grid, rng_seed: u64) -> Vec<SeedPoint<Rgba>> {
    let mut rng = ChaCha8Rng::seed_from_u64(rng_seed);
    (0..count)
        .map(|_| {
            let x = rng.gen_range(0..grid.width()) as i64;
            let y = rng.gen_range(0..grid.height()) as i64;
            let color: Rgba = [rng.gen(), rng.gen(), rng.gen(), rng.gen()];
            SeedPoint::new(x, y, color)
        })
        .collect()
}
