//! Composition root: grid, configuration, seeds, backend and buffers.

use std::time::Instant;

use crate::seed::{self, SeedPoint};
use crate::{
    ComputeBackend, CpuBackend, DistanceMode, Grid, PingPongScheduler, Result, VoronoiError,
    VoronoiResult,
};

/// Per-engine settings. Two engines never share configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub mode: DistanceMode,
}

/// Stateful jump flooding engine.
///
/// The grid is fixed at construction; seeds may be replaced at any time.
/// Results are cached until the next [`set_seeds`](Self::set_seeds), so a
/// renderer can redraw from [`result`](Self::result) without recomputing.
pub struct VoronoiEngine<P, B = CpuBackend> {
    grid: Grid,
    config: EngineConfig,
    seeds: Vec<SeedPoint<P>>,
    backend: B,
    scheduler: PingPongScheduler,
    computed: bool,
}

impl<P> VoronoiEngine<P, CpuBackend> {
    /// Create an engine for a `width x height` grid on the CPU backend
    pub fn configure(width: u32, height: u32) -> Result<Self> {
        Self::with_backend(width, height, EngineConfig::default(), CpuBackend::new())
    }

    pub fn with_config(width: u32, height: u32, config: EngineConfig) -> Result<Self> {
        Self::with_backend(width, height, config, CpuBackend::new())
    }
}

impl<P, B: ComputeBackend> VoronoiEngine<P, B> {
    pub fn with_backend(width: u32, height: u32, config: EngineConfig, backend: B) -> Result<Self> {
        let grid = Grid::new(width, height)?;
        Ok(Self {
            grid,
            config,
            seeds: Vec::new(),
            backend,
            scheduler: PingPongScheduler::new(grid),
            computed: false,
        })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Change the distance mode. Invalidates the cached result.
    pub fn set_mode(&mut self, mode: DistanceMode) {
        if self.config.mode != mode {
            self.config.mode = mode;
            self.computed = false;
        }
    }

    pub fn seeds(&self) -> &[SeedPoint<P>] {
        &self.seeds
    }

    /// Replace the seed list.
    ///
    /// All seeds are validated first; on error the previous seeds and any
    /// cached result are kept.
    pub fn set_seeds(&mut self, seeds: Vec<SeedPoint<P>>) -> Result<()> {
        seed::validate(&self.grid, &seeds)?;
        self.seeds = seeds;
        self.computed = false;
        Ok(())
    }

    /// Run seed field initialization and every jump flooding pass
    pub fn run(&mut self) -> Result<VoronoiResult<'_, P>> {
        let started = Instant::now();
        self.computed = false;
        self.scheduler.seed(&self.seeds)?;
        self.backend.flood(self.config.mode, &mut self.scheduler)?;
        self.computed = true;

        log::info!(
            "flooded {}x{} grid from {} seeds in {} passes ({:?}, {})",
            self.grid.width(),
            self.grid.height(),
            self.seeds.len(),
            self.scheduler.passes(),
            started.elapsed(),
            self.config.mode,
        );
        Ok(self.view())
    }

    /// Last computed result
    pub fn result(&self) -> Result<VoronoiResult<'_, P>> {
        if !self.computed {
            return Err(VoronoiError::NotComputed);
        }
        Ok(self.view())
    }

    fn view(&self) -> VoronoiResult<'_, P> {
        VoronoiResult::new(self.scheduler.front(), &self.seeds, self.scheduler.passes())
    }
}
