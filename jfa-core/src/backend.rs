//! Execution strategies for a full jump flooding run.

use crate::{CpuKernel, DistanceMode, PassKernel, PingPongScheduler, Result};

#[cfg(feature = "parallel")]
use crate::VoronoiError;

/// Trait for jump flooding backends.
///
/// `flood` runs every pass over the scheduler's seeded front buffer and
/// leaves the converged field in the front buffer.
pub trait ComputeBackend {
    fn flood(&mut self, mode: DistanceMode, scheduler: &mut PingPongScheduler) -> Result<()>;
}

impl<B: ComputeBackend + ?Sized> ComputeBackend for Box<B> {
    fn flood(&mut self, mode: DistanceMode, scheduler: &mut PingPongScheduler) -> Result<()> {
        (**self).flood(mode, scheduler)
    }
}

/// CPU backend using Rayon for parallel passes
pub struct CpuBackend {
    num_threads: usize,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self {
            num_threads: 0,
            #[cfg(feature = "parallel")]
            pool: None,
        }
    }

    /// Run passes on a dedicated pool of `num_threads` threads
    pub fn with_threads(num_threads: usize) -> Result<Self> {
        #[cfg(feature = "parallel")]
        {
            let pool = if num_threads == 0 {
                None
            } else {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(num_threads)
                    .build()
                    .map_err(|e| VoronoiError::BackendUnavailable(e.to_string()))?;
                Some(pool)
            };
            Ok(Self { num_threads, pool })
        }

        #[cfg(not(feature = "parallel"))]
        {
            if num_threads > 1 {
                log::warn!("parallel feature disabled, ignoring {} threads", num_threads);
            }
            Ok(Self { num_threads })
        }
    }

    /// Number of threads passes run on (0 = Rayon default)
    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Run every pass of `kernel` on this backend's threads
    pub fn run_kernel<K: PassKernel + Sync + ?Sized>(
        &self,
        kernel: &K,
        scheduler: &mut PingPongScheduler,
    ) {
        #[cfg(feature = "parallel")]
        {
            if let Some(pool) = &self.pool {
                pool.install(|| {
                    scheduler.run(kernel);
                });
                return;
            }
        }

        scheduler.run(kernel);
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn flood(&mut self, mode: DistanceMode, scheduler: &mut PingPongScheduler) -> Result<()> {
        self.run_kernel(&CpuKernel::new(mode), scheduler);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Grid, SeedPoint};

    fn flood_with(backend: &mut dyn ComputeBackend) -> PingPongScheduler {
        let grid = Grid::new(40, 30).unwrap();
        let seeds: Vec<SeedPoint<()>> = (0..9)
            .map(|i| SeedPoint::new((i * 13) % 40, (i * 11) % 30, ()))
            .collect();
        let mut scheduler = PingPongScheduler::new(grid);
        scheduler.seed(&seeds).unwrap();
        backend.flood(DistanceMode::Canonical, &mut scheduler).unwrap();
        scheduler
    }

    #[test]
    fn test_cpu_backend_fills_grid() {
        let scheduler = flood_with(&mut CpuBackend::new());
        assert_eq!(scheduler.front().occupied_count(), 40 * 30);
        assert_eq!(scheduler.passes(), 6);
    }

    #[test]
    fn test_dedicated_pool_matches_default() {
        let default = flood_with(&mut CpuBackend::new());
        let pooled = flood_with(&mut CpuBackend::with_threads(2).unwrap());
        assert_eq!(default.front(), pooled.front());
    }

    #[test]
    fn test_thread_count_reported() {
        assert_eq!(CpuBackend::new().num_threads(), 0);
        assert_eq!(CpuBackend::with_threads(3).unwrap().num_threads(), 3);
    }

    #[test]
    fn test_run_kernel_on_pool() {
        let mut scheduler = PingPongScheduler::new(Grid::new(40, 30).unwrap());
        scheduler.seed(&[SeedPoint::new(39, 0, ())]).unwrap();
        let backend = CpuBackend::with_threads(2).unwrap();
        backend.run_kernel(&CpuKernel::sequential(DistanceMode::Sampled), &mut scheduler);
        assert_eq!(scheduler.front().occupied_count(), 1200);
        assert_eq!(scheduler.passes(), 6);
    }

    #[test]
    fn test_boxed_backend() {
        let mut boxed: Box<dyn ComputeBackend> = Box::new(CpuBackend::default());
        let scheduler = flood_with(&mut boxed);
        assert_eq!(scheduler.front().occupied_count(), 1200);
    }
}
