//! Jump Flooding Algorithm core library.
//!
//! Computes discrete Voronoi diagrams on a fixed raster: every cell learns
//! which seed is nearest to it in `O(log N)` data-parallel passes. Passes run
//! on the CPU (Rayon-parallelized rows) or, with the `gpu` feature, in a wgpu
//! compute shader.

mod backend;
mod buffer;
mod engine;
mod grid;
mod kernel;
mod result;
mod schedule;
mod seed;

#[cfg(feature = "gpu")]
mod gpu;

pub use backend::{ComputeBackend, CpuBackend};
pub use buffer::{initialize, initialize_into, Buffer, Cell};
pub use engine::{EngineConfig, VoronoiEngine};
pub use grid::Grid;
pub use kernel::{CpuKernel, DistanceMode, PassKernel};
pub use result::VoronoiResult;
pub use schedule::{PingPongScheduler, StepSequence};
pub use seed::{random_seeds, SeedPoint};

#[cfg(feature = "gpu")]
pub use gpu::GpuBackend;

/// RGB color tuple
pub type Rgb = [u8; 3];

/// RGBA color tuple, the payload of randomly generated seeds
pub type Rgba = [u8; 4];

/// Error type for Voronoi operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VoronoiError {
    #[error("invalid grid dimensions {width}x{height}: both must be positive")]
    Config { width: u32, height: u32 },

    #[error("seed {index} at ({x}, {y}) lies outside the {width}x{height} grid")]
    OutOfBounds {
        index: usize,
        x: i64,
        y: i64,
        width: u32,
        height: u32,
    },

    #[error("no result computed yet: call run() first")]
    NotComputed,

    #[cfg(feature = "gpu")]
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("Backend not available: {0}")]
    BackendUnavailable(String),
}

pub type Result<T> = std::result::Result<T, VoronoiError>;
