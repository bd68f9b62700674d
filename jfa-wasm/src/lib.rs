//! WASM bindings for jfa-core.
//!
//! Exposes a stateful `VoronoiEngine` that holds the grid and seeds,
//! returning flat typed arrays for efficient JS interop.

use jfa_core::{random_seeds, DistanceMode, Rgba, SeedPoint};
use wasm_bindgen::prelude::*;

#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn dimension(name: &str, value: i32) -> Result<u32, JsError> {
    u32::try_from(value)
        .map_err(|_| JsError::new(&format!("{} must be non-negative, got {}", name, value)))
}

/// Stateful jump flooding engine.
/// Results are cached until the seeds or distance mode change.
#[wasm_bindgen]
pub struct VoronoiEngine {
    inner: jfa_core::VoronoiEngine<Rgba>,
}

#[wasm_bindgen]
impl VoronoiEngine {
    /// Create an engine for a `width × height` grid.
    #[wasm_bindgen(constructor)]
    pub fn new(width: i32, height: i32) -> Result<VoronoiEngine, JsError> {
        let (width, height) = (dimension("width", width)?, dimension("height", height)?);
        let inner = jfa_core::VoronoiEngine::configure(width, height)?;
        Ok(Self { inner })
    }

    /// Replace seeds from flat `[x0,y0, x1,y1, ...]` positions and
    /// `[r0,g0,b0,a0, ...]` colors.
    pub fn set_seeds(&mut self, xy: &[i32], rgba: &[u8]) -> Result<(), JsError> {
        if xy.len() % 2 != 0 || xy.len() / 2 != rgba.len() / 4 || rgba.len() % 4 != 0 {
            return Err(JsError::new(&format!(
                "expected 2 coordinates and 4 color bytes per seed, got {} and {}",
                xy.len(),
                rgba.len()
            )));
        }
        let seeds = xy
            .chunks_exact(2)
            .zip(rgba.chunks_exact(4))
            .map(|(p, c)| SeedPoint::new(p[0] as i64, p[1] as i64, [c[0], c[1], c[2], c[3]]))
            .collect();
        self.inner.set_seeds(seeds)?;
        Ok(())
    }

    /// Scatter `count` seeds with random colors, deterministic in `seed`.
    pub fn set_random_seeds(&mut self, count: usize, seed: u32) -> Result<(), JsError> {
        let seeds = random_seeds(count, &self.inner.grid(), seed as u64);
        self.inner.set_seeds(seeds)?;
        Ok(())
    }

    /// "canonical" or "sampled"
    pub fn set_mode(&mut self, mode: &str) -> Result<(), JsError> {
        let mode: DistanceMode = mode.parse().map_err(|e: String| JsError::new(&e))?;
        self.inner.set_mode(mode);
        Ok(())
    }

    /// Flood the grid. Returns the number of passes run.
    pub fn run(&mut self) -> Result<usize, JsError> {
        Ok(self.inner.run()?.passes())
    }

    /// RGBA pixels (row-major, 4 bytes per cell), ready for `ImageData`.
    /// `background` is packed `0xRRGGBBAA` and fills unreached cells.
    pub fn pixels(&self, background: u32) -> Result<js_sys::Uint8ClampedArray, JsError> {
        let pixels = self.inner.result()?.render_rgba(background.to_be_bytes());
        Ok(js_sys::Uint8ClampedArray::from(pixels.as_slice()))
    }

    /// Owning seed index per cell, -1 where unreached.
    pub fn owners(&self) -> Result<Vec<i32>, JsError> {
        Ok(self.inner.result()?.owners())
    }

    /// Distance to the owning seed per cell.
    pub fn distances(&self) -> Result<Vec<f32>, JsError> {
        Ok(self.inner.result()?.distances())
    }

    pub fn passes(&self) -> Result<usize, JsError> {
        Ok(self.inner.result()?.passes())
    }

    pub fn width(&self) -> u32 {
        self.inner.grid().width()
    }

    pub fn height(&self) -> u32 {
        self.inner.grid().height()
    }

    pub fn seed_count(&self) -> usize {
        self.inner.seeds().len()
    }
}
