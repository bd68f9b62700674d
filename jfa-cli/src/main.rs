//! Jump flooding Voronoi CLI
//!
//! Renders discrete Voronoi diagrams computed with the Jump Flooding
//! Algorithm, either as a single image or as a GIF with one frame per pass.
//!
//! ## YAML scene file
//!
//! ```yaml
//! width: 512
//! height: 512
//! mode: canonical      # or sampled
//! background: [0, 0, 0]
//! seeds:
//!   - { x: 10, y: 20, color: [255, 0, 0] }
//!   - { x: 400, y: 300 }
//! ```
//!
//! or `random: 100` (with optional `seed: 7`) instead of a seed list.
//!
//! Run with: `jfa -o out.png --scene scene.yaml`
//!
//! ## Quick random scenes
//!
//!   jfa -o out.png --width 640 --height 480 --seeds 200 --seed 3
//!   jfa -o passes.gif --animate --seeds 50
//!
//! Set `RUST_LOG=jfa_core=debug` to log every pass.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;

use jfa_core::{
    random_seeds, Buffer, ComputeBackend, CpuBackend, CpuKernel, DistanceMode, EngineConfig,
    Grid, PassKernel, PingPongScheduler, Rgb, SeedPoint, VoronoiEngine, VoronoiResult,
};

#[cfg(feature = "gpu")]
use jfa_core::GpuBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Png,
    Gif,
}

const DEFAULT_SIZE: u32 = 256;
const DEFAULT_SEEDS: usize = 100;

/// YAML scene file format
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Scene {
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    background: Option<Rgb>,
    /// Number of random seeds (ignored when `seeds` is given)
    #[serde(default)]
    random: Option<usize>,
    /// RNG seed for random seeds and default colors
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    seeds: Vec<SceneSeed>,
}

/// An explicit seed in the scene file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct SceneSeed {
    x: i64,
    y: i64,
    #[serde(default)]
    color: Option<Rgb>,
}

fn load_scene(path: &PathBuf) -> anyhow::Result<Scene> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scene file: {:?}", path))?;
    parse_scene(&contents)
        .with_context(|| format!("failed to parse scene file: {:?}", path))
}

fn parse_scene(contents: &str) -> anyhow::Result<Scene> {
    Ok(serde_yaml::from_str(contents)?)
}

/// Fully resolved rendering parameters
#[derive(Debug)]
struct Resolved {
    width: u32,
    height: u32,
    mode: DistanceMode,
    background: Rgb,
    seeds: Vec<SeedPoint<Rgb>>,
}

/// Merge scene values with CLI overrides. CLI args take precedence.
fn resolve(args: &Args, scene: &Scene) -> anyhow::Result<Resolved> {
    let width = args.width.or(scene.width).unwrap_or(DEFAULT_SIZE);
    let height = args.height.or(scene.height).unwrap_or(DEFAULT_SIZE);
    let mode: DistanceMode = args
        .mode
        .as_deref()
        .or(scene.mode.as_deref())
        .map(str::parse::<DistanceMode>)
        .transpose()
        .map_err(|e: String| anyhow::anyhow!(e))?
        .unwrap_or_default();
    let rng_seed = args.seed.or(scene.seed).unwrap_or(0);
    let background = scene.background.unwrap_or([0, 0, 0]);

    let grid = Grid::new(width, height)?;
    let seeds: Vec<SeedPoint<Rgb>> = if !scene.seeds.is_empty() && args.seeds.is_none() {
        // Seeds without a color borrow one from the random palette.
        let palette = random_seeds(scene.seeds.len(), &grid, rng_seed);
        scene
            .seeds
            .iter()
            .zip(palette)
            .map(|(s, p)| {
                let color = s.color.unwrap_or([p.payload[0], p.payload[1], p.payload[2]]);
                SeedPoint::new(s.x, s.y, color)
            })
            .collect()
    } else {
        let count = args.seeds.or(scene.random).unwrap_or(DEFAULT_SEEDS);
        random_seeds(count, &grid, rng_seed)
            .into_iter()
            .map(|s| SeedPoint::new(s.x, s.y, [s.payload[0], s.payload[1], s.payload[2]]))
            .collect()
    };

    Ok(Resolved {
        width,
        height,
        mode,
        background,
        seeds,
    })
}

#[derive(Parser, Debug)]
#[command(name = "jfa")]
#[command(about = "Render jump-flooded Voronoi diagrams", long_about = None)]
#[command(arg_required_else_help = true)]
struct Args {
    /// Output file path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format (inferred from the output extension when omitted)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// YAML scene file
    #[arg(long)]
    scene: Option<PathBuf>,

    /// Grid width in cells
    #[arg(long)]
    width: Option<u32>,

    /// Grid height in cells
    #[arg(long)]
    height: Option<u32>,

    /// Number of random seeds (overrides scene seeds)
    #[arg(long)]
    seeds: Option<usize>,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Distance mode: canonical | sampled
    #[arg(long)]
    mode: Option<String>,

    /// Use GPU acceleration (if available)
    #[arg(long)]
    gpu: bool,

    /// CPU threads (0 = all cores)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Write a GIF with one frame per pass
    #[arg(long)]
    animate: bool,

    /// Frame delay in the pass animation (hundredths of a second)
    #[arg(long, default_value = "50")]
    frame_delay: u16,

    /// Draw seed positions as dots
    #[arg(long)]
    show_seeds: bool,

    /// Run benchmark comparing backends
    #[arg(long)]
    benchmark: bool,

    /// Number of runs in benchmark mode
    #[arg(long, default_value = "10")]
    bench_runs: usize,
}

fn output_format(args: &Args, output: &Path) -> OutputFormat {
    if let Some(format) = args.format {
        return format;
    }
    if args.animate {
        return OutputFormat::Gif;
    }
    match output.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gif") => OutputFormat::Gif,
        _ => OutputFormat::Png,
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let scene = match &args.scene {
        Some(path) => load_scene(path)?,
        None => Scene::default(),
    };
    let resolved = resolve(&args, &scene)?;
    println!(
        "Grid {}x{}, {} seeds, {} distance",
        resolved.width,
        resolved.height,
        resolved.seeds.len(),
        resolved.mode
    );

    if args.benchmark {
        return run_benchmark(&resolved, &args);
    }

    let output = args.output.as_ref()
        .ok_or_else(|| anyhow::anyhow!("Output path required (use -o/--output)"))?;
    let format = output_format(&args, output);

    if args.animate {
        if format != OutputFormat::Gif {
            anyhow::bail!("--animate writes a GIF; use a .gif output or --format gif");
        }
        if args.gpu {
            eprintln!("Warning: --animate records every pass on the CPU. Ignoring --gpu.");
        }
        let backend = CpuBackend::with_threads(args.threads)?;
        return render_animation(&resolved, &backend, output, args.frame_delay, args.show_seeds);
    }

    let backend = make_backend(&args)?;
    let config = EngineConfig { mode: resolved.mode };
    let mut engine = VoronoiEngine::with_backend(resolved.width, resolved.height, config, backend)?;
    engine.set_seeds(resolved.seeds.clone())?;

    let started = Instant::now();
    let result = engine.run()?;
    println!("Computed {} passes in {:?}", result.passes(), started.elapsed());

    let mut frame_image = result.render(|c| *c, resolved.background);
    if args.show_seeds {
        draw_seeds(&mut frame_image, &resolved.seeds);
    }

    match format {
        OutputFormat::Png => frame_image.save(output)?,
        OutputFormat::Gif => {
            let mut encoder = GifWriter::create(output, resolved.width, resolved.height, 0)?;
            encoder.write_frame(frame_image.as_raw())?;
        }
    }

    println!("Output saved to: {:?}", output);
    Ok(())
}

/// Pick the backend requested on the command line
fn make_backend(args: &Args) -> anyhow::Result<Box<dyn ComputeBackend>> {
    let make_cpu = || -> anyhow::Result<Box<dyn ComputeBackend>> {
        println!("Using CPU backend (Rayon, {} threads)", match args.threads {
            0 => "all".to_string(),
            n => n.to_string(),
        });
        Ok(Box::new(CpuBackend::with_threads(args.threads)?))
    };

    #[cfg(feature = "gpu")]
    let backend: Box<dyn ComputeBackend> = if args.gpu {
        println!("Using GPU backend (wgpu)");
        match GpuBackend::new() {
            Ok(gpu) => Box::new(gpu),
            Err(e) => {
                eprintln!("Warning: GPU initialization failed: {}. Falling back to CPU.", e);
                make_cpu()?
            }
        }
    } else {
        make_cpu()?
    };

    #[cfg(not(feature = "gpu"))]
    let backend: Box<dyn ComputeBackend> = {
        if args.gpu {
            eprintln!("Warning: GPU feature not enabled. Using CPU backend.");
        }
        make_cpu()?
    };

    Ok(backend)
}

/// Kernel wrapper that keeps a copy of every pass's output
struct Recording {
    kernel: CpuKernel,
    frames: Mutex<Vec<(u32, Buffer)>>,
}

impl Recording {
    fn new(kernel: CpuKernel) -> Self {
        Self {
            kernel,
            frames: Mutex::new(Vec::new()),
        }
    }

    fn into_frames(self) -> anyhow::Result<Vec<(u32, Buffer)>> {
        self.frames
            .into_inner()
            .map_err(|_| anyhow::anyhow!("pass recorder panicked"))
    }
}

impl PassKernel for Recording {
    fn apply(&self, read: &Buffer, write: &mut Buffer, step: u32) {
        self.kernel.apply(read, write, step);
        if let Ok(mut frames) = self.frames.lock() {
            frames.push((step, write.clone()));
        }
    }
}

/// Render the seeded buffer and every pass as GIF frames
fn render_animation(
    resolved: &Resolved,
    backend: &CpuBackend,
    output: &Path,
    frame_delay: u16,
    show_seeds: bool,
) -> anyhow::Result<()> {
    let grid = Grid::new(resolved.width, resolved.height)?;
    let mut scheduler = PingPongScheduler::new(grid);
    scheduler.seed(&resolved.seeds)?;
    let initial = scheduler.front().clone();

    let recording = Recording::new(CpuKernel::new(resolved.mode));
    backend.run_kernel(&recording, &mut scheduler);
    let frames = recording.into_frames()?;

    let progress = ProgressBar::new(frames.len() as u64 + 1);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let mut encoder = GifWriter::create(output, resolved.width, resolved.height, frame_delay)?;
    let all = std::iter::once((0, &initial)).chain(frames.iter().map(|(s, b)| (*s, b)));
    for (pass, (step, buffer)) in all.enumerate() {
        progress.set_message(format!("step {}", step));
        let view = VoronoiResult::new(buffer, &resolved.seeds, pass);
        let mut image = view.render(|c| *c, resolved.background);
        if show_seeds {
            draw_seeds(&mut image, &resolved.seeds);
        }
        encoder.write_frame(image.as_raw())?;
        progress.inc(1);
    }
    progress.finish_with_message("done");

    println!("Output saved to: {:?} ({} passes)", output, frames.len());
    Ok(())
}

/// Draw 3x3 dots at each seed position, black or white for contrast
fn draw_seeds(image: &mut image::RgbImage, seeds: &[SeedPoint<Rgb>]) {
    let (w, h) = (image.width() as i64, image.height() as i64);
    for seed in seeds {
        let [r, g, b] = seed.payload;
        let luma = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
        let dot = if luma > 128_000 { [0, 0, 0] } else { [255, 255, 255] };
        for dy in -1..=1 {
            for dx in -1..=1 {
                let px = seed.x + dx;
                let py = seed.y + dy;
                if px >= 0 && px < w && py >= 0 && py < h {
                    image.put_pixel(px as u32, py as u32, image::Rgb(dot));
                }
            }
        }
    }
}

/// Benchmark the available backends on the resolved scene
fn run_benchmark(resolved: &Resolved, args: &Args) -> anyhow::Result<()> {
    let runs = args.bench_runs.max(1);

    println!("\n=== Jump Flooding Benchmark ===");
    println!("Grid: {}x{}", resolved.width, resolved.height);
    println!("Seeds: {}", resolved.seeds.len());
    println!("Runs: {}", runs);
    println!();

    println!("Benchmarking CPU (Rayon)...");
    let cpu_time = benchmark_backend(Box::new(CpuBackend::new()), resolved, runs)?;
    report("CPU", cpu_time, runs);

    println!("Benchmarking CPU (1 thread)...");
    let single_time = benchmark_backend(Box::new(CpuBackend::with_threads(1)?), resolved, runs)?;
    report("CPU x1", single_time, runs);
    println!(
        "  Parallel speedup: {:.2}x",
        single_time.as_secs_f64() / cpu_time.as_secs_f64()
    );

    #[cfg(feature = "gpu")]
    {
        println!("Benchmarking GPU (wgpu)...");
        match GpuBackend::new() {
            Ok(gpu) => {
                let gpu_time = benchmark_backend(Box::new(gpu), resolved, runs)?;
                report("GPU", gpu_time, runs);

                println!();
                println!("=== Summary ===");
                let speedup = cpu_time.as_secs_f64() / gpu_time.as_secs_f64();
                if speedup > 1.0 {
                    println!("GPU is {:.2}x faster than CPU", speedup);
                } else {
                    println!("CPU is {:.2}x faster than GPU", 1.0 / speedup);
                }
            }
            Err(e) => {
                eprintln!("  GPU initialization failed: {}", e);
            }
        }
    }

    #[cfg(not(feature = "gpu"))]
    {
        println!("GPU benchmark skipped (gpu feature not enabled)");
    }

    Ok(())
}

fn report(name: &str, total: Duration, runs: usize) {
    println!(
        "  {}: {:?} total, {:.2} ms/run",
        name,
        total,
        total.as_secs_f64() * 1000.0 / runs as f64
    );
}

/// Benchmark a single backend
fn benchmark_backend(
    backend: Box<dyn ComputeBackend>,
    resolved: &Resolved,
    runs: usize,
) -> anyhow::Result<Duration> {
    let config = EngineConfig { mode: resolved.mode };
    let mut engine = VoronoiEngine::with_backend(resolved.width, resolved.height, config, backend)?;
    engine.set_seeds(resolved.seeds.clone())?;

    // Warmup run (GPU needs to compile shaders, etc.)
    engine.run()?;

    let progress = ProgressBar::new(runs as u64);
    let start = Instant::now();
    for _ in 0..runs {
        engine.run()?;
        progress.inc(1);
    }
    let elapsed = start.elapsed();
    progress.finish_and_clear();
    Ok(elapsed)
}

/// Streaming GIF writer with a simple fixed palette quantizer.
struct GifWriter {
    encoder: gif::Encoder<std::fs::File>,
    width: u16,
    height: u16,
    frame_delay: u16,
}

impl GifWriter {
    fn create(output: &Path, width: u32, height: u32, frame_delay: u16) -> anyhow::Result<Self> {
        use gif::{Encoder, Repeat};
        let (width, height) = (
            u16::try_from(width).context("GIF width exceeds 65535")?,
            u16::try_from(height).context("GIF height exceeds 65535")?,
        );
        let file = std::fs::File::create(output)
            .with_context(|| format!("failed to create {:?}", output))?;
        let mut encoder = Encoder::new(file, width, height, &[])?;
        encoder.set_repeat(Repeat::Infinite)?;
        Ok(Self {
            encoder,
            width,
            height,
            frame_delay,
        })
    }

    /// Write one frame's raw RGB pixel data
    fn write_frame(&mut self, rgb_data: &[u8]) -> anyhow::Result<()> {
        let (pixels, palette) = quantize(rgb_data);
        let mut frame = gif::Frame::from_palette_pixels(
            self.width, self.height, pixels, palette, None,
        );
        frame.delay = self.frame_delay;
        self.encoder.write_frame(&frame)?;
        Ok(())
    }
}

/// Map RGB pixels to at most 256 palette entries. The first 256 distinct
/// colors are kept exactly; later colors snap to their nearest entry.
fn quantize(rgb_data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut pixels: Vec<u8> = Vec::with_capacity(rgb_data.len() / 3);
    let mut palette: Vec<Rgb> = Vec::new();

    for chunk in rgb_data.chunks_exact(3) {
        let rgb = [chunk[0], chunk[1], chunk[2]];
        let idx = palette.iter().position(|&c| c == rgb).unwrap_or_else(|| {
            if palette.len() < 256 {
                palette.push(rgb);
                palette.len() - 1
            } else {
                palette
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| {
                        let dr = c[0] as i32 - rgb[0] as i32;
                        let dg = c[1] as i32 - rgb[1] as i32;
                        let db = c[2] as i32 - rgb[2] as i32;
                        dr * dr + dg * dg + db * db
                    })
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            }
        });
        pixels.push(idx as u8);
    }

    while palette.len() < 256 {
        palette.push([0, 0, 0]);
    }
    let flat_palette: Vec<u8> = palette.iter().flat_map(|c| c.iter().copied()).collect();
    (pixels, flat_palette)
}
