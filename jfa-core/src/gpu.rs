//! GPU jump flooding using wgpu.
//!
//! Both buffers live on the device and are reused across runs on the same
//! grid. Each step is its own compute pass, which gives the whole-buffer
//! barrier between passes; the converged buffer is read back once at the end.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};

use crate::{
    Cell, ComputeBackend, DistanceMode, Grid, PingPongScheduler, Result, StepSequence,
    VoronoiError,
};

const EMPTY_OWNER: u32 = u32::MAX;

const WORKGROUP_SIZE: u32 = 16;

/// Upper bound on passes for any `u32` extent
const MAX_PASSES: usize = 32;

/// Device-side cell layout
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct GpuCell {
    owner: u32,
    origin_x: u32,
    origin_y: u32,
    distance: f32,
}

impl From<&Cell> for GpuCell {
    fn from(cell: &Cell) -> Self {
        if cell.occupied {
            Self {
                owner: cell.owner,
                origin_x: cell.origin[0],
                origin_y: cell.origin[1],
                distance: cell.distance,
            }
        } else {
            Self {
                owner: EMPTY_OWNER,
                origin_x: 0,
                origin_y: 0,
                distance: 0.0,
            }
        }
    }
}

impl From<&GpuCell> for Cell {
    fn from(cell: &GpuCell) -> Self {
        if cell.owner == EMPTY_OWNER {
            Cell::EMPTY
        } else {
            Cell {
                occupied: true,
                owner: cell.owner,
                origin: [cell.origin_x, cell.origin_y],
                distance: cell.distance,
            }
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct Uniforms {
    width: u32,
    height: u32,
    step: u32,
    mode: u32,
}

/// Check that a `grid` fits in one storage binding and one dispatch.
fn check_limits(grid: &Grid, limits: &wgpu::Limits) -> Result<()> {
    let bytes = grid.len() as u64 * size_of::<GpuCell>() as u64;
    let max_binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes > max_binding {
        return Err(VoronoiError::Gpu(format!(
            "{}x{} grid needs a {} byte storage buffer, device allows {}",
            grid.width(),
            grid.height(),
            bytes,
            max_binding
        )));
    }

    let groups_x = grid.width().div_ceil(WORKGROUP_SIZE);
    let groups_y = grid.height().div_ceil(WORKGROUP_SIZE);
    let max_groups = limits.max_compute_workgroups_per_dimension;
    if groups_x > max_groups || groups_y > max_groups {
        return Err(VoronoiError::Gpu(format!(
            "{}x{} grid needs {}x{} workgroups, device allows {} per dimension",
            grid.width(),
            grid.height(),
            groups_x,
            groups_y,
            max_groups
        )));
    }
    Ok(())
}

/// Byte distance between per-pass uniform blocks
fn uniform_stride(limits: &wgpu::Limits) -> u64 {
    let align = limits.min_uniform_buffer_offset_alignment.max(1) as u64;
    (size_of::<Uniforms>() as u64).div_ceil(align) * align
}

/// Run `f` with validation and out-of-memory errors captured instead of
/// reaching the uncaptured-error handler.
fn captured<T>(device: &wgpu::Device, what: &str, f: impl FnOnce() -> T) -> Result<T> {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    match validation.or(oom) {
        Some(e) => Err(VoronoiError::Gpu(format!("{}: {}", what, e))),
        None => Ok(value),
    }
}

/// Device buffers for one grid size
struct GridResources {
    grid: Grid,
    buffer_size: u64,
    cells: [wgpu::Buffer; 2],
    uniforms: wgpu::Buffer,
    staging: wgpu::Buffer,
    /// `bind_groups[i]` reads `cells[i]` and writes the other buffer
    bind_groups: [wgpu::BindGroup; 2],
}

/// GPU backend using wgpu compute shaders
pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_stride: u64,
    resources: Option<GridResources>,
    #[cfg(test)]
    allocations: usize,
}

impl GpuBackend {
    /// Create a new GPU backend
    pub fn new() -> Result<Self> {
        let instance = wgpu::Instance::default();

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .ok_or_else(|| VoronoiError::Gpu("No suitable GPU adapter found".into()))?;

        // Ask for everything the adapter offers so large grids still fit.
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("JFA GPU"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: Default::default(),
            },
            None,
        ))
        .map_err(|e| VoronoiError::Gpu(format!("Failed to create device: {}", e)))?;

        let storage = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("JFA Bind Group Layout"),
            entries: &[
                // 0: Per-pass uniforms, selected by dynamic offset
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: true,
                        min_binding_size: wgpu::BufferSize::new(size_of::<Uniforms>() as u64),
                    },
                    count: None,
                },
                // 1: Read buffer
                storage(1, true),
                // 2: Write buffer
                storage(2, false),
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("JFA Shader"),
            source: wgpu::ShaderSource::Wgsl(JFA_SHADER.into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("JFA Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("JFA Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_stride = uniform_stride(&device.limits());

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_stride,
            resources: None,
            #[cfg(test)]
            allocations: 0,
        })
    }

    /// Make sure device buffers exist for `grid`, reusing the current ones
    /// when the grid is unchanged.
    fn prepare(&mut self, grid: Grid) -> Result<()> {
        if self.resources.as_ref().is_some_and(|r| r.grid == grid) {
            return Ok(());
        }
        check_limits(&grid, &self.device.limits())?;
        self.resources = None;

        let resources = captured(&self.device, "allocating grid buffers", || self.allocate(grid))?;
        log::debug!("allocated GPU buffers for {:?}", grid);
        self.resources = Some(resources);
        #[cfg(test)]
        {
            self.allocations += 1;
        }
        Ok(())
    }

    fn allocate(&self, grid: Grid) -> GridResources {
        let buffer_size = grid.len() as u64 * size_of::<GpuCell>() as u64;
        let cell_buffer = |label| {
            self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: buffer_size,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let cells = [cell_buffer("JFA Buffer A"), cell_buffer("JFA Buffer B")];

        let uniforms = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("JFA Uniform Buffer"),
            size: self.uniform_stride * MAX_PASSES as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("JFA Staging Buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let bind_group = |src: &wgpu::Buffer, dst: &wgpu::Buffer| {
            self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("JFA Bind Group"),
                layout: &self.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                            buffer: &uniforms,
                            offset: 0,
                            size: wgpu::BufferSize::new(size_of::<Uniforms>() as u64),
                        }),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: src.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: dst.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_groups = [
            bind_group(&cells[0], &cells[1]),
            bind_group(&cells[1], &cells[0]),
        ];

        GridResources {
            grid,
            buffer_size,
            cells,
            uniforms,
            staging,
            bind_groups,
        }
    }
}

const JFA_SHADER: &str = r#"
struct Uniforms {
    width: u32,
    height: u32,
    step: u32,
    mode: u32,
}

struct Cell {
    owner: u32,
    origin_x: u32,
    origin_y: u32,
    distance: f32,
}

const EMPTY: u32 = 0xffffffffu;

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(0) @binding(1) var<storage, read> src: array<Cell>;
@group(0) @binding(2) var<storage, read_write> dst: array<Cell>;

// (distance, owner) ordering, same as the CPU kernel
fn beats(candidate: Cell, best: Cell) -> bool {
    return best.owner == EMPTY
        || candidate.distance < best.distance
        || (candidate.distance == best.distance && candidate.owner < best.owner);
}

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) global_id: vec3<u32>) {
    if (global_id.x >= uniforms.width || global_id.y >= uniforms.height) {
        return;
    }

    let x = i32(global_id.x);
    let y = i32(global_id.y);
    let w = i32(uniforms.width);
    let h = i32(uniforms.height);
    let step = i32(uniforms.step);
    let idx = global_id.y * uniforms.width + global_id.x;

    var best = src[idx];

    for (var j: i32 = -1; j <= 1; j = j + 1) {
        for (var i: i32 = -1; i <= 1; i = i + 1) {
            if (i == 0 && j == 0) {
                continue;
            }
            let qx = x + i * step;
            let qy = y + j * step;
            if (qx < 0 || qy < 0 || qx >= w || qy >= h) {
                continue;
            }
            let q = src[u32(qy) * uniforms.width + u32(qx)];
            if (q.owner == EMPTY) {
                continue;
            }

            // mode 0: owning seed position, mode 1: neighbour raster position
            var tx = f32(q.origin_x);
            var ty = f32(q.origin_y);
            if (uniforms.mode == 1u) {
                tx = f32(qx);
                ty = f32(qy);
            }
            let dx = f32(x) - tx;
            let dy = f32(y) - ty;
            let candidate = Cell(q.owner, q.origin_x, q.origin_y, sqrt(dx * dx + dy * dy));
            if (beats(candidate, best)) {
                best = candidate;
            }
        }
    }

    dst[idx] = best;
}
"#;

impl ComputeBackend for GpuBackend {
    fn flood(&mut self, mode: DistanceMode, scheduler: &mut PingPongScheduler) -> Result<()> {
        let grid = scheduler.grid();
        let (width, height) = (grid.width(), grid.height());
        let steps = StepSequence::for_grid(&grid);
        let num_passes = steps.passes();

        self.prepare(grid)?;
        let resources = self
            .resources
            .as_ref()
            .ok_or_else(|| VoronoiError::Gpu("grid buffers missing after allocation".into()))?;

        let initial: Vec<GpuCell> = scheduler.front().cells().iter().map(GpuCell::from).collect();
        self.queue.write_buffer(&resources.cells[0], 0, bytemuck::cast_slice(&initial));

        let mode_id = match mode {
            DistanceMode::Canonical => 0,
            DistanceMode::Sampled => 1,
        };
        let stride = self.uniform_stride as usize;
        let mut uniform_bytes = vec![0u8; num_passes * stride];
        for (pass, step) in steps.enumerate() {
            let uniforms = Uniforms {
                width,
                height,
                step,
                mode: mode_id,
            };
            let at = pass * stride;
            uniform_bytes[at..at + size_of::<Uniforms>()]
                .copy_from_slice(bytemuck::bytes_of(&uniforms));
        }
        self.queue.write_buffer(&resources.uniforms, 0, &uniform_bytes);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("JFA Encoder"),
        });
        for pass in 0..num_passes {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("JFA Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            let offset = (pass * stride) as u32;
            compute_pass.set_bind_group(0, &resources.bind_groups[pass % 2], &[offset]);
            compute_pass.dispatch_workgroups(
                width.div_ceil(WORKGROUP_SIZE),
                height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        let converged = &resources.cells[num_passes % 2];
        encoder.copy_buffer_to_buffer(converged, 0, &resources.staging, 0, resources.buffer_size);
        captured(&self.device, "submitting passes", || {
            self.queue.submit(std::iter::once(encoder.finish()));
        })?;
        log::trace!("submitted {} GPU passes", num_passes);

        let buffer_slice = resources.staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| VoronoiError::Gpu(format!("Buffer map channel closed: {}", e)))?
            .map_err(|e| VoronoiError::Gpu(format!("Buffer map failed: {:?}", e)))?;

        let data = buffer_slice.get_mapped_range();
        let cells: &[GpuCell] = bytemuck::cast_slice(&data);
        let copied = scheduler.swap_in(num_passes, |_, write| {
            for (out, cell) in write.cells_mut().iter_mut().zip(cells) {
                *out = Cell::from(cell);
            }
            Ok(())
        });
        drop(data);
        resources.staging.unmap();

        copied
    }
}
