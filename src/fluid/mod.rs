//! Volumetric smoke solver.
//!
//! Each frame runs the fixed stage sequence in [`stages::STAGES`]: inject,
//! advect, buoyancy, cool, divergence, iterated pressure relaxation, project.
//! Every stage is one compute dispatch over the whole grid followed by a
//! ping-pong swap of the field pairs it wrote; kernels only ever read the
//! previous identity and write the current one, so no dispatch observes a
//! partially updated field.

pub mod reference;
pub mod render;
pub mod stages;

use std::sync::Arc;

use crate::context::GpuError;
use crate::field::{FieldId, FieldStore, ALL_FIELDS};
use crate::readback;
use self::stages::{Repeat, STAGES};

/// Kernel thread-group shape; dispatches round the grid extent up.
const WORKGROUP: (u32, u32, u32) = (8, 8, 4);

fn workgroup_count(threads: u32, group: u32) -> u32 {
    threads.div_ceil(group)
}

/// Dispatch enough workgroups to cover `threads` invocations; out-of-range
/// threads exit at the kernel's bounds check.
fn dispatch_volume(pass: &mut wgpu::ComputePass<'_>, threads: (u32, u32, u32)) {
    pass.dispatch_workgroups(
        workgroup_count(threads.0, WORKGROUP.0),
        workgroup_count(threads.1, WORKGROUP.1),
        workgroup_count(threads.2, WORKGROUP.2),
    );
}

/// Static configuration of one volume. All quantities are in grid units
/// (cell size 1); the render transform maps grid space into the world.
#[derive(Debug, Clone)]
pub struct FluidVolumeDesc {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub pressure_iterations: u32,
    pub buoyancy: f32,
    pub smoke_weight: f32,
    pub cooling: f32,
    pub emitter_center: [f32; 3],
    pub emitter_radius: f32,
    /// Velocity forcing applied inside the emitter, scaled by falloff and dt.
    pub impulse: [f32; 3],
    pub source_density: f32,
    pub source_temperature: f32,
    pub ambient_temperature: f32,
    /// Cells at or below this density skip divergence and projection.
    /// Negative keeps the whole grid active.
    pub occupancy_threshold: f32,
}

impl Default for FluidVolumeDesc {
    fn default() -> Self {
        Self {
            width: 64,
            height: 64,
            depth: 64,
            pressure_iterations: 30,
            buoyancy: 1.0,
            smoke_weight: 0.05,
            cooling: 0.5,
            emitter_center: [32.0, 8.0, 32.0],
            emitter_radius: 6.0,
            impulse: [0.0, 4.0, 0.0],
            source_density: 1.0,
            source_temperature: 1.5,
            ambient_temperature: 0.0,
            occupancy_threshold: -1.0,
        }
    }
}

impl FluidVolumeDesc {
    pub fn cell_count(&self) -> u64 {
        self.width as u64 * self.height as u64 * self.depth as u64
    }
}

/// Uniform block shared by every kernel in `shaders/volume.wgsl`.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct FluidParams {
    width: u32,
    height: u32,
    depth: u32,
    _pad0: u32,
    dt: f32,
    buoyancy: f32,
    smoke_weight: f32,
    cooling: f32,
    emitter: [f32; 4],
    impulse: [f32; 4],
    source_density: f32,
    source_temperature: f32,
    ambient_temperature: f32,
    occupancy_threshold: f32,
}

/// Compiled pipelines for the volume kernels, shareable between volumes
/// created on the same device.
pub struct FluidKernels {
    bind_group_layout: wgpu::BindGroupLayout,
    init: wgpu::ComputePipeline,
    /// Parallel to [`STAGES`].
    stages: Vec<wgpu::ComputePipeline>,
}

impl FluidKernels {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Fluid Volume Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/volume.wgsl").into()),
        });

        let storage_entry = |binding: u32, read_only: bool| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Fluid Volume Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    },
                    storage_entry(1, true),
                    storage_entry(2, true),
                    storage_entry(3, true),
                    storage_entry(4, true),
                    storage_entry(5, false),
                    storage_entry(6, false),
                    storage_entry(7, false),
                    storage_entry(8, false),
                    storage_entry(9, false),
                ],
            });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fluid Volume Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = |entry_point: &str| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(&format!("Fluid {entry_point}")),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let init = pipeline("init");
        let stages = STAGES.iter().map(|s| pipeline(s.entry_point)).collect();

        Self {
            bind_group_layout,
            init,
            stages,
        }
    }
}

/// One double-buffered smoke volume on the GPU.
pub struct FluidVolume {
    desc: FluidVolumeDesc,
    device: Arc<wgpu::Device>,
    kernels: Arc<FluidKernels>,
    store: FieldStore,
    params_buffer: wgpu::Buffer,
}

impl FluidVolume {
    /// Create the field buffers and run the seeding pass. The seed writes
    /// every `current` identity, then all pairs swap so the data is readable
    /// as `previous` from the first update on.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: &wgpu::Queue,
        kernels: Arc<FluidKernels>,
        desc: FluidVolumeDesc,
    ) -> Self {
        let store = FieldStore::new(&device, desc.cell_count());
        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fluid Params"),
            size: std::mem::size_of::<FluidParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut volume = Self {
            desc,
            device,
            kernels,
            store,
            params_buffer,
        };

        queue.write_buffer(
            &volume.params_buffer,
            0,
            bytemuck::bytes_of(&volume.params(0.0)),
        );

        let mut encoder = volume
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Fluid Init Encoder"),
            });
        {
            let bind_group = volume.bind_group();
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Fluid init"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&volume.kernels.init);
            pass.set_bind_group(0, &bind_group, &[]);
            dispatch_volume(&mut pass, volume.grid_extent());
        }
        queue.submit(std::iter::once(encoder.finish()));

        for field in ALL_FIELDS {
            volume.store.swap(field);
        }

        log::info!(
            "fluid volume {}x{}x{} ({} cells), {} pressure iterations",
            volume.desc.width,
            volume.desc.height,
            volume.desc.depth,
            volume.desc.cell_count(),
            volume.desc.pressure_iterations,
        );

        volume
    }

    pub fn desc(&self) -> &FluidVolumeDesc {
        &self.desc
    }

    fn grid_extent(&self) -> (u32, u32, u32) {
        (self.desc.width, self.desc.height, self.desc.depth)
    }

    fn params(&self, dt: f32) -> FluidParams {
        let d = &self.desc;
        FluidParams {
            width: d.width,
            height: d.height,
            depth: d.depth,
            _pad0: 0,
            dt,
            buoyancy: d.buoyancy,
            smoke_weight: d.smoke_weight,
            cooling: d.cooling,
            emitter: [
                d.emitter_center[0],
                d.emitter_center[1],
                d.emitter_center[2],
                d.emitter_radius,
            ],
            impulse: [d.impulse[0], d.impulse[1], d.impulse[2], 0.0],
            source_density: d.source_density,
            source_temperature: d.source_temperature,
            ambient_temperature: d.ambient_temperature,
            occupancy_threshold: d.occupancy_threshold,
        }
    }

    /// Bind the current ping-pong roles: previous identities read-only,
    /// current identities writable. Rebuilt before every dispatch because the
    /// roles change at each swap.
    fn bind_group(&self) -> wgpu::BindGroup {
        fn buffer(b: &wgpu::Buffer) -> wgpu::BindingResource<'_> {
            b.as_entire_binding()
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fluid Volume Bind Group"),
            layout: &self.kernels.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer(self.store.pair(FieldId::Velocity).previous()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer(self.store.pair(FieldId::Pressure).previous()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffer(self.store.pair(FieldId::Density).previous()),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffer(self.store.pair(FieldId::Temperature).previous()),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: buffer(self.store.pair(FieldId::Velocity).current()),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: buffer(self.store.pair(FieldId::Pressure).current()),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: buffer(self.store.pair(FieldId::Density).current()),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: buffer(self.store.pair(FieldId::Temperature).current()),
                },
                wgpu::BindGroupEntry {
                    binding: 9,
                    resource: buffer(self.store.divergence()),
                },
            ],
        })
    }

    /// Advance the simulation by `dt`. Encodes every stage into `encoder` in
    /// table order, swapping the stage's pairs after each dispatch.
    pub fn update(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, dt: f32) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&self.params(dt)));

        let extent = self.grid_extent();
        for (stage, pipeline) in STAGES.iter().zip(&self.kernels.stages) {
            let iterations = match stage.repeat {
                Repeat::Once => 1,
                Repeat::PressureIterations => self.desc.pressure_iterations.max(1),
            };
            for _ in 0..iterations {
                let bind_group = self.bind_group();
                {
                    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                        label: Some(stage.name),
                        timestamp_writes: None,
                    });
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(0, &bind_group, &[]);
                    dispatch_volume(&mut pass, extent);
                }
                for field in stage.swaps {
                    self.store.swap(*field);
                }
            }
        }
    }

    /// The buffer a renderer should sample for `id`: the most recently
    /// completed identity.
    pub fn readable_buffer(&self, id: FieldId) -> &wgpu::Buffer {
        self.store.pair(id).previous()
    }

    /// Diagnostics: read back a scalar field (density, pressure or
    /// temperature) as one f32 per cell.
    pub fn read_scalar_field(
        &self,
        queue: &wgpu::Queue,
        id: FieldId,
    ) -> Result<Vec<f32>, GpuError> {
        debug_assert!(id != FieldId::Velocity, "velocity is vec4 per cell");
        readback::read_f32s(
            &self.device,
            queue,
            self.store.pair(id).previous(),
            self.desc.cell_count() as usize,
        )
    }

    /// Diagnostics: read back velocity as `[x, y, z, pad]` per cell.
    pub fn read_velocity(&self, queue: &wgpu::Queue) -> Result<Vec<[f32; 4]>, GpuError> {
        let flat = readback::read_f32s(
            &self.device,
            queue,
            self.store.pair(FieldId::Velocity).previous(),
            self.desc.cell_count() as usize * 4,
        )?;
        Ok(flat.chunks_exact(4).map(|c| [c[0], c[1], c[2], c[3]]).collect())
    }

    /// Diagnostics: read back the divergence grid.
    pub fn read_divergence(&self, queue: &wgpu::Queue) -> Result<Vec<f32>, GpuError> {
        readback::read_f32s(
            &self.device,
            queue,
            self.store.divergence(),
            self.desc.cell_count() as usize,
        )
    }
}
