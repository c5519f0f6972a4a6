//! GPU-resident particle pool with free-list allocation.
//!
//! A fixed-capacity pool of particle records lives on the GPU next to a
//! dead list (a stack of free slot indices with an atomic counter) and a
//! draw list (rebuilt every update with the slots still alive). Emission
//! pops slots, expiry pushes them back, and the draw list feeds an indirect
//! draw; particle counts never round-trip through the CPU on the hot path.
//!
//! The dead-count snapshot is a uniform copy of the counter taken right
//! after each update pass. The next emit clamps against the snapshot, so a
//! burst can never request more slots than existed at the last update even
//! though the live counter keeps moving underneath it.

pub mod render;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use wgpu::util::DeviceExt;

use crate::context::GpuError;
use crate::readback;

const WORKGROUP_SIZE: u32 = 64;
/// Two triangles per billboard quad.
pub const INDICES_PER_PARTICLE: u32 = 6;
pub const VERTICES_PER_PARTICLE: u32 = 4;

fn workgroup_count(threads: u32) -> u32 {
    threads.div_ceil(WORKGROUP_SIZE)
}

/// GPU particle record; must match the WGSL `Particle` struct.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuParticle {
    pub position: [f32; 3],
    pub rotation: f32,
    pub velocity: [f32; 3],
    pub age: f32,
    pub acceleration: [f32; 3],
    pub lifetime: f32,
    pub color: [f32; 4],
    pub alive: u32,
    pub _pad: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PoolParams {
    capacity: u32,
    dt: f32,
    _pad: [u32; 2],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct EmitParams {
    emit_count: u32,
    seed: u32,
    lifetime_min: f32,
    lifetime_max: f32,
    rotation_min: f32,
    rotation_max: f32,
    _pad: [u32; 2],
    position_min: [f32; 4],
    position_max: [f32; 4],
    velocity_min: [f32; 4],
    velocity_max: [f32; 4],
    acceleration_min: [f32; 4],
    acceleration_max: [f32; 4],
    color_min: [f32; 4],
    color_max: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawArgsParams {
    indices_per_particle: u32,
    _pad: [u32; 3],
}

/// Static configuration: pool capacity, automatic emission cadence, and the
/// uniform ranges new particles are randomized from.
#[derive(Debug, Clone)]
pub struct ParticleSystemDesc {
    pub capacity: u32,
    /// Seconds between automatic bursts, sampled per burst.
    pub emission_period: (f32, f32),
    /// Particles per automatic burst, sampled per burst.
    pub emission_count: (u32, u32),
    pub lifetime: (f32, f32),
    pub rotation: (f32, f32),
    pub position_min: [f32; 3],
    pub position_max: [f32; 3],
    pub velocity_min: [f32; 3],
    pub velocity_max: [f32; 3],
    pub acceleration_min: [f32; 3],
    pub acceleration_max: [f32; 3],
    pub color_min: [f32; 4],
    pub color_max: [f32; 4],
}

impl Default for ParticleSystemDesc {
    fn default() -> Self {
        Self {
            capacity: 4096,
            emission_period: (0.02, 0.08),
            emission_count: (8, 32),
            lifetime: (1.0, 3.0),
            rotation: (0.0, std::f32::consts::TAU),
            position_min: [-0.5, 0.0, -0.5],
            position_max: [0.5, 0.2, 0.5],
            velocity_min: [-0.5, 1.0, -0.5],
            velocity_max: [0.5, 2.5, 0.5],
            acceleration_min: [0.0, -1.0, 0.0],
            acceleration_max: [0.0, -1.0, 0.0],
            color_min: [0.9, 0.4, 0.1, 0.8],
            color_max: [1.0, 0.8, 0.3, 1.0],
        }
    }
}

/// Decides when the automatic emission fires and how large the burst is.
/// Pure CPU state; kept separate from the GPU plumbing so the cadence is
/// testable.
struct EmissionTimer {
    cooldown: f32,
    period: (f32, f32),
    count: (u32, u32),
}

impl EmissionTimer {
    fn new(period: (f32, f32), count: (u32, u32)) -> Self {
        Self {
            cooldown: 0.0,
            period,
            count,
        }
    }

    fn tick(&mut self, dt: f32, rng: &mut impl Rng) -> Option<u32> {
        self.cooldown -= dt;
        if self.cooldown >= 0.0 {
            return None;
        }
        self.cooldown = rng.gen_range(self.period.0..=self.period.1);
        Some(rng.gen_range(self.count.0..=self.count.1))
    }
}

/// Compiled particle pipelines, shareable between systems on one device.
pub struct ParticleKernels {
    init_layout: wgpu::BindGroupLayout,
    emit_layout: wgpu::BindGroupLayout,
    update_layout: wgpu::BindGroupLayout,
    draw_args_layout: wgpu::BindGroupLayout,
    init: wgpu::ComputePipeline,
    emit: wgpu::ComputePipeline,
    update: wgpu::ComputePipeline,
    draw_args: wgpu::ComputePipeline,
}

fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl ParticleKernels {
    pub fn new(device: &wgpu::Device) -> Self {
        let module = |label: &str, src: &'static str| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(src.into()),
            })
        };
        let init_shader = module("Particle Init Shader", include_str!("shaders/particle_init.wgsl"));
        let emit_shader = module("Particle Emit Shader", include_str!("shaders/particle_emit.wgsl"));
        let update_shader = module(
            "Particle Update Shader",
            include_str!("shaders/particle_update.wgsl"),
        );
        let draw_args_shader = module(
            "Particle Draw Args Shader",
            include_str!("shaders/particle_draw_args.wgsl"),
        );

        let init_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Init Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
            ],
        });
        let emit_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Emit Layout"),
            entries: &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, false),
                storage_entry(3, false),
                storage_entry(4, false),
            ],
        });
        let update_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Update Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, false),
                storage_entry(2, false),
                storage_entry(3, false),
                storage_entry(4, false),
                storage_entry(5, false),
            ],
        });
        let draw_args_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Particle Draw Args Layout"),
            entries: &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        });

        let pipeline = |label: &str,
                        layout: &wgpu::BindGroupLayout,
                        shader: &wgpu::ShaderModule,
                        entry_point: &str| {
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(label),
                bind_group_layouts: &[layout],
                push_constant_ranges: &[],
            });
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: shader,
                entry_point: Some(entry_point),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        let init = pipeline("Particle init", &init_layout, &init_shader, "init");
        let emit = pipeline("Particle emit", &emit_layout, &emit_shader, "emit");
        let update = pipeline("Particle update", &update_layout, &update_shader, "update");
        let draw_args = pipeline(
            "Particle draw args",
            &draw_args_layout,
            &draw_args_shader,
            "generate_draw_args",
        );

        Self {
            init_layout,
            emit_layout,
            update_layout,
            draw_args_layout,
            init,
            emit,
            update,
            draw_args,
        }
    }
}

/// Counter readback for tests and logging; only meaningful after the
/// submissions that produced it have completed.
#[derive(Debug, Clone, Copy)]
pub struct ParticleDiagnostics {
    pub alive: u32,
    pub dead: u32,
    pub capacity: u32,
    /// Particles the most recent burst requested but could not get.
    pub shortfall: u32,
}

pub struct ParticleSystem {
    desc: ParticleSystemDesc,
    device: Arc<wgpu::Device>,
    kernels: Arc<ParticleKernels>,
    pool: wgpu::Buffer,
    dead_list: wgpu::Buffer,
    dead_count: wgpu::Buffer,
    dead_snapshot: wgpu::Buffer,
    emit_budget: wgpu::Buffer,
    draw_list: wgpu::Buffer,
    draw_count: wgpu::Buffer,
    draw_args: wgpu::Buffer,
    draw_args_params: wgpu::Buffer,
    pool_params: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    timer: EmissionTimer,
    /// Size of the most recent burst after the capacity clamp; compared
    /// against the latched budget when diagnostics are read.
    last_requested: u32,
    rng: StdRng,
}

impl ParticleSystem {
    /// Create the pool and run the initialization pass: every slot dead,
    /// the dead list full, the counter at capacity and snapshotted.
    pub fn new(
        device: Arc<wgpu::Device>,
        queue: &wgpu::Queue,
        kernels: Arc<ParticleKernels>,
        desc: ParticleSystemDesc,
    ) -> Self {
        let capacity = desc.capacity;
        let storage = |label: &str, size: u64, extra: wgpu::BufferUsages| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size,
                usage: wgpu::BufferUsages::STORAGE | extra,
                mapped_at_creation: false,
            })
        };

        let pool = storage(
            "Particle Pool",
            capacity as u64 * std::mem::size_of::<GpuParticle>() as u64,
            wgpu::BufferUsages::COPY_SRC,
        );
        let dead_list = storage("Particle Dead List", capacity as u64 * 4, wgpu::BufferUsages::empty());
        let dead_count = storage(
            "Particle Dead Count",
            4,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        );
        let draw_list = storage("Particle Draw List", capacity as u64 * 4, wgpu::BufferUsages::empty());
        let draw_count = storage(
            "Particle Draw Count",
            4,
            wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
        );
        let draw_args = storage(
            "Particle Draw Args",
            20,
            wgpu::BufferUsages::INDIRECT | wgpu::BufferUsages::COPY_SRC,
        );

        let dead_snapshot = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Dead Count Snapshot"),
            size: 16,
            usage: wgpu::BufferUsages::UNIFORM
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        // Latches the snapshot value the most recent burst clamped against,
        // so diagnostics can report the shortfall after the fact.
        let emit_budget = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Particle Emit Budget"),
            size: 4,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let pool_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Pool Params"),
            contents: bytemuck::bytes_of(&PoolParams {
                capacity,
                dt: 0.0,
                _pad: [0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let draw_args_params = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Draw Args Params"),
            contents: bytemuck::bytes_of(&DrawArgsParams {
                indices_per_particle: INDICES_PER_PARTICLE,
                _pad: [0; 3],
            }),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Particle Index Buffer"),
            contents: bytemuck::cast_slice(&quad_indices(capacity)),
            usage: wgpu::BufferUsages::INDEX,
        });

        // Counter seeding is ordered before the submit below.
        queue.write_buffer(&dead_count, 0, bytemuck::bytes_of(&capacity));
        queue.write_buffer(&draw_count, 0, bytemuck::bytes_of(&0u32));
        queue.write_buffer(&emit_budget, 0, bytemuck::bytes_of(&capacity));

        let init_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Init Bind Group"),
            layout: &kernels.init_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: pool_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: pool.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: dead_list.as_entire_binding(),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Particle Init Encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("particle init"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&kernels.init);
            pass.set_bind_group(0, &init_bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(capacity), 1, 1);
        }
        encoder.copy_buffer_to_buffer(&dead_count, 0, &dead_snapshot, 0, 4);
        queue.submit(std::iter::once(encoder.finish()));

        log::info!("particle system with capacity {capacity}");

        Self {
            timer: EmissionTimer::new(desc.emission_period, desc.emission_count),
            desc,
            device,
            kernels,
            pool,
            dead_list,
            dead_count,
            dead_snapshot,
            emit_budget,
            draw_list,
            draw_count,
            draw_args,
            draw_args_params,
            pool_params,
            index_buffer,
            last_requested: 0,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn desc(&self) -> &ParticleSystemDesc {
        &self.desc
    }

    pub fn capacity(&self) -> u32 {
        self.desc.capacity
    }

    /// Encode an emission burst of `count` particles. Requests beyond
    /// capacity are clamped here; the kernel additionally clamps against the
    /// dead-count snapshot and guards each pop, so over-asking can only ever
    /// produce fewer particles, never a corrupted free list.
    pub fn emit(&mut self, encoder: &mut wgpu::CommandEncoder, count: u32) {
        if count == 0 {
            return;
        }
        let count = if count > self.desc.capacity {
            log::warn!(
                "emit burst {count} exceeds pool capacity {}, clamping",
                self.desc.capacity
            );
            self.desc.capacity
        } else {
            count
        };

        // Record what this burst asked for and the free-slot budget it will
        // be clamped against; the snapshot holds that budget until the next
        // update refreshes it.
        self.last_requested = count;
        encoder.copy_buffer_to_buffer(&self.dead_snapshot, 0, &self.emit_budget, 0, 4);

        let d = &self.desc;
        let params = EmitParams {
            emit_count: count,
            seed: self.rng.gen(),
            lifetime_min: d.lifetime.0,
            lifetime_max: d.lifetime.1,
            rotation_min: d.rotation.0,
            rotation_max: d.rotation.1,
            _pad: [0; 2],
            position_min: extend(d.position_min),
            position_max: extend(d.position_max),
            velocity_min: extend(d.velocity_min),
            velocity_max: extend(d.velocity_max),
            acceleration_min: extend(d.acceleration_min),
            acceleration_max: extend(d.acceleration_max),
            color_min: d.color_min,
            color_max: d.color_max,
        };
        // A fresh params buffer per burst keeps multiple emits in one
        // submission from clobbering each other's uniforms.
        let emit_params = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Particle Emit Params"),
                contents: bytemuck::bytes_of(&params),
                usage: wgpu::BufferUsages::UNIFORM,
            });

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Emit Bind Group"),
            layout: &self.kernels.emit_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: emit_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.dead_snapshot.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.pool.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.dead_list.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.dead_count.as_entire_binding(),
                },
            ],
        });

        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("particle emit"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.kernels.emit);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(workgroup_count(count), 1, 1);
    }

    /// Advance every particle by `dt`: fire the automatic emission cadence,
    /// clear and rebuild the draw list, retire expired particles, then
    /// refresh the dead-count snapshot for the next frame's emission.
    pub fn update(&mut self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, dt: f32) {
        if let Some(burst) = self.timer.tick(dt, &mut self.rng) {
            self.emit(encoder, burst);
        }

        queue.write_buffer(
            &self.pool_params,
            0,
            bytemuck::bytes_of(&PoolParams {
                capacity: self.desc.capacity,
                dt,
                _pad: [0; 2],
            }),
        );

        encoder.clear_buffer(&self.draw_count, 0, None);

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Update Bind Group"),
            layout: &self.kernels.update_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.pool_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.pool.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.dead_list.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: self.dead_count.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: self.draw_list.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: self.draw_count.as_entire_binding(),
                },
            ],
        });

        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("particle update"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.kernels.update);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(workgroup_count(self.desc.capacity), 1, 1);
        }

        encoder.copy_buffer_to_buffer(&self.dead_count, 0, &self.dead_snapshot, 0, 4);
    }

    /// Encode the one-thread pass that turns the live count into indirect
    /// draw arguments. Must run after `update` in the same or a later
    /// submission, before the indirect draw.
    pub fn encode_draw_args(&self, encoder: &mut wgpu::CommandEncoder) {
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Particle Draw Args Bind Group"),
            layout: &self.kernels.draw_args_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.draw_args_params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.draw_count.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.draw_args.as_entire_binding(),
                },
            ],
        });
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("particle draw args"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.kernels.draw_args);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.dispatch_workgroups(1, 1, 1);
    }

    pub fn pool_buffer(&self) -> &wgpu::Buffer {
        &self.pool
    }

    pub fn draw_list_buffer(&self) -> &wgpu::Buffer {
        &self.draw_list
    }

    pub fn draw_args_buffer(&self) -> &wgpu::Buffer {
        &self.draw_args
    }

    pub fn index_buffer(&self) -> &wgpu::Buffer {
        &self.index_buffer
    }

    /// Read the counters back. Valid once prior submissions have completed;
    /// after an update the live and dead counts partition the pool.
    ///
    /// `shortfall` is how many particles the most recent burst asked for
    /// beyond the free slots it found; a clamped burst is otherwise
    /// invisible because the in-kernel clamp keeps the counters consistent.
    pub fn diagnostics(&self, queue: &wgpu::Queue) -> Result<ParticleDiagnostics, GpuError> {
        let alive = readback::read_counter(&self.device, queue, &self.draw_count)?;
        let dead = readback::read_counter(&self.device, queue, &self.dead_count)?;
        let budget = readback::read_counter(&self.device, queue, &self.emit_budget)?;
        let capacity = self.desc.capacity;
        if alive + dead != capacity {
            log::warn!(
                "particle accounting drift: {alive} alive + {dead} dead != {capacity}"
            );
        }
        let shortfall = self.last_requested.saturating_sub(budget);
        if shortfall > 0 {
            log::warn!(
                "emission shortfall: burst of {} found only {budget} free slots",
                self.last_requested
            );
        }
        Ok(ParticleDiagnostics {
            alive,
            dead,
            capacity,
            shortfall,
        })
    }
}

fn extend(v: [f32; 3]) -> [f32; 4] {
    [v[0], v[1], v[2], 0.0]
}

/// Shared index pattern: quad `k` uses vertices `4k..4k+4` as two triangles.
fn quad_indices(capacity: u32) -> Vec<u32> {
    let mut indices = Vec::with_capacity(capacity as usize * INDICES_PER_PARTICLE as usize);
    for k in 0..capacity {
        let base = k * VERTICES_PER_PARTICLE;
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_record_is_80_bytes() {
        // Must match the WGSL struct layout in every particle shader.
        assert_eq!(std::mem::size_of::<GpuParticle>(), 80);
    }

    #[test]
    fn test_uniform_block_sizes() {
        assert_eq!(std::mem::size_of::<PoolParams>(), 16);
        assert_eq!(std::mem::size_of::<EmitParams>(), 160);
        assert_eq!(std::mem::size_of::<DrawArgsParams>(), 16);
    }

    #[test]
    fn test_quad_indices_pattern() {
        let indices = quad_indices(3);
        assert_eq!(indices.len(), 18);
        assert_eq!(&indices[..6], &[0, 1, 2, 0, 2, 3]);
        assert_eq!(&indices[6..12], &[4, 5, 6, 4, 6, 7]);
        // Every index stays inside its quad's four vertices.
        for (i, idx) in indices.iter().enumerate() {
            let quad = (i / 6) as u32;
            assert!(*idx >= quad * 4 && *idx < quad * 4 + 4);
        }
    }

    #[test]
    fn test_emission_timer_fires_within_period_bounds() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut timer = EmissionTimer::new((0.5, 1.0), (3, 9));

        let mut fired = 0;
        let mut since_last = 0.0;
        let dt = 0.01;
        for _ in 0..100_000 {
            since_last += dt;
            if let Some(count) = timer.tick(dt, &mut rng) {
                assert!((3..=9).contains(&count));
                // One tick of slack on each side of the sampled period.
                assert!(since_last >= 0.5 - dt || fired == 0);
                assert!(since_last <= 1.0 + 2.0 * dt);
                since_last = 0.0;
                fired += 1;
            }
        }
        assert!(fired > 500, "fired only {fired} bursts");
    }

    #[test]
    fn test_emission_timer_first_tick_fires() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut timer = EmissionTimer::new((1.0, 1.0), (5, 5));
        assert_eq!(timer.tick(0.016, &mut rng), Some(5));
        assert_eq!(timer.tick(0.016, &mut rng), None);
    }

    #[test]
    fn test_fixed_cadence_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut timer = EmissionTimer::new((0.1, 0.1), (4, 4));
        let mut bursts = 0;
        for _ in 0..100 {
            if timer.tick(0.01, &mut rng).is_some() {
                bursts += 1;
            }
        }
        // 1 second of 0.1s periods, plus the immediate first burst.
        assert!((9..=11).contains(&bursts), "{bursts} bursts");
    }
}
