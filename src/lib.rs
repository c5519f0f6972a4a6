//! GPU-driven smoke volume and particle simulation.
//!
//! Two simulation engines built around the same idiom: own a set of
//! GPU-resident buffers, mutate them only through compute dispatch, manage
//! buffer identity by ping-pong swaps, and publish the most recently
//! completed buffers for a renderer to sample.
//!
//! - [`fluid::FluidVolume`]: a grid-based smoke solver (inject, advect,
//!   buoyancy, cool, divergence, iterated pressure relaxation, projection)
//!   over double-buffered volumetric fields.
//! - [`particles::ParticleSystem`]: a fixed-capacity particle pool with a
//!   GPU-side free list (dead list), emission driven by a cooldown clock,
//!   and GPU-generated indirect draw arguments.
//!
//! All heavy work happens on the GPU; the CPU records passes in submission
//! order and never blocks on them in steady state.

pub mod camera;
pub mod context;
pub mod field;
pub mod fluid;
pub mod particles;
pub mod readback;

pub use camera::FlyCamera;
pub use context::{GpuContext, GpuError};
pub use fluid::{FluidVolume, FluidVolumeDesc};
pub use particles::{ParticleSystem, ParticleSystemDesc};
