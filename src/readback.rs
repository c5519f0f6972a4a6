//! Synchronous GPU buffer readback.
//!
//! Copies a GPU buffer into a fresh staging buffer, blocks until the map
//! completes, and returns the contents. This is a diagnostics/test path; the
//! steady-state simulation and render loops never read anything back.

use std::sync::mpsc;

use crate::context::{await_buffer_map, GpuError};

/// Read `size` bytes from the front of `src`.
pub fn read_bytes(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    size: u64,
) -> Result<Vec<u8>, GpuError> {
    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Copy Encoder"),
    });
    encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
    queue.submit(std::iter::once(encoder.finish()));

    let (tx, rx) = mpsc::channel();
    staging
        .slice(..)
        .map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
    device.poll(wgpu::Maintain::Wait);
    await_buffer_map(rx)?;

    let data = staging.slice(..).get_mapped_range().to_vec();
    staging.unmap();
    Ok(data)
}

/// Read `count` f32 elements from the front of `src`.
pub fn read_f32s(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<f32>, GpuError> {
    let bytes = read_bytes(device, queue, src, (count * 4) as u64)?;
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}

/// Read `count` u32 elements from the front of `src`.
pub fn read_u32s(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
    count: usize,
) -> Result<Vec<u32>, GpuError> {
    let bytes = read_bytes(device, queue, src, (count * 4) as u64)?;
    Ok(bytemuck::cast_slice(&bytes).to_vec())
}

/// Read a single u32 counter.
pub fn read_counter(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    src: &wgpu::Buffer,
) -> Result<u32, GpuError> {
    Ok(read_u32s(device, queue, src, 1)?[0])
}
