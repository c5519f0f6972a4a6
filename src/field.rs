//! Double-buffered GPU field storage.
//!
//! Every simulated quantity lives in a pair of identically shaped storage
//! buffers. Within one pass a field is read from its `previous` identity and
//! written to its `current` identity, never both; after the pass the roles
//! are exchanged with an O(1) index flip. No data is ever copied on swap.

/// Two fixed slots plus a role selector. `swap` is an index flip; two swaps
/// restore the original assignment.
pub struct Pair<T> {
    slots: [T; 2],
    front: usize,
}

impl<T> Pair<T> {
    pub fn new(previous: T, current: T) -> Self {
        Self {
            slots: [previous, current],
            front: 0,
        }
    }

    /// The authoritative, fully-computed identity. Read-only for the rest of
    /// the frame once swapped in.
    pub fn previous(&self) -> &T {
        &self.slots[self.front]
    }

    /// The write target of the next pass.
    pub fn current(&self) -> &T {
        &self.slots[1 - self.front]
    }

    /// Exchange the role labels. O(1), no data movement.
    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}

/// The volumetric quantities owned by a fluid volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    Velocity,
    Pressure,
    Density,
    Temperature,
}

pub const ALL_FIELDS: [FieldId; 4] = [
    FieldId::Velocity,
    FieldId::Pressure,
    FieldId::Density,
    FieldId::Temperature,
];

/// A double-buffered GPU field.
pub type FieldPair = Pair<wgpu::Buffer>;

fn storage_buffer(device: &wgpu::Device, label: &str, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size,
        usage: wgpu::BufferUsages::STORAGE
            | wgpu::BufferUsages::COPY_DST
            | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    })
}

impl FieldPair {
    /// Create both identities of a field, zero-initialized.
    ///
    /// No shape or type checks happen at this layer; callers must bind
    /// matching element layouts in their kernels.
    pub fn create(device: &wgpu::Device, label: &str, size_bytes: u64) -> Self {
        debug_assert!(size_bytes > 0, "field must have a non-zero extent");
        Pair::new(
            storage_buffer(device, &format!("{label} A"), size_bytes),
            storage_buffer(device, &format!("{label} B"), size_bytes),
        )
    }
}

/// Owns the fluid volume's field pairs plus the single-buffered divergence
/// field (fully recomputed each frame, so it never swaps).
pub struct FieldStore {
    velocity: FieldPair,
    pressure: FieldPair,
    density: FieldPair,
    temperature: FieldPair,
    divergence: wgpu::Buffer,
}

impl FieldStore {
    pub fn new(device: &wgpu::Device, cell_count: u64) -> Self {
        let scalar_bytes = cell_count * 4;
        let vector_bytes = cell_count * 16; // vec4<f32> per cell
        Self {
            velocity: FieldPair::create(device, "Velocity", vector_bytes),
            pressure: FieldPair::create(device, "Pressure", scalar_bytes),
            density: FieldPair::create(device, "Density", scalar_bytes),
            temperature: FieldPair::create(device, "Temperature", scalar_bytes),
            divergence: storage_buffer(device, "Divergence", scalar_bytes),
        }
    }

    pub fn pair(&self, id: FieldId) -> &FieldPair {
        match id {
            FieldId::Velocity => &self.velocity,
            FieldId::Pressure => &self.pressure,
            FieldId::Density => &self.density,
            FieldId::Temperature => &self.temperature,
        }
    }

    pub fn swap(&mut self, id: FieldId) {
        match id {
            FieldId::Velocity => self.velocity.swap(),
            FieldId::Pressure => self.pressure.swap(),
            FieldId::Density => self.density.swap(),
            FieldId::Temperature => self.temperature.swap(),
        }
    }

    pub fn divergence(&self) -> &wgpu::Buffer {
        &self.divergence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swap_exchanges_roles() {
        let mut pair = Pair::new("a", "b");
        assert_eq!(*pair.previous(), "a");
        assert_eq!(*pair.current(), "b");

        pair.swap();
        assert_eq!(*pair.previous(), "b");
        assert_eq!(*pair.current(), "a");
    }

    #[test]
    fn test_double_swap_is_identity() {
        let mut pair = Pair::new(1, 2);
        pair.swap();
        pair.swap();
        assert_eq!(*pair.previous(), 1);
        assert_eq!(*pair.current(), 2);
    }

    #[test]
    fn test_previous_tracks_most_recent_write_target() {
        // After each simulated pass the buffer just written becomes
        // `previous`; an odd number of swaps leaves the roles exchanged.
        let mut pair = Pair::new(0, 1);
        for step in 0..7 {
            let written = *pair.current();
            pair.swap();
            assert_eq!(*pair.previous(), written, "step {step}");
        }
    }

    #[test]
    fn test_roles_never_alias() {
        let mut pair = Pair::new(10, 20);
        for _ in 0..4 {
            assert_ne!(*pair.previous(), *pair.current());
            pair.swap();
        }
    }
}
