//! CPU mirror of the volume kernels.
//!
//! Implements the same stage sequence as `shaders/volume.wgsl`, cell for
//! cell: identical index clamping, trilinear sampling, and constants. Used
//! by unit tests as an oracle and by GPU integration tests for comparison;
//! never part of the simulation path.

use glam::Vec3;

use super::FluidVolumeDesc;

pub struct ReferenceVolume {
    pub desc: FluidVolumeDesc,
    pub velocity: Vec<Vec3>,
    pub pressure: Vec<f32>,
    pub density: Vec<f32>,
    pub temperature: Vec<f32>,
    pub divergence: Vec<f32>,
}

impl ReferenceVolume {
    pub fn new(desc: FluidVolumeDesc) -> Self {
        let n = desc.cell_count() as usize;
        let mut volume = Self {
            velocity: vec![Vec3::ZERO; n],
            pressure: vec![0.0; n],
            density: vec![0.0; n],
            temperature: vec![desc.ambient_temperature; n],
            divergence: vec![0.0; n],
            desc,
        };
        volume.seed();
        volume
    }

    /// Matches the GPU `init` kernel.
    fn seed(&mut self) {
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            let p = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
            let s = self.emitter_falloff(p);
            self.density[i] = s * self.desc.source_density;
            self.temperature[i] =
                self.desc.ambient_temperature + s * self.desc.source_temperature;
        }
    }

    fn cells(&self) -> Vec<(i32, i32, i32)> {
        let mut out = Vec::with_capacity(self.desc.cell_count() as usize);
        for z in 0..self.desc.depth as i32 {
            for y in 0..self.desc.height as i32 {
                for x in 0..self.desc.width as i32 {
                    out.push((x, y, z));
                }
            }
        }
        out
    }

    fn index(&self, x: i32, y: i32, z: i32) -> usize {
        let w = self.desc.width as i32;
        let h = self.desc.height as i32;
        let d = self.desc.depth as i32;
        let cx = x.clamp(0, w - 1);
        let cy = y.clamp(0, h - 1);
        let cz = z.clamp(0, d - 1);
        (cx + cy * w + cz * w * h) as usize
    }

    fn emitter_falloff(&self, p: Vec3) -> f32 {
        let center = Vec3::from(self.desc.emitter_center);
        let d = p.distance(center);
        (1.0 - d / self.desc.emitter_radius.max(1e-6)).max(0.0)
    }

    fn trilerp(&self, field: &[f32], pos: Vec3) -> f32 {
        let base = pos.floor();
        let f = pos - base;
        let b = (base.x as i32, base.y as i32, base.z as i32);
        let at = |dx, dy, dz| field[self.index(b.0 + dx, b.1 + dy, b.2 + dz)];
        let c00 = at(0, 0, 0) + (at(1, 0, 0) - at(0, 0, 0)) * f.x;
        let c10 = at(0, 1, 0) + (at(1, 1, 0) - at(0, 1, 0)) * f.x;
        let c01 = at(0, 0, 1) + (at(1, 0, 1) - at(0, 0, 1)) * f.x;
        let c11 = at(0, 1, 1) + (at(1, 1, 1) - at(0, 1, 1)) * f.x;
        let c0 = c00 + (c10 - c00) * f.y;
        let c1 = c01 + (c11 - c01) * f.y;
        c0 + (c1 - c0) * f.z
    }

    fn trilerp_vec(&self, field: &[Vec3], pos: Vec3) -> Vec3 {
        let base = pos.floor();
        let f = pos - base;
        let b = (base.x as i32, base.y as i32, base.z as i32);
        let at = |dx, dy, dz| field[self.index(b.0 + dx, b.1 + dy, b.2 + dz)];
        let c00 = at(0, 0, 0).lerp(at(1, 0, 0), f.x);
        let c10 = at(0, 1, 0).lerp(at(1, 1, 0), f.x);
        let c01 = at(0, 0, 1).lerp(at(1, 0, 1), f.x);
        let c11 = at(0, 1, 1).lerp(at(1, 1, 1), f.x);
        c00.lerp(c10, f.y).lerp(c01.lerp(c11, f.y), f.z)
    }

    pub fn inject(&mut self, dt: f32) {
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            let p = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
            let s = self.emitter_falloff(p) * dt;
            self.velocity[i] += Vec3::from(self.desc.impulse) * s;
            self.density[i] += self.desc.source_density * s;
            self.temperature[i] += self.desc.source_temperature * s;
        }
    }

    pub fn advect(&mut self, dt: f32) {
        let vel = self.velocity.clone();
        let pressure = self.pressure.clone();
        let density = self.density.clone();
        let temperature = self.temperature.clone();
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            let center = Vec3::new(x as f32, y as f32, z as f32) + 0.5;
            let back = center - vel[i] * dt - 0.5;
            self.velocity[i] = self.trilerp_vec(&vel, back);
            self.pressure[i] = self.trilerp(&pressure, back);
            self.density[i] = self.trilerp(&density, back);
            self.temperature[i] = self.trilerp(&temperature, back);
        }
    }

    pub fn buoyancy(&mut self, dt: f32) {
        for i in 0..self.velocity.len() {
            let lift =
                self.desc.buoyancy * (self.temperature[i] - self.desc.ambient_temperature);
            let drag = self.desc.smoke_weight * self.density[i];
            self.velocity[i].y += dt * (lift - drag);
        }
    }

    pub fn cool(&mut self, dt: f32) {
        let decay = (1.0 - self.desc.cooling * dt).clamp(0.0, 1.0);
        for t in &mut self.temperature {
            *t = self.desc.ambient_temperature + (*t - self.desc.ambient_temperature) * decay;
        }
    }

    pub fn compute_divergence(&mut self) {
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            if self.density[i] <= self.desc.occupancy_threshold {
                self.divergence[i] = 0.0;
                continue;
            }
            let r = self.velocity[self.index(x + 1, y, z)].x;
            let l = self.velocity[self.index(x - 1, y, z)].x;
            let u = self.velocity[self.index(x, y + 1, z)].y;
            let d = self.velocity[self.index(x, y - 1, z)].y;
            let f = self.velocity[self.index(x, y, z + 1)].z;
            let b = self.velocity[self.index(x, y, z - 1)].z;
            self.divergence[i] = 0.5 * ((r - l) + (u - d) + (f - b));
        }
    }

    pub fn pressure_iteration(&mut self) {
        let prev = self.pressure.clone();
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            let sum = prev[self.index(x + 1, y, z)]
                + prev[self.index(x - 1, y, z)]
                + prev[self.index(x, y + 1, z)]
                + prev[self.index(x, y - 1, z)]
                + prev[self.index(x, y, z + 1)]
                + prev[self.index(x, y, z - 1)];
            self.pressure[i] = (sum - self.divergence[i]) / 6.0;
        }
    }

    pub fn project(&mut self) {
        let pressure = self.pressure.clone();
        for (x, y, z) in self.cells() {
            let i = self.index(x, y, z);
            if self.density[i] <= self.desc.occupancy_threshold {
                continue;
            }
            let r = pressure[self.index(x + 1, y, z)];
            let l = pressure[self.index(x - 1, y, z)];
            let u = pressure[self.index(x, y + 1, z)];
            let d = pressure[self.index(x, y - 1, z)];
            let f = pressure[self.index(x, y, z + 1)];
            let b = pressure[self.index(x, y, z - 1)];
            self.velocity[i] -= 0.5 * Vec3::new(r - l, u - d, f - b);
        }
    }

    /// One full frame, in stage-table order.
    pub fn update(&mut self, dt: f32) {
        self.inject(dt);
        self.advect(dt);
        self.buoyancy(dt);
        self.cool(dt);
        self.compute_divergence();
        for _ in 0..self.desc.pressure_iterations.max(1) {
            self.pressure_iteration();
        }
        self.project();
    }

    pub fn total_absolute_divergence(&mut self) -> f32 {
        self.compute_divergence();
        self.divergence.iter().map(|d| d.abs()).sum()
    }
}
