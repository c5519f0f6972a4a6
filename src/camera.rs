//! Free-flying debug camera for the demo and render paths.

use glam::{Mat4, Vec3};

/// Yaw/pitch fly camera. Angles are radians; yaw 0 looks down +X.
pub struct FlyCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub speed: f32,
    pub sensitivity: f32,
    pub fov_y: f32,
    pub near: f32,
    pub far: f32,
}

/// Which movement keys are currently held.
#[derive(Clone, Copy, Default)]
pub struct InputState {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
}

// Just shy of 90 degrees; keeps forward() off the world up axis.
const PITCH_LIMIT: f32 = 1.5533;

impl Default for FlyCamera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            speed: 5.0,
            sensitivity: 0.003,
            fov_y: std::f32::consts::FRAC_PI_3,
            near: 0.01,
            far: 100.0,
        }
    }
}

impl FlyCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Aim the camera at `target` from its current position.
    pub fn with_target(mut self, target: Vec3) -> Self {
        let dir = (target - self.position).normalize_or_zero();
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.clamp(-1.0, 1.0).asin();
        self
    }

    pub fn forward(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        Vec3::new(cy * cp, sp, sy * cp)
    }

    /// Horizontal strafe direction; well-defined because pitch never
    /// reaches the poles.
    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, aspect, self.near, self.far)
    }

    pub fn on_mouse_move(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw += delta_x * self.sensitivity;
        self.pitch = (self.pitch - delta_y * self.sensitivity).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    pub fn update(&mut self, input: &InputState, dt: f32) {
        let mut movement = Vec3::ZERO;
        if input.forward {
            movement += self.forward();
        }
        if input.back {
            movement -= self.forward();
        }
        if input.right {
            movement += self.right();
        }
        if input.left {
            movement -= self.right();
        }
        if input.up {
            movement += Vec3::Y;
        }
        if input.down {
            movement -= Vec3::Y;
        }
        if movement != Vec3::ZERO {
            self.position += movement.normalize() * self.speed * dt;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_is_unit_length() {
        let mut camera = FlyCamera::new();
        for (yaw, pitch) in [(0.0, 0.0), (1.2, 0.7), (-2.5, -1.0)] {
            camera.yaw = yaw;
            camera.pitch = pitch;
            assert!((camera.forward().length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_with_target_faces_target() {
        let camera = FlyCamera::new()
            .with_position(Vec3::new(0.0, 2.0, 5.0))
            .with_target(Vec3::new(0.0, 1.0, 0.0));
        let dir = (Vec3::new(0.0, 1.0, 0.0) - camera.position).normalize();
        assert!(camera.forward().dot(dir) > 0.999);
    }

    #[test]
    fn test_pitch_stays_clamped() {
        let mut camera = FlyCamera::new();
        for _ in 0..1000 {
            camera.on_mouse_move(0.0, -50.0);
        }
        assert!(camera.pitch <= PITCH_LIMIT);
        // Strafe direction must survive extreme pitch.
        assert!(camera.right().is_finite());
        assert!((camera.right().length() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_update_moves_along_view() {
        let mut camera = FlyCamera::new();
        camera.yaw = 0.0;
        camera.pitch = 0.0;
        let input = InputState {
            forward: true,
            ..Default::default()
        };
        camera.update(&input, 1.0);
        assert!(camera.position.x > 0.0);
        assert_eq!(camera.position.y, 0.0);
    }
}
