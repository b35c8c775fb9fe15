use std::collections::HashSet;

use glam::Vec3;

use crate::model::Camera;

/// Walks the simulated AR device around the room.
pub struct CameraController {
    pub move_speed: f32,
    pub mouse_sensitivity: f32,
    /// Eye height is kept inside this band so the device never sinks into the floor.
    pub min_height: f32,
    pub max_height: f32,
}

impl Default for CameraController {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraController {
    pub fn new() -> Self {
        Self {
            move_speed: 1.5,
            mouse_sensitivity: 0.002,
            min_height: 0.2,
            max_height: 3.0,
        }
    }

    /// Apply mouse look delta to camera
    pub fn apply_look(&self, camera: &mut Camera, dx: f32, dy: f32) {
        camera.yaw += dx * self.mouse_sensitivity;
        let limit = std::f32::consts::FRAC_PI_2 - 0.01;
        camera.pitch = (camera.pitch - dy * self.mouse_sensitivity).clamp(-limit, limit);
    }

    /// Walk on the horizontal plane; Space / Shift change eye height.
    pub fn update_movement(&self, camera: &mut Camera, pressed: &HashSet<String>, dt: f32) {
        let forward = camera.forward();
        let flat = Vec3::new(forward.x, 0.0, forward.z).normalize_or_zero();
        let right = flat.cross(Vec3::Y).normalize_or_zero();
        let held = |k: &str| pressed.contains(k) || pressed.contains(&k.to_uppercase());

        let mut step = Vec3::ZERO;
        if held("w") {
            step += flat;
        }
        if held("s") {
            step -= flat;
        }
        if held("d") {
            step += right;
        }
        if held("a") {
            step -= right;
        }
        if pressed.contains(" ") {
            step += Vec3::Y;
        }
        if pressed.contains("Shift") {
            step -= Vec3::Y;
        }

        if step.length_squared() > 0.0 {
            camera.eye += step.normalize() * self.move_speed * dt;
            camera.eye.y = camera.eye.y.clamp(self.min_height, self.max_height);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_walk_stays_level_and_above_floor() {
        let ctl = CameraController::new();
        let mut cam = Camera::new(800, 600);
        cam.eye = Vec3::new(0.0, 1.5, 0.0);
        cam.pitch = -0.6;

        let keys: HashSet<String> = ["w".to_string()].into_iter().collect();
        ctl.update_movement(&mut cam, &keys, 1.0);
        assert!((cam.eye.y - 1.5).abs() < 1e-6);
        assert!(cam.eye.z < -1.0);

        let down: HashSet<String> = ["Shift".to_string()].into_iter().collect();
        for _ in 0..10 {
            ctl.update_movement(&mut cam, &down, 1.0);
        }
        assert_eq!(cam.eye.y, ctl.min_height);
    }
}
