use glam::{Mat4, Quat, Vec3};

/// Pose of the viewer as reported by an AR frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewerPose {
    /// Viewer-to-world transform.
    pub transform: Mat4,
    /// Projection of the primary view, when the host supplies one.
    pub projection: Option<Mat4>,
}

#[derive(Debug, Clone)]
pub struct Camera {
    pub eye: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub up: Vec3,
    pub fov_y: f32,
    pub aspect: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Set while an AR session drives the camera.
    pub viewer: Option<ViewerPose>,
}

impl Camera {
    /// Perspective camera at the origin looking down -Z.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            eye: Vec3::ZERO,
            yaw: -std::f32::consts::FRAC_PI_2,
            pitch: 0.0,
            up: Vec3::Y,
            fov_y: 70f32.to_radians(),
            aspect: width as f32 / height.max(1) as f32,
            z_near: 0.01,
            z_far: 20.0,
            viewer: None,
        }
    }

    pub fn forward(&self) -> Vec3 {
        let cy = self.yaw;
        let cp = self.pitch.clamp(-1.5533, 1.5533); // Slightly less than π/2 to avoid gimbal lock
        Vec3::new(cy.cos() * cp.cos(), cp.sin(), cy.sin() * cp.cos()).normalize()
    }

    pub fn target(&self) -> Vec3 { self.eye + self.forward() }

    pub fn set_aspect(&mut self, width: u32, height: u32) { self.aspect = width as f32 / height.max(1) as f32; }

    pub fn view(&self) -> Mat4 {
        match self.viewer {
            Some(pose) => pose.transform.inverse(),
            None => Mat4::look_at_rh(self.eye, self.target(), self.up),
        }
    }

    pub fn projection(&self) -> Mat4 {
        self.viewer
            .and_then(|pose| pose.projection)
            .unwrap_or_else(|| Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far))
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    pub fn set_look_at(&mut self, target: Vec3) {
        let dir = (target - self.eye).normalize();
        self.yaw = dir.z.atan2(dir.x);
        self.pitch = dir.y.asin().clamp(-1.4, 1.4);
    }

    /// Camera-to-world transform (the pose a device at this camera would report).
    pub fn pose(&self) -> Mat4 {
        let look = Mat4::look_at_rh(self.eye, self.target(), self.up);
        let (_, rotation, _) = look.inverse().to_scale_rotation_translation();
        Mat4::from_rotation_translation(rotation, self.eye)
    }

    /// Follow the AR viewer, or fall back to the free camera with `None`.
    pub fn follow(&mut self, pose: Option<ViewerPose>) {
        self.viewer = pose;
        if let Some(pose) = pose {
            let (_, rotation, translation): (Vec3, Quat, Vec3) = pose.transform.to_scale_rotation_translation();
            self.eye = translation;
            let dir = rotation * Vec3::NEG_Z;
            self.yaw = dir.z.atan2(dir.x);
            self.pitch = dir.y.clamp(-1.0, 1.0).asin();
        }
    }

    /// Intersect the view ray with the horizontal plane `y = height`.
    /// Returns the hit point or None if the plane is behind or beyond `max_distance`.
    pub fn raycast_plane(&self, height: f32, max_distance: f32) -> Option<Vec3> {
        ray_plane(self.eye, self.forward(), height, max_distance)
    }
}

pub fn ray_plane(origin: Vec3, dir: Vec3, height: f32, max_distance: f32) -> Option<Vec3> {
    if dir.y.abs() < 1e-6 {
        return None;
    }
    let t = (height - origin.y) / dir.y;
    (t > 0.0 && t <= max_distance).then(|| origin + dir * t)
}
