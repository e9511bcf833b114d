use glam::{Mat4, Quat, Vec3};

/// Right-handed perspective camera with a 0..1 depth range.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_radians: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    pub fn look_at(eye: Vec3, target: Vec3) -> Self {
        Self {
            eye,
            target,
            ..Self::default()
        }
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn proj(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_radians, aspect, self.near, self.far)
    }

    pub fn view_proj(&self, aspect: f32) -> Mat4 {
        self.proj(aspect) * self.view()
    }

    pub fn position(&self) -> Vec3 {
        self.eye
    }

    pub fn forward(&self) -> Vec3 {
        (self.target - self.eye).normalize_or_zero()
    }

    /// Circles the target around the up axis, keeping distance and height.
    pub fn orbit(&mut self, angle_radians: f32) {
        let offset = self.eye - self.target;
        let rotated = Quat::from_axis_angle(self.up.normalize_or_zero(), angle_radians) * offset;
        self.eye = self.target + rotated;
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(0.0, 0.0, 3.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_radians: 60f32.to_radians(),
            near: 0.1,
            far: 100.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_proj_is_invertible() {
        let cam = Camera::default();
        let vp = cam.view_proj(16.0 / 9.0);
        let id = vp * vp.inverse();
        assert!(id.abs_diff_eq(Mat4::IDENTITY, 1e-4));
    }

    #[test]
    fn target_projects_to_screen_centre() {
        let cam = Camera::look_at(Vec3::new(4.0, 3.0, 6.0), Vec3::new(1.0, 0.0, -1.0));
        let clip = cam.view_proj(1.5) * cam.target.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-4 && ndc.y.abs() < 1e-4);
        assert!(ndc.z > 0.0 && ndc.z < 1.0);
    }

    #[test]
    fn orbit_keeps_distance() {
        let mut cam = Camera::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO);
        let before = cam.eye.distance(cam.target);
        cam.orbit(1.0);
        assert!((cam.eye.distance(cam.target) - before).abs() < 1e-4);
        assert!((cam.eye.y - 2.0).abs() < 1e-4);
    }
}
