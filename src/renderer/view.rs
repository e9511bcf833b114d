use glam::{Mat4, Vec3};

use crate::math::Frustum;
use crate::scene::Camera;

/// Camera matrices frozen for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameView {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inverse_view_projection: Mat4,
    pub position: Vec3,
}

impl FrameView {
    pub fn new(camera: &Camera, aspect: f32) -> Self {
        let view = camera.view();
        let projection = camera.proj(aspect);
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            inverse_view_projection: view_projection.inverse(),
            position: camera.position(),
        }
    }

    pub fn frustum(&self) -> Frustum {
        Frustum::from_view_projection(&self.view_projection)
    }
}

impl Default for FrameView {
    fn default() -> Self {
        Self::new(&Camera::default(), 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_round_trips_world_points() {
        let view = FrameView::new(&Camera::default(), 16.0 / 9.0);
        let clip = view.view_projection * Vec3::new(0.3, -0.2, 0.5).extend(1.0);
        let ndc = clip / clip.w;
        let back = view.inverse_view_projection * ndc;
        let world = back.truncate() / back.w;
        assert!(world.abs_diff_eq(Vec3::new(0.3, -0.2, 0.5), 1e-4));
    }
}
