// renderer/lighting.rs
//
// Light accumulation. Every light the scene submits this frame is drawn into
// the G-buffer's light target with additive blending, after an emissive pass
// that needs no submission at all.

use glam::{Mat4, Vec3};

use crate::renderer::bounded::BoundedQueue;
use crate::renderer::primitives::sphere_mesh;
use crate::renderer::{
    BlendMode, CullMode, DepthMode, DrawCall, FrameView, FullScreenQuad, GBuffer, GeometryHandle,
    GeometrySource, GraphicsDevice, Program, RasterState,
};
use crate::scene::{EntityId, Light, LightKind};

pub const MAX_LIGHTS: usize = 512;

const VOLUME_SEGMENTS: u32 = 12;
const VOLUME_RINGS: u32 = 8;

/// A light paired with the entity that submitted it, valid for one frame.
#[derive(Clone, Copy, Debug)]
pub struct LightData {
    pub light: Light,
    pub entity_matrix: Mat4,
    pub entity: EntityId,
}

impl LightData {
    pub fn world_position(&self) -> Vec3 {
        self.entity_matrix.transform_point3(self.light.position)
    }
}

/// Point lights whose volume contains the camera draw their back faces.
pub fn point_light_cull(camera_position: Vec3, light_position: Vec3, radius: f32) -> CullMode {
    if camera_position.distance(light_position) < radius {
        CullMode::CullClockwiseFace
    } else {
        CullMode::CullCounterClockwiseFace
    }
}

pub struct LightingPass {
    queue: BoundedQueue<LightData>,
    volume: GeometryHandle,
    volume_primitives: u32,
}

impl LightingPass {
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        let (vertices, indices) = sphere_mesh(VOLUME_SEGMENTS, VOLUME_RINGS);
        Self {
            queue: BoundedQueue::with_capacity(MAX_LIGHTS),
            volume: device.create_geometry(&vertices, &indices),
            volume_primitives: (indices.len() / 3) as u32,
        }
    }

    /// Queues a light for this frame. Past capacity the light is dropped and
    /// `false` is returned; nothing else happens.
    pub fn submit(&mut self, light: &Light, entity_matrix: Mat4, entity: EntityId) -> bool {
        let accepted = self.queue.push(LightData {
            light: *light,
            entity_matrix,
            entity,
        });
        if !accepted && self.queue.dropped() == 1 {
            log::debug!("Light queue full ({}), dropping submissions", MAX_LIGHTS);
        }
        accepted
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn submitted(&self) -> &[LightData] {
        self.queue.as_slice()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.queue.dropped()
    }

    /// Fills the light target: clear, emissive, then each submitted light.
    pub fn draw(&self, device: &mut dyn GraphicsDevice, gbuffer: &GBuffer, view: &FrameView) {
        gbuffer.begin_light_pass(device);

        FullScreenQuad::draw(
            device,
            Program::Emissive {
                colour_map: gbuffer.colour(),
            },
            RasterState::ADDITIVE,
        );

        for data in self.queue.iter() {
            match data.light.kind {
                LightKind::Directional { direction } => {
                    self.draw_directional(device, gbuffer, view, data, direction)
                }
                LightKind::Point { radius } => {
                    self.draw_point(device, gbuffer, view, data, radius)
                }
            }
        }
    }

    fn draw_directional(
        &self,
        device: &mut dyn GraphicsDevice,
        gbuffer: &GBuffer,
        view: &FrameView,
        data: &LightData,
        direction: Vec3,
    ) {
        let direction = data
            .entity_matrix
            .transform_vector3(direction)
            .normalize_or_zero();
        FullScreenQuad::draw(
            device,
            Program::DirectionalLight {
                direction,
                colour: data.light.colour,
                intensity: data.light.intensity,
                camera_position: view.position,
                inverse_view_projection: view.inverse_view_projection,
                gbuffer: gbuffer.inputs(),
            },
            RasterState::ADDITIVE,
        );
    }

    fn draw_point(
        &self,
        device: &mut dyn GraphicsDevice,
        gbuffer: &GBuffer,
        view: &FrameView,
        data: &LightData,
        radius: f32,
    ) {
        let position = data.world_position();
        let world = Mat4::from_translation(position) * Mat4::from_scale(Vec3::splat(radius));

        device.draw(&DrawCall {
            program: Program::PointLight {
                world,
                view_projection: view.view_projection,
                position,
                colour: data.light.colour,
                radius,
                intensity: data.light.intensity,
                camera_position: view.position,
                inverse_view_projection: view.inverse_view_projection,
                gbuffer: gbuffer.inputs(),
            },
            geometry: GeometrySource::Indexed {
                geometry: self.volume,
                start_index: 0,
                primitive_count: self.volume_primitives,
            },
            raster: RasterState {
                blend: BlendMode::Additive,
                cull: point_light_cull(view.position, position, radius),
                depth: DepthMode::Disabled,
            },
            viewport: None,
        });
    }

    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        device.release_geometry(self.volume);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::soft::SoftDevice;
    use crate::scene::IdAllocator;

    #[test]
    fn cull_flips_exactly_at_the_radius() {
        let light = Vec3::ZERO;
        let camera = |d: f32| Vec3::new(d, 0.0, 0.0);

        assert_eq!(point_light_cull(camera(4.99), light, 5.0), CullMode::CullClockwiseFace);
        assert_eq!(
            point_light_cull(camera(5.0), light, 5.0),
            CullMode::CullCounterClockwiseFace
        );
        assert_eq!(
            point_light_cull(camera(5.01), light, 5.0),
            CullMode::CullCounterClockwiseFace
        );
    }

    #[test]
    fn queue_drops_past_capacity() {
        let mut device = SoftDevice::new(1, 1);
        let mut pass = LightingPass::new(&mut device);
        let entity = IdAllocator::default().next_entity();
        let light = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);

        for _ in 0..MAX_LIGHTS {
            assert!(pass.submit(&light, Mat4::IDENTITY, entity));
        }
        assert!(!pass.submit(&light, Mat4::IDENTITY, entity));
        assert_eq!(pass.len(), MAX_LIGHTS);
        assert_eq!(pass.dropped(), 1);

        pass.clear();
        assert!(pass.is_empty());
    }

    #[test]
    fn point_light_position_follows_entity() {
        let entity = IdAllocator::default().next_entity();
        let data = LightData {
            light: Light::point(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, 3.0, 1.0),
            entity_matrix: Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)),
            entity,
        };
        assert_eq!(data.world_position(), Vec3::new(10.0, 1.0, 0.0));
    }
}
