// renderer/billboard.rs
//
// Camera-facing sprites forward-rendered on top of the resolved frame. One
// draw call per billboard, all sharing a single quad template.

use glam::{Vec2, Vec3};

use crate::asset::TextureManager;
use crate::renderer::bounded::BoundedQueue;
use crate::renderer::primitives::quad_template;
use crate::renderer::{
    BlendMode, CullMode, DepthMode, DrawCall, FrameView, GeometryHandle, GeometrySource,
    GraphicsDevice, Program, RasterState, TargetHandle,
};

pub const MAX_BILLBOARDS: usize = 2048;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BillboardData {
    pub texture_key: u32,
    pub position: Vec3,
    pub size: Vec2,
}

pub struct BillboardBatcher {
    queue: BoundedQueue<BillboardData>,
    quad: GeometryHandle,
}

impl BillboardBatcher {
    pub fn new(device: &mut dyn GraphicsDevice) -> Self {
        let (vertices, indices) = quad_template();
        Self {
            queue: BoundedQueue::with_capacity(MAX_BILLBOARDS),
            quad: device.create_geometry(&vertices, &indices),
        }
    }

    pub fn submit(&mut self, texture_key: u32, position: Vec3, size: Vec2) -> bool {
        let accepted = self.queue.push(BillboardData {
            texture_key,
            position,
            size,
        });
        if !accepted && self.queue.dropped() == 1 {
            log::debug!("Billboard queue full ({}), dropping submissions", MAX_BILLBOARDS);
        }
        accepted
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn submitted(&self) -> &[BillboardData] {
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

    /// Draws every queued billboard into the back buffer, depth tested
    /// against the G-buffer depth map.
    pub fn draw_all(
        &self,
        device: &mut dyn GraphicsDevice,
        textures: &TextureManager,
        view: &FrameView,
        depth_map: TargetHandle,
    ) {
        if self.queue.is_empty() {
            return;
        }
        device.set_render_targets(&[]);

        for billboard in self.queue.iter() {
            device.draw(&DrawCall {
                program: Program::Billboard {
                    texture: textures.resolve(billboard.texture_key),
                    position: billboard.position,
                    size: billboard.size,
                    view: view.view,
                    projection: view.projection,
                    depth_map,
                },
                geometry: GeometrySource::Indexed {
                    geometry: self.quad,
                    start_index: 0,
                    primitive_count: 2,
                },
                raster: RasterState {
                    blend: BlendMode::AlphaBlend,
                    cull: CullMode::None,
                    depth: DepthMode::Disabled,
                },
                viewport: None,
            });
        }
    }

    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        device.release_geometry(self.quad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::soft::SoftDevice;

    #[test]
    fn queue_holds_exactly_capacity() {
        let mut device = SoftDevice::new(1, 1);
        let mut batcher = BillboardBatcher::new(&mut device);

        for i in 0..MAX_BILLBOARDS + 5 {
            batcher.submit(0, Vec3::new(i as f32, 0.0, 0.0), Vec2::ONE);
        }

        assert_eq!(batcher.len(), MAX_BILLBOARDS);
        assert_eq!(batcher.dropped(), 5);
        assert_eq!(batcher.submitted()[MAX_BILLBOARDS - 1].position.x, 2047.0);
    }
}
