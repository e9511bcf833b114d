// renderer/renderer.rs
use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::asset::TextureManager;
use crate::math::{BoundingSphere, Frustum};
use crate::renderer::billboard::BillboardBatcher;
use crate::renderer::lighting::LightingPass;
use crate::renderer::postprocess::{PostEffects, PostProcessChain};
use crate::renderer::{
    DrawCall, FrameView, FullScreenQuad, GBuffer, GeometryHandle, GeometrySource, GraphicsDevice,
    Material, Program, RasterState, Rect,
};
use crate::scene::{Camera, EntityId, Light, Scene};
use crate::settings::RenderSettings;

/// Per-frame draw counters, reset by `begin_draw`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub static_batches: usize,
    pub dynamic_drawables: usize,
    pub culled_drawables: usize,
}

/// Deferred renderer: G-buffer fill, light accumulation, compose and
/// post-processing, then forward billboards.
///
/// Constructing one is the content-loading step, so every target it draws
/// with exists from the start.
pub struct Renderer {
    settings: RenderSettings,
    gbuffer: GBuffer,
    lighting: LightingPass,
    post: PostProcessChain,
    billboards: BillboardBatcher,
    view: FrameView,
    stats: FrameStats,
    visible_lights: usize,
    visible_billboards: usize,
    device_lost: bool,
}

impl Renderer {
    pub fn new(device: &mut dyn GraphicsDevice, settings: RenderSettings) -> Self {
        let (width, height) = device.backbuffer_size();
        log::info!("Loading renderer content at {}x{}", width, height);

        let gbuffer = GBuffer::new(device, width, height);
        let lighting = LightingPass::new(device);
        let post = PostProcessChain::new(
            device,
            width,
            height,
            PostEffects::from_flags(settings.fxaa, settings.bloom),
            settings.bloom_settings,
        );
        let billboards = BillboardBatcher::new(device);

        Self {
            settings,
            gbuffer,
            lighting,
            post,
            billboards,
            view: FrameView::default(),
            stats: FrameStats::default(),
            visible_lights: 0,
            visible_billboards: 0,
            device_lost: false,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn set_fxaa(&mut self, enabled: bool) {
        self.settings.fxaa = enabled;
        self.sync_effects();
    }

    pub fn set_bloom(&mut self, enabled: bool) {
        self.settings.bloom = enabled;
        self.sync_effects();
    }

    pub fn set_show_debug_buffers(&mut self, enabled: bool) {
        self.settings.show_debug_buffers = enabled;
    }

    pub fn set_ambient(&mut self, colour: Vec3, intensity: f32) {
        self.settings.ambient_colour = colour.to_array();
        self.settings.ambient_intensity = intensity;
    }

    pub fn set_clear_colour(&mut self, colour: Vec4) {
        self.settings.clear_colour = colour.to_array();
    }

    fn sync_effects(&mut self) {
        self.post
            .set_effects(PostEffects::from_flags(self.settings.fxaa, self.settings.bloom));
    }

    pub fn gbuffer(&self) -> &GBuffer {
        &self.gbuffer
    }

    pub fn post_process(&self) -> &PostProcessChain {
        &self.post
    }

    pub fn lighting(&self) -> &LightingPass {
        &self.lighting
    }

    pub fn billboards(&self) -> &BillboardBatcher {
        &self.billboards
    }

    pub fn view(&self) -> &FrameView {
        &self.view
    }

    pub fn aspect_ratio(&self) -> f32 {
        let (width, height) = self.gbuffer.size();
        width as f32 / height.max(1) as f32
    }

    /// Lights drawn by the last completed frame.
    pub fn visible_lights_count(&self) -> usize {
        self.visible_lights
    }

    /// Billboards drawn by the last completed frame.
    pub fn visible_billboards_count(&self) -> usize {
        self.visible_billboards
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn is_device_lost(&self) -> bool {
        self.device_lost
    }

    /// The host saw the device go away. Targets stay stale until
    /// `on_device_reset`.
    pub fn on_device_lost(&mut self) {
        log::warn!("Graphics device lost, render targets are stale until reset");
        self.device_lost = true;
    }

    /// Recreates every render target at the back buffer size.
    pub fn on_device_reset(&mut self, device: &mut dyn GraphicsDevice) {
        let (width, height) = device.backbuffer_size();
        self.recreate_targets(device, width, height);
        self.device_lost = false;
    }

    pub fn on_resize(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring resize to {}x{}", width, height);
            return;
        }
        self.recreate_targets(device, width, height);
    }

    fn recreate_targets(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        self.gbuffer.create(device, width, height);
        self.post.create(device, width, height);
    }

    pub fn submit_light(&mut self, light: &Light, entity_matrix: Mat4, entity: EntityId) -> bool {
        self.lighting.submit(light, entity_matrix, entity)
    }

    pub fn submit_billboard(&mut self, texture_key: u32, position: Vec3, size: Vec2) -> bool {
        self.billboards.submit(texture_key, position, size)
    }

    /// Clears the submission queues, freezes the camera and prepares the
    /// G-buffer for opaque geometry.
    pub fn begin_draw(&mut self, device: &mut dyn GraphicsDevice, camera: &Camera) {
        self.lighting.clear();
        self.billboards.clear();
        self.stats = FrameStats::default();
        self.view = FrameView::new(camera, self.aspect_ratio());

        self.gbuffer.begin_geometry_pass(device);
        self.gbuffer
            .clear(device, Vec4::from_array(self.settings.clear_colour));
    }

    /// Borrow handed to the scene while it fills the G-buffer.
    pub fn draw_context<'a>(
        &'a mut self,
        device: &'a mut dyn GraphicsDevice,
        textures: &'a TextureManager,
    ) -> DrawContext<'a> {
        DrawContext {
            device,
            textures,
            frustum: self.view.frustum(),
            view: &self.view,
            lighting: &mut self.lighting,
            billboards: &mut self.billboards,
            stats: &mut self.stats,
        }
    }

    /// Lighting, compose, post-processing and billboards, in that order.
    pub fn end_draw(&mut self, device: &mut dyn GraphicsDevice, textures: &TextureManager) {
        self.gbuffer.resolve(device);
        self.lighting.draw(device, &self.gbuffer, &self.view);

        self.post.run(
            device,
            &self.gbuffer,
            Vec3::from_array(self.settings.ambient_colour),
            self.settings.ambient_intensity,
        );

        if self.settings.show_debug_buffers {
            self.draw_debug_buffers(device);
        }

        self.billboards
            .draw_all(device, textures, &self.view, self.gbuffer.depth());

        self.visible_lights = self.lighting.len();
        self.visible_billboards = self.billboards.len();
        log::debug!(
            "Frame: {} lights ({} dropped), {} billboards, {:?}",
            self.visible_lights,
            self.lighting.dropped(),
            self.visible_billboards,
            self.stats
        );
    }

    pub fn draw(&mut self, device: &mut dyn GraphicsDevice, textures: &TextureManager, scene: &Scene) {
        self.begin_draw(device, scene.camera());
        {
            let mut context = self.draw_context(device, textures);
            scene.draw(&mut context);
        }
        self.end_draw(device, textures);
    }

    /// Colour, normal, depth and light targets as thumbnails along the
    /// bottom edge of the back buffer.
    fn draw_debug_buffers(&self, device: &mut dyn GraphicsDevice) {
        let (width, height) = device.backbuffer_size();
        let thumb_width = width / 4;
        let thumb_height = height / 4;
        if thumb_width == 0 || thumb_height == 0 {
            return;
        }

        device.set_render_targets(&[]);
        let programs = [
            Program::Copy {
                source: self.gbuffer.colour(),
            },
            Program::Copy {
                source: self.gbuffer.normal(),
            },
            Program::CopyDepth {
                source: self.gbuffer.depth(),
            },
            Program::Copy {
                source: self.gbuffer.light(),
            },
        ];
        for (index, program) in programs.into_iter().enumerate() {
            FullScreenQuad::draw_in(
                device,
                program,
                RasterState::FULLSCREEN,
                Rect {
                    x: index as u32 * thumb_width,
                    y: height - thumb_height,
                    width: thumb_width,
                    height: thumb_height,
                },
            );
        }
    }

    /// Releases everything the renderer created.
    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        self.gbuffer.dispose(device);
        self.post.dispose(device);
        self.lighting.dispose(device);
        self.billboards.dispose(device);
    }
}

/// What the scene sees of the renderer during `Scene::draw`.
pub struct DrawContext<'a> {
    device: &'a mut dyn GraphicsDevice,
    textures: &'a TextureManager,
    view: &'a FrameView,
    frustum: Frustum,
    lighting: &'a mut LightingPass,
    billboards: &'a mut BillboardBatcher,
    stats: &'a mut FrameStats,
}

impl<'a> DrawContext<'a> {
    pub fn view(&self) -> &FrameView {
        self.view
    }

    pub fn is_visible(&self, sphere: &BoundingSphere) -> bool {
        self.frustum.intersects_sphere(sphere)
    }

    pub fn draw_static_batch(
        &mut self,
        geometry: GeometryHandle,
        start_index: u32,
        primitive_count: u32,
        world: Mat4,
        material: &Material,
    ) {
        self.stats.static_batches += 1;
        self.draw_mesh(geometry, start_index, primitive_count, world, material);
    }

    pub fn draw_dynamic(
        &mut self,
        geometry: GeometryHandle,
        primitive_count: u32,
        world: Mat4,
        material: &Material,
    ) {
        self.stats.dynamic_drawables += 1;
        self.draw_mesh(geometry, 0, primitive_count, world, material);
    }

    pub fn record_culled(&mut self) {
        self.stats.culled_drawables += 1;
    }

    fn draw_mesh(
        &mut self,
        geometry: GeometryHandle,
        start_index: u32,
        primitive_count: u32,
        world: Mat4,
        material: &Material,
    ) {
        self.device.draw(&DrawCall {
            program: Program::Geometry {
                world,
                view_projection: self.view.view_projection,
                texture: self.textures.resolve(material.texture_key),
                colour: material.colour,
                specular_power: material.specular_power,
            },
            geometry: GeometrySource::Indexed {
                geometry,
                start_index,
                primitive_count,
            },
            raster: RasterState::GEOMETRY,
            viewport: None,
        });
    }

    pub fn submit_light(&mut self, light: &Light, entity_matrix: Mat4, entity: EntityId) -> bool {
        self.lighting.submit(light, entity_matrix, entity)
    }

    pub fn submit_billboard(&mut self, texture_key: u32, position: Vec3, size: Vec2) -> bool {
        self.billboards.submit(texture_key, position, size)
    }
}
