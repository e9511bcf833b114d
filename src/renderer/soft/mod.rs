//! Deterministic CPU implementation of [`GraphicsDevice`].
//!
//! Runs the same passes as the wgpu backend without a window or adapter, which
//! makes every stage of the deferred pipeline observable from tests. Full
//! screen passes shade rows in parallel; triangles are drawn in submission
//! order.

mod raster;
mod shading;
mod surface;

pub use surface::Surface;

use glam::Vec4;
use rayon::prelude::*;

use crate::asset::ResourcePool;
use crate::renderer::{
    BlendMode, CullMode, DepthMode, DrawCall, GeometryHandle, GeometrySource, GraphicsDevice,
    ProgramKind, Rect, TargetDesc, TargetFormat, TargetHandle, TextureHandle, Vertex,
};

use raster::Fragment;
use shading::{Bindings, Outputs, VertexStage};

struct SoftGeometry {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

/// One submitted draw, kept when the draw log is enabled.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawRecord {
    pub kind: ProgramKind,
    pub blend: BlendMode,
    pub cull: CullMode,
    /// Bound outputs; empty means the back buffer.
    pub targets: Vec<TargetHandle>,
    /// `false` when a stale handle made the device skip the draw.
    pub executed: bool,
}

pub struct SoftDevice {
    backbuffer: Surface,
    targets: ResourcePool<Surface>,
    textures: ResourcePool<Surface>,
    geometry: ResourcePool<SoftGeometry>,
    bound: Vec<TargetHandle>,
    draw_log: Option<Vec<DrawRecord>>,
}

impl SoftDevice {
    pub fn new(width: u32, height: u32) -> Self {
        log::debug!("Creating software device {}x{}", width, height);
        Self {
            backbuffer: Surface::new(width, height, TargetFormat::Rgba8, false),
            targets: ResourcePool::new(),
            textures: ResourcePool::new(),
            geometry: ResourcePool::new(),
            bound: Vec::new(),
            draw_log: None,
        }
    }

    /// Records every draw call from now on.
    pub fn with_draw_log(mut self) -> Self {
        self.draw_log = Some(Vec::new());
        self
    }

    pub fn draw_log(&self) -> &[DrawRecord] {
        self.draw_log.as_deref().unwrap_or(&[])
    }

    pub fn clear_draw_log(&mut self) {
        if let Some(log) = self.draw_log.as_mut() {
            log.clear();
        }
    }

    pub fn backbuffer(&self) -> &Surface {
        &self.backbuffer
    }

    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let texel = self.backbuffer.texel(x, y).clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
        [
            texel.x.round() as u8,
            texel.y.round() as u8,
            texel.z.round() as u8,
            texel.w.round() as u8,
        ]
    }

    pub fn read_target(&self, target: TargetHandle) -> Option<&Surface> {
        self.targets.get(target.cast())
    }

    /// Simulates losing the device: every render target is gone while
    /// textures and geometry survive.
    pub fn reset(&mut self) {
        log::warn!(
            "Software device reset, dropping {} render targets",
            self.targets.len()
        );
        self.targets.clear();
        self.bound.clear();
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.backbuffer = Surface::new(width, height, TargetFormat::Rgba8, false);
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_geometry(&self) -> usize {
        self.geometry.len()
    }

    fn record(&mut self, call: &DrawCall, executed: bool) {
        let targets = self.bound.clone();
        if let Some(log) = self.draw_log.as_mut() {
            log.push(DrawRecord {
                kind: call.program.kind(),
                blend: call.raster.blend,
                cull: call.raster.cull,
                targets,
                executed,
            });
        }
    }

    /// Moves the bound surfaces out so inputs can be read while they are
    /// written. `None` if any bound handle is stale.
    fn take_outputs(&mut self) -> Option<Vec<Surface>> {
        if self.bound.is_empty() {
            return Some(vec![std::mem::take(&mut self.backbuffer)]);
        }
        if self
            .bound
            .iter()
            .any(|handle| self.targets.get(handle.cast()).is_none())
        {
            return None;
        }
        let mut outputs = Vec::with_capacity(self.bound.len());
        for handle in &self.bound {
            if let Some(surface) = self.targets.get_mut(handle.cast()) {
                outputs.push(std::mem::take(surface));
            }
        }
        Some(outputs)
    }

    fn restore_outputs(&mut self, outputs: Vec<Surface>) {
        if self.bound.is_empty() {
            if let Some(surface) = outputs.into_iter().next() {
                self.backbuffer = surface;
            }
            return;
        }
        for (handle, surface) in self.bound.iter().zip(outputs) {
            if let Some(slot) = self.targets.get_mut(handle.cast()) {
                *slot = surface;
            }
        }
    }
}

impl GraphicsDevice for SoftDevice {
    fn backbuffer_size(&self) -> (u32, u32) {
        self.backbuffer.size()
    }

    fn create_render_target(&mut self, desc: &TargetDesc) -> TargetHandle {
        log::trace!("Creating render target '{}' {}x{}", desc.label, desc.width, desc.height);
        self.targets
            .insert(Surface::new(desc.width, desc.height, desc.format, desc.depth))
            .cast()
    }

    fn release_render_target(&mut self, target: TargetHandle) {
        self.targets.remove(target.cast());
    }

    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)> {
        self.targets.get(target.cast()).map(Surface::size)
    }

    fn live_render_targets(&self) -> usize {
        self.targets.len()
    }

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle {
        self.textures
            .insert(Surface::from_rgba8(width, height, rgba))
            .cast()
    }

    fn release_texture(&mut self, texture: TextureHandle) {
        self.textures.remove(texture.cast());
    }

    fn create_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> GeometryHandle {
        self.geometry
            .insert(SoftGeometry {
                vertices: vertices.to_vec(),
                indices: indices.to_vec(),
            })
            .cast()
    }

    fn release_geometry(&mut self, geometry: GeometryHandle) {
        self.geometry.remove(geometry.cast());
    }

    fn set_render_targets(&mut self, targets: &[TargetHandle]) {
        self.bound.clear();
        self.bound.extend_from_slice(targets);
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(mut outputs) = self.take_outputs() else {
            log::trace!("Skipping {:?}: bound target is gone", call.program.kind());
            self.record(call, false);
            return;
        };

        let executed = match Bindings::resolve(&call.program, &self.targets, &self.textures) {
            Some(bindings) => execute(call, &bindings, &self.geometry, &mut outputs),
            None => false,
        };
        if !executed {
            log::trace!("Skipping {:?}: input is gone", call.program.kind());
        }

        self.restore_outputs(outputs);
        self.record(call, executed);
    }
}

fn execute(
    call: &DrawCall,
    bindings: &Bindings,
    geometry: &ResourcePool<SoftGeometry>,
    outputs: &mut [Surface],
) -> bool {
    let (width, height) = outputs[0].size();
    let viewport = clip_viewport(call.viewport, width, height);
    if viewport.width == 0 || viewport.height == 0 {
        return true;
    }

    match call.geometry {
        GeometrySource::FullScreen => {
            let shaded: Vec<(Fragment, Option<Outputs>)> = (0..viewport.height)
                .into_par_iter()
                .flat_map_iter(|row| {
                    let y = viewport.y + row;
                    (viewport.x..viewport.x + viewport.width).map(move |x| {
                        let fragment = raster::full_screen_fragment(x, y, viewport);
                        let result = shading::shade(&call.program, bindings, &fragment);
                        (fragment, result)
                    })
                })
                .collect();

            for (fragment, result) in shaded {
                if let Some(values) = result {
                    write_fragment(outputs, call, &fragment, &values);
                }
            }
            true
        }
        GeometrySource::Indexed {
            geometry: handle,
            start_index,
            primitive_count,
        } => {
            let Some(mesh) = geometry.get(handle.cast()) else {
                return false;
            };
            let stage = VertexStage::new(&call.program);
            let start = start_index as usize;
            let end = (start + primitive_count as usize * 3).min(mesh.indices.len());

            for triangle in mesh.indices[start.min(end)..end].chunks_exact(3) {
                let Some(corners) = fetch_triangle(&mesh.vertices, triangle) else {
                    continue;
                };
                let clip = corners.map(|vertex| stage.run(vertex));
                raster::rasterize_triangle(clip, viewport, call.raster.cull, |fragment| {
                    if !depth_passes(&outputs[0], call.raster.depth, &fragment) {
                        return;
                    }
                    if let Some(values) = shading::shade(&call.program, bindings, &fragment) {
                        write_fragment(outputs, call, &fragment, &values);
                    }
                });
            }
            true
        }
    }
}

fn fetch_triangle<'a>(vertices: &'a [Vertex], triangle: &[u32]) -> Option<[&'a Vertex; 3]> {
    Some([
        vertices.get(triangle[0] as usize)?,
        vertices.get(triangle[1] as usize)?,
        vertices.get(triangle[2] as usize)?,
    ])
}

fn clip_viewport(viewport: Option<Rect>, width: u32, height: u32) -> Rect {
    let rect = viewport.unwrap_or(Rect {
        x: 0,
        y: 0,
        width,
        height,
    });
    let x = rect.x.min(width);
    let y = rect.y.min(height);
    Rect {
        x,
        y,
        width: rect.width.min(width - x),
        height: rect.height.min(height - y),
    }
}

fn depth_passes(target: &Surface, mode: DepthMode, fragment: &Fragment) -> bool {
    if mode != DepthMode::Test {
        return true;
    }
    let index = target.index(fragment.x, fragment.y);
    target
        .depth_at(index)
        .map_or(true, |stored| fragment.depth < stored)
}

fn write_fragment(outputs: &mut [Surface], call: &DrawCall, fragment: &Fragment, values: &Outputs) {
    for (surface, value) in outputs.iter_mut().zip(values) {
        if fragment.x >= surface.width || fragment.y >= surface.height {
            continue;
        }
        let index = surface.index(fragment.x, fragment.y);
        let blended = blend(call.raster.blend, *value, surface.texel_at(index));
        surface.store(index, blended);
    }

    if call.raster.depth != DepthMode::Disabled {
        if let Some(surface) = outputs.first_mut() {
            let index = surface.index(fragment.x, fragment.y);
            surface.store_depth(index, fragment.depth);
        }
    }
}

fn blend(mode: BlendMode, src: Vec4, dst: Vec4) -> Vec4 {
    match mode {
        BlendMode::Opaque => src,
        BlendMode::Additive => src + dst,
        BlendMode::AlphaBlend => {
            let a = src.w.clamp(0.0, 1.0);
            let rgb = src.truncate() * a + dst.truncate() * (1.0 - a);
            rgb.extend(a + dst.w * (1.0 - a))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{Program, RasterState};

    fn clear(colour: Vec4) -> DrawCall {
        DrawCall {
            program: Program::Clear { colour },
            geometry: GeometrySource::FullScreen,
            raster: RasterState::FULLSCREEN,
            viewport: None,
        }
    }

    fn target(device: &mut SoftDevice, width: u32, height: u32) -> TargetHandle {
        device.create_render_target(&TargetDesc {
            label: "test",
            width,
            height,
            format: TargetFormat::Rgba8,
            depth: false,
        })
    }

    #[test]
    fn clear_fills_back_buffer() {
        let mut device = SoftDevice::new(4, 4);
        device.set_render_targets(&[]);
        device.draw(&clear(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        assert_eq!(device.pixel(3, 3), [255, 0, 0, 255]);
    }

    #[test]
    fn additive_blend_accumulates() {
        let mut device = SoftDevice::new(2, 2);
        let light = target(&mut device, 2, 2);
        device.set_render_targets(&[light]);

        let mut call = clear(Vec4::splat(0.25));
        call.raster = RasterState::ADDITIVE;
        device.draw(&call);
        device.draw(&call);

        let surface = device.read_target(light).expect("target exists");
        assert!((surface.texel(0, 0).x - 0.5).abs() < 1.0 / 255.0);
    }

    #[test]
    fn viewport_limits_writes() {
        let mut device = SoftDevice::new(4, 4);
        let mut call = clear(Vec4::ONE);
        call.viewport = Some(Rect {
            x: 0,
            y: 0,
            width: 2,
            height: 2,
        });
        device.draw(&call);

        assert_eq!(device.pixel(1, 1), [255, 255, 255, 255]);
        assert_eq!(device.pixel(2, 2), [0, 0, 0, 0]);
    }

    #[test]
    fn reset_invalidates_targets_but_keeps_geometry() {
        let mut device = SoftDevice::new(2, 2).with_draw_log();
        let stale = target(&mut device, 2, 2);
        let quad = device.create_geometry(&crate::renderer::primitives::quad_template().0, &[0, 1, 2]);

        device.reset();
        assert_eq!(device.live_render_targets(), 0);
        assert_eq!(device.live_geometry(), 1);
        assert!(device.target_size(stale).is_none());

        device.set_render_targets(&[stale]);
        device.draw(&clear(Vec4::ONE));
        assert!(!device.draw_log()[0].executed);
        device.release_geometry(quad);
        assert_eq!(device.live_geometry(), 0);
    }

    #[test]
    fn missing_input_skips_the_draw() {
        let mut device = SoftDevice::new(2, 2).with_draw_log();
        let source = target(&mut device, 2, 2);
        device.release_render_target(source);

        device.set_render_targets(&[]);
        device.draw(&DrawCall {
            program: Program::Copy { source },
            geometry: GeometrySource::FullScreen,
            raster: RasterState::FULLSCREEN,
            viewport: None,
        });

        assert!(!device.draw_log()[0].executed);
        assert_eq!(device.pixel(0, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn alpha_blend_mixes_towards_source() {
        let mixed = blend(
            BlendMode::AlphaBlend,
            Vec4::new(1.0, 0.0, 0.0, 0.5),
            Vec4::new(0.0, 0.0, 1.0, 1.0),
        );
        assert_eq!(mixed, Vec4::new(0.5, 0.0, 0.5, 1.0));
    }
}
