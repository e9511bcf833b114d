// renderer/gbuffer.rs
//
// The four off-screen targets behind the deferred pipeline. They are created,
// released and recreated together; a GBuffer value always holds a full set.

use glam::{Vec3, Vec4};

use crate::renderer::{
    BlendMode, CullMode, DepthMode, FullScreenQuad, GBufferInputs, GraphicsDevice, Program,
    RasterState, TargetDesc, TargetFormat, TargetHandle,
};

#[derive(Debug)]
pub struct GBuffer {
    colour: TargetHandle,
    normal: TargetHandle,
    depth: TargetHandle,
    light: TargetHandle,
    width: u32,
    height: u32,
}

impl GBuffer {
    pub fn new(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> Self {
        let [colour, normal, depth, light] = Self::allocate(device, width, height);
        Self {
            colour,
            normal,
            depth,
            light,
            width,
            height,
        }
    }

    /// Releases the current set and allocates four new targets.
    ///
    /// Call after a device reset or viewport resize; the old handles are
    /// released even if the device already dropped them.
    pub fn create(&mut self, device: &mut dyn GraphicsDevice, width: u32, height: u32) {
        self.dispose(device);
        let [colour, normal, depth, light] = Self::allocate(device, width, height);
        self.colour = colour;
        self.normal = normal;
        self.depth = depth;
        self.light = light;
        self.width = width;
        self.height = height;
        log::info!("G-buffer created at {}x{}", width, height);
    }

    fn allocate(device: &mut dyn GraphicsDevice, width: u32, height: u32) -> [TargetHandle; 4] {
        let desc = |label, format, depth| TargetDesc {
            label,
            width,
            height,
            format,
            depth,
        };
        [
            device.create_render_target(&desc("gbuffer colour", TargetFormat::Rgba8, true)),
            device.create_render_target(&desc("gbuffer normal", TargetFormat::Rgba8, false)),
            device.create_render_target(&desc("gbuffer depth", TargetFormat::R32Float, false)),
            device.create_render_target(&desc("gbuffer light", TargetFormat::Rgba8, false)),
        ]
    }

    pub fn dispose(&self, device: &mut dyn GraphicsDevice) {
        for target in self.targets() {
            device.release_render_target(target);
        }
    }

    pub fn targets(&self) -> [TargetHandle; 4] {
        [self.colour, self.normal, self.depth, self.light]
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn colour(&self) -> TargetHandle {
        self.colour
    }

    pub fn normal(&self) -> TargetHandle {
        self.normal
    }

    pub fn depth(&self) -> TargetHandle {
        self.depth
    }

    pub fn light(&self) -> TargetHandle {
        self.light
    }

    pub fn inputs(&self) -> GBufferInputs {
        GBufferInputs {
            colour: self.colour,
            normal: self.normal,
            depth: self.depth,
        }
    }

    /// Binds colour, normal and depth as simultaneous outputs.
    pub fn begin_geometry_pass(&self, device: &mut dyn GraphicsDevice) {
        device.set_render_targets(&[self.colour, self.normal, self.depth]);
    }

    /// Shader clear of the bound G-buffer: the targets differ in format, so a
    /// single hardware clear colour cannot serve all three.
    pub fn clear(&self, device: &mut dyn GraphicsDevice, colour: Vec4) {
        FullScreenQuad::draw(
            device,
            Program::ClearGBuffer { colour },
            RasterState {
                blend: BlendMode::Opaque,
                cull: CullMode::None,
                depth: DepthMode::Overwrite,
            },
        );
    }

    /// Binds the light accumulation target and zeroes it.
    pub fn begin_light_pass(&self, device: &mut dyn GraphicsDevice) {
        device.set_render_targets(&[self.light]);
        FullScreenQuad::draw(
            device,
            Program::Clear {
                colour: Vec4::ZERO,
            },
            RasterState::FULLSCREEN,
        );
    }

    /// Unbinds everything and restores the back buffer with its viewport.
    pub fn resolve(&self, device: &mut dyn GraphicsDevice) {
        device.set_render_targets(&[]);
    }

    /// Writes the lit image into `output`, or the back buffer when `None`.
    pub fn compose_final(
        &self,
        device: &mut dyn GraphicsDevice,
        output: Option<TargetHandle>,
        ambient_colour: Vec3,
        ambient_intensity: f32,
    ) {
        match output {
            Some(target) => device.set_render_targets(&[target]),
            None => device.set_render_targets(&[]),
        }
        FullScreenQuad::draw(
            device,
            Program::Compose {
                colour_map: self.colour,
                light_map: self.light,
                depth_map: self.depth,
                ambient_colour,
                ambient_intensity,
            },
            RasterState::FULLSCREEN,
        );
    }
}
