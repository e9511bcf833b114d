// renderer/device.rs
//
// Everything the renderer asks of a graphics backend goes through this seam.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::asset::Handle;
use crate::renderer::Vertex;

pub enum TargetTag {}
pub enum TextureTag {}
pub enum GeometryTag {}

pub type TargetHandle = Handle<TargetTag>;
pub type TextureHandle = Handle<TextureTag>;
pub type GeometryHandle = Handle<GeometryTag>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// 8 bits per channel, values clamp to 0..=1 on write.
    Rgba8,
    /// One 32-bit float channel.
    R32Float,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
    /// Attach a depth buffer used when this target is bound first.
    pub depth: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Opaque,
    /// `src + dst`, used for light accumulation.
    Additive,
    /// `src * src.a + dst * (1 - src.a)`.
    AlphaBlend,
}

/// Which winding gets discarded, judged on screen like the fixed-function
/// pipeline does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CullMode {
    None,
    CullClockwiseFace,
    CullCounterClockwiseFace,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthMode {
    Disabled,
    /// Less-than test with depth writes.
    Test,
    /// Always passes and writes, used to reset depth from a full-screen pass.
    Overwrite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterState {
    pub blend: BlendMode,
    pub cull: CullMode,
    pub depth: DepthMode,
}

impl RasterState {
    /// Back faces culled (front faces wind clockwise), depth tested.
    pub const GEOMETRY: Self = Self {
        blend: BlendMode::Opaque,
        cull: CullMode::CullCounterClockwiseFace,
        depth: DepthMode::Test,
    };

    pub const FULLSCREEN: Self = Self {
        blend: BlendMode::Opaque,
        cull: CullMode::None,
        depth: DepthMode::Disabled,
    };

    pub const ADDITIVE: Self = Self {
        blend: BlendMode::Additive,
        cull: CullMode::None,
        depth: DepthMode::Disabled,
    };
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GeometrySource {
    /// A screen covering triangle generated by the backend.
    FullScreen,
    Indexed {
        geometry: GeometryHandle,
        start_index: u32,
        primitive_count: u32,
    },
}

/// The three G-buffer targets lighting passes read from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GBufferInputs {
    pub colour: TargetHandle,
    pub normal: TargetHandle,
    pub depth: TargetHandle,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Program {
    /// Opaque geometry into colour, normal and depth at once.
    Geometry {
        world: Mat4,
        view_projection: Mat4,
        texture: Option<TextureHandle>,
        colour: Vec4,
        specular_power: f32,
    },
    /// Resets colour to `colour`, normals to zero, depth to the far plane.
    ClearGBuffer { colour: Vec4 },
    /// Fills every bound target with `colour`.
    Clear { colour: Vec4 },
    DirectionalLight {
        direction: Vec3,
        colour: Vec3,
        intensity: f32,
        camera_position: Vec3,
        inverse_view_projection: Mat4,
        gbuffer: GBufferInputs,
    },
    PointLight {
        world: Mat4,
        view_projection: Mat4,
        position: Vec3,
        colour: Vec3,
        radius: f32,
        intensity: f32,
        camera_position: Vec3,
        inverse_view_projection: Mat4,
        gbuffer: GBufferInputs,
    },
    /// Self-illumination from the emissive band of the colour alpha.
    Emissive { colour_map: TargetHandle },
    Compose {
        colour_map: TargetHandle,
        light_map: TargetHandle,
        depth_map: TargetHandle,
        ambient_colour: Vec3,
        ambient_intensity: f32,
    },
    Fxaa { source: TargetHandle },
    BloomExtract { source: TargetHandle, threshold: f32 },
    GaussianBlur {
        source: TargetHandle,
        direction: Vec2,
        blur_amount: f32,
    },
    BloomCombine {
        base: TargetHandle,
        bloom: TargetHandle,
        bloom_intensity: f32,
        base_intensity: f32,
        bloom_saturation: f32,
        base_saturation: f32,
    },
    Copy { source: TargetHandle },
    /// Shows a single channel float target as grey.
    CopyDepth { source: TargetHandle },
    Billboard {
        texture: Option<TextureHandle>,
        position: Vec3,
        size: Vec2,
        view: Mat4,
        projection: Mat4,
        depth_map: TargetHandle,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    Geometry,
    ClearGBuffer,
    Clear,
    DirectionalLight,
    PointLight,
    Emissive,
    Compose,
    Fxaa,
    BloomExtract,
    GaussianBlur,
    BloomCombine,
    Copy,
    CopyDepth,
    Billboard,
}

impl Program {
    pub fn kind(&self) -> ProgramKind {
        match self {
            Program::Geometry { .. } => ProgramKind::Geometry,
            Program::ClearGBuffer { .. } => ProgramKind::ClearGBuffer,
            Program::Clear { .. } => ProgramKind::Clear,
            Program::DirectionalLight { .. } => ProgramKind::DirectionalLight,
            Program::PointLight { .. } => ProgramKind::PointLight,
            Program::Emissive { .. } => ProgramKind::Emissive,
            Program::Compose { .. } => ProgramKind::Compose,
            Program::Fxaa { .. } => ProgramKind::Fxaa,
            Program::BloomExtract { .. } => ProgramKind::BloomExtract,
            Program::GaussianBlur { .. } => ProgramKind::GaussianBlur,
            Program::BloomCombine { .. } => ProgramKind::BloomCombine,
            Program::Copy { .. } => ProgramKind::Copy,
            Program::CopyDepth { .. } => ProgramKind::CopyDepth,
            Program::Billboard { .. } => ProgramKind::Billboard,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: Program,
    pub geometry: GeometrySource,
    pub raster: RasterState,
    /// Restricts output to a sub-rectangle of the bound targets.
    pub viewport: Option<Rect>,
}

/// Graphics backend contract.
///
/// Resource creation never fails; handles that outlive their resource (for
/// example render targets dropped by a device reset) are ignored by `draw`.
pub trait GraphicsDevice {
    fn backbuffer_size(&self) -> (u32, u32);

    fn create_render_target(&mut self, desc: &TargetDesc) -> TargetHandle;
    fn release_render_target(&mut self, target: TargetHandle);
    fn target_size(&self, target: TargetHandle) -> Option<(u32, u32)>;
    fn live_render_targets(&self) -> usize;

    fn create_texture(&mut self, width: u32, height: u32, rgba: &[u8]) -> TextureHandle;
    fn release_texture(&mut self, texture: TextureHandle);

    fn create_geometry(&mut self, vertices: &[Vertex], indices: &[u32]) -> GeometryHandle;
    fn release_geometry(&mut self, geometry: GeometryHandle);

    /// Binds `targets` as simultaneous outputs; an empty slice binds the
    /// back buffer with the default viewport.
    fn set_render_targets(&mut self, targets: &[TargetHandle]);

    fn draw(&mut self, call: &DrawCall);
}
