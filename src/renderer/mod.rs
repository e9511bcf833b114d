pub mod billboard;
pub mod bounded;
pub mod device;
pub mod gbuffer;
pub mod lighting;
pub mod material;
pub mod postprocess;
pub mod primitives;
pub mod quad;
pub mod renderer;
pub mod soft;
pub mod vertex;
pub mod view;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use billboard::{BillboardBatcher, BillboardData, MAX_BILLBOARDS};
pub use bounded::BoundedQueue;
pub use device::{
    BlendMode, CullMode, DepthMode, DrawCall, GBufferInputs, GeometryHandle, GeometrySource,
    GraphicsDevice, Program, ProgramKind, RasterState, Rect, TargetDesc, TargetFormat,
    TargetHandle, TextureHandle,
};
pub use gbuffer::GBuffer;
pub use lighting::{point_light_cull, LightData, LightingPass, MAX_LIGHTS};
pub use material::{Material, MaterialKey};
pub use postprocess::{PostEffects, PostProcessChain, PostStage, StageRecord};
pub use quad::FullScreenQuad;
pub use renderer::{DrawContext, FrameStats, Renderer};
pub use soft::SoftDevice;
pub use vertex::Vertex;
pub use view::FrameView;
