pub mod handle;
pub mod mesh;
pub mod model;
pub mod pool;
pub mod texture;

pub use handle::Handle;
pub use mesh::MeshData;
pub use model::{load_gltf, load_gltf_slice};
pub use pool::ResourcePool;
pub use texture::{TextureManager, NULL_TEXTURE_KEY};
