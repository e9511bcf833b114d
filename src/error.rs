use std::path::PathBuf;

use thiserror::Error;

use crate::scene::{ComponentId, EntityId};

/// Errors raised by the fallible setup paths of the engine.
///
/// Per-frame update and draw never fail; see the renderer module for how
/// dropped submissions and stale targets are handled instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("entity {0} does not exist in this scene")]
    EntityNotFound(EntityId),

    #[error("entity {0} has been disposed")]
    EntityDisposed(EntityId),

    #[error("component {0:?} not found")]
    ComponentNotFound(ComponentId),

    #[error("geometry index {index} out of range for {vertex_count} vertices")]
    InvalidGeometry { index: u32, vertex_count: usize },

    #[error("failed to load texture {path:?}: {source}")]
    Texture {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("texture data is {actual} bytes, expected {expected}")]
    TextureSize { expected: usize, actual: usize },

    #[error("failed to import model: {0}")]
    Model(#[from] gltf::Error),

    #[error("model primitive has no {0} attribute")]
    MissingAttribute(&'static str),

    #[error("graphics device error: {0}")]
    Gpu(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
