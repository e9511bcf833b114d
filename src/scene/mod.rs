// scene/mod.rs

pub mod camera;
pub mod component;
pub mod entity;
pub mod physics;
pub mod scene;
pub mod static_geometry;

pub use camera::Camera;
pub use component::{
    BillboardComponent, Component, ComponentAdded, ComponentCollection, ComponentId,
    DrawableComponent, Light, LightKind, PhysicsComponent,
};
pub use entity::{Entity, EntityId, EntityKind, EntityState, IdAllocator};
pub use physics::{BodyHandle, PhysicsSpace, RigidBody, DEFAULT_GRAVITY};
pub use scene::Scene;
pub use static_geometry::{StaticBatch, StaticGeometryBuilder};
