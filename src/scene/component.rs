// scene/component.rs

use std::fmt;

use glam::{Mat4, Vec2, Vec3};

use crate::asset::MeshData;
use crate::math::BoundingSphere;
use crate::renderer::{GeometryHandle, Material};
use crate::scene::physics::BodyHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) u64);

impl ComponentId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Result of attaching a component to an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComponentAdded {
    pub id: ComponentId,
    /// The entity's static batches were rebuilt and re-uploaded.
    pub static_rebuild: bool,
}

#[derive(Debug)]
pub enum Component {
    Drawable(DrawableComponent),
    Light(Light),
    Physics(PhysicsComponent),
    Billboard(BillboardComponent),
}

impl Component {
    /// Fixed when the component is added.
    pub fn is_static(&self) -> bool {
        matches!(self, Component::Drawable(drawable) if drawable.is_static)
    }

    pub fn as_drawable(&self) -> Option<&DrawableComponent> {
        match self {
            Component::Drawable(drawable) => Some(drawable),
            _ => None,
        }
    }

    pub fn as_light(&self) -> Option<&Light> {
        match self {
            Component::Light(light) => Some(light),
            _ => None,
        }
    }

    pub fn as_physics(&self) -> Option<&PhysicsComponent> {
        match self {
            Component::Physics(physics) => Some(physics),
            _ => None,
        }
    }
}

impl From<DrawableComponent> for Component {
    fn from(drawable: DrawableComponent) -> Self {
        Component::Drawable(drawable)
    }
}

impl From<Light> for Component {
    fn from(light: Light) -> Self {
        Component::Light(light)
    }
}

impl From<PhysicsComponent> for Component {
    fn from(physics: PhysicsComponent) -> Self {
        Component::Physics(physics)
    }
}

impl From<BillboardComponent> for Component {
    fn from(billboard: BillboardComponent) -> Self {
        Component::Billboard(billboard)
    }
}

/// Mesh plus material placed in entity space.
///
/// A static drawable hands its geometry to the entity's static batches and is
/// never drawn on its own; a dynamic one uploads its own buffers and is
/// frustum tested every frame.
#[derive(Debug)]
pub struct DrawableComponent {
    mesh: MeshData,
    material: Material,
    matrix: Mat4,
    is_static: bool,
    pub(crate) geometry: Option<GeometryHandle>,
}

impl DrawableComponent {
    pub fn new(mesh: MeshData, material: Material) -> Self {
        Self {
            mesh,
            material,
            matrix: Mat4::IDENTITY,
            is_static: false,
            geometry: None,
        }
    }

    pub fn with_matrix(mut self, matrix: Mat4) -> Self {
        self.matrix = matrix;
        self
    }

    pub fn with_static(mut self, is_static: bool) -> Self {
        self.is_static = is_static;
        self
    }

    pub fn mesh(&self) -> &MeshData {
        &self.mesh
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Placement relative to the owning entity.
    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Own device buffers; always `None` for static drawables.
    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    /// Bounds in entity space.
    pub fn bounds(&self) -> BoundingSphere {
        self.mesh.bounds().transform(&self.matrix)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Directional { direction: Vec3 },
    Point { radius: f32 },
}

/// Light source drawn by the lighting pass once the entity submits it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub colour: Vec3,
    pub intensity: f32,
    /// Entity-space position; point lights only.
    pub position: Vec3,
}

impl Light {
    pub fn directional(direction: Vec3, colour: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional { direction },
            colour,
            intensity,
            position: Vec3::ZERO,
        }
    }

    pub fn point(position: Vec3, colour: Vec3, radius: f32, intensity: f32) -> Self {
        Self {
            kind: LightKind::Point { radius },
            colour,
            intensity,
            position,
        }
    }

    pub fn radius(&self) -> Option<f32> {
        match self.kind {
            LightKind::Point { radius } => Some(radius),
            LightKind::Directional { .. } => None,
        }
    }
}

/// Binds the entity to a body in the scene's physics space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PhysicsComponent {
    pub radius: f32,
    pub immovable: bool,
    pub velocity: Vec3,
    pub(crate) body: Option<BodyHandle>,
}

impl PhysicsComponent {
    pub fn sphere(radius: f32) -> Self {
        Self {
            radius,
            immovable: false,
            velocity: Vec3::ZERO,
            body: None,
        }
    }

    pub fn immovable(mut self) -> Self {
        self.immovable = true;
        self
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }
}

/// Camera-facing sprite anchored to the entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BillboardComponent {
    pub texture_key: u32,
    pub offset: Vec3,
    pub size: Vec2,
}

impl BillboardComponent {
    pub fn new(texture_key: u32, size: Vec2) -> Self {
        Self {
            texture_key,
            offset: Vec3::ZERO,
            size,
        }
    }

    pub fn with_offset(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }
}

/// Components of one entity in insertion order.
#[derive(Debug, Default)]
pub struct ComponentCollection {
    items: Vec<(ComponentId, Component)>,
}

impl ComponentCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, id: ComponentId, component: Component) {
        self.items.push((id, component));
    }

    pub(crate) fn remove(&mut self, id: ComponentId) -> Option<Component> {
        let index = self.items.iter().position(|(item, _)| *item == id)?;
        Some(self.items.remove(index).1)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = (ComponentId, Component)> + '_ {
        self.items.drain(..)
    }

    pub fn get(&self, id: ComponentId) -> Option<&Component> {
        self.items
            .iter()
            .find(|(item, _)| *item == id)
            .map(|(_, component)| component)
    }

    pub fn contains(&self, id: ComponentId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.items.iter().map(|(id, component)| (*id, component))
    }

    pub fn drawables(&self) -> impl Iterator<Item = (ComponentId, &DrawableComponent)> {
        self.iter()
            .filter_map(|(id, component)| component.as_drawable().map(|d| (id, d)))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
