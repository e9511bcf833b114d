// scene/entity.rs

use std::fmt;

use glam::Mat4;

use crate::error::{EngineError, Result};
use crate::math::BoundingSphere;
use crate::renderer::{DrawContext, GraphicsDevice};
use crate::scene::component::{Component, ComponentAdded, ComponentCollection, ComponentId};
use crate::scene::physics::{PhysicsSpace, RigidBody};
use crate::scene::static_geometry::StaticGeometryBuilder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u64);

impl EntityId {
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Hands out entity and component ids for one scene. Ids start at 1 and only
/// ever increase.
#[derive(Debug, Default)]
pub struct IdAllocator {
    entities: u64,
    components: u64,
}

impl IdAllocator {
    pub fn next_entity(&mut self) -> EntityId {
        self.entities += 1;
        EntityId(self.entities)
    }

    pub fn next_component(&mut self) -> ComponentId {
        self.components += 1;
        ComponentId(self.components)
    }
}

/// World entities ignore their physics bodies; dynamic entities take their
/// translation from them after every physics step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityKind {
    World,
    Dynamic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntityState {
    Active,
    Disabled,
    PendingDispose,
    Disposed,
}

#[derive(Debug)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    matrix: Mat4,
    enabled: bool,
    dispose_on_update: bool,
    disposed: bool,
    tag: Option<String>,
    bounds: Option<BoundingSphere>,
    components: ComponentCollection,
    static_geometry: StaticGeometryBuilder,
}

impl Entity {
    pub(crate) fn new(id: EntityId, kind: EntityKind, matrix: Mat4) -> Self {
        Self {
            id,
            kind,
            matrix,
            enabled: true,
            dispose_on_update: false,
            disposed: false,
            tag: None,
            bounds: None,
            components: ComponentCollection::new(),
            static_geometry: StaticGeometryBuilder::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn matrix(&self) -> Mat4 {
        self.matrix
    }

    pub(crate) fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Disabled entities also put their bodies to sleep, so re-enabling
    /// resumes the simulation where it stopped.
    pub(crate) fn set_enabled(&mut self, physics: &mut PhysicsSpace, enabled: bool) {
        self.enabled = enabled;
        for (_, component) in self.components.iter() {
            let Some(handle) = component.as_physics().and_then(|p| p.body()) else {
                continue;
            };
            if let Some(body) = physics.body_mut(handle) {
                body.asleep = !enabled;
            }
        }
    }

    pub fn dispose_on_update(&self) -> bool {
        self.dispose_on_update
    }

    pub(crate) fn mark_for_dispose(&mut self) {
        self.dispose_on_update = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn set_tag(&mut self, tag: impl Into<String>) {
        self.tag = Some(tag.into());
    }

    pub fn state(&self) -> EntityState {
        if self.disposed {
            EntityState::Disposed
        } else if self.dispose_on_update {
            EntityState::PendingDispose
        } else if !self.enabled {
            EntityState::Disabled
        } else {
            EntityState::Active
        }
    }

    pub fn components(&self) -> &ComponentCollection {
        &self.components
    }

    pub fn static_geometry(&self) -> &StaticGeometryBuilder {
        &self.static_geometry
    }

    /// Entity-space bounds of every drawable added so far. Removing a
    /// drawable does not shrink them; call `recompute_bounds` for that.
    pub fn bounds(&self) -> Option<BoundingSphere> {
        self.bounds
    }

    pub fn world_bounds(&self) -> Option<BoundingSphere> {
        self.bounds.map(|bounds| bounds.transform(&self.matrix))
    }

    /// Rebuilds the bounds from the drawables currently attached.
    pub fn recompute_bounds(&mut self) {
        self.bounds = self
            .components
            .drawables()
            .map(|(_, drawable)| drawable.bounds())
            .reduce(|merged, next| BoundingSphere::merged(&merged, &next));
    }

    fn grow_bounds(&mut self, sphere: BoundingSphere) {
        self.bounds = Some(match self.bounds {
            Some(current) => BoundingSphere::merged(&current, &sphere),
            None => sphere,
        });
    }

    pub(crate) fn attach(
        &mut self,
        device: &mut dyn GraphicsDevice,
        physics: &mut PhysicsSpace,
        id: ComponentId,
        mut component: Component,
    ) -> Result<ComponentAdded> {
        if self.disposed || self.dispose_on_update {
            return Err(EngineError::EntityDisposed(self.id));
        }

        let mut static_rebuild = false;
        match &mut component {
            Component::Drawable(drawable) => {
                self.grow_bounds(drawable.bounds());
                if drawable.is_static() {
                    self.static_geometry.add_to_builder(
                        id,
                        drawable.mesh(),
                        &drawable.matrix(),
                        *drawable.material(),
                    );
                    self.static_geometry.apply_builder(device);
                    static_rebuild = true;
                } else {
                    let mesh = drawable.mesh();
                    drawable.geometry =
                        Some(device.create_geometry(mesh.vertices(), mesh.indices()));
                }
            }
            Component::Physics(body) => {
                body.body = Some(physics.add_body(RigidBody {
                    position: self.matrix.w_axis.truncate(),
                    velocity: body.velocity,
                    radius: body.radius,
                    immovable: body.immovable,
                    asleep: !self.enabled,
                }));
            }
            Component::Light(_) | Component::Billboard(_) => {}
        }

        log::debug!(
            "Entity {} gained component {} (static rebuild: {})",
            self.id,
            id,
            static_rebuild
        );
        self.components.push(id, component);
        Ok(ComponentAdded { id, static_rebuild })
    }

    pub(crate) fn detach(
        &mut self,
        device: &mut dyn GraphicsDevice,
        physics: &mut PhysicsSpace,
        id: ComponentId,
    ) -> Result<Component> {
        let mut component = self
            .components
            .remove(id)
            .ok_or(EngineError::ComponentNotFound(id))?;
        self.release(device, physics, id, &mut component);
        Ok(component)
    }

    fn release(
        &mut self,
        device: &mut dyn GraphicsDevice,
        physics: &mut PhysicsSpace,
        id: ComponentId,
        component: &mut Component,
    ) {
        match component {
            Component::Drawable(drawable) => {
                if drawable.is_static() {
                    if self.static_geometry.remove(id) && !self.disposed {
                        self.static_geometry.apply_builder(device);
                    }
                } else if let Some(geometry) = drawable.geometry.take() {
                    device.release_geometry(geometry);
                }
            }
            Component::Physics(body) => {
                if let Some(handle) = body.body.take() {
                    physics.remove_body(handle);
                }
            }
            Component::Light(_) | Component::Billboard(_) => {}
        }
    }

    /// Dynamic entities follow the first physics body they own.
    pub(crate) fn update(&mut self, physics: &PhysicsSpace) {
        if !self.enabled || self.disposed || self.kind != EntityKind::Dynamic {
            return;
        }
        let position = self
            .components
            .iter()
            .filter_map(|(_, component)| component.as_physics())
            .filter_map(|physics_component| physics_component.body())
            .find_map(|handle| physics.body(handle))
            .map(|body| body.position);

        if let Some(position) = position {
            self.matrix.w_axis = position.extend(1.0);
        }
    }

    /// Moves every body this entity owns to its current translation.
    pub(crate) fn sync_bodies(&self, physics: &mut PhysicsSpace) {
        let position = self.matrix.w_axis.truncate();
        for (_, component) in self.components.iter() {
            let Some(handle) = component.as_physics().and_then(|p| p.body()) else {
                continue;
            };
            if let Some(body) = physics.body_mut(handle) {
                body.position = position;
            }
        }
    }

    /// Static batches first, then each dynamic drawable that survives the
    /// frustum test, then light and billboard submissions.
    pub(crate) fn draw(&self, context: &mut DrawContext) {
        if !self.enabled || self.disposed {
            return;
        }

        if self.static_geometry.has_buffers() {
            let visible = self
                .world_bounds()
                .map_or(true, |bounds| context.is_visible(&bounds));
            if visible {
                self.static_geometry.draw(context, self.matrix);
            }
        }

        for (_, component) in self.components.iter() {
            match component {
                Component::Drawable(drawable) => {
                    let Some(geometry) = drawable.geometry() else {
                        continue;
                    };
                    let world = self.matrix * drawable.matrix();
                    let bounds = drawable.mesh().bounds().transform(&world);
                    if context.is_visible(&bounds) {
                        context.draw_dynamic(
                            geometry,
                            drawable.mesh().primitive_count(),
                            world,
                            drawable.material(),
                        );
                    } else {
                        context.record_culled();
                    }
                }
                Component::Light(light) => {
                    context.submit_light(light, self.matrix, self.id);
                }
                Component::Billboard(billboard) => {
                    context.submit_billboard(
                        billboard.texture_key,
                        self.matrix.transform_point3(billboard.offset),
                        billboard.size,
                    );
                }
                Component::Physics(_) => {}
            }
        }
    }

    /// Releases every component and the static buffers, then empties the
    /// collection.
    pub(crate) fn dispose(&mut self, device: &mut dyn GraphicsDevice, physics: &mut PhysicsSpace) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let drained: Vec<(ComponentId, Component)> = self.components.drain().collect();
        for (id, mut component) in drained {
            self.release(device, physics, id, &mut component);
        }
        self.static_geometry.dispose(device);
        log::debug!("Entity {} disposed", self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::MeshData;
    use crate::renderer::primitives::cube_mesh;
    use crate::renderer::soft::SoftDevice;
    use crate::renderer::Material;
    use crate::scene::{DrawableComponent, Light, PhysicsComponent};
    use glam::Vec3;

    fn cube_at(x: f32) -> Component {
        DrawableComponent::new(MeshData::from_primitive(cube_mesh()), Material::white())
            .with_matrix(Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
            .into()
    }

    #[test]
    fn ids_are_per_allocator() {
        let mut first = IdAllocator::default();
        let mut second = IdAllocator::default();
        assert_eq!(first.next_entity().raw(), 1);
        assert_eq!(first.next_entity().raw(), 2);
        assert_eq!(second.next_entity().raw(), 1);
        assert_eq!(first.next_component().raw(), 1);
    }

    #[test]
    fn state_follows_flags() {
        let mut entity = Entity::new(EntityId(1), EntityKind::World, Mat4::IDENTITY);
        assert_eq!(entity.state(), EntityState::Active);
        entity.set_enabled(&mut PhysicsSpace::default(), false);
        assert_eq!(entity.state(), EntityState::Disabled);
        entity.mark_for_dispose();
        assert_eq!(entity.state(), EntityState::PendingDispose);
    }

    #[test]
    fn recompute_bounds_shrinks_after_removal() {
        let mut device = SoftDevice::new(1, 1);
        let mut physics = PhysicsSpace::default();
        let mut ids = IdAllocator::default();
        let mut entity = Entity::new(ids.next_entity(), EntityKind::World, Mat4::IDENTITY);

        let near = ids.next_component();
        let far = ids.next_component();
        entity.attach(&mut device, &mut physics, near, cube_at(0.0)).unwrap();
        entity.attach(&mut device, &mut physics, far, cube_at(10.0)).unwrap();
        let grown = entity.bounds().unwrap();

        entity.detach(&mut device, &mut physics, far).unwrap();
        assert_eq!(entity.bounds(), Some(grown));

        entity.recompute_bounds();
        let shrunk = entity.bounds().unwrap();
        assert!(shrunk.radius < grown.radius);
        assert!(shrunk.center.abs_diff_eq(Vec3::ZERO, 1e-5));
    }

    #[test]
    fn dispose_releases_everything() {
        let mut device = SoftDevice::new(1, 1);
        let mut physics = PhysicsSpace::default();
        let mut ids = IdAllocator::default();
        let mut entity = Entity::new(ids.next_entity(), EntityKind::Dynamic, Mat4::IDENTITY);

        entity
            .attach(&mut device, &mut physics, ids.next_component(), cube_at(0.0))
            .unwrap();
        entity
            .attach(
                &mut device,
                &mut physics,
                ids.next_component(),
                PhysicsComponent::sphere(1.0).into(),
            )
            .unwrap();
        entity
            .attach(
                &mut device,
                &mut physics,
                ids.next_component(),
                Light::point(Vec3::ZERO, Vec3::ONE, 4.0, 1.0).into(),
            )
            .unwrap();
        assert_eq!(device.live_geometry(), 1);
        assert_eq!(physics.len(), 1);

        entity.dispose(&mut device, &mut physics);

        assert_eq!(entity.state(), EntityState::Disposed);
        assert!(entity.components().is_empty());
        assert_eq!(device.live_geometry(), 0);
        assert!(physics.is_empty());
    }

    #[test]
    fn disposed_entity_rejects_components() {
        let mut device = SoftDevice::new(1, 1);
        let mut physics = PhysicsSpace::default();
        let mut entity = Entity::new(EntityId(3), EntityKind::World, Mat4::IDENTITY);
        entity.mark_for_dispose();

        let result = entity.attach(&mut device, &mut physics, ComponentId(1), cube_at(0.0));
        assert!(matches!(result, Err(EngineError::EntityDisposed(id)) if id == EntityId(3)));
    }
}
