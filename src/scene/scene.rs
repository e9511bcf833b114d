// scene/scene.rs
use glam::Mat4;

use crate::error::{EngineError, Result};
use crate::renderer::{DrawContext, GraphicsDevice};
use crate::scene::{
    Camera, Component, ComponentAdded, ComponentId, Entity, EntityId, EntityKind, IdAllocator,
    PhysicsSpace,
};

/// Entities in creation order plus the physics space they share.
///
/// Ids come from the scene's own allocator, so two scenes built the same way
/// hand out the same ids.
pub struct Scene {
    entities: Vec<Entity>,
    ids: IdAllocator,
    physics: PhysicsSpace,
    camera: Camera,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self::with_physics(PhysicsSpace::default())
    }

    pub fn with_physics(physics: PhysicsSpace) -> Self {
        Self {
            entities: Vec::new(),
            ids: IdAllocator::default(),
            physics,
            camera: Camera::default(),
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_camera(&mut self, camera: Camera) {
        self.camera = camera;
    }

    pub fn physics(&self) -> &PhysicsSpace {
        &self.physics
    }

    pub fn physics_mut(&mut self) -> &mut PhysicsSpace {
        &mut self.physics
    }

    /// Registers a new, enabled entity at the end of the list.
    pub fn create_entity(&mut self, kind: EntityKind, matrix: Mat4) -> EntityId {
        let id = self.ids.next_entity();
        self.entities.push(Entity::new(id, kind, matrix));
        id
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    // Ids are allocated in increasing order and removal keeps order, so the
    // list stays sorted.
    fn index_of(&self, id: EntityId) -> Result<usize> {
        self.entities
            .binary_search_by_key(&id, Entity::id)
            .map_err(|_| EngineError::EntityNotFound(id))
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        let index = self.index_of(id).ok()?;
        self.entities.get(index)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let index = self.index_of(id).ok()?;
        self.entities.get_mut(index)
    }

    /// Attaches `component`, uploading its geometry. Static drawables rebuild
    /// the entity's batches, which the returned value reports.
    pub fn add_component(
        &mut self,
        device: &mut dyn GraphicsDevice,
        entity: EntityId,
        component: impl Into<Component>,
    ) -> Result<ComponentAdded> {
        let index = self.index_of(entity)?;
        let id = self.ids.next_component();
        self.entities[index].attach(device, &mut self.physics, id, component.into())
    }

    /// Detaches and releases a component. The entity's bounds are left as
    /// they were.
    pub fn remove_component(
        &mut self,
        device: &mut dyn GraphicsDevice,
        entity: EntityId,
        component: ComponentId,
    ) -> Result<Component> {
        let index = self.index_of(entity)?;
        self.entities[index].detach(device, &mut self.physics, component)
    }

    /// Disabled entities are skipped by update and draw; their bodies sleep.
    pub fn set_enabled(&mut self, entity: EntityId, enabled: bool) -> Result<()> {
        let index = self.index_of(entity)?;
        self.entities[index].set_enabled(&mut self.physics, enabled);
        Ok(())
    }

    /// Moves the entity and any bodies it owns.
    pub fn set_entity_matrix(&mut self, entity: EntityId, matrix: Mat4) -> Result<()> {
        let index = self.index_of(entity)?;
        let target = &mut self.entities[index];
        target.set_matrix(matrix);
        target.sync_bodies(&mut self.physics);
        Ok(())
    }

    /// Flags the entity for removal at the next `collect_disposed`.
    pub fn mark_for_dispose(&mut self, entity: EntityId) -> Result<()> {
        let index = self.index_of(entity)?;
        self.entities[index].mark_for_dispose();
        Ok(())
    }

    /// Disposes and removes the entity right away.
    pub fn dispose_entity(&mut self, device: &mut dyn GraphicsDevice, entity: EntityId) -> Result<()> {
        let index = self.index_of(entity)?;
        let mut removed = self.entities.remove(index);
        removed.dispose(device, &mut self.physics);
        Ok(())
    }

    /// Physics first, then every enabled entity.
    pub fn update(&mut self, elapsed: f32) {
        self.physics.step(elapsed);
        for entity in &mut self.entities {
            entity.update(&self.physics);
        }
    }

    pub fn draw(&self, context: &mut DrawContext) {
        for entity in &self.entities {
            entity.draw(context);
        }
    }

    /// Drain point for entities flagged with `mark_for_dispose`. Returns the
    /// ids that were disposed, in list order.
    pub fn collect_disposed(&mut self, device: &mut dyn GraphicsDevice) -> Vec<EntityId> {
        let mut collected = Vec::new();
        let mut index = 0;
        while index < self.entities.len() {
            if self.entities[index].dispose_on_update() {
                let mut entity = self.entities.remove(index);
                entity.dispose(device, &mut self.physics);
                collected.push(entity.id());
            } else {
                index += 1;
            }
        }
        if !collected.is_empty() {
            log::debug!("Collected {} disposed entities", collected.len());
        }
        collected
    }

    /// Disposes every entity.
    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        for mut entity in self.entities.drain(..) {
            entity.dispose(device, &mut self.physics);
        }
    }
}
