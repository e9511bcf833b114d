// scene/physics.rs

use glam::Vec3;

use crate::asset::{Handle, ResourcePool};

pub type BodyHandle = Handle<RigidBody>;

pub const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBody {
    pub position: Vec3,
    pub velocity: Vec3,
    pub radius: f32,
    pub immovable: bool,
    /// Skipped by [`PhysicsSpace::step`] while set.
    pub asleep: bool,
}

/// Sphere bodies under constant gravity, resting on an optional ground plane.
pub struct PhysicsSpace {
    bodies: ResourcePool<RigidBody>,
    gravity: Vec3,
    ground: Option<f32>,
}

impl Default for PhysicsSpace {
    fn default() -> Self {
        Self::new(DEFAULT_GRAVITY)
    }
}

impl PhysicsSpace {
    pub fn new(gravity: Vec3) -> Self {
        Self {
            bodies: ResourcePool::new(),
            gravity,
            ground: None,
        }
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    /// Horizontal plane at `height` that bodies cannot fall through.
    pub fn set_ground_plane(&mut self, height: Option<f32>) {
        self.ground = height;
    }

    pub fn add_body(&mut self, body: RigidBody) -> BodyHandle {
        self.bodies.insert(body)
    }

    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<RigidBody> {
        self.bodies.remove(handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle)
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    /// Semi-implicit Euler step; bodies touching the ground lose their
    /// downward velocity.
    pub fn step(&mut self, elapsed: f32) {
        if elapsed <= 0.0 {
            return;
        }
        let gravity = self.gravity;
        let ground = self.ground;

        for body in self
            .bodies
            .iter_mut()
            .filter(|body| !body.immovable && !body.asleep)
        {
            body.velocity += gravity * elapsed;
            body.position += body.velocity * elapsed;

            if let Some(height) = ground {
                let floor = height + body.radius;
                if body.position.y < floor {
                    body.position.y = floor;
                    body.velocity.y = body.velocity.y.max(0.0);
                }
            }
        }
    }

    /// Bodies whose sphere overlaps the query sphere.
    pub fn overlapping(&self, center: Vec3, radius: f32) -> Vec<RigidBody> {
        self.bodies
            .iter()
            .filter(|body| body.position.distance(center) < body.radius + radius)
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ball(y: f32) -> RigidBody {
        RigidBody {
            position: Vec3::new(0.0, y, 0.0),
            velocity: Vec3::ZERO,
            radius: 0.5,
            immovable: false,
            asleep: false,
        }
    }

    #[test]
    fn gravity_accelerates_free_bodies() {
        let mut space = PhysicsSpace::default();
        let handle = space.add_body(ball(10.0));
        space.step(1.0);

        let body = space.body(handle).unwrap();
        assert!((body.velocity.y + 9.81).abs() < 1e-5);
        assert!((body.position.y - 0.19).abs() < 1e-4);
    }

    #[test]
    fn immovable_bodies_stay_put() {
        let mut space = PhysicsSpace::default();
        let handle = space.add_body(RigidBody {
            immovable: true,
            ..ball(3.0)
        });
        space.step(0.5);
        assert_eq!(space.body(handle).unwrap().position.y, 3.0);
    }

    #[test]
    fn sleeping_bodies_keep_their_velocity() {
        let mut space = PhysicsSpace::default();
        let handle = space.add_body(RigidBody {
            velocity: Vec3::new(1.0, 0.0, 0.0),
            asleep: true,
            ..ball(4.0)
        });
        space.step(0.5);

        let body = space.body(handle).unwrap();
        assert_eq!(body.position, Vec3::new(0.0, 4.0, 0.0));
        assert_eq!(body.velocity, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn ground_plane_stops_the_fall() {
        let mut space = PhysicsSpace::default();
        space.set_ground_plane(Some(0.0));
        let handle = space.add_body(ball(1.0));
        for _ in 0..120 {
            space.step(1.0 / 60.0);
        }

        let body = space.body(handle).unwrap();
        assert_eq!(body.position.y, 0.5);
        assert_eq!(body.velocity.y, 0.0);
    }

    #[test]
    fn overlap_query_finds_touching_bodies() {
        let mut space = PhysicsSpace::default();
        space.add_body(ball(0.0));
        space.add_body(ball(10.0));
        assert_eq!(space.overlapping(Vec3::new(0.0, 0.8, 0.0), 0.5).len(), 1);
    }
}
