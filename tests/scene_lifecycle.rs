use deep_engine::asset::{MeshData, TextureManager};
use deep_engine::demo_scenes::build_demo_scene;
use deep_engine::math::BoundingSphere;
use deep_engine::renderer::primitives::cube_mesh;
use deep_engine::renderer::{FrameStats, Material, Renderer, SoftDevice};
use deep_engine::scene::{
    Camera, DrawableComponent, EntityKind, EntityState, PhysicsComponent, Scene,
};
use deep_engine::{EngineError, RenderSettings};
use glam::{Mat4, Vec3};

fn cube() -> MeshData {
    MeshData::from_primitive(cube_mesh())
}

fn red() -> Material {
    Material::white().with_tint(Vec3::new(1.0, 0.0, 0.0))
}

fn looking_down_z() -> Camera {
    Camera::look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO)
}

fn draw_stats(device: &mut SoftDevice, scene: &Scene) -> FrameStats {
    let mut renderer = Renderer::new(device, RenderSettings::default());
    let textures = TextureManager::new(device);
    renderer.draw(device, &textures, scene);
    renderer.frame_stats()
}

#[test]
fn static_drawables_batch_and_dynamic_ones_draw_alone() {
    let mut device = SoftDevice::new(16, 16);
    let mut scene = Scene::new();
    scene.set_camera(looking_down_z());

    let world = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    for (x, material) in [(-2.0, Material::white()), (0.0, red()), (2.0, red())] {
        let added = scene
            .add_component(
                &mut device,
                world,
                DrawableComponent::new(cube(), material)
                    .with_matrix(Mat4::from_translation(Vec3::new(x, 0.0, 0.0)))
                    .with_static(true),
            )
            .unwrap();
        assert!(added.static_rebuild);
    }

    let mover = scene.create_entity(EntityKind::Dynamic, Mat4::IDENTITY);
    let added = scene
        .add_component(&mut device, mover, DrawableComponent::new(cube(), red()))
        .unwrap();
    assert!(!added.static_rebuild);

    let stats = draw_stats(&mut device, &scene);
    assert_eq!(stats.static_batches, 2);
    assert_eq!(stats.dynamic_drawables, 1);
    assert_eq!(stats.culled_drawables, 0);
}

#[test]
fn dynamic_drawables_outside_the_frustum_are_culled() {
    let mut device = SoftDevice::new(16, 16);
    let mut scene = Scene::new();
    scene.set_camera(looking_down_z());

    let behind = scene.create_entity(
        EntityKind::Dynamic,
        Mat4::from_translation(Vec3::new(0.0, 0.0, 30.0)),
    );
    scene
        .add_component(&mut device, behind, DrawableComponent::new(cube(), red()))
        .unwrap();
    let ahead = scene.create_entity(EntityKind::Dynamic, Mat4::IDENTITY);
    scene
        .add_component(&mut device, ahead, DrawableComponent::new(cube(), red()))
        .unwrap();

    let stats = draw_stats(&mut device, &scene);
    assert_eq!(stats.dynamic_drawables, 1);
    assert_eq!(stats.culled_drawables, 1);
}

#[test]
fn bounds_grow_on_add_and_only_shrink_on_request() {
    let mut device = SoftDevice::new(4, 4);
    let mut scene = Scene::new();
    let id = scene.create_entity(EntityKind::World, Mat4::IDENTITY);

    let near = DrawableComponent::new(cube(), red());
    let far = DrawableComponent::new(cube(), red())
        .with_matrix(Mat4::from_translation(Vec3::new(20.0, 0.0, 0.0)));
    let expected = BoundingSphere::merged(&near.bounds(), &far.bounds());

    scene.add_component(&mut device, id, near).unwrap();
    let far = scene.add_component(&mut device, id, far).unwrap();

    let grown = scene.entity(id).unwrap().bounds().unwrap();
    assert_eq!(grown, expected);
    assert!(grown.contains_point(Vec3::new(20.0, 0.0, 0.0)));
    assert!(grown.contains_point(Vec3::ZERO));

    scene.remove_component(&mut device, id, far.id).unwrap();
    assert_eq!(scene.entity(id).unwrap().bounds(), Some(grown));

    scene.entity_mut(id).unwrap().recompute_bounds();
    let shrunk = scene.entity(id).unwrap().bounds().unwrap();
    assert!(shrunk.radius < grown.radius);
    assert!(!shrunk.contains_point(Vec3::new(20.0, 0.0, 0.0)));
}

#[test]
fn marked_entities_linger_until_collected() {
    let mut device = SoftDevice::new(4, 4);
    let mut scene = Scene::new();
    let keep = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    let doomed = scene.create_entity(EntityKind::Dynamic, Mat4::IDENTITY);
    scene
        .add_component(&mut device, doomed, DrawableComponent::new(cube(), red()))
        .unwrap();
    scene
        .add_component(&mut device, doomed, PhysicsComponent::sphere(0.5))
        .unwrap();
    let geometry_before = device.live_geometry();

    scene.mark_for_dispose(doomed).unwrap();
    assert_eq!(
        scene.entity(doomed).unwrap().state(),
        EntityState::PendingDispose
    );
    assert!(matches!(
        scene.add_component(&mut device, doomed, PhysicsComponent::sphere(1.0)),
        Err(EngineError::EntityDisposed(id)) if id == doomed
    ));

    scene.update(0.1);
    assert_eq!(scene.len(), 2);

    assert_eq!(scene.collect_disposed(&mut device), vec![doomed]);
    assert!(scene.entity(doomed).is_none());
    assert!(scene.entity(keep).is_some());
    assert_eq!(device.live_geometry(), geometry_before - 1);
    assert!(scene.physics().is_empty());

    assert!(scene.collect_disposed(&mut device).is_empty());
}

#[test]
fn identical_scenes_hand_out_identical_ids() {
    let build = || {
        let mut device = SoftDevice::new(4, 4);
        let mut scene = Scene::new();
        let a = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
        let b = scene.create_entity(EntityKind::Dynamic, Mat4::IDENTITY);
        let component = scene
            .add_component(&mut device, b, PhysicsComponent::sphere(1.0))
            .unwrap();
        (a, b, component.id)
    };

    assert_eq!(build(), build());
}

#[test]
fn demo_crate_falls_and_lands() {
    let mut device = SoftDevice::new(32, 24);
    let mut textures = TextureManager::new(&mut device);
    let (mut scene, parts) = build_demo_scene(&mut device, &mut textures, 3).unwrap();

    let start = scene.entity(parts.falling_crate).unwrap().matrix().w_axis.y;
    scene.update(0.1);
    let after = scene.entity(parts.falling_crate).unwrap().matrix().w_axis.y;
    assert!(after < start);

    for _ in 0..100 {
        scene.update(0.05);
    }
    let rest = scene.entity(parts.falling_crate).unwrap().matrix().w_axis.y;
    assert!((rest - 0.5).abs() < 1e-4);

    let terrain = scene.entity(parts.terrain).unwrap();
    assert_eq!(terrain.matrix(), Mat4::IDENTITY);

    let mut renderer = Renderer::new(&mut device, RenderSettings::default());
    renderer.draw(&mut device, &textures, &scene);
    assert!(renderer.visible_lights_count() >= 5);
    assert_eq!(renderer.visible_billboards_count(), 24);
}
