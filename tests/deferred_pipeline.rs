use deep_engine::asset::{MeshData, TextureManager, NULL_TEXTURE_KEY};
use deep_engine::renderer::postprocess::PostStage;
use deep_engine::renderer::primitives::plane_mesh;
use deep_engine::renderer::soft::DrawRecord;
use deep_engine::renderer::{
    CullMode, GraphicsDevice, Material, ProgramKind, Renderer, SoftDevice, MAX_BILLBOARDS,
    MAX_LIGHTS,
};
use deep_engine::scene::{BillboardComponent, Camera, DrawableComponent, EntityKind, Light, Scene};
use deep_engine::RenderSettings;
use glam::{Mat4, Vec2, Vec3};

const SIZE: u32 = 32;

fn settings() -> RenderSettings {
    RenderSettings {
        ambient_intensity: 0.0,
        ..Default::default()
    }
}

struct Harness {
    device: SoftDevice,
    renderer: Renderer,
    textures: TextureManager,
}

impl Harness {
    fn new(size: u32, settings: RenderSettings) -> Self {
        let mut device = SoftDevice::new(size, size).with_draw_log();
        let renderer = Renderer::new(&mut device, settings);
        let textures = TextureManager::new(&mut device);
        Self {
            device,
            renderer,
            textures,
        }
    }

    fn frame(&mut self, scene: &Scene) {
        self.device.clear_draw_log();
        self.renderer.draw(&mut self.device, &self.textures, scene);
    }

    fn records(&self, kind: ProgramKind) -> Vec<&DrawRecord> {
        self.device
            .draw_log()
            .iter()
            .filter(|record| record.kind == kind)
            .collect()
    }

    fn pixels(&self) -> Vec<[u8; 4]> {
        let mut out = Vec::new();
        for y in 0..SIZE {
            for x in 0..SIZE {
                out.push(self.device.pixel(x, y));
            }
        }
        out
    }
}

/// A white ground plane under a camera looking down at it from an angle.
fn ground_scene(device: &mut SoftDevice) -> Scene {
    ground_scene_with(device, Material::white(), Vec3::new(0.0, 4.0, 4.0))
}

fn ground_scene_with(device: &mut SoftDevice, material: Material, eye: Vec3) -> Scene {
    let mut scene = Scene::new();
    scene.set_camera(Camera::look_at(eye, Vec3::ZERO));
    let ground = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    scene
        .add_component(
            device,
            ground,
            DrawableComponent::new(MeshData::from_primitive(plane_mesh(4.0)), material)
                .with_static(true),
        )
        .unwrap();
    scene
}

fn add_sun(scene: &mut Scene, device: &mut SoftDevice) {
    let lights = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    scene
        .add_component(device, lights, Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0))
        .unwrap();
}

fn brightness(pixel: [u8; 4]) -> u32 {
    pixel[..3].iter().map(|&c| c as u32).sum()
}

#[test]
fn light_queue_keeps_the_first_512() {
    let mut harness = Harness::new(8, settings());
    let mut scene = Scene::new();
    let lights = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    for _ in 0..MAX_LIGHTS + 1 {
        scene
            .add_component(
                &mut harness.device,
                lights,
                Light::directional(Vec3::NEG_Y, Vec3::ONE, 0.001),
            )
            .unwrap();
    }

    harness.frame(&scene);

    assert_eq!(harness.renderer.visible_lights_count(), MAX_LIGHTS);
    assert_eq!(harness.renderer.lighting().dropped(), 1);
    assert_eq!(harness.records(ProgramKind::DirectionalLight).len(), MAX_LIGHTS);
}

#[test]
fn billboard_queue_keeps_the_first_2048() {
    let mut harness = Harness::new(8, settings());
    let mut scene = Scene::new();
    let flats = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    for _ in 0..MAX_BILLBOARDS + 1 {
        scene
            .add_component(
                &mut harness.device,
                flats,
                BillboardComponent::new(NULL_TEXTURE_KEY, Vec2::splat(0.1)),
            )
            .unwrap();
    }

    harness.frame(&scene);

    assert_eq!(harness.renderer.visible_billboards_count(), MAX_BILLBOARDS);
    assert_eq!(harness.records(ProgramKind::Billboard).len(), MAX_BILLBOARDS);
}

#[test]
fn point_light_cull_flips_when_the_camera_leaves_the_volume() {
    let cull_for = |radius: f32| {
        let mut harness = Harness::new(8, settings());
        let mut scene = Scene::new();
        scene.set_camera(Camera::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO));
        let lamp = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
        scene
            .add_component(
                &mut harness.device,
                lamp,
                Light::point(Vec3::ZERO, Vec3::ONE, radius, 1.0),
            )
            .unwrap();
        harness.frame(&scene);
        let records = harness.records(ProgramKind::PointLight);
        assert_eq!(records.len(), 1);
        records[0].cull
    };

    assert_eq!(cull_for(5.5), CullMode::CullClockwiseFace);
    // Exactly on the surface counts as outside.
    assert_eq!(cull_for(5.0), CullMode::CullCounterClockwiseFace);
    assert_eq!(cull_for(2.0), CullMode::CullCounterClockwiseFace);
}

#[test]
fn point_lights_shade_from_inside_and_outside_their_volume() {
    let centre = |eye: Vec3, radius: f32| {
        let mut harness = Harness::new(SIZE, settings());
        let mut scene = ground_scene_with(&mut harness.device, Material::white(), eye);
        let lamp = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
        scene
            .add_component(
                &mut harness.device,
                lamp,
                Light::point(Vec3::new(0.0, 1.0, 0.0), Vec3::ONE, radius, 1.0),
            )
            .unwrap();
        harness.frame(&scene);
        let cull = harness.records(ProgramKind::PointLight)[0].cull;
        (cull, harness.device.pixel(SIZE / 2, SIZE / 2))
    };

    let (cull, inside) = centre(Vec3::new(0.0, 1.0, 1.0), 3.0);
    assert_eq!(cull, CullMode::CullClockwiseFace);
    assert!(brightness(inside) > 0);

    let (cull, outside) = centre(Vec3::new(0.0, 4.0, 4.0), 1.5);
    assert_eq!(cull, CullMode::CullCounterClockwiseFace);
    assert!(brightness(outside) > 0);
}

#[test]
fn emissive_surfaces_glow_without_lights() {
    let centre = |material: Material| {
        let mut harness = Harness::new(SIZE, settings());
        let scene = ground_scene_with(&mut harness.device, material, Vec3::new(0.0, 4.0, 4.0));
        harness.frame(&scene);
        assert_eq!(harness.renderer.visible_lights_count(), 0);
        assert_eq!(harness.records(ProgramKind::Emissive).len(), 1);
        harness.device.pixel(SIZE / 2, SIZE / 2)
    };

    let glowing = centre(Material::white().with_emissive(1.0));
    assert!(brightness(glowing) > 0);

    let shiny = centre(Material::white().with_specular(0.5, 16.0));
    assert_eq!(brightness(shiny), 0);
}

#[test]
fn post_stages_run_in_fixed_order_and_end_on_the_back_buffer() {
    let settings = RenderSettings {
        fxaa: true,
        bloom: true,
        ..settings()
    };
    let mut harness = Harness::new(SIZE, settings);
    let scene = ground_scene(&mut harness.device);
    harness.frame(&scene);

    let run = harness.renderer.post_process().last_run();
    let stages: Vec<PostStage> = run.iter().map(|record| record.stage).collect();
    assert_eq!(stages, [PostStage::Compose, PostStage::Fxaa, PostStage::Bloom]);
    assert!(run[0].output.is_some());
    assert!(run[1].output.is_some());
    assert_ne!(run[0].output, run[1].output);
    assert_eq!(run[2].output, None);

    harness.renderer.set_bloom(false);
    harness.frame(&scene);
    let stages: Vec<PostStage> = harness
        .renderer
        .post_process()
        .last_run()
        .iter()
        .map(|record| record.stage)
        .collect();
    assert_eq!(stages, [PostStage::Compose, PostStage::Fxaa]);
}

#[test]
fn identical_frames_are_byte_identical() {
    let render = || {
        let settings = RenderSettings {
            fxaa: true,
            bloom: true,
            ..settings()
        };
        let mut harness = Harness::new(SIZE, settings);
        let mut scene = ground_scene(&mut harness.device);
        add_sun(&mut scene, &mut harness.device);
        harness.frame(&scene);
        harness.pixels()
    };

    assert_eq!(render(), render());
}

#[test]
fn resize_recreates_the_target_set() {
    let mut harness = Harness::new(SIZE, settings());
    let live = harness.device.live_render_targets();
    let old = harness.renderer.gbuffer().targets();

    harness.renderer.on_resize(&mut harness.device, 16, 8);

    assert_eq!(harness.device.live_render_targets(), live);
    assert_eq!(harness.renderer.gbuffer().size(), (16, 8));
    for target in old {
        assert_eq!(harness.device.target_size(target), None);
    }
    for target in harness.renderer.gbuffer().targets() {
        assert_eq!(harness.device.target_size(target), Some((16, 8)));
    }
}

#[test]
fn zero_sized_resize_is_ignored() {
    let mut harness = Harness::new(SIZE, settings());
    let before = harness.renderer.gbuffer().targets();
    harness.renderer.on_resize(&mut harness.device, 0, 16);
    assert_eq!(harness.renderer.gbuffer().targets(), before);
}

#[test]
fn lost_device_skips_passes_until_reset() {
    let mut harness = Harness::new(SIZE, settings());
    let mut scene = ground_scene(&mut harness.device);
    add_sun(&mut scene, &mut harness.device);
    let live = harness.device.live_render_targets();
    harness.frame(&scene);
    let before = harness.pixels();
    assert!(before.iter().any(|&pixel| brightness(pixel) > 0));

    harness.device.reset();
    harness.renderer.on_device_lost();
    assert!(harness.renderer.is_device_lost());
    assert_eq!(harness.device.live_render_targets(), 0);

    harness.frame(&scene);
    assert!(harness
        .records(ProgramKind::Compose)
        .iter()
        .all(|record| !record.executed));

    harness.renderer.on_device_reset(&mut harness.device);
    assert!(!harness.renderer.is_device_lost());
    assert_eq!(harness.device.live_render_targets(), live);

    harness.frame(&scene);
    assert!(harness.device.draw_log().iter().all(|record| record.executed));
    assert_eq!(harness.pixels(), before);
}

#[test]
fn lights_brighten_the_composed_frame() {
    let centre = |with_light: bool| {
        let mut harness = Harness::new(SIZE, settings());
        let mut scene = ground_scene(&mut harness.device);
        if with_light {
            add_sun(&mut scene, &mut harness.device);
        }
        harness.frame(&scene);
        harness.device.pixel(SIZE / 2, SIZE / 2)
    };

    let dark = centre(false);
    let lit = centre(true);
    assert_eq!(brightness(dark), 0);
    assert!(brightness(lit) > brightness(dark));
}

#[test]
fn background_shows_the_clear_colour() {
    let mut harness = Harness::new(SIZE, settings());
    let scene = Scene::new();
    harness.frame(&scene);

    let clear = harness.renderer.settings().clear_colour;
    let expected = [
        (clear[0] * 255.0).round() as u8,
        (clear[1] * 255.0).round() as u8,
        (clear[2] * 255.0).round() as u8,
    ];
    assert_eq!(&harness.device.pixel(0, 0)[..3], &expected);
}

#[test]
fn debug_buffers_add_four_thumbnails() {
    let mut harness = Harness::new(SIZE, settings());
    let scene = ground_scene(&mut harness.device);

    harness.frame(&scene);
    assert!(harness.records(ProgramKind::Copy).is_empty());

    harness.renderer.set_show_debug_buffers(true);
    harness.frame(&scene);
    assert_eq!(harness.records(ProgramKind::Copy).len(), 3);
    let depth = harness.records(ProgramKind::CopyDepth);
    assert_eq!(depth.len(), 1);
    assert!(depth[0].targets.is_empty());
}
