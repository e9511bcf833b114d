//! Scenes the preview binary and the integration tests share.

use glam::{Mat4, Vec2, Vec3};
use log::info;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::asset::{MeshData, TextureManager};
use crate::error::Result;
use crate::renderer::primitives::{cube_mesh, plane_mesh, terrain_grid};
use crate::renderer::{GraphicsDevice, Material};
use crate::scene::{
    BillboardComponent, Camera, DrawableComponent, EntityId, EntityKind, Light, PhysicsComponent,
    PhysicsSpace, Scene, DEFAULT_GRAVITY,
};

const TERRAIN_SIZE: usize = 33;
const CRATE_DROP_HEIGHT: f32 = 6.0;

/// Entity ids of the interesting parts of [`build_demo_scene`].
#[derive(Clone, Copy, Debug)]
pub struct DemoScene {
    pub terrain: EntityId,
    pub scenery: EntityId,
    pub falling_crate: EntityId,
    pub lights: EntityId,
}

/// Checkerboard in RGBA8, `cells` squares per side.
pub fn checkerboard(size: u32, cells: u32, a: [u8; 4], b: [u8; 4]) -> Vec<u8> {
    let cell = (size / cells.max(1)).max(1);
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let colour = if ((x / cell) + (y / cell)) % 2 == 0 { a } else { b };
            pixels.extend_from_slice(&colour);
        }
    }
    pixels
}

/// Round dot used for flats; transparent outside the circle.
pub fn flat_sprite(size: u32, colour: [u8; 3]) -> Vec<u8> {
    let centre = (size as f32 - 1.0) * 0.5;
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let d = Vec2::new(x as f32 - centre, y as f32 - centre).length() / centre.max(1.0);
            let alpha = if d <= 1.0 { 255 } else { 0 };
            pixels.extend_from_slice(&[colour[0], colour[1], colour[2], alpha]);
        }
    }
    pixels
}

/// Rolling hills from a few random octaves of sines.
pub fn terrain_heights(rng: &mut SmallRng, width: usize, depth: usize) -> Vec<f32> {
    let octaves: Vec<(f32, f32, f32)> = (0..3)
        .map(|i| {
            let frequency = 0.15 * (i + 1) as f32;
            (
                frequency,
                rng.gen_range(0.0..std::f32::consts::TAU),
                1.0 / (i + 1) as f32,
            )
        })
        .collect();

    let mut heights = Vec::with_capacity(width * depth);
    for z in 0..depth {
        for x in 0..width {
            let h: f32 = octaves
                .iter()
                .map(|(f, phase, amp)| {
                    ((x as f32 * f + phase).sin() * (z as f32 * f + phase).cos()) * amp
                })
                .sum();
            heights.push(h);
        }
    }
    heights
}

/// Terrain, static scenery, a crate that falls onto the ground plane, a
/// directional and several point lights, and flats drawn as billboards.
pub fn build_demo_scene(
    device: &mut dyn GraphicsDevice,
    textures: &mut TextureManager,
    seed: u64,
) -> Result<(Scene, DemoScene)> {
    info!("Creating demo scene...");
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut physics = PhysicsSpace::new(DEFAULT_GRAVITY);
    physics.set_ground_plane(Some(0.0));
    let mut scene = Scene::with_physics(physics);
    scene.set_camera(Camera::look_at(Vec3::new(0.0, 8.0, 20.0), Vec3::ZERO));

    let ground = textures.insert_rgba8(
        device,
        64,
        64,
        &checkerboard(64, 8, [90, 140, 70, 255], [70, 110, 55, 255]),
    )?;
    let crate_texture = textures.insert_rgba8(
        device,
        32,
        32,
        &checkerboard(32, 4, [170, 120, 60, 255], [120, 80, 40, 255]),
    )?;
    let flat = textures.insert_rgba8(device, 16, 16, &flat_sprite(16, [240, 220, 120]))?;

    // Terrain
    let terrain = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    let heights = terrain_heights(&mut rng, TERRAIN_SIZE, TERRAIN_SIZE);
    let terrain_mesh =
        MeshData::from_primitive(terrain_grid(&heights, TERRAIN_SIZE, TERRAIN_SIZE, 1.0, 0.6));
    scene.add_component(
        device,
        terrain,
        DrawableComponent::new(terrain_mesh, Material::textured(ground).with_specular(0.1, 8.0))
            .with_matrix(Mat4::from_translation(Vec3::new(0.0, -0.6, 0.0)))
            .with_static(true),
    )?;

    // Scenery: pillars around the origin merged into one static batch.
    let scenery = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    let pillar = MeshData::from_primitive(cube_mesh());
    for i in 0..8 {
        let angle = i as f32 / 8.0 * std::f32::consts::TAU;
        let height = rng.gen_range(1.5..4.0);
        let position = Vec3::new(angle.cos() * 9.0, height * 0.5, angle.sin() * 9.0);
        let matrix =
            Mat4::from_translation(position) * Mat4::from_scale(Vec3::new(0.8, height, 0.8));
        scene.add_component(
            device,
            scenery,
            DrawableComponent::new(
                pillar.clone(),
                Material::white()
                    .with_tint(Vec3::new(0.8, 0.8, 0.85))
                    .with_specular(0.4, 32.0),
            )
            .with_matrix(matrix)
            .with_static(true),
        )?;
    }
    let beacon = Material::white()
        .with_tint(Vec3::new(1.0, 0.4, 0.2))
        .with_emissive(0.8);
    scene.add_component(
        device,
        scenery,
        DrawableComponent::new(pillar, beacon)
            .with_matrix(Mat4::from_translation(Vec3::new(0.0, 0.5, 0.0)))
            .with_static(true),
    )?;

    // Crate
    let falling_crate = scene.create_entity(
        EntityKind::Dynamic,
        Mat4::from_translation(Vec3::new(2.0, CRATE_DROP_HEIGHT, 0.0)),
    );
    scene.add_component(device, falling_crate, PhysicsComponent::sphere(0.5))?;
    scene.add_component(
        device,
        falling_crate,
        DrawableComponent::new(
            MeshData::from_primitive(cube_mesh()),
            Material::textured(crate_texture).with_specular(0.2, 16.0),
        ),
    )?;

    // Lights
    let lights = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    scene.add_component(
        device,
        lights,
        Light::directional(Vec3::new(-0.4, -1.0, -0.3), Vec3::new(1.0, 0.95, 0.85), 0.6),
    )?;
    let palette = [
        Vec3::new(1.0, 0.3, 0.2),
        Vec3::new(0.2, 0.6, 1.0),
        Vec3::new(0.3, 1.0, 0.4),
        Vec3::new(1.0, 0.9, 0.3),
    ];
    for (i, colour) in palette.iter().enumerate() {
        let angle = i as f32 / palette.len() as f32 * std::f32::consts::TAU;
        let position = Vec3::new(angle.cos() * 5.0, 1.5, angle.sin() * 5.0);
        scene.add_component(device, lights, Light::point(position, *colour, 6.0, 1.2))?;
    }

    // Flats
    let flats = scene.create_entity(EntityKind::World, Mat4::IDENTITY);
    for _ in 0..24 {
        let offset = Vec3::new(rng.gen_range(-12.0..12.0), 0.6, rng.gen_range(-12.0..12.0));
        scene.add_component(
            device,
            flats,
            BillboardComponent::new(flat, Vec2::new(0.8, 1.2)).with_offset(offset),
        )?;
    }

    // Landing pad under the crate.
    let pad = scene.create_entity(
        EntityKind::World,
        Mat4::from_translation(Vec3::new(2.0, 0.01, 0.0)),
    );
    scene.add_component(
        device,
        pad,
        DrawableComponent::new(MeshData::from_primitive(plane_mesh(3.0)), Material::white())
            .with_static(true),
    )?;

    info!("Demo scene: {} entities", scene.len());
    Ok((
        scene,
        DemoScene {
            terrain,
            scenery,
            falling_crate,
            lights,
        },
    ))
}
