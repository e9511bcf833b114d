//! Procedural meshes. Every front face is wound clockwise as seen by a viewer
//! on the side the face normal points to.

use super::vertex::{v, Vertex};
use glam::Vec3;
use std::f32::consts::PI;

/// Unit sphere used as the point light volume.
pub fn sphere_mesh(segments: u32, rings: u32) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for ring in 0..=rings {
        let phi = PI * ring as f32 / rings as f32;
        let y = phi.cos();
        let ring_radius = phi.sin();

        for segment in 0..=segments {
            let theta = 2.0 * PI * segment as f32 / segments as f32;
            let x = ring_radius * theta.cos();
            let z = ring_radius * theta.sin();

            let u = segment as f32 / segments as f32;
            let tex_v = ring as f32 / rings as f32;
            vertices.push(v([x, y, z], [x, y, z], [u, tex_v]));
        }
    }

    for ring in 0..rings {
        for segment in 0..segments {
            let current = ring * (segments + 1) + segment;
            let next = current + segments + 1;

            indices.extend_from_slice(&[current, next, current + 1]);
            indices.extend_from_slice(&[current + 1, next, next + 1]);
        }
    }

    (vertices, indices)
}

/// Four corner quad in the XY plane, corners at +-0.5. Billboards expand it
/// towards the camera in the vertex stage.
pub fn quad_template() -> (Vec<Vertex>, Vec<u32>) {
    let normal = [0.0, 0.0, 1.0];
    let vertices = vec![
        v([-0.5, -0.5, 0.0], normal, [0.0, 1.0]),
        v([0.5, -0.5, 0.0], normal, [1.0, 1.0]),
        v([0.5, 0.5, 0.0], normal, [1.0, 0.0]),
        v([-0.5, 0.5, 0.0], normal, [0.0, 0.0]),
    ];
    (vertices, vec![0, 3, 2, 0, 2, 1])
}

pub fn cube_mesh() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    let faces = [
        (Vec3::X, Vec3::Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];

    for (normal, u, w) in faces {
        let centre = normal * 0.5;
        let corners = [
            (centre - u * 0.5 - w * 0.5, [0.0, 1.0]),
            (centre + u * 0.5 - w * 0.5, [1.0, 1.0]),
            (centre + u * 0.5 + w * 0.5, [1.0, 0.0]),
            (centre - u * 0.5 + w * 0.5, [0.0, 0.0]),
        ];
        push_quad(&mut vertices, &mut indices, corners, normal);
    }

    (vertices, indices)
}

/// Flat square on the XZ plane facing +Y.
pub fn plane_mesh(size: f32) -> (Vec<Vertex>, Vec<u32>) {
    terrain_grid(&[0.0; 4], 2, 2, size, 1.0)
}

/// Builds a terrain surface from a `width * depth` height raster.
///
/// Samples are spaced `spacing` apart, centred on the origin, and scaled by
/// `height_scale`. Normals come from central differences.
pub fn terrain_grid(
    heights: &[f32],
    width: usize,
    depth: usize,
    spacing: f32,
    height_scale: f32,
) -> (Vec<Vertex>, Vec<u32>) {
    if width < 2 || depth < 2 || heights.len() < width * depth {
        log::warn!(
            "Terrain raster {}x{} with {} samples is too small",
            width,
            depth,
            heights.len()
        );
        return (Vec::new(), Vec::new());
    }

    let sample = |x: usize, z: usize| heights[z * width + x] * height_scale;
    let half_w = (width - 1) as f32 * spacing * 0.5;
    let half_d = (depth - 1) as f32 * spacing * 0.5;

    let mut vertices = Vec::with_capacity(width * depth);
    for z in 0..depth {
        for x in 0..width {
            let left = sample(x.saturating_sub(1), z);
            let right = sample((x + 1).min(width - 1), z);
            let back = sample(x, z.saturating_sub(1));
            let front = sample(x, (z + 1).min(depth - 1));
            let normal = Vec3::new(left - right, 2.0 * spacing, back - front).normalize();

            vertices.push(v(
                [x as f32 * spacing - half_w, sample(x, z), z as f32 * spacing - half_d],
                normal.to_array(),
                [x as f32 / (width - 1) as f32, z as f32 / (depth - 1) as f32],
            ));
        }
    }

    let mut indices = Vec::with_capacity((width - 1) * (depth - 1) * 6);
    for z in 0..depth - 1 {
        for x in 0..width - 1 {
            let a = (z * width + x) as u32;
            let b = a + 1;
            let c = a + width as u32 + 1;
            let d = a + width as u32;
            indices.extend_from_slice(&[a, b, c, a, c, d]);
        }
    }

    (vertices, indices)
}

fn push_quad(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    corners: [(Vec3, [f32; 2]); 4],
    normal: Vec3,
) {
    let base = vertices.len() as u32;
    for (position, uv) in corners {
        vertices.push(v(position.to_array(), normal.to_array(), uv));
    }

    let winding = (corners[1].0 - corners[0].0)
        .cross(corners[2].0 - corners[0].0)
        .dot(normal);
    if winding < 0.0 {
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    } else {
        indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
    }
}
