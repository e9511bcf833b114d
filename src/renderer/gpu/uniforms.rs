// renderer/gpu/uniforms.rs
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::renderer::vertex::normal_matrix;
use crate::renderer::{Program, ProgramKind, TargetHandle, TextureHandle};

/// Mirror of `DrawUniforms` in `shader/common.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub(crate) struct DrawUniforms {
    pub matrix_a: [[f32; 4]; 4],
    pub matrix_b: [[f32; 4]; 4],
    pub matrix_c: [[f32; 4]; 4],
    pub colour: [f32; 4],
    pub vector: [f32; 4],
    pub camera: [f32; 4],
    pub params: [f32; 4],
    pub viewport: [f32; 4],
}

impl DrawUniforms {
    pub fn new(program: &Program, viewport: [f32; 4]) -> Self {
        let mut uniforms = Self {
            matrix_a: Mat4::IDENTITY.to_cols_array_2d(),
            matrix_b: Mat4::IDENTITY.to_cols_array_2d(),
            matrix_c: Mat4::IDENTITY.to_cols_array_2d(),
            colour: [0.0; 4],
            vector: [0.0; 4],
            camera: [0.0; 4],
            params: [0.0; 4],
            viewport,
        };

        match program {
            Program::Geometry {
                world,
                view_projection,
                colour,
                specular_power,
                ..
            } => {
                uniforms.matrix_a = world.to_cols_array_2d();
                uniforms.matrix_b = view_projection.to_cols_array_2d();
                uniforms.matrix_c = Mat4::from_mat3(normal_matrix(world)).to_cols_array_2d();
                uniforms.colour = colour.to_array();
                uniforms.camera[3] = *specular_power;
            }
            Program::ClearGBuffer { colour } | Program::Clear { colour } => {
                uniforms.colour = colour.to_array();
            }
            Program::DirectionalLight {
                direction,
                colour,
                intensity,
                camera_position,
                inverse_view_projection,
                ..
            } => {
                uniforms.matrix_c = inverse_view_projection.to_cols_array_2d();
                uniforms.colour = colour.extend(*intensity).to_array();
                uniforms.vector = direction.extend(0.0).to_array();
                uniforms.camera = camera_position.extend(0.0).to_array();
            }
            Program::PointLight {
                world,
                view_projection,
                position,
                colour,
                radius,
                intensity,
                camera_position,
                inverse_view_projection,
                ..
            } => {
                uniforms.matrix_a = world.to_cols_array_2d();
                uniforms.matrix_b = view_projection.to_cols_array_2d();
                uniforms.matrix_c = inverse_view_projection.to_cols_array_2d();
                uniforms.colour = colour.extend(*intensity).to_array();
                uniforms.vector = position.extend(*radius).to_array();
                uniforms.camera = camera_position.extend(0.0).to_array();
            }
            Program::Compose {
                ambient_colour,
                ambient_intensity,
                ..
            } => {
                uniforms.colour = ambient_colour.extend(*ambient_intensity).to_array();
            }
            Program::BloomExtract { threshold, .. } => {
                uniforms.params[0] = *threshold;
            }
            Program::GaussianBlur {
                direction,
                blur_amount,
                ..
            } => {
                uniforms.params = [direction.x, direction.y, *blur_amount, 0.0];
            }
            Program::BloomCombine {
                bloom_intensity,
                base_intensity,
                bloom_saturation,
                base_saturation,
                ..
            } => {
                uniforms.params = [
                    *bloom_intensity,
                    *base_intensity,
                    *bloom_saturation,
                    *base_saturation,
                ];
            }
            Program::Billboard {
                position,
                size,
                view,
                projection,
                ..
            } => {
                uniforms.matrix_a = view.to_cols_array_2d();
                uniforms.matrix_b = projection.to_cols_array_2d();
                uniforms.vector = position.extend(1.0).to_array();
                uniforms.params = Vec4::new(size.x, size.y, 0.0, 0.0).to_array();
            }
            Program::Emissive { .. }
            | Program::Fxaa { .. }
            | Program::Copy { .. }
            | Program::CopyDepth { .. } => {}
        }

        uniforms
    }
}

/// What goes into one texture slot of the pass bind group.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Slot {
    Empty,
    Target(TargetHandle),
    /// `None` samples plain white.
    Texture(Option<TextureHandle>),
}

/// Texture slots per program, matching the `t0..t3` bindings in the shaders.
/// Slot 3 only ever holds single channel float targets.
pub(crate) fn slots(program: &Program) -> [Slot; 4] {
    use Slot::{Empty, Target, Texture};
    match program {
        Program::Geometry { texture, .. } => [Texture(*texture), Empty, Empty, Empty],
        Program::ClearGBuffer { .. } | Program::Clear { .. } => [Empty; 4],
        Program::DirectionalLight { gbuffer, .. } | Program::PointLight { gbuffer, .. } => [
            Target(gbuffer.colour),
            Target(gbuffer.normal),
            Empty,
            Target(gbuffer.depth),
        ],
        Program::Emissive { colour_map } => [Target(*colour_map), Empty, Empty, Empty],
        Program::Compose {
            colour_map,
            light_map,
            depth_map,
            ..
        } => [Target(*colour_map), Target(*light_map), Empty, Target(*depth_map)],
        Program::Fxaa { source }
        | Program::BloomExtract { source, .. }
        | Program::GaussianBlur { source, .. }
        | Program::Copy { source } => [Target(*source), Empty, Empty, Empty],
        Program::CopyDepth { source } => [Empty, Empty, Empty, Target(*source)],
        Program::BloomCombine { base, bloom, .. } => [Target(*base), Target(*bloom), Empty, Empty],
        Program::Billboard {
            texture, depth_map, ..
        } => [Texture(*texture), Empty, Empty, Target(*depth_map)],
    }
}

/// Vertex and fragment entry points, and whether the program reads a vertex
/// buffer.
pub(crate) fn entry_points(kind: ProgramKind) -> (&'static str, &'static str, bool) {
    match kind {
        ProgramKind::Geometry => ("vs_geometry", "fs_geometry", true),
        ProgramKind::ClearGBuffer => ("vs_fullscreen", "fs_clear_gbuffer", false),
        ProgramKind::Clear => ("vs_fullscreen", "fs_clear", false),
        ProgramKind::DirectionalLight => ("vs_fullscreen", "fs_directional", false),
        ProgramKind::PointLight => ("vs_volume", "fs_point", true),
        ProgramKind::Emissive => ("vs_fullscreen", "fs_emissive", false),
        ProgramKind::Compose => ("vs_fullscreen", "fs_compose", false),
        ProgramKind::Fxaa => ("vs_fullscreen", "fs_fxaa", false),
        ProgramKind::BloomExtract => ("vs_fullscreen", "fs_bloom_extract", false),
        ProgramKind::GaussianBlur => ("vs_fullscreen", "fs_blur", false),
        ProgramKind::BloomCombine => ("vs_fullscreen", "fs_bloom_combine", false),
        ProgramKind::Copy => ("vs_fullscreen", "fs_copy", false),
        ProgramKind::CopyDepth => ("vs_fullscreen", "fs_copy_depth", false),
        ProgramKind::Billboard => ("vs_billboard", "fs_billboard", true),
    }
}
