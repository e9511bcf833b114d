//! CPU renditions of the programs in `shader/`. Each function mirrors the
//! matching WGSL entry point so the two backends agree on what a pass means.

use glam::{Mat3, Mat4, Vec2, Vec3, Vec4, Vec4Swizzles};

use super::raster::{ClipVertex, Fragment, Varyings};
use super::surface::Surface;
use crate::asset::ResourcePool;
use crate::renderer::material::{decode_emissive, decode_specular};
use crate::renderer::vertex::{normal_matrix, Vertex};
use crate::renderer::{Program, TargetHandle, TextureHandle};

pub(crate) type Outputs = [Vec4; 3];

const FXAA_REDUCE_MIN: f32 = 1.0 / 128.0;
const FXAA_REDUCE_MUL: f32 = 1.0 / 8.0;
const FXAA_SPAN_MAX: f32 = 8.0;
const BLUR_TAP_PAIRS: usize = 7;

/// Input surfaces resolved once per draw call.
pub(crate) struct Bindings<'a> {
    slots: [Option<&'a Surface>; 3],
    texture: Option<&'a Surface>,
}

impl<'a> Bindings<'a> {
    /// `None` when a required input target no longer exists.
    pub fn resolve(
        program: &Program,
        targets: &'a ResourcePool<Surface>,
        textures: &'a ResourcePool<Surface>,
    ) -> Option<Self> {
        let target = |handle: TargetHandle| targets.get(handle.cast()).filter(|s| s.width > 0);
        let texture = |handle: Option<TextureHandle>| handle.and_then(|h| textures.get(h.cast()));

        let (slots, texture) = match program {
            Program::Geometry { texture: t, .. } => ([None, None, None], texture(*t)),
            Program::ClearGBuffer { .. } | Program::Clear { .. } => ([None, None, None], None),
            Program::DirectionalLight { gbuffer, .. } | Program::PointLight { gbuffer, .. } => (
                [
                    Some(target(gbuffer.colour)?),
                    Some(target(gbuffer.normal)?),
                    Some(target(gbuffer.depth)?),
                ],
                None,
            ),
            Program::Emissive { colour_map } => ([Some(target(*colour_map)?), None, None], None),
            Program::Compose {
                colour_map,
                light_map,
                depth_map,
                ..
            } => (
                [
                    Some(target(*colour_map)?),
                    Some(target(*light_map)?),
                    Some(target(*depth_map)?),
                ],
                None,
            ),
            Program::Fxaa { source }
            | Program::BloomExtract { source, .. }
            | Program::GaussianBlur { source, .. }
            | Program::Copy { source }
            | Program::CopyDepth { source } => ([Some(target(*source)?), None, None], None),
            Program::BloomCombine { base, bloom, .. } => (
                [Some(target(*base)?), Some(target(*bloom)?), None],
                None,
            ),
            Program::Billboard {
                texture: t,
                depth_map,
                ..
            } => ([Some(target(*depth_map)?), None, None], texture(*t)),
        };

        Some(Self { slots, texture })
    }

    fn slot(&self, index: usize) -> Option<&'a Surface> {
        self.slots[index]
    }

    fn texel(&self, uv: Vec2) -> Vec4 {
        self.texture
            .map(|texture| texture.sample_repeat(uv))
            .unwrap_or(Vec4::ONE)
    }
}

/// Per-draw vertex transform, with matrices prepared once.
pub(crate) enum VertexStage {
    Mesh {
        world: Mat4,
        view_projection: Mat4,
        normal: Mat3,
    },
    Billboard {
        centre: Vec3,
        right: Vec3,
        up: Vec3,
        size: Vec2,
        view_projection: Mat4,
    },
}

impl VertexStage {
    pub fn new(program: &Program) -> Self {
        match program {
            Program::Geometry {
                world,
                view_projection,
                ..
            }
            | Program::PointLight {
                world,
                view_projection,
                ..
            } => VertexStage::Mesh {
                world: *world,
                view_projection: *view_projection,
                normal: normal_matrix(world),
            },
            Program::Billboard {
                position,
                size,
                view,
                projection,
                ..
            } => VertexStage::Billboard {
                centre: *position,
                right: view.row(0).xyz(),
                up: view.row(1).xyz(),
                size: *size,
                view_projection: *projection * *view,
            },
            _ => VertexStage::Mesh {
                world: Mat4::IDENTITY,
                view_projection: Mat4::IDENTITY,
                normal: Mat3::IDENTITY,
            },
        }
    }

    pub fn run(&self, vertex: &Vertex) -> ClipVertex {
        match self {
            VertexStage::Mesh {
                world,
                view_projection,
                normal,
            } => {
                let world_position = world.transform_point3(vertex.position());
                ClipVertex {
                    clip: *view_projection * world_position.extend(1.0),
                    varyings: Varyings {
                        world: world_position,
                        normal: *normal * vertex.normal(),
                        uv: vertex.uv(),
                    },
                }
            }
            VertexStage::Billboard {
                centre,
                right,
                up,
                size,
                view_projection,
            } => {
                let corner = vertex.position();
                let world_position =
                    *centre + *right * (corner.x * size.x) + *up * (corner.y * size.y);
                ClipVertex {
                    clip: *view_projection * world_position.extend(1.0),
                    varyings: Varyings {
                        world: world_position,
                        normal: vertex.normal(),
                        uv: vertex.uv(),
                    },
                }
            }
        }
    }
}

/// Runs the fragment half of `program`; `None` discards the fragment.
pub(crate) fn shade(program: &Program, bindings: &Bindings, fragment: &Fragment) -> Option<Outputs> {
    match program {
        Program::Geometry {
            colour,
            specular_power,
            ..
        } => {
            let texel = bindings.texel(fragment.varyings.uv);
            if texel.w < 0.5 {
                return None;
            }
            let normal = fragment.varyings.normal.normalize_or_zero();
            Some([
                (texel.xyz() * colour.xyz()).extend(colour.w),
                (normal * 0.5 + 0.5).extend(specular_power / 255.0),
                Vec4::new(fragment.depth, 0.0, 0.0, 0.0),
            ])
        }
        Program::ClearGBuffer { colour } => Some([
            *colour,
            Vec4::new(0.5, 0.5, 0.5, 0.0),
            Vec4::new(1.0, 0.0, 0.0, 0.0),
        ]),
        Program::Clear { colour } => Some([*colour; 3]),
        Program::DirectionalLight {
            direction,
            colour,
            intensity,
            camera_position,
            inverse_view_projection,
            ..
        } => {
            let surface = GSample::read(bindings, fragment.uv, inverse_view_projection)?;
            let light = surface.illuminate(-direction.normalize_or_zero(), *camera_position);
            Some(single((light.diffuse * *colour * *intensity).extend(light.specular * *intensity)))
        }
        Program::PointLight {
            position,
            colour,
            radius,
            intensity,
            camera_position,
            inverse_view_projection,
            ..
        } => {
            let surface = GSample::read(bindings, fragment.uv, inverse_view_projection)?;
            let to_light = *position - surface.world;
            let attenuation = (1.0 - to_light.length() / radius.max(f32::EPSILON)).clamp(0.0, 1.0);
            let light = surface.illuminate(to_light.normalize_or_zero(), *camera_position);
            let scale = attenuation * *intensity;
            Some(single((light.diffuse * *colour * scale).extend(light.specular * scale)))
        }
        Program::Emissive { .. } => {
            let colour = bindings.slot(0)?.fetch(fragment.uv);
            let emissive = decode_emissive(colour.w);
            Some(single(Vec4::new(emissive, emissive, emissive, 0.0)))
        }
        Program::Compose {
            ambient_colour,
            ambient_intensity,
            ..
        } => {
            let colour = bindings.slot(0)?.fetch(fragment.uv);
            let depth = bindings.slot(2)?.fetch(fragment.uv).x;
            if depth >= 1.0 {
                return Some(single(colour.xyz().extend(1.0)));
            }
            let light = bindings.slot(1)?.fetch(fragment.uv);
            let ambient = *ambient_colour * *ambient_intensity;
            let lit = colour.xyz() * (ambient + light.xyz()) + Vec3::splat(light.w);
            Some(single(lit.extend(1.0)))
        }
        Program::Fxaa { .. } => Some(single(fxaa(bindings.slot(0)?, fragment.uv))),
        Program::BloomExtract { threshold, .. } => {
            let colour = bindings.slot(0)?.sample_linear(fragment.uv);
            let range = (1.0 - threshold).max(f32::EPSILON);
            Some(single(((colour - Vec4::splat(*threshold)) / range).clamp(Vec4::ZERO, Vec4::ONE)))
        }
        Program::GaussianBlur {
            direction,
            blur_amount,
            ..
        } => Some(single(gaussian_blur(
            bindings.slot(0)?,
            fragment.uv,
            *direction,
            *blur_amount,
        ))),
        Program::BloomCombine {
            bloom_intensity,
            base_intensity,
            bloom_saturation,
            base_saturation,
            ..
        } => {
            let base = bindings.slot(0)?.sample_linear(fragment.uv);
            let bloom = bindings.slot(1)?.sample_linear(fragment.uv);
            let bloom = adjust_saturation(bloom, *bloom_saturation) * *bloom_intensity;
            let base = adjust_saturation(base, *base_saturation) * *base_intensity;
            let base = base * (Vec4::ONE - bloom.clamp(Vec4::ZERO, Vec4::ONE));
            Some(single((base + bloom).xyz().extend(1.0)))
        }
        Program::Copy { .. } => Some(single(bindings.slot(0)?.sample_linear(fragment.uv))),
        Program::CopyDepth { .. } => {
            let depth = bindings.slot(0)?.fetch(fragment.uv).x;
            Some(single(Vec3::splat(depth).extend(1.0)))
        }
        Program::Billboard { .. } => {
            let scene_depth = bindings.slot(0)?.fetch(fragment.uv).x;
            if fragment.depth > scene_depth {
                return None;
            }
            let texel = bindings.texel(fragment.varyings.uv);
            if texel.w < 0.5 {
                return None;
            }
            Some(single(texel))
        }
    }
}

fn single(value: Vec4) -> Outputs {
    [value, Vec4::ZERO, Vec4::ZERO]
}

/// One decoded G-buffer texel.
struct GSample {
    albedo_w: f32,
    normal: Vec3,
    specular_power: f32,
    world: Vec3,
}

struct Illumination {
    diffuse: f32,
    specular: f32,
}

impl GSample {
    /// `None` for background pixels, which carry a zero normal.
    fn read(bindings: &Bindings, uv: Vec2, inverse_view_projection: &Mat4) -> Option<Self> {
        let colour = bindings.slot(0)?.fetch(uv);
        let encoded = bindings.slot(1)?.fetch(uv);
        let depth = bindings.slot(2)?.fetch(uv).x;

        let normal = encoded.xyz() * 2.0 - 1.0;
        if normal.length_squared() < 0.25 {
            return Some(Self {
                albedo_w: colour.w,
                normal: Vec3::ZERO,
                specular_power: 0.0,
                world: Vec3::ZERO,
            });
        }

        let ndc = Vec4::new(uv.x * 2.0 - 1.0, (1.0 - uv.y) * 2.0 - 1.0, depth, 1.0);
        let position = *inverse_view_projection * ndc;
        Some(Self {
            albedo_w: colour.w,
            normal: normal.normalize(),
            specular_power: encoded.w * 255.0,
            world: position.xyz() / position.w,
        })
    }

    fn illuminate(&self, to_light: Vec3, camera_position: Vec3) -> Illumination {
        if self.normal == Vec3::ZERO {
            return Illumination {
                diffuse: 0.0,
                specular: 0.0,
            };
        }

        let n_dot_l = self.normal.dot(to_light).max(0.0);
        let amount = decode_specular(self.albedo_w);
        let specular = if self.specular_power > 0.0 && amount > 0.0 && n_dot_l > 0.0 {
            let reflection = (2.0 * n_dot_l * self.normal - to_light).normalize_or_zero();
            let to_camera = (camera_position - self.world).normalize_or_zero();
            amount * reflection.dot(to_camera).max(0.0).powf(self.specular_power)
        } else {
            0.0
        };

        Illumination {
            diffuse: n_dot_l,
            specular,
        }
    }
}

fn luma(colour: Vec4) -> f32 {
    colour.xyz().dot(Vec3::new(0.299, 0.587, 0.114))
}

fn fxaa(source: &Surface, uv: Vec2) -> Vec4 {
    let texel = Vec2::new(1.0 / source.width as f32, 1.0 / source.height as f32);
    let at = |offset: Vec2| source.sample_linear(uv + offset * texel);

    let luma_nw = luma(at(Vec2::new(-1.0, -1.0)));
    let luma_ne = luma(at(Vec2::new(1.0, -1.0)));
    let luma_sw = luma(at(Vec2::new(-1.0, 1.0)));
    let luma_se = luma(at(Vec2::new(1.0, 1.0)));
    let centre = source.sample_linear(uv);
    let luma_m = luma(centre);

    let luma_min = luma_m.min(luma_nw.min(luma_ne).min(luma_sw.min(luma_se)));
    let luma_max = luma_m.max(luma_nw.max(luma_ne).max(luma_sw.max(luma_se)));

    let mut dir = Vec2::new(
        -((luma_nw + luma_ne) - (luma_sw + luma_se)),
        (luma_nw + luma_sw) - (luma_ne + luma_se),
    );
    let reduce =
        ((luma_nw + luma_ne + luma_sw + luma_se) * 0.25 * FXAA_REDUCE_MUL).max(FXAA_REDUCE_MIN);
    let rcp_min = 1.0 / (dir.x.abs().min(dir.y.abs()) + reduce);
    dir = (dir * rcp_min).clamp(Vec2::splat(-FXAA_SPAN_MAX), Vec2::splat(FXAA_SPAN_MAX)) * texel;

    let rgb_a = 0.5
        * (source.sample_linear(uv + dir * (1.0 / 3.0 - 0.5))
            + source.sample_linear(uv + dir * (2.0 / 3.0 - 0.5)));
    let rgb_b = rgb_a * 0.5
        + 0.25 * (source.sample_linear(uv + dir * -0.5) + source.sample_linear(uv + dir * 0.5));

    let luma_b = luma(rgb_b);
    let result = if luma_b < luma_min || luma_b > luma_max {
        rgb_a
    } else {
        rgb_b
    };
    result.xyz().extend(centre.w)
}

fn gaussian(n: f32, theta: f32) -> f32 {
    (1.0 / (2.0 * std::f32::consts::PI * theta).sqrt()) * (-(n * n) / (2.0 * theta * theta)).exp()
}

/// Fifteen tap separable blur, taps paired to lean on bilinear filtering.
pub(crate) fn blur_weights(blur_amount: f32) -> ([f32; 1 + 2 * BLUR_TAP_PAIRS], [f32; 1 + 2 * BLUR_TAP_PAIRS]) {
    let theta = blur_amount.max(f32::EPSILON);
    let mut weights = [0.0; 1 + 2 * BLUR_TAP_PAIRS];
    let mut offsets = [0.0; 1 + 2 * BLUR_TAP_PAIRS];

    weights[0] = gaussian(0.0, theta);
    let mut total = weights[0];
    for i in 0..BLUR_TAP_PAIRS {
        let weight = gaussian((i + 1) as f32, theta);
        weights[i * 2 + 1] = weight;
        weights[i * 2 + 2] = weight;
        total += weight * 2.0;

        let offset = i as f32 * 2.0 + 1.5;
        offsets[i * 2 + 1] = offset;
        offsets[i * 2 + 2] = -offset;
    }
    for weight in &mut weights {
        *weight /= total;
    }
    (weights, offsets)
}

fn gaussian_blur(source: &Surface, uv: Vec2, direction: Vec2, blur_amount: f32) -> Vec4 {
    let texel = Vec2::new(1.0 / source.width as f32, 1.0 / source.height as f32);
    let (weights, offsets) = blur_weights(blur_amount);
    weights
        .iter()
        .zip(offsets)
        .map(|(weight, offset)| source.sample_linear(uv + direction * texel * offset) * *weight)
        .sum()
}

fn adjust_saturation(colour: Vec4, saturation: f32) -> Vec4 {
    let grey = colour.xyz().dot(Vec3::new(0.3, 0.59, 0.11));
    Vec4::splat(grey).lerp(colour, saturation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_weights_sum_to_one() {
        let (weights, offsets) = blur_weights(4.0);
        let total: f32 = weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert_eq!(offsets[0], 0.0);
        assert_eq!(offsets[1], -offsets[2]);
    }

    #[test]
    fn saturation_zero_is_grey() {
        let grey = adjust_saturation(Vec4::new(1.0, 0.0, 0.0, 1.0), 0.0);
        assert!((grey.x - 0.3).abs() < 1e-6);
        assert!((grey.y - 0.3).abs() < 1e-6);
    }

    #[test]
    fn facing_light_is_fully_diffuse() {
        let sample = GSample {
            albedo_w: 0.0,
            normal: Vec3::Y,
            specular_power: 0.0,
            world: Vec3::ZERO,
        };
        let lit = sample.illuminate(Vec3::Y, Vec3::new(0.0, 5.0, 5.0));
        assert!((lit.diffuse - 1.0).abs() < 1e-6);
        assert_eq!(lit.specular, 0.0);

        let grazing = sample.illuminate(Vec3::NEG_Y, Vec3::ZERO);
        assert_eq!(grazing.diffuse, 0.0);
    }

    #[test]
    fn specular_peaks_along_reflection() {
        let sample = GSample {
            albedo_w: 0.49,
            normal: Vec3::Y,
            specular_power: 16.0,
            world: Vec3::ZERO,
        };
        let to_light = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mirror = Vec3::new(-1.0, 1.0, 0.0) * 10.0;
        let off_axis = Vec3::new(1.0, 1.0, 0.0) * 10.0;

        let peak = sample.illuminate(to_light, mirror).specular;
        assert!((peak - 1.0).abs() < 1e-4);
        assert!(sample.illuminate(to_light, off_axis).specular < peak);
    }
}
