//! Triangle setup and scan conversion for the software backend.
//!
//! Barycentric edge functions with perspective-correct varyings. Pixel centres
//! sit at `+0.5`; shared edges follow the top-left rule so adjacent triangles
//! never touch a pixel twice.

use glam::{Vec2, Vec3, Vec4};

use crate::renderer::{CullMode, Rect};

/// Attributes interpolated across a triangle.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub(crate) struct Varyings {
    pub world: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
}

impl Varyings {
    fn weighted(items: [&Varyings; 3], weights: [f32; 3]) -> Self {
        let mut out = Varyings::default();
        for (item, weight) in items.into_iter().zip(weights) {
            out.world += item.world * weight;
            out.normal += item.normal * weight;
            out.uv += item.uv * weight;
        }
        out
    }

    fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            world: self.world.lerp(other.world, t),
            normal: self.normal.lerp(other.normal, t),
            uv: self.uv.lerp(other.uv, t),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct ClipVertex {
    pub clip: Vec4,
    pub varyings: Varyings,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Fragment {
    pub x: u32,
    pub y: u32,
    /// Pixel centre relative to the viewport, 0..1 with y pointing down.
    pub uv: Vec2,
    /// Normalised device depth, 0 at the near plane.
    pub depth: f32,
    pub varyings: Varyings,
}

struct ScreenVertex {
    position: Vec2,
    depth: f32,
    inv_w: f32,
    varyings: Varyings,
}

/// Clips against the near plane, then scan converts every resulting
/// triangle. Fragments arrive in row-major order per triangle.
pub(crate) fn rasterize_triangle(
    triangle: [ClipVertex; 3],
    viewport: Rect,
    cull: CullMode,
    mut emit: impl FnMut(Fragment),
) {
    let polygon = clip_near(&triangle);
    if polygon.len() < 3 {
        return;
    }

    let screen: Vec<ScreenVertex> = polygon
        .iter()
        .map(|vertex| to_screen(vertex, viewport))
        .collect();

    for i in 1..screen.len() - 1 {
        scan_triangle([&screen[0], &screen[i], &screen[i + 1]], viewport, cull, &mut emit);
    }
}

/// Fragment at the pixel centre of `(x, y)` inside `viewport`.
pub(crate) fn full_screen_fragment(x: u32, y: u32, viewport: Rect) -> Fragment {
    Fragment {
        x,
        y,
        uv: viewport_uv(x, y, viewport),
        depth: 1.0,
        varyings: Varyings::default(),
    }
}

fn viewport_uv(x: u32, y: u32, viewport: Rect) -> Vec2 {
    Vec2::new(
        (x - viewport.x) as f32 + 0.5,
        (y - viewport.y) as f32 + 0.5,
    ) / Vec2::new(viewport.width as f32, viewport.height as f32)
}

fn clip_near(triangle: &[ClipVertex; 3]) -> Vec<ClipVertex> {
    let inside = |v: &ClipVertex| v.clip.z >= 0.0 && v.clip.w > f32::EPSILON;
    if triangle.iter().all(inside) {
        return triangle.to_vec();
    }

    let mut out = Vec::with_capacity(4);
    for i in 0..3 {
        let current = &triangle[i];
        let next = &triangle[(i + 1) % 3];
        let current_in = current.clip.z >= 0.0;
        let next_in = next.clip.z >= 0.0;

        if current_in {
            out.push(*current);
        }
        if current_in != next_in {
            let t = current.clip.z / (current.clip.z - next.clip.z);
            out.push(ClipVertex {
                clip: current.clip.lerp(next.clip, t),
                varyings: current.varyings.lerp(&next.varyings, t),
            });
        }
    }
    out.retain(|v| v.clip.w > f32::EPSILON);
    out
}

fn to_screen(vertex: &ClipVertex, viewport: Rect) -> ScreenVertex {
    let inv_w = 1.0 / vertex.clip.w;
    let ndc = vertex.clip.truncate() * inv_w;
    ScreenVertex {
        position: Vec2::new(
            viewport.x as f32 + (ndc.x * 0.5 + 0.5) * viewport.width as f32,
            viewport.y as f32 + (0.5 - ndc.y * 0.5) * viewport.height as f32,
        ),
        depth: ndc.z,
        inv_w,
        varyings: vertex.varyings,
    }
}

/// Twice the signed area; positive when `a, b, c` run clockwise on screen.
fn edge(a: Vec2, b: Vec2, c: Vec2) -> f32 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Top edges run right along a horizontal, left edges run up the screen.
fn is_top_left(from: Vec2, to: Vec2) -> bool {
    (from.y == to.y && to.x > from.x) || to.y < from.y
}

fn scan_triangle(
    vertices: [&ScreenVertex; 3],
    viewport: Rect,
    cull: CullMode,
    emit: &mut impl FnMut(Fragment),
) {
    let [a, mut b, mut c] = vertices;
    let area = edge(a.position, b.position, c.position);
    if area == 0.0 || !area.is_finite() {
        return;
    }

    let clockwise = area > 0.0;
    match cull {
        CullMode::CullClockwiseFace if clockwise => return,
        CullMode::CullCounterClockwiseFace if !clockwise => return,
        _ => {}
    }
    if !clockwise {
        std::mem::swap(&mut b, &mut c);
    }
    let area = area.abs();

    let min = a.position.min(b.position).min(c.position);
    let max = a.position.max(b.position).max(c.position);
    let x0 = min.x.floor().max(viewport.x as f32) as u32;
    let y0 = min.y.floor().max(viewport.y as f32) as u32;
    let x1 = (max.x.ceil() as i64).min((viewport.x + viewport.width) as i64);
    let y1 = (max.y.ceil() as i64).min((viewport.y + viewport.height) as i64);
    if x1 <= x0 as i64 || y1 <= y0 as i64 {
        return;
    }

    let bias = [
        is_top_left(b.position, c.position),
        is_top_left(c.position, a.position),
        is_top_left(a.position, b.position),
    ];

    for y in y0..y1 as u32 {
        for x in x0..x1 as u32 {
            let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
            let weights = [
                edge(b.position, c.position, p),
                edge(c.position, a.position, p),
                edge(a.position, b.position, p),
            ];
            let covered = weights
                .iter()
                .zip(bias)
                .all(|(&w, top_left)| w > 0.0 || (w == 0.0 && top_left));
            if !covered {
                continue;
            }

            let linear = weights.map(|w| w / area);
            let depth = linear[0] * a.depth + linear[1] * b.depth + linear[2] * c.depth;
            if !(0.0..=1.0).contains(&depth) {
                continue;
            }

            let perspective = [
                linear[0] * a.inv_w,
                linear[1] * b.inv_w,
                linear[2] * c.inv_w,
            ];
            let total: f32 = perspective.iter().sum();
            let perspective = perspective.map(|w| w / total);

            emit(Fragment {
                x,
                y,
                uv: viewport_uv(x, y, viewport),
                depth,
                varyings: Varyings::weighted(
                    [&a.varyings, &b.varyings, &c.varyings],
                    perspective,
                ),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, z: f32) -> ClipVertex {
        ClipVertex {
            clip: Vec4::new(x, y, z, 1.0),
            varyings: Varyings::default(),
        }
    }

    fn viewport(size: u32) -> Rect {
        Rect {
            x: 0,
            y: 0,
            width: size,
            height: size,
        }
    }

    fn count(triangle: [ClipVertex; 3], cull: CullMode) -> usize {
        let mut n = 0;
        rasterize_triangle(triangle, viewport(8), cull, |_| n += 1);
        n
    }

    // Clockwise on screen: top-left, top-right, bottom-left.
    fn clockwise() -> [ClipVertex; 3] {
        [
            vertex(-1.0, 1.0, 0.5),
            vertex(1.0, 1.0, 0.5),
            vertex(-1.0, -1.0, 0.5),
        ]
    }

    #[test]
    fn cull_mode_discards_matching_winding() {
        let cw = clockwise();
        let ccw = [cw[0], cw[2], cw[1]];

        assert!(count(cw, CullMode::None) > 0);
        assert_eq!(count(cw, CullMode::CullClockwiseFace), 0);
        assert_eq!(count(cw, CullMode::CullCounterClockwiseFace), count(cw, CullMode::None));
        assert_eq!(count(ccw, CullMode::CullCounterClockwiseFace), 0);
        assert_eq!(count(ccw, CullMode::CullClockwiseFace), count(cw, CullMode::None));
    }

    #[test]
    fn two_halves_of_a_square_cover_each_pixel_once() {
        let tl = vertex(-1.0, 1.0, 0.5);
        let tr = vertex(1.0, 1.0, 0.5);
        let br = vertex(1.0, -1.0, 0.5);
        let bl = vertex(-1.0, -1.0, 0.5);

        let mut hits = vec![0u32; 64];
        for triangle in [[tl, tr, br], [tl, br, bl]] {
            rasterize_triangle(triangle, viewport(8), CullMode::None, |f| {
                hits[(f.y * 8 + f.x) as usize] += 1;
            });
        }
        assert!(hits.iter().all(|&h| h == 1), "{:?}", hits);
    }

    #[test]
    fn triangle_behind_near_plane_is_clipped_away() {
        let behind = [
            vertex(-1.0, 1.0, -0.5),
            vertex(1.0, 1.0, -0.5),
            vertex(-1.0, -1.0, -0.5),
        ];
        assert_eq!(count(behind, CullMode::None), 0);
    }

    #[test]
    fn full_screen_uv_is_viewport_relative() {
        let rect = Rect {
            x: 4,
            y: 2,
            width: 2,
            height: 2,
        };
        let first = full_screen_fragment(4, 2, rect);
        assert_eq!((first.x, first.y), (4, 2));
        assert_eq!(first.uv, Vec2::new(0.25, 0.25));
        assert_eq!(full_screen_fragment(5, 3, rect).uv, Vec2::new(0.75, 0.75));
    }
}
