use glam::{Vec2, Vec4};

use crate::renderer::TargetFormat;

/// CPU-side pixel storage for render targets, textures and the back buffer.
#[derive(Clone, Debug, Default)]
pub struct Surface {
    pub(crate) width: u32,
    pub(crate) height: u32,
    format: Option<TargetFormat>,
    texels: Vec<Vec4>,
    depth: Option<Vec<f32>>,
}

impl Surface {
    pub fn new(width: u32, height: u32, format: TargetFormat, depth: bool) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = (width * height) as usize;
        Self {
            width,
            height,
            format: Some(format),
            texels: vec![Vec4::ZERO; count],
            depth: depth.then(|| vec![1.0; count]),
        }
    }

    pub fn from_rgba8(width: u32, height: u32, rgba: &[u8]) -> Self {
        let mut surface = Self::new(width, height, TargetFormat::Rgba8, false);
        for (texel, bytes) in surface.texels.iter_mut().zip(rgba.chunks_exact(4)) {
            *texel = Vec4::new(
                bytes[0] as f32,
                bytes[1] as f32,
                bytes[2] as f32,
                bytes[3] as f32,
            ) / 255.0;
        }
        surface
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    pub(crate) fn index(&self, x: u32, y: u32) -> usize {
        (y * self.width + x) as usize
    }

    pub fn texel(&self, x: u32, y: u32) -> Vec4 {
        self.texels[self.index(x.min(self.width - 1), y.min(self.height - 1))]
    }

    pub(crate) fn texel_at(&self, index: usize) -> Vec4 {
        self.texels[index]
    }

    /// Writes with the format's precision applied.
    pub(crate) fn store(&mut self, index: usize, value: Vec4) {
        self.texels[index] = match self.format {
            Some(TargetFormat::Rgba8) | None => quantize_unorm8(value),
            Some(TargetFormat::R32Float) => Vec4::new(value.x, 0.0, 0.0, 0.0),
        };
    }

    pub(crate) fn depth_at(&self, index: usize) -> Option<f32> {
        self.depth.as_ref().map(|depth| depth[index])
    }

    pub(crate) fn store_depth(&mut self, index: usize, value: f32) {
        if let Some(depth) = self.depth.as_mut() {
            depth[index] = value;
        }
    }

    /// Nearest texel under a 0..1 coordinate, clamped to the edge.
    pub fn fetch(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.width as f32).floor().clamp(0.0, (self.width - 1) as f32) as u32;
        let y = (uv.y * self.height as f32).floor().clamp(0.0, (self.height - 1) as f32) as u32;
        self.texel(x, y)
    }

    /// Nearest texel with wrap-around addressing, used for material textures.
    pub fn sample_repeat(&self, uv: Vec2) -> Vec4 {
        let wrapped = uv - uv.floor();
        self.fetch(wrapped)
    }

    /// Bilinear sample clamped to the edge.
    pub fn sample_linear(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.width as f32 - 0.5;
        let y = uv.y * self.height as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;

        let max_x = (self.width - 1) as f32;
        let max_y = (self.height - 1) as f32;
        let at = |tx: f32, ty: f32| {
            self.texel(tx.clamp(0.0, max_x) as u32, ty.clamp(0.0, max_y) as u32)
        };

        let top = at(x0, y0).lerp(at(x0 + 1.0, y0), fx);
        let bottom = at(x0, y0 + 1.0).lerp(at(x0 + 1.0, y0 + 1.0), fx);
        top.lerp(bottom, fy)
    }

    pub fn to_rgba8(&self) -> Vec<[u8; 4]> {
        self.texels
            .iter()
            .map(|texel| {
                let c = texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.0;
                [
                    c.x.round() as u8,
                    c.y.round() as u8,
                    c.z.round() as u8,
                    c.w.round() as u8,
                ]
            })
            .collect()
    }
}

fn quantize_unorm8(value: Vec4) -> Vec4 {
    (value.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round() / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba8_store_clamps_and_quantizes() {
        let mut surface = Surface::new(1, 1, TargetFormat::Rgba8, false);
        surface.store(0, Vec4::new(1.7, -0.2, 0.5, 0.25));
        let texel = surface.texel(0, 0);

        assert_eq!(texel.x, 1.0);
        assert_eq!(texel.y, 0.0);
        assert!((texel.z - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(surface.to_rgba8()[0], [255, 0, 128, 64]);
    }

    #[test]
    fn float_store_keeps_precision() {
        let mut surface = Surface::new(1, 1, TargetFormat::R32Float, false);
        surface.store(0, Vec4::new(0.123_456_7, 9.0, 9.0, 9.0));
        assert_eq!(surface.texel(0, 0), Vec4::new(0.123_456_7, 0.0, 0.0, 0.0));
    }

    #[test]
    fn linear_sample_blends_neighbours() {
        let surface = Surface::from_rgba8(2, 1, &[0, 0, 0, 255, 255, 255, 255, 255]);
        let mid = surface.sample_linear(Vec2::new(0.5, 0.5));
        assert!((mid.x - 0.5).abs() < 1e-5);
        assert_eq!(surface.fetch(Vec2::new(0.9, 0.5)).x, 1.0);
    }

    #[test]
    fn depth_attachment_starts_at_far_plane() {
        let surface = Surface::new(2, 2, TargetFormat::Rgba8, true);
        assert_eq!(surface.depth_at(3), Some(1.0));
        assert!(Surface::new(2, 2, TargetFormat::Rgba8, false)
            .depth_at(0)
            .is_none());
    }
}
