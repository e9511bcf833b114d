use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Mat4, Vec2, Vec3};

/// Position/normal/texcoord vertex shared by every mesh the engine draws.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable, Debug, PartialEq)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn position(&self) -> Vec3 {
        Vec3::from(self.position)
    }

    pub fn normal(&self) -> Vec3 {
        Vec3::from(self.normal)
    }

    pub fn uv(&self) -> Vec2 {
        Vec2::from(self.uv)
    }

    /// Returns the vertex moved by `matrix`; normals go through the inverse
    /// transpose so non-uniform scale keeps them perpendicular.
    pub fn transformed(&self, matrix: &Mat4, normal_matrix: &Mat3) -> Self {
        let position = matrix.transform_point3(self.position());
        let normal = (*normal_matrix * self.normal()).normalize_or_zero();
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: self.uv,
        }
    }
}

#[cfg(feature = "gpu")]
impl Vertex {
    pub const ATTRS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,
        1 => Float32x3,
        2 => Float32x2
    ];

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[inline]
pub fn v(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex {
        position,
        normal,
        uv,
    }
}

pub fn normal_matrix(matrix: &Mat4) -> Mat3 {
    Mat3::from_mat4(*matrix).inverse().transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 32);
    }

    #[test]
    fn transformed_keeps_normals_unit_length_under_scale() {
        let vertex = v([1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.5, 0.5]);
        let matrix = Mat4::from_scale(Vec3::new(3.0, 0.5, 1.0));
        let moved = vertex.transformed(&matrix, &normal_matrix(&matrix));

        assert_eq!(moved.position, [3.0, 0.0, 0.0]);
        assert!((moved.normal() - Vec3::Y).length() < 1e-5);
        assert_eq!(moved.uv, vertex.uv);
    }
}
