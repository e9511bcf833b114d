use glam::Mat4;

use crate::error::{EngineError, Result};
use crate::math::BoundingSphere;
use crate::renderer::vertex::normal_matrix;
use crate::renderer::Vertex;

/// CPU copy of an indexed triangle list.
///
/// Uploading is the owner's job: dynamic drawables upload their own copy,
/// static ones hand it to the static geometry builder.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshData {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    bounds: BoundingSphere,
}

impl MeshData {
    /// Fails if any index points past the vertex list.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self> {
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(EngineError::InvalidGeometry {
                index,
                vertex_count: vertices.len(),
            });
        }

        let bounds = BoundingSphere::from_points(vertices.iter().map(Vertex::position));
        Ok(Self {
            vertices,
            indices,
            bounds,
        })
    }

    /// Wraps one of the procedural builders in `renderer::primitives`.
    pub fn from_primitive((vertices, indices): (Vec<Vertex>, Vec<u32>)) -> Self {
        let bounds = BoundingSphere::from_points(vertices.iter().map(Vertex::position));
        Self {
            vertices,
            indices,
            bounds,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn primitive_count(&self) -> u32 {
        (self.indices.len() / 3) as u32
    }

    pub fn is_empty(&self) -> bool {
        self.indices.len() < 3
    }

    /// Bounds in the mesh's own space.
    pub fn bounds(&self) -> BoundingSphere {
        self.bounds
    }

    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let normals = normal_matrix(matrix);
        let vertices: Vec<Vertex> = self
            .vertices
            .iter()
            .map(|vertex| vertex.transformed(matrix, &normals))
            .collect();
        let bounds = BoundingSphere::from_points(vertices.iter().map(Vertex::position));
        Self {
            vertices,
            indices: self.indices.clone(),
            bounds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::primitives::cube_mesh;
    use glam::Vec3;

    #[test]
    fn out_of_range_index_is_rejected() {
        let (vertices, _) = cube_mesh();
        let err = MeshData::new(vertices, vec![0, 1, 99]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::InvalidGeometry {
                index: 99,
                vertex_count: 24
            }
        ));
    }

    #[test]
    fn transformed_moves_bounds() {
        let cube = MeshData::from_primitive(cube_mesh());
        assert!(cube.bounds().center.abs_diff_eq(Vec3::ZERO, 1e-5));

        let moved = cube.transformed(&Mat4::from_translation(Vec3::new(10.0, 0.0, 0.0)));
        assert!(moved.bounds().center.abs_diff_eq(Vec3::new(10.0, 0.0, 0.0), 1e-5));
        assert_eq!(moved.primitive_count(), 12);
    }
}
