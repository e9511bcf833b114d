// asset/model.rs

use std::path::Path;

use glam::Mat4;

use crate::asset::MeshData;
use crate::error::{EngineError, Result};
use crate::renderer::vertex::v;

/// Loads every mesh primitive of a glTF file, baked into model space.
///
/// glTF winds front faces counter-clockwise; triangles are flipped on import
/// so they follow the engine's clockwise convention.
pub fn load_gltf(path: impl AsRef<Path>, scale: f32) -> Result<Vec<MeshData>> {
    let path = path.as_ref();
    log::info!("Loading glTF model: {:?}", path);
    let (document, buffers, _) = gltf::import(path)?;
    collect_meshes(&document, &buffers, scale)
}

/// Same as [`load_gltf`] for a self-contained `.gltf`/`.glb` in memory.
pub fn load_gltf_slice(bytes: &[u8], scale: f32) -> Result<Vec<MeshData>> {
    let (document, buffers, _) = gltf::import_slice(bytes)?;
    collect_meshes(&document, &buffers, scale)
}

fn collect_meshes(
    document: &gltf::Document,
    buffers: &[gltf::buffer::Data],
    scale: f32,
) -> Result<Vec<MeshData>> {
    let root = Mat4::from_scale(glam::Vec3::splat(scale));
    let mut meshes = Vec::new();

    match document.default_scene().or_else(|| document.scenes().next()) {
        Some(scene) => {
            for node in scene.nodes() {
                load_node(&node, root, buffers, &mut meshes)?;
            }
        }
        None => {
            for mesh in document.meshes() {
                load_mesh(&mesh, root, buffers, &mut meshes)?;
            }
        }
    }

    log::debug!("Imported {} primitives", meshes.len());
    Ok(meshes)
}

fn load_node(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    let local = Mat4::from_cols_array_2d(&node.transform().matrix());
    let world = parent * local;

    if let Some(mesh) = node.mesh() {
        log::trace!("Node {:?} carries mesh {}", node.name(), mesh.index());
        load_mesh(&mesh, world, buffers, meshes)?;
    }
    for child in node.children() {
        load_node(&child, world, buffers, meshes)?;
    }
    Ok(())
}

fn load_mesh(
    mesh: &gltf::Mesh,
    matrix: Mat4,
    buffers: &[gltf::buffer::Data],
    meshes: &mut Vec<MeshData>,
) -> Result<()> {
    for primitive in mesh.primitives() {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            log::warn!("Skipping non-triangle primitive in mesh {}", mesh.index());
            continue;
        }
        meshes.push(load_primitive(&primitive, buffers)?.transformed(&matrix));
    }
    Ok(())
}

fn load_primitive(primitive: &gltf::Primitive, buffers: &[gltf::buffer::Data]) -> Result<MeshData> {
    let reader = primitive.reader(|buffer| Some(buffers[buffer.index()].0.as_slice()));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(EngineError::MissingAttribute("POSITION"))?
        .collect();

    let normals: Vec<[f32; 3]> = reader
        .read_normals()
        .map(|n| n.collect())
        .unwrap_or_else(|| vec![[0.0, 1.0, 0.0]; positions.len()]);

    let uvs: Vec<[f32; 2]> = reader
        .read_tex_coords(0)
        .map(|uv| uv.into_f32().collect())
        .unwrap_or_else(|| vec![[0.0, 0.0]; positions.len()]);

    let mut indices: Vec<u32> = reader
        .read_indices()
        .map(|i| i.into_u32().collect())
        .unwrap_or_else(|| (0..positions.len() as u32).collect());
    indices.truncate(indices.len() / 3 * 3);
    for triangle in indices.chunks_exact_mut(3) {
        triangle.swap(1, 2);
    }

    log::trace!(
        "Primitive: {} vertices, {} indices",
        positions.len(),
        indices.len()
    );

    let vertices = positions
        .iter()
        .zip(normals.iter().chain(std::iter::repeat(&[0.0, 1.0, 0.0])))
        .zip(uvs.iter().chain(std::iter::repeat(&[0.0, 0.0])))
        .map(|((position, normal), uv)| v(*position, *normal, *uv))
        .collect();

    MeshData::new(vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    // One triangle, counter-clockwise in glTF terms, under a node moved +2 on X.
    fn triangle_gltf() -> Vec<u8> {
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let indices: [u16; 3] = [0, 1, 2];
        let mut buffer = bytemuck::cast_slice::<f32, u8>(&positions).to_vec();
        buffer.extend_from_slice(bytemuck::cast_slice(&indices));
        buffer.extend_from_slice(&[0, 0]);

        let json = format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [{{ "nodes": [0] }}],
  "nodes": [{{ "mesh": 0, "translation": [2.0, 0.0, 0.0] }}],
  "meshes": [{{ "primitives": [{{ "attributes": {{ "POSITION": 0 }}, "indices": 1 }}] }}],
  "buffers": [{{ "byteLength": {len}, "uri": "data:application/octet-stream;base64,{data}" }}],
  "bufferViews": [
    {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }},
    {{ "buffer": 0, "byteOffset": 36, "byteLength": 6 }}
  ],
  "accessors": [
    {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
       "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] }},
    {{ "bufferView": 1, "componentType": 5123, "count": 3, "type": "SCALAR" }}
  ]
}}"#,
            len = buffer.len(),
            data = base64::encode(&buffer)
        );
        json.into_bytes()
    }

    #[test]
    fn imports_node_transformed_triangle() {
        let meshes = load_gltf_slice(&triangle_gltf(), 1.0).unwrap();
        assert_eq!(meshes.len(), 1);

        let mesh = &meshes[0];
        assert_eq!(mesh.vertices().len(), 3);
        assert_eq!(mesh.vertices()[1].position(), Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(mesh.indices(), &[0, 2, 1]);
    }

    #[test]
    fn scale_applies_to_positions() {
        let meshes = load_gltf_slice(&triangle_gltf(), 10.0).unwrap();
        assert_eq!(meshes[0].vertices()[2].position(), Vec3::new(20.0, 10.0, 0.0));
    }

    #[test]
    fn garbage_is_a_model_error() {
        let err = load_gltf_slice(b"not a model", 1.0).unwrap_err();
        assert!(matches!(err, EngineError::Model(_)));
    }
}
