// scene/static_geometry.rs
//
// Per-entity merge of static drawables. Geometry is grouped by material into
// one shared vertex/index buffer; each batch is a range of that buffer.

use std::collections::BTreeMap;

use glam::Mat4;

use crate::asset::MeshData;
use crate::renderer::{DrawContext, GeometryHandle, GraphicsDevice, Material, MaterialKey, Vertex};
use crate::scene::ComponentId;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticBatch {
    pub material: Material,
    pub start_index: u32,
    pub primitive_count: u32,
}

#[derive(Debug)]
struct StaticSource {
    component: ComponentId,
    material: Material,
    /// Already transformed into entity space.
    mesh: MeshData,
}

#[derive(Debug, Default)]
pub struct StaticGeometryBuilder {
    sources: Vec<StaticSource>,
    batches: Vec<StaticBatch>,
    geometry: Option<GeometryHandle>,
    vertex_count: usize,
    rebuilds: u32,
}

impl StaticGeometryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `mesh` moved by `matrix` for the next `apply_builder`.
    pub fn add_to_builder(
        &mut self,
        component: ComponentId,
        mesh: &MeshData,
        matrix: &Mat4,
        material: Material,
    ) {
        self.sources.push(StaticSource {
            component,
            material,
            mesh: mesh.transformed(matrix),
        });
    }

    pub fn remove(&mut self, component: ComponentId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.component != component);
        self.sources.len() != before
    }

    /// Rebuilds every batch from scratch and uploads the merged buffers,
    /// releasing the previous upload.
    pub fn apply_builder(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(old) = self.geometry.take() {
            device.release_geometry(old);
        }
        self.batches.clear();
        self.vertex_count = 0;
        self.rebuilds += 1;

        let mut groups: BTreeMap<MaterialKey, (Material, Vec<&StaticSource>)> = BTreeMap::new();
        for source in &self.sources {
            groups
                .entry(source.material.key())
                .or_insert_with(|| (source.material, Vec::new()))
                .1
                .push(source);
        }

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        let mut batches = Vec::with_capacity(groups.len());

        for (material, sources) in groups.into_values() {
            let start_index = indices.len() as u32;
            for source in sources {
                let base = vertices.len() as u32;
                vertices.extend_from_slice(source.mesh.vertices());
                indices.extend(source.mesh.indices().iter().map(|i| base + i));
            }
            let primitive_count = (indices.len() as u32 - start_index) / 3;
            if primitive_count > 0 {
                batches.push(StaticBatch {
                    material,
                    start_index,
                    primitive_count,
                });
            }
        }
        self.batches = batches;

        if indices.is_empty() {
            log::debug!("Static geometry is empty after rebuild");
            return;
        }

        self.vertex_count = vertices.len();
        self.geometry = Some(device.create_geometry(&vertices, &indices));
        log::debug!(
            "Static geometry rebuilt: {} batches, {} vertices, {} indices",
            self.batches.len(),
            vertices.len(),
            indices.len()
        );
    }

    /// No-op until something static has been applied.
    pub fn draw(&self, context: &mut DrawContext, world: Mat4) {
        let Some(geometry) = self.geometry else {
            return;
        };
        for batch in &self.batches {
            context.draw_static_batch(
                geometry,
                batch.start_index,
                batch.primitive_count,
                world,
                &batch.material,
            );
        }
    }

    pub fn dispose(&mut self, device: &mut dyn GraphicsDevice) {
        if let Some(geometry) = self.geometry.take() {
            device.release_geometry(geometry);
        }
        self.sources.clear();
        self.batches.clear();
        self.vertex_count = 0;
    }

    pub fn batches(&self) -> &[StaticBatch] {
        &self.batches
    }

    pub fn has_buffers(&self) -> bool {
        self.geometry.is_some()
    }

    pub fn geometry(&self) -> Option<GeometryHandle> {
        self.geometry
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Number of full rebuilds so far.
    pub fn rebuild_count(&self) -> u32 {
        self.rebuilds
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::primitives::{cube_mesh, plane_mesh};
    use crate::renderer::soft::SoftDevice;
    use glam::Vec3;

    fn id(raw: u64) -> ComponentId {
        ComponentId(raw)
    }

    #[test]
    fn groups_by_material() {
        let mut device = SoftDevice::new(1, 1);
        let mut builder = StaticGeometryBuilder::new();
        let cube = MeshData::from_primitive(cube_mesh());
        let red = Material::white().with_tint(Vec3::X);

        builder.add_to_builder(id(1), &cube, &Mat4::IDENTITY, Material::white());
        builder.add_to_builder(id(2), &cube, &Mat4::from_translation(Vec3::X * 3.0), red);
        builder.add_to_builder(id(3), &cube, &Mat4::from_translation(Vec3::X * 6.0), Material::white());
        builder.apply_builder(&mut device);

        assert_eq!(builder.batches().len(), 2);
        let total: u32 = builder.batches().iter().map(|b| b.primitive_count).sum();
        assert_eq!(total, 36);
        assert_eq!(builder.vertex_count(), 72);
        assert_eq!(device.live_geometry(), 1);

        let white = builder
            .batches()
            .iter()
            .find(|b| b.material == Material::white())
            .unwrap();
        assert_eq!(white.primitive_count, 24);
    }

    #[test]
    fn rebuild_replaces_previous_upload() {
        let mut device = SoftDevice::new(1, 1);
        let mut builder = StaticGeometryBuilder::new();
        let plane = MeshData::from_primitive(plane_mesh(2.0));

        builder.add_to_builder(id(1), &plane, &Mat4::IDENTITY, Material::white());
        builder.apply_builder(&mut device);
        let first = builder.geometry();

        builder.add_to_builder(id(2), &plane, &Mat4::IDENTITY, Material::white());
        builder.apply_builder(&mut device);

        assert_ne!(builder.geometry(), first);
        assert_eq!(device.live_geometry(), 1);
        assert_eq!(builder.rebuild_count(), 2);
        assert_eq!(builder.batches()[0].primitive_count, 4);
    }

    #[test]
    fn removing_last_source_drops_buffers() {
        let mut device = SoftDevice::new(1, 1);
        let mut builder = StaticGeometryBuilder::new();
        let plane = MeshData::from_primitive(plane_mesh(2.0));

        builder.add_to_builder(id(7), &plane, &Mat4::IDENTITY, Material::white());
        builder.apply_builder(&mut device);
        assert!(builder.remove(id(7)));
        builder.apply_builder(&mut device);

        assert!(!builder.has_buffers());
        assert!(builder.batches().is_empty());
        assert_eq!(device.live_geometry(), 0);
    }
}
