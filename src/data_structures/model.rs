//! Renderable models.
//!
//! A [`Model`] is what one model file turns into on the GPU: one [`SubShape`]
//! per mesh group, each holding its own buffers and optional texture. Models
//! are shared between every scene object that names the same file.

use crate::{
    config::Topology,
    gpu::{BufferId, DrawCall, DrawSubmitter, GpuResources, TextureId},
};

/// GPU residency of one mesh group.
///
/// Optional attributes are `None` rather than a zero handle; positions and
/// indices always exist.
#[derive(Clone, Debug, PartialEq)]
pub struct SubShape {
    pub name: String,
    pub positions: BufferId,
    pub normals: Option<BufferId>,
    pub uvs: Option<BufferId>,
    pub indices: BufferId,
    pub index_count: u32,
    pub vertex_count: u32,
    pub texture: Option<TextureId>,
}

impl SubShape {
    pub fn draw_call(&self, topology: Topology) -> DrawCall {
        DrawCall {
            texture: self.texture,
            positions: self.positions,
            normals: self.normals,
            uvs: self.uvs,
            indices: self.indices,
            index_count: self.index_count,
            vertex_count: self.vertex_count,
            topology,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct Model {
    pub name: String,
    pub shapes: Vec<SubShape>,
}

impl Model {
    /// Issues one indexed draw per sub-shape, in load order.
    pub fn draw(&self, target: &mut dyn DrawSubmitter, topology: Topology) {
        for shape in &self.shapes {
            target.draw_indexed(shape.draw_call(topology));
        }
    }

    /// Frees every buffer and texture of this model.
    pub fn release(&self, gpu: &mut dyn GpuResources) {
        for shape in &self.shapes {
            gpu.release_buffer(shape.positions);
            if let Some(normals) = shape.normals {
                gpu.release_buffer(normals);
            }
            if let Some(uvs) = shape.uvs {
                gpu.release_buffer(uvs);
            }
            gpu.release_buffer(shape.indices);
            if let Some(texture) = shape.texture {
                gpu.release_texture(texture);
            }
        }
    }
}
