//! The GPU boundary.
//!
//! The scene layer never talks to a graphics API directly. It allocates
//! buffers and textures through [`GpuResources`] and submits self-contained
//! [`DrawCall`]s through [`DrawSubmitter`]. Two backends implement both:
//!
//! - [`headless::HeadlessGpu`] records everything and owns no device
//! - [`wgpu_backend::WgpuGpu`] uploads to a `wgpu` device and encodes the
//!   recorded calls into a render pass

use std::num::NonZeroU32;

use crate::config::Topology;

pub mod headless;
pub mod wgpu_backend;

/// Handle of a GPU buffer. Only valid for the backend that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub NonZeroU32);

/// Handle of a GPU texture. Only valid for the backend that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub NonZeroU32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// Per-vertex attribute data.
    Vertex,
    /// `u32` triangle indices.
    Index,
}

/// Decoded RGBA8 image plus the smaller mip levels derived from it.
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// Level 0 first, each level half the size of the previous one.
    pub levels: Vec<image::RgbaImage>,
}

/// Allocation side of a GPU backend.
pub trait GpuResources {
    fn create_buffer(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BufferId;

    /// Uploads a 2D texture sampled with linear filtering, mipmaps and
    /// clamp-to-edge wrapping.
    fn create_texture(&mut self, label: &str, data: &TextureData) -> TextureId;

    fn release_buffer(&mut self, id: BufferId);

    fn release_texture(&mut self, id: TextureId);
}

/// One indexed draw of one sub-shape.
///
/// Every binding the draw needs travels with the call, so nothing a previous
/// call bound can leak into the next one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub texture: Option<TextureId>,
    pub positions: BufferId,
    pub normals: Option<BufferId>,
    pub uvs: Option<BufferId>,
    pub indices: BufferId,
    pub index_count: u32,
    pub vertex_count: u32,
    pub topology: Topology,
}

/// Submission side of a GPU backend.
pub trait DrawSubmitter {
    /// Sets the `mvp` uniform used by every following draw.
    fn set_mvp(&mut self, location: u32, mvp: [[f32; 4]; 4]);

    fn draw_indexed(&mut self, call: DrawCall);
}
