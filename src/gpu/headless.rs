//! Headless backend: no device, everything is recorded.
//!
//! Handles are handed out from a counter that never repeats, so two uploads
//! can never alias. Draws are kept in submission order together with the
//! `mvp` that was current when they were issued; draws before the first
//! `mvp` are dropped like the `wgpu` backend drops them.

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use super::{BufferId, BufferKind, DrawCall, DrawSubmitter, GpuResources, TextureData, TextureId};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferRecord {
    pub label: String,
    pub kind: BufferKind,
    pub size: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureRecord {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RecordedDraw {
    pub location: u32,
    pub mvp: [[f32; 4]; 4],
    pub call: DrawCall,
}

#[derive(Debug)]
pub struct HeadlessGpu {
    next_id: u32,
    buffers: BTreeMap<BufferId, BufferRecord>,
    textures: BTreeMap<TextureId, TextureRecord>,
    uploads: usize,
    current_mvp: Option<(u32, [[f32; 4]; 4])>,
    draws: Vec<RecordedDraw>,
}

impl HeadlessGpu {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            buffers: BTreeMap::new(),
            textures: BTreeMap::new(),
            uploads: 0,
            current_mvp: None,
            draws: Vec::new(),
        }
    }

    fn next(&mut self) -> NonZeroU32 {
        let id = NonZeroU32::new(self.next_id).unwrap_or(NonZeroU32::MIN);
        self.next_id += 1;
        id
    }

    /// Buffers currently alive.
    pub fn buffers(&self) -> &BTreeMap<BufferId, BufferRecord> {
        &self.buffers
    }

    /// Textures currently alive.
    pub fn textures(&self) -> &BTreeMap<TextureId, TextureRecord> {
        &self.textures
    }

    /// Number of buffer and texture uploads ever made.
    pub fn upload_count(&self) -> usize {
        self.uploads
    }

    pub fn draws(&self) -> &[RecordedDraw] {
        &self.draws
    }

    /// Hands out the draws recorded so far and starts a fresh list.
    pub fn take_draws(&mut self) -> Vec<RecordedDraw> {
        std::mem::take(&mut self.draws)
    }
}

impl Default for HeadlessGpu {
    fn default() -> Self {
        Self::new()
    }
}

impl GpuResources for HeadlessGpu {
    fn create_buffer(&mut self, label: &str, kind: BufferKind, contents: &[u8]) -> BufferId {
        let id = BufferId(self.next());
        self.uploads += 1;
        self.buffers.insert(
            id,
            BufferRecord {
                label: label.to_string(),
                kind,
                size: contents.len(),
            },
        );
        id
    }

    fn create_texture(&mut self, label: &str, data: &TextureData) -> TextureId {
        let id = TextureId(self.next());
        self.uploads += 1;
        self.textures.insert(
            id,
            TextureRecord {
                label: label.to_string(),
                width: data.width,
                height: data.height,
                mip_levels: data.levels.len() as u32,
            },
        );
        id
    }

    fn release_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_none() {
            log::warn!("Released unknown buffer {:?}", id);
        }
    }

    fn release_texture(&mut self, id: TextureId) {
        if self.textures.remove(&id).is_none() {
            log::warn!("Released unknown texture {:?}", id);
        }
    }
}

impl DrawSubmitter for HeadlessGpu {
    fn set_mvp(&mut self, location: u32, mvp: [[f32; 4]; 4]) {
        self.current_mvp = Some((location, mvp));
    }

    fn draw_indexed(&mut self, call: DrawCall) {
        let Some((location, mvp)) = self.current_mvp else {
            log::warn!("Draw issued before any mvp was set, skipping");
            return;
        };
        self.draws.push(RecordedDraw {
            location,
            mvp,
            call,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Topology;

    fn call(gpu: &mut HeadlessGpu) -> DrawCall {
        let positions = gpu.create_buffer("positions", BufferKind::Vertex, &[0; 36]);
        let indices = gpu.create_buffer("indices", BufferKind::Index, &[0; 12]);
        DrawCall {
            texture: None,
            positions,
            normals: None,
            uvs: None,
            indices,
            index_count: 3,
            vertex_count: 3,
            topology: Topology::TriangleList,
        }
    }

    #[test]
    fn draws_without_an_mvp_are_dropped() {
        let mut gpu = HeadlessGpu::new();
        let call = call(&mut gpu);

        gpu.draw_indexed(call);
        assert!(gpu.draws().is_empty());

        let mvp = [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0], [0.0, 0.0, 1.0, 0.0], [0.0, 0.0, 0.0, 1.0]];
        gpu.set_mvp(2, mvp);
        gpu.draw_indexed(call);
        assert_eq!(gpu.draws(), [RecordedDraw { location: 2, mvp, call }]);
    }

    #[test]
    fn handles_are_never_reused() {
        let mut gpu = HeadlessGpu::new();
        let first = gpu.create_buffer("a", BufferKind::Vertex, &[1, 2, 3, 4]);
        gpu.release_buffer(first);
        let second = gpu.create_buffer("b", BufferKind::Vertex, &[1, 2, 3, 4]);
        assert_ne!(first, second);
        assert_eq!(gpu.upload_count(), 2);
        assert_eq!(gpu.buffers().len(), 1);
    }
}
