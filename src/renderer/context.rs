use generational_arena::Index;
use glam::Mat4;
use serde::{Deserialize, Serialize};

/// Handle to a GPU-side buffer owned by a [`RenderContext`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub Index);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    Vertex,
    Index,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    Triangles,
    Lines,
    Points,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MaterialId(pub u32);

/// Vertex layout a batch was built with; selects the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexKind {
    Mesh,
    Line,
}

/// One indexed draw over a vertex/index buffer pair, `[0, index_count)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCall {
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub index_count: u32,
    pub vertex_kind: VertexKind,
    pub primitive: Primitive,
    pub transform: Mat4,
    pub material: MaterialId,
}

/// Everything batching and skinning submission need from the renderer.
///
/// Passed explicitly into draw and submission calls.
pub trait RenderContext {
    /// `size` is in bytes.
    fn create_buffer(&mut self, label: &str, usage: BufferUsage, size: u64) -> BufferId;
    fn write_buffer(&mut self, buffer: BufferId, offset: u64, bytes: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);
    fn draw_indexed(&mut self, call: &DrawCall);
    /// Appends a bone palette for this frame and returns the index of its
    /// first matrix.
    fn submit_skinning(&mut self, palette: &[Mat4]) -> u32;
}
