use std::ops::Range;

use glam::Mat4;
use log::{debug, trace};

use crate::config::BatchingConfig;

use super::{
    context::{BufferId, BufferUsage, DrawCall, MaterialId, Primitive, RenderContext},
    vertex::InstanceVertex,
};

/// Where one queued instance lives inside a batch. Ends are exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InstanceHandle {
    pub start_vertex: u32,
    pub end_vertex: u32,
    pub start_index: u32,
    pub end_index: u32,
}
impl InstanceHandle {
    pub fn vertex_count(&self) -> usize {
        (self.end_vertex - self.start_vertex) as usize
    }

    pub fn index_count(&self) -> usize {
        (self.end_index - self.start_index) as usize
    }

    pub fn vertex_range(&self) -> Range<usize> {
        self.start_vertex as usize..self.end_vertex as usize
    }

    pub fn index_range(&self) -> Range<usize> {
        self.start_index as usize..self.end_index as usize
    }
}

struct GpuBuffers {
    vertex: BufferId,
    index: BufferId,
    vertex_capacity: usize,
    index_capacity: usize,
}

/// Growable vertex/index buffer pair filled with transformed copies of base
/// meshes and drawn with a single indexed draw.
///
/// The CPU storage is always filled up to capacity so writes are plain
/// indexed stores. GPU buffers are only recreated after an expand.
pub struct InstanceBatch<V: InstanceVertex> {
    label: String,
    vertices: Vec<V>,
    indices: Vec<u32>,
    vertex_cursor: usize,
    index_cursor: usize,
    growth_factor: f32,
    clear_post_draw: bool,
    dirty: bool,
    free_slots: Vec<InstanceHandle>,
    gpu: Option<GpuBuffers>,
    expansions: usize,
}

impl<V: InstanceVertex> InstanceBatch<V> {
    pub fn new(label: impl Into<String>, vertex_capacity: usize, index_capacity: usize) -> Self {
        Self {
            label: label.into(),
            vertices: vec![V::default(); vertex_capacity],
            indices: vec![0; index_capacity],
            vertex_cursor: 0,
            index_cursor: 0,
            growth_factor: BatchingConfig::default().growth_factor,
            clear_post_draw: true,
            dirty: false,
            free_slots: vec![],
            gpu: None,
            expansions: 0,
        }
    }

    /// Room for `config.initial_instances` copies of a base mesh with the
    /// given vertex and index counts.
    pub fn for_mesh(
        label: impl Into<String>,
        base_vertices: usize,
        base_indices: usize,
        config: &BatchingConfig,
    ) -> Self {
        Self::new(
            label,
            base_vertices * config.initial_instances,
            base_indices * config.initial_instances,
        )
        .with_growth_factor(config.growth_factor)
    }

    pub fn with_growth_factor(mut self, growth_factor: f32) -> Self {
        assert!(growth_factor > 1.0, "growth factor must be greater than 1");
        self.growth_factor = growth_factor;
        self
    }

    /// Batches that persist across frames turn this off.
    pub fn with_clear_post_draw(mut self, clear_post_draw: bool) -> Self {
        self.clear_post_draw = clear_post_draw;
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_cursor
    }

    pub fn index_count(&self) -> usize {
        self.index_cursor
    }

    pub fn vertex_capacity(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_capacity(&self) -> usize {
        self.indices.len()
    }

    pub fn vertices(&self) -> &[V] {
        &self.vertices[..self.vertex_cursor]
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices[..self.index_cursor]
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn free_slot_count(&self) -> usize {
        self.free_slots.len()
    }

    /// Number of times the CPU storage has grown.
    pub fn expansion_count(&self) -> usize {
        self.expansions
    }

    pub fn should_expand(&self, incoming_vertices: usize, incoming_indices: usize) -> bool {
        self.vertex_cursor + incoming_vertices > self.vertices.len()
            || self.index_cursor + incoming_indices > self.indices.len()
    }

    /// Grows both buffers by the growth factor, or to exactly what the
    /// incoming instance needs when that is larger.
    pub fn expand(&mut self, incoming_vertices: usize, incoming_indices: usize) {
        let vertex_capacity = grown(self.vertices.len(), self.vertex_cursor + incoming_vertices, self.growth_factor);
        let index_capacity = grown(self.indices.len(), self.index_cursor + incoming_indices, self.growth_factor);
        debug!(
            "expanding batch '{}' from {}/{} to {}/{} vertices/indices",
            self.label,
            self.vertices.len(),
            self.indices.len(),
            vertex_capacity,
            index_capacity
        );
        self.vertices.resize(vertex_capacity, V::default());
        self.indices.resize(index_capacity, 0);
        self.expansions += 1;
    }

    /// Appends a transformed copy of the base mesh, reusing a freed slot of
    /// exactly the same size when one exists.
    pub fn queue_draw(
        &mut self,
        base_vertices: &[V],
        base_indices: &[u32],
        transform: &Mat4,
        extra: &V::Extra,
    ) -> InstanceHandle {
        debug_assert!(
            base_indices.iter().all(|&i| (i as usize) < base_vertices.len()),
            "base index out of range of base vertices"
        );
        let reusable = self
            .free_slots
            .iter()
            .position(|slot| slot.vertex_count() == base_vertices.len() && slot.index_count() == base_indices.len());
        let handle = match reusable {
            Some(pos) => self.free_slots.swap_remove(pos),
            None => {
                if self.should_expand(base_vertices.len(), base_indices.len()) {
                    self.expand(base_vertices.len(), base_indices.len());
                }
                let handle = InstanceHandle {
                    start_vertex: self.vertex_cursor as u32,
                    end_vertex: (self.vertex_cursor + base_vertices.len()) as u32,
                    start_index: self.index_cursor as u32,
                    end_index: (self.index_cursor + base_indices.len()) as u32,
                };
                self.vertex_cursor += base_vertices.len();
                self.index_cursor += base_indices.len();
                handle
            }
        };

        let start = handle.start_vertex;
        for (dst, &index) in self.indices[handle.index_range()].iter_mut().zip(base_indices) {
            *dst = index + start;
        }
        self.write_vertices(handle.start_vertex as usize, base_vertices, transform, extra);
        handle
    }

    /// Overwrites the instance's vertices with degenerate ones. The slot is
    /// kept and may be reused by a later [`queue_draw`](Self::queue_draw) of
    /// the same size.
    pub fn remove_instance(&mut self, handle: &InstanceHandle) {
        assert!(
            handle.end_vertex as usize <= self.vertex_cursor && handle.end_index as usize <= self.index_cursor,
            "instance {handle:?} is not inside the written part of batch '{}'",
            self.label
        );
        debug_assert!(!self.free_slots.contains(handle), "instance {handle:?} removed twice");
        self.vertices[handle.vertex_range()].fill(V::default());
        self.free_slots.push(*handle);
        self.dirty = true;
    }

    /// Rewrites the instance starting at `start_vertex` in place.
    pub fn update_instance(&mut self, start_vertex: u32, base_vertices: &[V], transform: &Mat4, extra: &V::Extra) {
        let start = start_vertex as usize;
        assert!(
            start + base_vertices.len() <= self.vertex_cursor,
            "update of {} vertices at {start} runs past the {} written vertices of batch '{}'",
            base_vertices.len(),
            self.vertex_cursor,
            self.label
        );
        self.write_vertices(start, base_vertices, transform, extra);
    }

    fn write_vertices(&mut self, start: usize, base_vertices: &[V], transform: &Mat4, extra: &V::Extra) {
        let prepared = V::prepare(transform, extra);
        for (dst, base) in self.vertices[start..start + base_vertices.len()].iter_mut().zip(base_vertices) {
            *dst = base.instantiate(&prepared);
        }
        self.dirty = true;
    }

    /// Drops everything queued so far. Capacity is kept.
    pub fn clear(&mut self) {
        self.vertex_cursor = 0;
        self.index_cursor = 0;
        self.free_slots.clear();
    }

    pub fn draw_triangles<C: RenderContext>(&mut self, ctx: &mut C, transform: &Mat4, material: MaterialId) {
        self.draw(ctx, Primitive::Triangles, transform, material);
    }

    pub fn draw_lines<C: RenderContext>(&mut self, ctx: &mut C, transform: &Mat4, material: MaterialId) {
        self.draw(ctx, Primitive::Lines, transform, material);
    }

    pub fn draw_points<C: RenderContext>(&mut self, ctx: &mut C, transform: &Mat4, material: MaterialId) {
        self.draw(ctx, Primitive::Points, transform, material);
    }

    /// Uploads if dirty and issues one draw over `[0, index_count)`.
    pub fn draw<C: RenderContext>(&mut self, ctx: &mut C, primitive: Primitive, transform: &Mat4, material: MaterialId) {
        let (vertex_buffer, index_buffer) = self.sync(ctx);
        if self.index_cursor > 0 {
            trace!("drawing batch '{}' with {} indices", self.label, self.index_cursor);
            ctx.draw_indexed(&DrawCall {
                vertex_buffer,
                index_buffer,
                index_count: self.index_cursor as u32,
                vertex_kind: V::KIND,
                primitive,
                transform: *transform,
                material,
            });
        }
        if self.clear_post_draw {
            self.clear();
        }
    }

    /// Frees the GPU buffers. They are recreated on the next draw.
    pub fn release<C: RenderContext>(&mut self, ctx: &mut C) {
        if let Some(gpu) = self.gpu.take() {
            ctx.destroy_buffer(gpu.vertex);
            ctx.destroy_buffer(gpu.index);
        }
    }

    fn sync<C: RenderContext>(&mut self, ctx: &mut C) -> (BufferId, BufferId) {
        let stale = self.gpu.as_ref().map_or(true, |gpu| {
            gpu.vertex_capacity != self.vertices.len() || gpu.index_capacity != self.indices.len()
        });
        if stale {
            self.release(ctx);
            debug!(
                "allocating gpu buffers for batch '{}': {} vertices, {} indices",
                self.label,
                self.vertices.len(),
                self.indices.len()
            );
            self.gpu = Some(GpuBuffers {
                vertex: ctx.create_buffer(
                    &format!("{} vertices", self.label),
                    BufferUsage::Vertex,
                    (self.vertices.len() * size_of::<V>()) as u64,
                ),
                index: ctx.create_buffer(
                    &format!("{} indices", self.label),
                    BufferUsage::Index,
                    (self.indices.len() * size_of::<u32>()) as u64,
                ),
                vertex_capacity: self.vertices.len(),
                index_capacity: self.indices.len(),
            });
            self.dirty = true;
        }

        let Some(gpu) = &self.gpu else {
            unreachable!("gpu buffers were just allocated");
        };
        let ids = (gpu.vertex, gpu.index);
        if self.dirty {
            ctx.write_buffer(ids.0, 0, bytemuck::cast_slice(&self.vertices[..self.vertex_cursor]));
            ctx.write_buffer(ids.1, 0, bytemuck::cast_slice(&self.indices[..self.index_cursor]));
            self.dirty = false;
        }
        ids
    }
}

fn grown(capacity: usize, required: usize, growth_factor: f32) -> usize {
    let scaled = (capacity as f32 * growth_factor).ceil() as usize;
    scaled.max(required)
}
