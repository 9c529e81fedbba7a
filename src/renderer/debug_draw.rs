use glam::{Mat4, Vec3};

use crate::{config::DebugDrawConfig, math::Aabb};

use super::{
    context::{MaterialId, RenderContext},
    instance_batch::InstanceBatch,
    vertex::LineVertex,
};

// corner pairs, corners indexed by bit pattern zyx
const BOX_EDGES: [u32; 24] = [
    0, 1, 2, 3, 4, 5, 6, 7, // along x
    0, 2, 1, 3, 4, 6, 5, 7, // along y
    0, 4, 1, 5, 2, 6, 3, 7, // along z
];

/// Per-frame line geometry: queue anything, flush once, start over.
pub struct DebugDraw {
    lines: InstanceBatch<LineVertex>,
}

impl DebugDraw {
    pub fn new(config: &DebugDrawConfig) -> Self {
        Self {
            lines: InstanceBatch::new("debug lines", config.initial_lines * 2, config.initial_lines * 2),
        }
    }

    pub fn line(&mut self, from: Vec3, to: Vec3, color: [f32; 4]) {
        self.lines
            .queue_draw(&[LineVertex::at(from), LineVertex::at(to)], &[0, 1], &Mat4::IDENTITY, &color);
    }

    /// The 12 edges of `aabb` moved by `transform`.
    pub fn aabb(&mut self, aabb: &Aabb, transform: &Mat4, color: [f32; 4]) {
        if aabb.is_empty() {
            return;
        }
        let corners = aabb.corners().map(LineVertex::at);
        self.lines.queue_draw(&corners, &BOX_EDGES, transform, &color);
    }

    pub fn queued_lines(&self) -> usize {
        self.lines.index_count() / 2
    }

    pub fn flush<C: RenderContext>(&mut self, ctx: &mut C, view_projection: &Mat4) {
        self.lines.draw_lines(ctx, view_projection, MaterialId::default());
    }
}
