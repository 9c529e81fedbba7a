use generational_arena::Arena;
use glam::Mat4;
use log::{trace, warn};

use super::context::{BufferId, BufferUsage, DrawCall, RenderContext};

struct HeadlessBuffer {
    usage: BufferUsage,
    data: Vec<u8>,
}

/// CPU-only render context. Buffers are byte vectors and draws are
/// recorded instead of executed.
#[derive(Default)]
pub struct HeadlessContext {
    buffers: Arena<HeadlessBuffer>,
    draws: Vec<DrawCall>,
    palette: Vec<Mat4>,
    buffers_created: usize,
    bytes_written: usize,
}

impl HeadlessContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forgets the previous frame's draws and bone palettes.
    pub fn begin_frame(&mut self) {
        self.draws.clear();
        self.palette.clear();
    }

    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    pub fn buffers_created(&self) -> usize {
        self.buffers_created
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    pub fn buffer_usage(&self, buffer: BufferId) -> Option<BufferUsage> {
        self.buffers.get(buffer.0).map(|b| b.usage)
    }

    /// Copies the whole buffer out as `T`s.
    pub fn read_buffer<T: bytemuck::Pod>(&self, buffer: BufferId) -> Vec<T> {
        let Some(b) = self.buffers.get(buffer.0) else {
            return vec![];
        };
        let mut out = vec![T::zeroed(); b.data.len() / size_of::<T>()];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut out);
        let len = bytes.len();
        bytes.copy_from_slice(&b.data[..len]);
        out
    }
}

impl RenderContext for HeadlessContext {
    fn create_buffer(&mut self, label: &str, usage: BufferUsage, size: u64) -> BufferId {
        trace!("create {usage:?} buffer '{label}' of {size} bytes");
        self.buffers_created += 1;
        BufferId(self.buffers.insert(HeadlessBuffer {
            usage,
            data: vec![0; size as usize],
        }))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, bytes: &[u8]) {
        let Some(b) = self.buffers.get_mut(buffer.0) else {
            warn!("write to destroyed buffer {buffer:?}");
            return;
        };
        let start = offset as usize;
        assert!(
            start + bytes.len() <= b.data.len(),
            "write of {} bytes at {start} overflows buffer of {} bytes",
            bytes.len(),
            b.data.len()
        );
        b.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.bytes_written += bytes.len();
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(buffer.0);
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        self.draws.push(*call);
    }

    fn submit_skinning(&mut self, palette: &[Mat4]) -> u32 {
        let offset = self.palette.len() as u32;
        self.palette.extend_from_slice(palette);
        offset
    }
}
