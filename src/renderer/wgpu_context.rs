use std::collections::HashMap;

use generational_arena::Arena;
use glam::Mat4;
use log::{debug, warn};

use super::{
    bones::{BoneMat34, BonesBinding},
    context::{BufferId, BufferUsage, DrawCall, MaterialId, Primitive, RenderContext, VertexKind},
};

/// Bind group slots every pipeline drawn through [`WgpuContext`] must use.
pub const TRANSFORM_GROUP: u32 = 0;
pub const MATERIAL_GROUP: u32 = 1;
pub const BONES_GROUP: u32 = 2;

const MAT4_SIZE: u64 = size_of::<Mat4>() as u64;

/// One uniform buffer holding every draw's transform, bound with a dynamic
/// offset per draw.
struct TransformUniforms {
    layout: wgpu::BindGroupLayout,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    staged: Vec<u8>,
}

static TRANSFORM_ENTRIES: [wgpu::BindGroupLayoutEntry; 1] = [wgpu::BindGroupLayoutEntry {
    binding: 0,
    visibility: wgpu::ShaderStages::VERTEX,
    ty: wgpu::BindingType::Buffer {
        ty: wgpu::BufferBindingType::Uniform,
        has_dynamic_offset: true,
        min_binding_size: wgpu::BufferSize::new(MAT4_SIZE),
    },
    count: None,
}];

impl TransformUniforms {
    fn desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            entries: &TRANSFORM_ENTRIES,
            label: Some("Draw Transform Bind Group Layout"),
        }
    }

    fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&Self::desc());
        let stride = MAT4_SIZE.next_multiple_of(device.limits().min_uniform_buffer_offset_alignment as u64);
        let (buffer, bind_group) = Self::allocate(device, &layout, stride * 64);
        Self {
            layout,
            buffer,
            bind_group,
            stride,
            staged: vec![],
        }
    }

    fn allocate(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, size: u64) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Draw Transform Uniforms"),
            size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Draw Transform Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(MAT4_SIZE),
                }),
            }],
        });
        (buffer, bind_group)
    }

    /// Returns the dynamic offset of the pushed transform.
    fn push(&mut self, transform: &Mat4) -> u32 {
        let offset = self.staged.len();
        self.staged.extend_from_slice(bytemuck::bytes_of(transform));
        self.staged.resize(offset + self.stride as usize, 0);
        offset as u32
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue) {
        let needed = self.staged.len() as u64;
        if needed > self.buffer.size() {
            let size = needed.next_power_of_two();
            debug!("growing draw transform uniforms to {size} bytes");
            (self.buffer, self.bind_group) = Self::allocate(device, &self.layout, size);
        }
        if needed > 0 {
            queue.write_buffer(&self.buffer, 0, &self.staged);
        }
    }
}

pub fn primitive_state(primitive: Primitive) -> wgpu::PrimitiveState {
    let topology = match primitive {
        Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
        Primitive::Lines => wgpu::PrimitiveTopology::LineList,
        Primitive::Points => wgpu::PrimitiveTopology::PointList,
    };
    wgpu::PrimitiveState {
        topology,
        cull_mode: match primitive {
            Primitive::Triangles => Some(wgpu::Face::Back),
            _ => None,
        },
        ..Default::default()
    }
}

struct RecordedDraw {
    call: DrawCall,
    transform_offset: u32,
}

/// Whether `call` reads a vertex buffer an earlier draw of this frame
/// already reads.
fn reuses_vertex_buffer(draws: &[RecordedDraw], call: &DrawCall) -> bool {
    draws.iter().any(|d| d.call.vertex_buffer == call.vertex_buffer)
}

/// [`RenderContext`] backed by real wgpu buffers.
///
/// Draws are recorded during the frame, uploaded by [`prepare`](Self::prepare)
/// and replayed into a render pass by [`encode`](Self::encode).
///
/// Buffer writes go through `Queue::write_buffer` and all land before the
/// pass runs, so a batch drawn twice in one frame shows its last contents
/// in both draws. Draw each batch at most once per frame.
pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    buffers: Arena<wgpu::Buffer>,
    draws: Vec<RecordedDraw>,
    transforms: TransformUniforms,
    bones_layout: wgpu::BindGroupLayout,
    bones: BonesBinding,
    palette: Vec<BoneMat34>,
    pipelines: HashMap<(VertexKind, Primitive), wgpu::RenderPipeline>,
    materials: HashMap<MaterialId, wgpu::BindGroup>,
}

impl WgpuContext {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let transforms = TransformUniforms::new(&device);
        let bones_layout = device.create_bind_group_layout(&BonesBinding::desc());
        let bones = BonesBinding::new(&bones_layout, &device);
        Self {
            device,
            queue,
            buffers: Arena::new(),
            draws: vec![],
            transforms,
            bones_layout,
            bones,
            palette: vec![],
            pipelines: HashMap::new(),
            materials: HashMap::new(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn transform_layout(&self) -> &wgpu::BindGroupLayout {
        &self.transforms.layout
    }

    pub fn bones_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bones_layout
    }

    /// Pipeline used for every draw of this vertex kind and primitive.
    pub fn register_pipeline(&mut self, kind: VertexKind, primitive: Primitive, pipeline: wgpu::RenderPipeline) {
        self.pipelines.insert((kind, primitive), pipeline);
    }

    pub fn register_material(&mut self, material: MaterialId, bind_group: wgpu::BindGroup) {
        self.materials.insert(material, bind_group);
    }

    pub fn begin_frame(&mut self) {
        self.draws.clear();
        self.transforms.staged.clear();
        self.palette.clear();
    }

    /// Uploads this frame's draw transforms and bone palette.
    pub fn prepare(&mut self) {
        self.transforms.upload(&self.device, &self.queue);
        self.bones.update(&self.palette, &self.bones_layout, &self.device, &self.queue);
    }

    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_bind_group(BONES_GROUP, &self.bones.bind_group, &[]);
        for draw in &self.draws {
            let call = &draw.call;
            let Some(pipeline) = self.pipelines.get(&(call.vertex_kind, call.primitive)) else {
                warn!("no pipeline for {:?} {:?}, draw skipped", call.vertex_kind, call.primitive);
                continue;
            };
            let (Some(vertices), Some(indices)) =
                (self.buffers.get(call.vertex_buffer.0), self.buffers.get(call.index_buffer.0))
            else {
                warn!("draw references a destroyed buffer, skipped");
                continue;
            };
            pass.set_pipeline(pipeline);
            pass.set_bind_group(TRANSFORM_GROUP, &self.transforms.bind_group, &[draw.transform_offset]);
            if let Some(material) = self.materials.get(&call.material) {
                pass.set_bind_group(MATERIAL_GROUP, material, &[]);
            }
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..call.index_count, 0, 0..1);
        }
    }
}

impl RenderContext for WgpuContext {
    fn create_buffer(&mut self, label: &str, usage: BufferUsage, size: u64) -> BufferId {
        let usage = match usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(wgpu::COPY_BUFFER_ALIGNMENT).next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        BufferId(self.buffers.insert(buffer))
    }

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        match self.buffers.get(buffer.0) {
            Some(b) => self.queue.write_buffer(b, offset, bytes),
            None => warn!("write to destroyed buffer {buffer:?}"),
        }
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(b) = self.buffers.remove(buffer.0) {
            b.destroy();
        }
    }

    fn draw_indexed(&mut self, call: &DrawCall) {
        if reuses_vertex_buffer(&self.draws, call) {
            warn!(
                "vertex buffer {:?} drawn twice this frame, both draws see its last upload",
                call.vertex_buffer
            );
        }
        let transform_offset = self.transforms.push(&call.transform);
        self.draws.push(RecordedDraw {
            call: *call,
            transform_offset,
        });
    }

    fn submit_skinning(&mut self, palette: &[Mat4]) -> u32 {
        let offset = self.palette.len() as u32;
        self.palette.extend(palette.iter().copied().map(BoneMat34::from));
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transform_layout_binds_one_matrix_at_a_dynamic_offset() {
        let desc = TransformUniforms::desc();
        assert_eq!(desc.entries.len(), 1);
        match desc.entries[0].ty {
            wgpu::BindingType::Buffer {
                has_dynamic_offset,
                min_binding_size,
                ..
            } => {
                assert!(has_dynamic_offset);
                assert_eq!(min_binding_size.map(|s| s.get()), Some(64));
            }
            ref other => panic!("unexpected binding type {other:?}"),
        }
    }

    #[test]
    fn second_draw_of_a_buffer_in_one_frame_is_detected() {
        let mut ids = Arena::new();
        let (vertices, indices, other) = (ids.insert(()), ids.insert(()), ids.insert(()));
        let call = DrawCall {
            vertex_buffer: BufferId(vertices),
            index_buffer: BufferId(indices),
            index_count: 6,
            vertex_kind: VertexKind::Mesh,
            primitive: Primitive::Triangles,
            transform: Mat4::IDENTITY,
            material: MaterialId(0),
        };
        assert!(!reuses_vertex_buffer(&[], &call));

        let recorded = [RecordedDraw {
            call,
            transform_offset: 0,
        }];
        assert!(reuses_vertex_buffer(&recorded, &call));
        let elsewhere = DrawCall {
            vertex_buffer: BufferId(other),
            ..call
        };
        assert!(!reuses_vertex_buffer(&recorded, &elsewhere));
    }

    #[test]
    fn only_triangles_are_culled() {
        assert_eq!(primitive_state(Primitive::Triangles).cull_mode, Some(wgpu::Face::Back));
        assert_eq!(
            primitive_state(Primitive::Lines).topology,
            wgpu::PrimitiveTopology::LineList
        );
        assert_eq!(primitive_state(Primitive::Points).cull_mode, None);
    }
}
