use glam::{Mat4, Vec3};

use crate::math::transform::normal_matrix;

use super::context::VertexKind;

/// Per-vertex-type instance creator.
///
/// `prepare` runs once per queued instance, `instantiate` once per base
/// vertex. Resolved at compile time through [`InstanceBatch`](super::InstanceBatch)'s
/// type parameter.
pub trait InstanceVertex: bytemuck::Pod + Default {
    /// Extra per-instance attribute, e.g. a texture index.
    type Extra: Copy;
    type Prepared;
    const KIND: VertexKind;

    fn prepare(transform: &Mat4, extra: &Self::Extra) -> Self::Prepared;
    fn instantiate(&self, prepared: &Self::Prepared) -> Self;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub texture_index: u32,
}

pub struct MeshInstance {
    transform: Mat4,
    normal: glam::Mat3,
    texture_index: u32,
}

impl InstanceVertex for MeshVertex {
    type Extra = u32;
    type Prepared = MeshInstance;
    const KIND: VertexKind = VertexKind::Mesh;

    fn prepare(transform: &Mat4, texture_index: &u32) -> MeshInstance {
        MeshInstance {
            transform: *transform,
            normal: normal_matrix(transform),
            texture_index: *texture_index,
        }
    }

    fn instantiate(&self, instance: &MeshInstance) -> Self {
        let position = instance.transform.transform_point3(Vec3::from(self.position));
        let normal = (instance.normal * Vec3::from(self.normal)).normalize_or_zero();
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv: self.uv,
            texture_index: instance.texture_index,
        }
    }
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, uv: [f32; 2]) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            uv,
            texture_index: 0,
        }
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: size_of::<[f32; 6]>() as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: size_of::<[f32; 8]>() as wgpu::BufferAddress,
            shader_location: 3,
            format: wgpu::VertexFormat::Uint32,
        },
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub color: [f32; 4],
}

impl InstanceVertex for LineVertex {
    /// Colour, overrides the base vertex colour.
    type Extra = [f32; 4];
    type Prepared = (Mat4, [f32; 4]);
    const KIND: VertexKind = VertexKind::Line;

    fn prepare(transform: &Mat4, color: &[f32; 4]) -> (Mat4, [f32; 4]) {
        (*transform, *color)
    }

    fn instantiate(&self, (transform, color): &(Mat4, [f32; 4])) -> Self {
        Self {
            position: transform.transform_point3(Vec3::from(self.position)).to_array(),
            color: *color,
        }
    }
}

impl LineVertex {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: position.to_array(),
            color: [1.0; 4],
        }
    }

    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
        wgpu::VertexAttribute {
            offset: 0,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: size_of::<[f32; 3]>() as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x4,
        },
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: size_of::<LineVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
