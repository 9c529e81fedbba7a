use glam::Mat4;
use log::debug;

/// Affine skinning matrix stored as three rows, the layout the skinning
/// shader reads from the palette storage buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct BoneMat34 {
    pub rows: [[f32; 4]; 3],
}
impl Default for BoneMat34 {
    fn default() -> Self {
        Self::from(Mat4::IDENTITY)
    }
}
impl From<Mat4> for BoneMat34 {
    fn from(m: Mat4) -> Self {
        let t = m.transpose();
        Self {
            rows: [t.x_axis.to_array(), t.y_axis.to_array(), t.z_axis.to_array()],
        }
    }
}

/// Bone palette storage buffer shared by every skinned draw of a frame.
pub struct BonesBinding {
    pub bind_group: wgpu::BindGroup,
    buffer: wgpu::Buffer,
    capacity: usize,
}
impl BonesBinding {
    const INITIAL_CAPACITY: usize = 1024;

    pub fn desc() -> wgpu::BindGroupLayoutDescriptor<'static> {
        wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Storage { read_only: true },
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("Bones Bind Group Layout"),
        }
    }

    pub fn new(layout: &wgpu::BindGroupLayout, device: &wgpu::Device) -> Self {
        let (buffer, bind_group) = Self::allocate(layout, device, Self::INITIAL_CAPACITY);
        Self {
            bind_group,
            buffer,
            capacity: Self::INITIAL_CAPACITY,
        }
    }

    fn allocate(
        layout: &wgpu::BindGroupLayout,
        device: &wgpu::Device,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Bones SSBO"),
            size: (capacity * size_of::<BoneMat34>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Bones Bind Group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    /// Uploads the palette, growing the buffer first when it does not fit.
    pub fn update(
        &mut self,
        data: &[BoneMat34],
        layout: &wgpu::BindGroupLayout,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) {
        if data.len() > self.capacity {
            let capacity = data.len().next_power_of_two();
            debug!("growing bone palette from {} to {} matrices", self.capacity, capacity);
            (self.buffer, self.bind_group) = Self::allocate(layout, device, capacity);
            self.capacity = capacity;
        }
        if !data.is_empty() {
            queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(data));
        }
    }
}
