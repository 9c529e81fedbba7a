pub mod bones;
pub mod context;
pub mod debug_draw;
pub mod headless;
pub mod instance_batch;
pub mod vertex;
pub mod wgpu_context;

pub use context::{BufferId, BufferUsage, DrawCall, MaterialId, Primitive, RenderContext, VertexKind};
pub use debug_draw::DebugDraw;
pub use headless::HeadlessContext;
pub use instance_batch::{InstanceBatch, InstanceHandle};
pub use vertex::{InstanceVertex, LineVertex, MeshVertex};
pub use wgpu_context::WgpuContext;
