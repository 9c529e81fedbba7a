pub mod animation_system;
pub mod animator;

pub use animation_system::{AnimatedMesh, AnimatedMeshId, AnimationSystem, PendingPoses};
pub use animator::Animator;
