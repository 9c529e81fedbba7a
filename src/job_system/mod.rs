pub mod anim_pose;
pub mod worker_pool;

pub use anim_pose::PoseTask;
pub use worker_pool::{PoseJobHandle, WorkerPool};
