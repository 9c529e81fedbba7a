use std::sync::Arc;

use generational_arena::Index;
use glam::Mat4;

use crate::animation::{AnimationClip, PoseBuffer, PoseEvaluator, Skeleton};

/// Everything one skeleton needs to recompute its pose for a frame.
///
/// The pose buffer travels with the task and comes back on completion, so
/// producer and consumer never touch it at the same time.
pub struct PoseTask {
    pub instance: Index,
    pub skeleton: Arc<Skeleton>,
    pub clip: Arc<AnimationClip>,
    pub elapsed_seconds: f32,
    pub global_inverse: Mat4,
    pub pose: PoseBuffer,
}

impl PoseTask {
    pub fn run(&mut self) {
        PoseEvaluator::new(&self.clip, &self.skeleton, self.elapsed_seconds, self.global_inverse)
            .evaluate(&mut self.pose);
    }
}

pub fn execute_pose_tasks(mut tasks: Vec<PoseTask>) -> Vec<PoseTask> {
    for task in &mut tasks {
        task.run();
    }
    tasks
}
