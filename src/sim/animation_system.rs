use std::sync::Arc;

use generational_arena::{Arena, Index};
use glam::Mat4;
use log::{debug, trace, warn};

use crate::{
    animation::{ClipLibrary, PoseBuffer, Skeleton},
    error::JobError,
    job_system::{PoseJobHandle, PoseTask, WorkerPool},
    renderer::RenderContext,
};

use super::animator::Animator;

pub type AnimatedMeshId = Index;

/// One skinned mesh instance in the scene.
pub struct AnimatedMesh {
    skeleton: Arc<Skeleton>,
    clips: Arc<ClipLibrary>,
    pub animator: Animator,
    pub global_inverse: Mat4,
    pose: PoseBuffer,
    palette_offset: Option<u32>,
}
impl AnimatedMesh {
    pub fn new(skeleton: Arc<Skeleton>, clips: Arc<ClipLibrary>, clip: impl Into<String>) -> Self {
        Self {
            pose: PoseBuffer::new(&skeleton),
            global_inverse: skeleton.global_inverse_transform(),
            animator: Animator::new(clip),
            palette_offset: None,
            skeleton,
            clips,
        }
    }

    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Rebinds the mesh to another skeleton. The pose buffer and global
    /// inverse are rebuilt from it.
    pub fn set_skeleton(&mut self, skeleton: Arc<Skeleton>) {
        self.pose = PoseBuffer::new(&skeleton);
        self.global_inverse = skeleton.global_inverse_transform();
        self.palette_offset = None;
        self.skeleton = skeleton;
    }

    pub fn clips(&self) -> &Arc<ClipLibrary> {
        &self.clips
    }

    pub fn set_clips(&mut self, clips: Arc<ClipLibrary>) {
        self.clips = clips;
    }

    pub fn pose(&self) -> &PoseBuffer {
        &self.pose
    }

    /// Where this mesh's matrices landed in the last skinning submission.
    pub fn palette_offset(&self) -> Option<u32> {
        self.palette_offset
    }
}

/// Owns every animated mesh and drives their per-frame pose task.
#[derive(Default)]
pub struct AnimationSystem {
    meshes: Arena<AnimatedMesh>,
}
impl AnimationSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self, mesh: AnimatedMesh) -> AnimatedMeshId {
        self.meshes.insert(mesh)
    }

    pub fn despawn(&mut self, id: AnimatedMeshId) -> Option<AnimatedMesh> {
        self.meshes.remove(id)
    }

    pub fn get(&self, id: AnimatedMeshId) -> Option<&AnimatedMesh> {
        self.meshes.get(id)
    }

    pub fn get_mut(&mut self, id: AnimatedMeshId) -> Option<&mut AnimatedMesh> {
        self.meshes.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnimatedMeshId, &AnimatedMesh)> {
        self.meshes.iter()
    }

    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }

    /// Advances every animator by `dt` and dispatches one pose task covering
    /// all meshes with a playable clip.
    ///
    /// Pose buffers travel with the task; the returned [`PendingPoses`] must
    /// be joined before the render phase reads them. Dropping it joins too.
    /// A pose buffer that does not match its skeleton fails the whole update
    /// before anything is dispatched.
    pub fn update(&mut self, dt: f32, pool: &WorkerPool) -> Result<PendingPoses<'_>, JobError> {
        for (_, mesh) in self.meshes.iter() {
            let expected = mesh.skeleton.bone_count();
            if mesh.pose.len() != expected {
                return Err(JobError::PoseSizeMismatch {
                    expected,
                    found: mesh.pose.len(),
                });
            }
        }

        let mut tasks = Vec::with_capacity(self.meshes.len());
        for (instance, mesh) in self.meshes.iter_mut() {
            mesh.animator.advance(dt);
            let Some(clip) = mesh.animator.current_clip(&mesh.clips) else {
                debug!("no clip named '{}', pose left unchanged", mesh.animator.clip_name());
                continue;
            };
            tasks.push(PoseTask {
                instance,
                skeleton: mesh.skeleton.clone(),
                clip,
                elapsed_seconds: mesh.animator.elapsed_seconds(),
                global_inverse: mesh.global_inverse,
                pose: std::mem::take(&mut mesh.pose),
            });
        }

        let dispatched: Vec<AnimatedMeshId> = tasks.iter().map(|t| t.instance).collect();
        let handle = if tasks.is_empty() {
            None
        } else {
            match pool.submit_poses(tasks) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    self.recreate_lost_poses(&dispatched);
                    return Err(e);
                }
            }
        };
        Ok(PendingPoses {
            system: self,
            handle,
            dispatched,
        })
    }

    /// Gives meshes whose pose went down with a lost task a fresh rest-sized
    /// buffer.
    fn recreate_lost_poses(&mut self, instances: &[AnimatedMeshId]) {
        let mut recreated = 0;
        for &id in instances {
            if let Some(mesh) = self.meshes.get_mut(id) {
                if mesh.pose.len() != mesh.skeleton.bone_count() {
                    mesh.pose = PoseBuffer::new(&mesh.skeleton);
                    recreated += 1;
                }
            }
        }
        warn!("pose task lost, {recreated} pose buffers recreated");
    }

    /// Hands every pose to the render context and records where it landed.
    pub fn submit_skinning<C: RenderContext>(&mut self, ctx: &mut C) {
        for (_, mesh) in self.meshes.iter_mut() {
            mesh.palette_offset = if mesh.pose.is_empty() {
                None
            } else {
                Some(ctx.submit_skinning(mesh.pose.matrices()))
            };
        }
    }
}

/// In-flight pose task of one frame.
pub struct PendingPoses<'a> {
    system: &'a mut AnimationSystem,
    handle: Option<PoseJobHandle>,
    dispatched: Vec<AnimatedMeshId>,
}
impl PendingPoses<'_> {
    /// Blocks until the frame's poses are evaluated and returns how many
    /// meshes got a fresh pose.
    pub fn join(mut self) -> Result<usize, JobError> {
        self.finish()
    }

    pub fn is_finished(&mut self) -> bool {
        self.handle.as_mut().map_or(true, PoseJobHandle::is_finished)
    }

    fn finish(&mut self) -> Result<usize, JobError> {
        let Some(handle) = self.handle.take() else {
            return Ok(0);
        };
        let done = match handle.wait() {
            Ok(done) => done,
            Err(e) => {
                self.system.recreate_lost_poses(&self.dispatched);
                return Err(e);
            }
        };
        let mut restored = 0;
        for task in done {
            // meshes despawned mid-frame just drop their pose
            if let Some(mesh) = self.system.meshes.get_mut(task.instance) {
                mesh.pose = task.pose;
                restored += 1;
            }
        }
        trace!("joined pose task, {restored} poses restored");
        Ok(restored)
    }
}

impl Drop for PendingPoses<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            debug!("pose task dropped without a result: {e}");
        }
    }
}
