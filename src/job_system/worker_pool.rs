use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use log::{debug, error, info, trace};

use crate::error::JobError;

use super::anim_pose::{execute_pose_tasks, PoseTask};

pub enum Task {
    Pose(Vec<PoseTask>, Sender<Vec<PoseTask>>),
}

fn worker_loop(rx: Receiver<Task>) {
    while let Ok(task) = rx.recv() {
        match task {
            Task::Pose(tasks, reply) => {
                let count = tasks.len();
                // a panicking task drops its reply sender; the worker keeps serving
                let Ok(done) = catch_unwind(AssertUnwindSafe(|| execute_pose_tasks(tasks))) else {
                    error!("pose task for {count} instances panicked");
                    continue;
                };
                if reply.send(done).is_err() {
                    debug!("pose results for {count} instances dropped, frame was abandoned");
                }
            }
        }
    }
}

/// Completion handle for one submitted pose task.
pub struct PoseJobHandle {
    rx: Receiver<Vec<PoseTask>>,
    done: Option<Result<Vec<PoseTask>, JobError>>,
}
impl PoseJobHandle {
    /// Blocks until the task has run and returns its evaluated poses.
    pub fn wait(mut self) -> Result<Vec<PoseTask>, JobError> {
        match self.done.take() {
            Some(done) => done,
            None => self.rx.recv().map_err(|_| JobError::WorkerLost),
        }
    }

    /// True once the result is in or the task can no longer deliver one.
    pub fn is_finished(&mut self) -> bool {
        if self.done.is_none() {
            match self.rx.try_recv() {
                Ok(tasks) => self.done = Some(Ok(tasks)),
                Err(TryRecvError::Disconnected) => self.done = Some(Err(JobError::WorkerLost)),
                Err(TryRecvError::Empty) => {}
            }
        }
        self.done.is_some()
    }
}

pub struct WorkerPool {
    tx: Option<Sender<Task>>,
    workers: Vec<std::thread::JoinHandle<()>>,
}
impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, JobError> {
        let (tx, rx) = crossbeam::channel::unbounded::<Task>();
        let workers = (0..threads.max(1))
            .map(|i| {
                let rx = rx.clone();
                std::thread::Builder::new()
                    .name(format!("anim-worker-{i}"))
                    .spawn(move || worker_loop(rx))
                    .map_err(|e| JobError::Spawn(e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        info!("started {} animation workers", workers.len());

        Ok(Self { tx: Some(tx), workers })
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    pub fn submit_poses(&self, tasks: Vec<PoseTask>) -> Result<PoseJobHandle, JobError> {
        let (reply_tx, reply_rx) = crossbeam::channel::bounded(1);
        trace!("dispatching pose task for {} instances", tasks.len());
        self.tx
            .as_ref()
            .ok_or(JobError::PoolClosed)?
            .send(Task::Pose(tasks, reply_tx))
            .map_err(|_| JobError::PoolClosed)?;
        Ok(PoseJobHandle { rx: reply_rx, done: None })
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // closing the channel ends every worker loop
        self.tx.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                debug!("animation worker panicked before shutdown");
            }
        }
        info!("animation workers stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use generational_arena::Arena;
    use glam::{Mat4, Vec3};

    use super::*;
    use crate::animation::{AnimationClip, Keyframe, KeyframeTrack, PoseBuffer, SkeletonBuilder};

    fn task(instance: generational_arena::Index, elapsed_seconds: f32) -> PoseTask {
        let mut b = SkeletonBuilder::new();
        b.add_bone(None, "root", 0, Mat4::IDENTITY, Mat4::IDENTITY);
        let skeleton = Arc::new(b.build(1, Mat4::IDENTITY).unwrap());
        let track = KeyframeTrack::new(
            "root",
            [Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(4.0, Vec3::new(4.0, 0.0, 0.0))],
            [],
        )
        .unwrap();
        let clip = Arc::new(AnimationClip::new("move", 4.0, 1.0).unwrap().with_track("root", track).unwrap());
        PoseTask {
            instance,
            pose: PoseBuffer::new(&skeleton),
            skeleton,
            clip,
            elapsed_seconds,
            global_inverse: Mat4::IDENTITY,
        }
    }

    #[test]
    fn handle_returns_evaluated_poses() {
        let mut ids = Arena::new();
        let a = ids.insert(());
        let b = ids.insert(());
        let pool = WorkerPool::new(2).unwrap();
        let handle = pool.submit_poses(vec![task(a, 1.0), task(b, 3.0)]).unwrap();
        let done = handle.wait().unwrap();

        assert_eq!(done.len(), 2);
        assert_eq!(done[0].instance, a);
        assert_eq!(done[0].pose.matrices()[0].w_axis.x, 1.0);
        assert_eq!(done[1].instance, b);
        assert_eq!(done[1].pose.matrices()[0].w_axis.x, 3.0);
    }

    #[test]
    fn many_frames_in_flight_complete_independently() {
        let mut ids = Arena::new();
        let id = ids.insert(());
        let pool = WorkerPool::new(3).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| pool.submit_poses(vec![task(id, i as f32 * 0.5)]).unwrap())
            .collect();
        for (i, handle) in handles.into_iter().enumerate() {
            let done = handle.wait().unwrap();
            let expected = (i as f32 * 0.5).rem_euclid(4.0);
            assert!((done[0].pose.matrices()[0].w_axis.x - expected).abs() < 1e-5);
        }
    }

    fn poll_until_finished(handle: &mut PoseJobHandle) -> bool {
        for _ in 0..2000 {
            if handle.is_finished() {
                return true;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn polled_handle_still_returns_its_poses() {
        let mut ids = Arena::new();
        let id = ids.insert(());
        let pool = WorkerPool::new(1).unwrap();
        let mut handle = pool.submit_poses(vec![task(id, 2.0)]).unwrap();
        assert!(poll_until_finished(&mut handle));
        assert!(handle.is_finished());
        let done = handle.wait().unwrap();
        assert_eq!(done[0].pose.matrices()[0].w_axis.x, 2.0);
    }

    #[test]
    fn panicking_task_is_reported_and_worker_survives() {
        let mut ids = Arena::new();
        let id = ids.insert(());
        let pool = WorkerPool::new(1).unwrap();

        let mut broken = task(id, 1.0);
        broken.pose = PoseBuffer::with_bone_count(0);
        let mut handle = pool.submit_poses(vec![broken]).unwrap();
        assert!(poll_until_finished(&mut handle));
        assert!(matches!(handle.wait(), Err(JobError::WorkerLost)));

        // the single worker is still there for the next frame
        let done = pool.submit_poses(vec![task(id, 3.0)]).unwrap().wait().unwrap();
        assert_eq!(done[0].pose.matrices()[0].w_axis.x, 3.0);
    }

    #[test]
    fn zero_threads_still_gets_one_worker() {
        assert_eq!(WorkerPool::new(0).unwrap().worker_count(), 1);
    }
}
