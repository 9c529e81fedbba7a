use glam::{Mat4, Quat, Vec3};

use super::{
    clip::AnimationClip,
    skeleton::{BoneId, Skeleton},
};

/// Flat per-bone skinning matrices for one mesh instance.
///
/// Sized once from the skeleton and overwritten in place every frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PoseBuffer {
    matrices: Vec<Mat4>,
}

impl PoseBuffer {
    pub fn new(skeleton: &Skeleton) -> Self {
        Self::with_bone_count(skeleton.bone_count())
    }

    pub fn with_bone_count(bone_count: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; bone_count],
        }
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn get(&self, slot: usize) -> Option<&Mat4> {
        self.matrices.get(slot)
    }

    /// Column-major bytes ready for a storage/uniform buffer upload.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.matrices)
    }

    pub(crate) fn matrices_mut(&mut self) -> &mut [Mat4] {
        &mut self.matrices
    }
}

/// Walks a skeleton against one clip at one instant, writing skinning
/// matrices `global_inverse * world * offset` into a pose buffer.
pub struct PoseEvaluator<'a> {
    clip: &'a AnimationClip,
    skeleton: &'a Skeleton,
    anim_time: f32,
    global_inverse: Mat4,
}

impl<'a> PoseEvaluator<'a> {
    /// `elapsed_seconds` is converted to ticks and wrapped into the clip.
    pub fn new(clip: &'a AnimationClip, skeleton: &'a Skeleton, elapsed_seconds: f32, global_inverse: Mat4) -> Self {
        Self {
            clip,
            skeleton,
            anim_time: clip.wrap_time(elapsed_seconds),
            global_inverse,
        }
    }

    pub fn anim_time(&self) -> f32 {
        self.anim_time
    }

    /// Local transform of one node: animated translation * rotation, or the
    /// rest transform when the clip has no track for it.
    pub fn local_transform(&self, id: BoneId) -> Mat4 {
        let node = self.skeleton.node(id);
        match self.clip.track(&node.name) {
            Some(track) => {
                let translation: Vec3 = track.interpolate(self.anim_time);
                let rotation: Quat = track.interpolate(self.anim_time);
                Mat4::from_translation(translation) * Mat4::from_quat(rotation)
            }
            None => node.relative_transform,
        }
    }

    /// Writes every reachable pose slot exactly once. Slots no node owns keep
    /// their previous contents.
    pub fn evaluate(&self, pose: &mut PoseBuffer) {
        assert_eq!(
            pose.len(),
            self.skeleton.bone_count(),
            "pose buffer was not sized for this skeleton"
        );
        self.visit(self.skeleton.root(), Mat4::IDENTITY, pose.matrices_mut());
    }

    fn visit(&self, id: BoneId, parent_world: Mat4, out: &mut [Mat4]) {
        let node = self.skeleton.node(id);
        let world = parent_world * self.local_transform(id);
        if let Some(slot) = node.pose_slot {
            out[slot as usize] = self.global_inverse * world * node.offset_matrix;
        }
        for &child in &node.children {
            self.visit(child, world, out);
        }
    }
}

/// One-shot form of [`PoseEvaluator::evaluate`].
pub fn evaluate(
    clip: &AnimationClip,
    skeleton: &Skeleton,
    elapsed_seconds: f32,
    global_inverse: Mat4,
    pose: &mut PoseBuffer,
) {
    PoseEvaluator::new(clip, skeleton, elapsed_seconds, global_inverse).evaluate(pose);
}
