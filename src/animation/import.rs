//! Boundary with the asset importer.
//!
//! The importer hands over already-decoded structures: a node hierarchy, a
//! bone-name to bone-info map, and per-animation channel lists. Everything
//! here validates once at load time so evaluation can trust the data.

use std::collections::HashMap;

use glam::{Mat4, Quat, Vec3};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::AnimationError;

use super::{
    clip::{AnimationClip, ClipLibrary},
    keyframe::{Keyframe, KeyframeTrack},
    skeleton::{BoneId, BoneNode, Skeleton, SkeletonBuilder},
};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceNode {
    pub name: String,
    /// Node-to-parent transform.
    pub transform: Mat4,
    #[serde(default)]
    pub children: Vec<SourceNode>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct BoneInfo {
    pub index: u32,
    pub offset: Mat4,
}

pub type BoneInfoMap = HashMap<String, BoneInfo>;

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceChannel {
    pub bone: String,
    #[serde(default)]
    pub positions: Vec<Keyframe<Vec3>>,
    #[serde(default)]
    pub rotations: Vec<Keyframe<Quat>>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SourceAnimation {
    pub name: String,
    /// Length in ticks.
    pub duration: f32,
    /// 0 when the source file did not specify a rate.
    pub ticks_per_second: f32,
    pub channels: Vec<SourceChannel>,
}

/// Builds the arena skeleton from the importer's node tree.
///
/// Nodes found in `bones` own the pose slot named there; the rest become
/// helper nodes. The global inverse transform is the inverse of the root's
/// transform.
pub fn build_skeleton(root: &SourceNode, bones: &BoneInfoMap) -> Result<Skeleton, AnimationError> {
    let mut builder = SkeletonBuilder::new();
    let mut stack: Vec<(&SourceNode, Option<BoneId>)> = vec![(root, None)];
    let mut placed = 0usize;

    while let Some((source, parent)) = stack.pop() {
        let mut node = BoneNode::new(source.name.clone(), source.transform);
        if let Some(info) = bones.get(&source.name) {
            node.pose_slot = Some(info.index);
            node.offset_matrix = info.offset;
            placed += 1;
        }
        let id = builder.add(parent, node);
        // reversed so children are added in source order
        stack.extend(source.children.iter().rev().map(|child| (child, Some(id))));
    }

    if placed < bones.len() {
        let mut names: Vec<_> = bones.keys().collect();
        names.sort();
        for name in names {
            if find_node(root, name).is_none() {
                return Err(AnimationError::UnplacedBone(name.clone()));
            }
        }
    }

    debug!(
        "built skeleton '{}' with {} nodes and {} bones",
        root.name,
        builder.len(),
        bones.len()
    );
    builder.build(bones.len(), root.transform.inverse())
}

fn find_node<'a>(node: &'a SourceNode, name: &str) -> Option<&'a SourceNode> {
    if node.name == name {
        return Some(node);
    }
    node.children.iter().find_map(|child| find_node(child, name))
}

/// Converts one decoded animation. A zero tick rate is replaced with
/// `default_ticks_per_second`.
pub fn build_clip(source: &SourceAnimation, default_ticks_per_second: f32) -> Result<AnimationClip, AnimationError> {
    let ticks_per_second = if source.ticks_per_second == 0.0 {
        warn!(
            "animation '{}' has no tick rate, assuming {}",
            source.name, default_ticks_per_second
        );
        default_ticks_per_second
    } else {
        source.ticks_per_second
    };

    let mut clip = AnimationClip::new(source.name.clone(), source.duration, ticks_per_second)?;
    for channel in &source.channels {
        let track = KeyframeTrack::new(
            &channel.bone,
            channel.positions.iter().copied(),
            channel.rotations.iter().copied(),
        )?;
        if track.end_time() > source.duration {
            debug!(
                "channel '{}' of '{}' has keys past the clip end ({} > {})",
                channel.bone,
                source.name,
                track.end_time(),
                source.duration
            );
        }
        clip.add_track(channel.bone.clone(), track)?;
    }
    Ok(clip)
}

impl ClipLibrary {
    pub fn from_sources<'a>(
        sources: impl IntoIterator<Item = &'a SourceAnimation>,
        default_ticks_per_second: f32,
    ) -> Result<Self, AnimationError> {
        let mut library = Self::new();
        for source in sources {
            library.insert(build_clip(source, default_ticks_per_second)?)?;
        }
        Ok(library)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn node(name: &str, transform: Mat4, children: Vec<SourceNode>) -> SourceNode {
        SourceNode {
            name: name.to_string(),
            transform,
            children,
        }
    }

    fn humanoid() -> (SourceNode, BoneInfoMap) {
        let root = node(
            "Scene",
            Mat4::from_scale(Vec3::splat(2.0)),
            vec![node(
                "hips",
                Mat4::IDENTITY,
                vec![
                    node("spine", Mat4::from_translation(Vec3::Y), vec![]),
                    node("leg", Mat4::from_translation(-Vec3::Y), vec![]),
                ],
            )],
        );
        let bones = BoneInfoMap::from([
            ("hips".to_string(), BoneInfo { index: 0, offset: Mat4::IDENTITY }),
            ("spine".to_string(), BoneInfo { index: 2, offset: Mat4::IDENTITY }),
            ("leg".to_string(), BoneInfo { index: 1, offset: Mat4::IDENTITY }),
        ]);
        (root, bones)
    }

    #[test]
    fn builds_hierarchy_in_source_order() {
        let (root, bones) = humanoid();
        let skeleton = build_skeleton(&root, &bones).unwrap();
        assert_eq!(skeleton.bone_count(), 3);
        assert_eq!(skeleton.node(skeleton.root()).pose_slot, None);

        let names: Vec<_> = skeleton.depth_first().map(|id| skeleton.node(id).name.clone()).collect();
        assert_eq!(names, vec!["Scene", "hips", "spine", "leg"]);
        assert_eq!(skeleton.node(skeleton.find("leg").unwrap()).pose_slot, Some(1));
        assert!(skeleton
            .global_inverse_transform()
            .abs_diff_eq(Mat4::from_scale(Vec3::splat(0.5)), 1e-6));
    }

    #[test]
    fn bone_missing_from_hierarchy_is_an_error() {
        let (root, mut bones) = humanoid();
        bones.insert("tail".to_string(), BoneInfo { index: 3, offset: Mat4::IDENTITY });
        assert_eq!(
            build_skeleton(&root, &bones).unwrap_err(),
            AnimationError::UnplacedBone("tail".to_string())
        );
    }

    #[test]
    fn slot_outside_map_size_is_an_error() {
        let (root, mut bones) = humanoid();
        bones.get_mut("spine").unwrap().index = 7;
        assert!(matches!(
            build_skeleton(&root, &bones),
            Err(AnimationError::PoseSlotOutOfRange { slot: 7, .. })
        ));
    }

    fn walk(ticks_per_second: f32) -> SourceAnimation {
        SourceAnimation {
            name: "walk".to_string(),
            duration: 10.0,
            ticks_per_second,
            channels: vec![SourceChannel {
                bone: "hips".to_string(),
                positions: vec![Keyframe::new(0.0, Vec3::ZERO), Keyframe::new(10.0, Vec3::X)],
                rotations: vec![Keyframe::new(0.0, Quat::IDENTITY)],
            }],
        }
    }

    #[test]
    fn zero_tick_rate_uses_default() {
        let clip = build_clip(&walk(0.0), 25.0).unwrap();
        assert_eq!(clip.ticks_per_second(), 25.0);
        let clip = build_clip(&walk(30.0), 25.0).unwrap();
        assert_eq!(clip.ticks_per_second(), 30.0);
    }

    #[test]
    fn duplicate_timestamp_fails_import() {
        let mut source = walk(30.0);
        source.channels[0].positions.push(Keyframe::new(10.0, Vec3::Y));
        assert!(matches!(
            build_clip(&source, 25.0),
            Err(AnimationError::NonAscendingKeyframes { index: 2, .. })
        ));
    }

    #[test]
    fn library_from_json_sources() {
        let json = r#"[
            { "name": "idle", "duration": 4.0, "ticks_per_second": 2.0, "channels": [] },
            { "name": "wave", "duration": 8.0, "ticks_per_second": 0.0, "channels": [
                { "bone": "arm", "rotations": [ { "time": 0.0, "value": [0.0, 0.0, 0.0, 1.0] } ] }
            ] }
        ]"#;
        let sources: Vec<SourceAnimation> = serde_json::from_str(json).unwrap();
        let library = ClipLibrary::from_sources(&sources, 24.0).unwrap();
        assert_eq!(library.len(), 2);
        let wave = library.get("wave").unwrap();
        assert_eq!(wave.ticks_per_second(), 24.0);
        assert_eq!(wave.track("arm").unwrap().rotations().len(), 1);
    }
}
