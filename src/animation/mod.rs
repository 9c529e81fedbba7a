//! Skeletal animation: keyframe tracks, clips, the bone arena and pose evaluation.

pub mod clip;
pub mod import;
pub mod keyframe;
pub mod pose;
pub mod skeleton;

pub use clip::{AnimationClip, ClipLibrary};
pub use keyframe::{KeyValue, Keyframe, KeyframeTrack, Keyframes, TrackChannel};
pub use pose::{evaluate, PoseBuffer, PoseEvaluator};
pub use skeleton::{BoneId, BoneNode, Skeleton, SkeletonBuilder};
