use std::{io, path::PathBuf};

use thiserror::Error;

/// Errors raised while turning imported skeleton/animation data into runtime structures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    #[error("keyframes of {channel} channel for bone '{bone}' are not strictly ascending at key {index} (t={time})")]
    NonAscendingKeyframes {
        bone: String,
        channel: &'static str,
        index: usize,
        time: f32,
    },

    #[error("keyframe {index} of {channel} channel for bone '{bone}' holds a non-finite value")]
    NonFiniteKeyframe {
        bone: String,
        channel: &'static str,
        index: usize,
    },

    #[error("animation '{clip}' has invalid tick rate {ticks_per_second}")]
    InvalidTickRate { clip: String, ticks_per_second: f32 },

    #[error("animation '{clip}' has invalid duration {duration}")]
    InvalidDuration { clip: String, duration: f32 },

    #[error("animation '{clip}' has more than one channel for bone '{bone}'")]
    DuplicateChannel { clip: String, bone: String },

    #[error("duplicate animation name '{0}'")]
    DuplicateClip(String),

    #[error("bone name '{0}' appears more than once in the hierarchy")]
    DuplicateBoneName(String),

    #[error("pose slot {slot} is claimed by both '{first}' and '{second}'")]
    DuplicatePoseSlot {
        slot: u32,
        first: String,
        second: String,
    },

    #[error("pose slot {slot} of bone '{bone}' is outside [0, {bone_count})")]
    PoseSlotOutOfRange {
        bone: String,
        slot: u32,
        bone_count: usize,
    },

    #[error("bone '{0}' from the bone-info map does not appear in the node hierarchy")]
    UnplacedBone(String),

    #[error("node {node} is referenced by more than one parent or forms a cycle")]
    MalformedHierarchy { node: usize },

    #[error("skeleton has no nodes")]
    EmptySkeleton,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("pose task was lost before it completed")]
    WorkerLost,

    #[error("pose buffer holds {found} matrices but its skeleton has {expected} bones")]
    PoseSizeMismatch { expected: usize, found: usize },

    #[error("animation worker pool is not accepting tasks")]
    PoolClosed,

    #[error("failed to spawn animation worker: {0}")]
    Spawn(String),
}
