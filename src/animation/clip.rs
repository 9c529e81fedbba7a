use std::{collections::HashMap, sync::Arc};

use crate::error::AnimationError;

use super::keyframe::KeyframeTrack;

/// Named set of per-bone tracks. Times are in ticks.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    name: String,
    duration: f32,
    ticks_per_second: f32,
    tracks: HashMap<String, KeyframeTrack>,
}

impl AnimationClip {
    pub fn new(
        name: impl Into<String>,
        duration: f32,
        ticks_per_second: f32,
    ) -> Result<Self, AnimationError> {
        let name = name.into();
        if !(ticks_per_second > 0.0) || !ticks_per_second.is_finite() {
            return Err(AnimationError::InvalidTickRate { clip: name, ticks_per_second });
        }
        if !(duration >= 0.0) || !duration.is_finite() {
            return Err(AnimationError::InvalidDuration { clip: name, duration });
        }
        Ok(Self {
            name,
            duration,
            ticks_per_second,
            tracks: HashMap::new(),
        })
    }

    pub fn add_track(&mut self, bone: impl Into<String>, track: KeyframeTrack) -> Result<(), AnimationError> {
        let bone = bone.into();
        if self.tracks.contains_key(&bone) {
            return Err(AnimationError::DuplicateChannel {
                clip: self.name.clone(),
                bone,
            });
        }
        self.tracks.insert(bone, track);
        Ok(())
    }

    pub fn with_track(mut self, bone: impl Into<String>, track: KeyframeTrack) -> Result<Self, AnimationError> {
        self.add_track(bone, track)?;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn ticks_per_second(&self) -> f32 {
        self.ticks_per_second
    }

    pub fn duration_seconds(&self) -> f32 {
        self.duration / self.ticks_per_second
    }

    /// Track driving `bone`, if the clip animates it.
    pub fn track(&self, bone: &str) -> Option<&KeyframeTrack> {
        self.tracks.get(bone)
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> impl Iterator<Item = (&str, &KeyframeTrack)> {
        self.tracks.iter().map(|(name, track)| (name.as_str(), track))
    }

    /// Converts elapsed seconds to a tick time wrapped into `[0, duration)`.
    pub fn wrap_time(&self, elapsed_seconds: f32) -> f32 {
        if self.duration <= f32::EPSILON {
            return 0.0;
        }
        (elapsed_seconds * self.ticks_per_second).rem_euclid(self.duration)
    }
}

/// Clips of one model, addressed by animation name.
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, Arc<AnimationClip>>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, clip: AnimationClip) -> Result<Arc<AnimationClip>, AnimationError> {
        if self.clips.contains_key(clip.name()) {
            return Err(AnimationError::DuplicateClip(clip.name().to_string()));
        }
        let clip = Arc::new(clip);
        self.clips.insert(clip.name().to_string(), clip.clone());
        Ok(clip)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<AnimationClip>> {
        self.clips.get(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.clips.keys().map(String::as_str)
    }
}
