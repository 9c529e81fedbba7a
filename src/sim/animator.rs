use std::sync::Arc;

use crate::animation::{AnimationClip, ClipLibrary};

pub enum PlaybackState {
    Playing,
    Paused,
}

/// Playback state of one animated instance: which clip, and how far into it.
pub struct Animator {
    clip: String,
    /// Seconds of clip time, already scaled by `speed`.
    elapsed: f32,
    pub speed: f32,
    state: PlaybackState,
}
impl Animator {
    pub fn new(clip: impl Into<String>) -> Self {
        Self {
            clip: clip.into(),
            elapsed: 0.0,
            speed: 1.0,
            state: PlaybackState::Playing,
        }
    }

    /// Switches to `clip` and restarts from its first frame.
    pub fn play(&mut self, clip: impl Into<String>) {
        self.clip = clip.into();
        self.elapsed = 0.0;
        self.state = PlaybackState::Playing;
    }

    pub fn pause(&mut self) {
        self.state = PlaybackState::Paused;
    }

    pub fn resume(&mut self) {
        self.state = PlaybackState::Playing;
    }

    pub fn is_paused(&self) -> bool {
        matches!(self.state, PlaybackState::Paused)
    }

    pub fn advance(&mut self, dt: f32) {
        if let PlaybackState::Playing = self.state {
            self.elapsed += dt * self.speed;
        }
    }

    pub fn clip_name(&self) -> &str {
        &self.clip
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed
    }

    pub fn current_clip(&self, library: &ClipLibrary) -> Option<Arc<AnimationClip>> {
        library.get(&self.clip).cloned()
    }
}
