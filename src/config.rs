use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnimationConfig {
    /// Threads in the pose worker pool.
    pub worker_threads: usize,
    /// Used when an imported animation reports a tick rate of 0.
    pub default_ticks_per_second: f32,
}
impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            default_ticks_per_second: 25.0,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BatchingConfig {
    pub initial_instances: usize,
    pub growth_factor: f32,
}
impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            initial_instances: 16,
            growth_factor: 1.5,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DebugDrawConfig {
    pub initial_lines: usize,
}
impl Default for DebugDrawConfig {
    fn default() -> Self {
        Self { initial_lines: 256 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub animation: AnimationConfig,
    pub batching: BatchingConfig,
    pub debug_draw: DebugDrawConfig,
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.animation.worker_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "animation.worker_threads",
                reason: "at least one worker is required".to_string(),
            });
        }
        if !(self.animation.default_ticks_per_second > 0.0) {
            return Err(ConfigError::Invalid {
                field: "animation.default_ticks_per_second",
                reason: format!("must be positive, got {}", self.animation.default_ticks_per_second),
            });
        }
        if !(self.batching.growth_factor > 1.0) {
            return Err(ConfigError::Invalid {
                field: "batching.growth_factor",
                reason: format!("must be greater than 1, got {}", self.batching.growth_factor),
            });
        }
        if self.batching.initial_instances == 0 {
            return Err(ConfigError::Invalid {
                field: "batching.initial_instances",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{ "batching": { "initial_instances": 64 } }"#).unwrap();
        assert_eq!(config.batching.initial_instances, 64);
        assert_eq!(config.batching.growth_factor, 1.5);
        assert_eq!(config.animation, AnimationConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn rejects_non_growing_factor() {
        let mut config = EngineConfig::default();
        config.batching.growth_factor = 1.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "batching.growth_factor", .. })
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = EngineConfig::load("does/not/exist.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let path = std::env::temp_dir().join(format!("ossature-config-{}.json", std::process::id()));
        std::fs::write(&path, r#"{ "animation": { "worker_threads": 4 } }"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.animation.worker_threads, 4);
    }
}
