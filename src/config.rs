// Scene configuration: the immutable snapshot the core reads once per tick,
// the unchecked draft the UI and config files edit, and the store that holds
// the current snapshot between frames.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::scene::locomotion::LocomotionState;

/// Upper bounds on counts; every agent imports its own asset on rebuild.
pub const MAX_BOXES: i64 = 200;
pub const MAX_PEDESTRIANS: i64 = 50;

/// Pedestrian section of the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub state: LocomotionState,
    pub count: u32,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { state: LocomotionState::Static, count: 1 }
    }
}

/// Belt section of the configuration, projected out of `SceneConfig`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConveyorConfig {
    pub box_count: u32,
    pub speed: f32,
    pub spacing: f32,
}

/// Validated configuration snapshot. Replaced wholesale on every edit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneConfig {
    pub num_boxes: u32,
    pub box_speed: f32,
    pub box_spacing: f32,
    pub pedestrian: AgentConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            num_boxes: 5,
            box_speed: 2.0,
            box_spacing: 2.5,
            pedestrian: AgentConfig::default(),
        }
    }
}

impl SceneConfig {
    pub fn conveyor(&self) -> ConveyorConfig {
        ConveyorConfig {
            box_count: self.num_boxes,
            speed: self.box_speed,
            spacing: self.box_spacing,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentDraft {
    pub state: LocomotionState,
    pub count: i64,
}

/// Unchecked configuration as typed into the UI or read from disk.
///
/// Counts are signed so out-of-range edits can be reported instead of
/// silently wrapping; `validate` is the only way to get a `SceneConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigDraft {
    pub num_boxes: i64,
    pub box_speed: f32,
    pub box_spacing: f32,
    pub pedestrian: AgentDraft,
}

impl From<SceneConfig> for ConfigDraft {
    fn from(config: SceneConfig) -> Self {
        Self {
            num_boxes: i64::from(config.num_boxes),
            box_speed: config.box_speed,
            box_spacing: config.box_spacing,
            pedestrian: AgentDraft {
                state: config.pedestrian.state,
                count: i64::from(config.pedestrian.count),
            },
        }
    }
}

impl ConfigDraft {
    pub fn validate(&self) -> Result<SceneConfig, ConfigError> {
        if self.num_boxes < 0 {
            return Err(ConfigError::NegativeCount { field: "numBoxes", value: self.num_boxes });
        }
        if self.num_boxes < 1 {
            return Err(ConfigError::TooFewBoxes(self.num_boxes));
        }
        if self.pedestrian.count < 0 {
            return Err(ConfigError::NegativeCount {
                field: "pedestrian.count",
                value: self.pedestrian.count,
            });
        }
        if self.num_boxes > MAX_BOXES {
            return Err(ConfigError::TooMany { field: "numBoxes", value: self.num_boxes, max: MAX_BOXES });
        }
        if self.pedestrian.count > MAX_PEDESTRIANS {
            return Err(ConfigError::TooMany {
                field: "pedestrian.count",
                value: self.pedestrian.count,
                max: MAX_PEDESTRIANS,
            });
        }
        if !self.box_speed.is_finite() {
            return Err(ConfigError::NonFinite { field: "boxSpeed", value: self.box_speed });
        }
        if !self.box_spacing.is_finite() {
            return Err(ConfigError::NonFinite { field: "boxSpacing", value: self.box_spacing });
        }
        if self.box_spacing < 0.0 {
            return Err(ConfigError::NegativeSpacing(self.box_spacing));
        }

        // Both counts are range-checked above.
        Ok(SceneConfig {
            num_boxes: self.num_boxes as u32,
            box_speed: self.box_speed,
            box_spacing: self.box_spacing,
            pedestrian: AgentConfig { state: self.pedestrian.state, count: self.pedestrian.count as u32 },
        })
    }
}

/// Parse and validate a JSON config document.
pub fn parse_config(json: &str) -> Result<SceneConfig, ConfigError> {
    let draft: ConfigDraft = serde_json::from_str(json)?;
    draft.validate()
}

pub fn load_config(path: impl AsRef<Path>) -> Result<SceneConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}

/// Holder for the current snapshot.
///
/// The UI writes through `set`; the render loop reads `snapshot` once per
/// frame. `revision` only moves when the stored value actually changes.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    current: SceneConfig,
    revision: u64,
}

impl ConfigStore {
    pub fn new(initial: SceneConfig) -> Self {
        Self { current: initial, revision: 0 }
    }

    pub fn set(&mut self, config: SceneConfig) {
        if config != self.current {
            self.current = config;
            self.revision += 1;
            log::info!("config revision {}: {:?}", self.revision, self.current);
        }
    }

    pub fn snapshot(&self) -> SceneConfig {
        self.current
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
