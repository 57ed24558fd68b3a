/// Director configuration. Every tuned number the flow engine uses lives
/// here, with the installation's values as defaults.
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::core::tween::Vec2;
use crate::schema::line::LanguageTag;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON deserialization error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Choice preview placement and hold-to-confirm timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoiceConfig {
    /// Continuous hover needed to confirm.
    pub hold_seconds: f32,
    /// 0 keeps the preview on its side's anchor, 1 puts it in the middle.
    pub toward_center: f32,
    /// Added to the blended anchor position.
    pub offset: Vec2,
    /// Preview open/close/move animation.
    pub anim_seconds: f32,
    /// Gap between the preview box and the hold ring.
    pub ring_gap: f32,
    pub left_anchor: Vec2,
    pub right_anchor: Vec2,
}

impl Default for ChoiceConfig {
    fn default() -> Self {
        Self {
            hold_seconds: 1.25,
            toward_center: 0.25,
            offset: Vec2::new(0.0, 120.0),
            anim_seconds: 0.2,
            ring_gap: 12.0,
            left_anchor: Vec2::new(-480.0, 0.0),
            right_anchor: Vec2::new(480.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbienceConfig {
    pub channels: usize,
    pub preview_volume: f32,
    pub preview_fade_seconds: f32,
    pub commit_fade_seconds: f32,
    pub stop_fade_seconds: f32,
}

impl Default for AmbienceConfig {
    fn default() -> Self {
        Self {
            channels: 2,
            preview_volume: 0.33,
            preview_fade_seconds: 0.25,
            commit_fade_seconds: 1.25,
            stop_fade_seconds: 0.25,
        }
    }
}

/// The full-screen cover used for scene transitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverConfig {
    pub fade_seconds: f32,
    /// Time décor gets to move under the cover before it lifts.
    pub preroll_seconds: f32,
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            fade_seconds: 0.5,
            preroll_seconds: 0.35,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypingConfig {
    pub chars_per_second: f32,
    /// Minimum spacing between two type clicks.
    pub click_min_interval: f32,
    /// Type click pitch is 1 +- this.
    pub pitch_jitter: f32,
    pub open_seconds: f32,
    pub open_scale: f32,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            chars_per_second: 45.0,
            click_min_interval: 0.03,
            pitch_jitter: 0.1,
            open_seconds: 0.35,
            open_scale: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub confirm_volume: f32,
    pub transition_volume: f32,
    pub click_volume: f32,
    pub choice_open_volume: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            confirm_volume: 1.0,
            transition_volume: 1.0,
            click_volume: 1.0,
            choice_open_volume: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchdogConfig {
    pub idle_timeout_seconds: f32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            idle_timeout_seconds: 30.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectorConfig {
    pub choice: ChoiceConfig,
    pub ambience: AmbienceConfig,
    pub cover: CoverConfig,
    pub typing: TypingConfig,
    pub audio: AudioConfig,
    pub watchdog: WatchdogConfig,
    pub default_language: LanguageTag,
    /// Seed for image picks and click pitch jitter.
    pub seed: u64,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            choice: ChoiceConfig::default(),
            ambience: AmbienceConfig::default(),
            cover: CoverConfig::default(),
            typing: TypingConfig::default(),
            audio: AudioConfig::default(),
            watchdog: WatchdogConfig::default(),
            default_language: LanguageTag::new("en"),
            seed: 0,
        }
    }
}

impl DirectorConfig {
    /// Load a config from a RON file. Missing fields take their defaults.
    pub fn load_from_ron(path: &Path) -> Result<DirectorConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<DirectorConfig, ConfigError> {
        let config: DirectorConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let seconds = [
            ("choice.anim_seconds", self.choice.anim_seconds),
            ("ambience.preview_fade_seconds", self.ambience.preview_fade_seconds),
            ("ambience.commit_fade_seconds", self.ambience.commit_fade_seconds),
            ("ambience.stop_fade_seconds", self.ambience.stop_fade_seconds),
            ("cover.fade_seconds", self.cover.fade_seconds),
            ("cover.preroll_seconds", self.cover.preroll_seconds),
            ("typing.click_min_interval", self.typing.click_min_interval),
            ("typing.open_seconds", self.typing.open_seconds),
        ];
        for (field, value) in seconds {
            non_negative(field, value)?;
        }

        let unit = [
            ("choice.toward_center", self.choice.toward_center),
            ("ambience.preview_volume", self.ambience.preview_volume),
            ("audio.confirm_volume", self.audio.confirm_volume),
            ("audio.transition_volume", self.audio.transition_volume),
            ("audio.click_volume", self.audio.click_volume),
            ("audio.choice_open_volume", self.audio.choice_open_volume),
            ("typing.pitch_jitter", self.typing.pitch_jitter),
        ];
        for (field, value) in unit {
            unit_interval(field, value)?;
        }

        positive("choice.hold_seconds", self.choice.hold_seconds)?;
        positive("typing.chars_per_second", self.typing.chars_per_second)?;
        positive("typing.open_scale", self.typing.open_scale)?;
        positive(
            "watchdog.idle_timeout_seconds",
            self.watchdog.idle_timeout_seconds,
        )?;

        if self.ambience.channels == 0 {
            return Err(ConfigError::Invalid {
                field: "ambience.channels",
                reason: "at least one channel is required".to_string(),
            });
        }
        if self.default_language.as_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "default_language",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("{} must be finite and >= 0", value),
    })
}

fn positive(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("{} must be finite and > 0", value),
    })
}

fn unit_interval(field: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        return Ok(());
    }
    Err(ConfigError::Invalid {
        field,
        reason: format!("{} is outside [0, 1]", value),
    })
}
