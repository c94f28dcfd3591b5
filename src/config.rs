use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::score::Thresholds;

/// Session rules shared by the engine (offline play) and the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Seconds on the clock when a session starts.
    pub game_duration: u32,
    /// Manual refresh cooldown for a new session, in seconds.
    pub refresh_base: u32,
    pub thresholds: Thresholds,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            game_duration: 60,
            refresh_base: 10,
            thresholds: Thresholds::default(),
        }
    }
}

/// Timings and input tuning for the engine. Every field has a default, so a
/// partial JSON document is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub clear_delay_ms: u64,
    pub settle_delay_ms: u64,
    pub effect_preview_ms: u64,
    pub score_highlight_ms: u64,
    pub drag_jitter_px: f32,
    pub tile_size_px: f32,
    pub rules: RulesConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clear_delay_ms: 200,
            settle_delay_ms: 320,
            effect_preview_ms: 320,
            score_highlight_ms: 500,
            drag_jitter_px: 6.0,
            tile_size_px: 64.0,
            rules: RulesConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn clear_delay(&self) -> Duration {
        Duration::from_millis(self.clear_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn effect_preview(&self) -> Duration {
        Duration::from_millis(self.effect_preview_ms)
    }

    pub fn score_highlight(&self) -> Duration {
        Duration::from_millis(self.score_highlight_ms)
    }
}
