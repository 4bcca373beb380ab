//! Configuration shared between the coordinator and its host glue.
//!
//! Every section carries `#[serde(default)]` so a partial TOML file only
//! overrides the keys it names.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitrunConfig {
    /// Location of `runs.json`. `None` resolves to the platform data dir.
    pub ledger_path: Option<PathBuf>,
    /// Ticks between periodic re-evaluations (20 ticks ~ 1 second).
    pub periodic_interval_ticks: u32,
    pub respawn: RespawnMode,
    pub damage: DamageConfig,
    pub pin: PinConfig,
    pub display: DisplayConfig,
}

impl Default for SplitrunConfig {
    fn default() -> Self {
        Self {
            ledger_path: None,
            periodic_interval_ticks: 20,
            respawn: RespawnMode::default(),
            damage: DamageConfig::default(),
            pin: PinConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

/// How a player stuck on the death screen is brought back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RespawnMode {
    /// Ask the host to respawn the player server-side.
    #[default]
    Server,
    /// Host cannot force a respawn; the player clicks through themselves.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageConfig {
    pub default_cooldown_ms: i64,
    /// Cooldown for damage-over-time sources that tick repeatedly.
    pub dot_cooldown_ms: i64,
    /// Case-insensitive substrings that classify a source as damage-over-time.
    pub dot_sources: Vec<String>,
    /// Case-insensitive substrings of sources ignored entirely (admin kills).
    pub excluded_sources: Vec<String>,
    pub leaderboard_size: usize,
}

impl Default for DamageConfig {
    fn default() -> Self {
        Self {
            default_cooldown_ms: 300,
            dot_cooldown_ms: 1500,
            dot_sources: ["fire", "lava", "wither", "poison", "starve", "cactus"]
                .into_iter()
                .map(String::from)
                .collect(),
            excluded_sources: vec!["generickill".to_string()],
            leaderboard_size: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PinConfig {
    pub window_ms: i64,
    pub radius: f64,
    pub teleport_interval_ticks: u32,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            window_ms: 5000,
            radius: 0.25,
            teleport_interval_ticks: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub objective: String,
    pub title: String,
    /// Highest slot; the status line or the first milestone lands here.
    pub top_slot: i32,
    pub max_line_chars: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            objective: "alliance_splits".to_string(),
            title: "SPLITS".to_string(),
            top_slot: 15,
            max_line_chars: 38,
        }
    }
}
