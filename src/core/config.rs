//! Engine configuration with documented constants
//!
//! All tunable numbers for ticking, spawning and sync live here. The
//! binary loads them from a TOML file; tests use `EngineConfig::default()`.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::error::{EngineError, Result};

/// Configuration for the combat event engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // === CLOCK ===
    /// Wall-clock seconds per simulation tick
    ///
    /// A poll owes `floor(elapsed / tick_seconds)` ticks. The remainder is
    /// carried into the encounter clock so no time is lost between polls.
    pub tick_seconds: f64,

    // === ENCOUNTERS ===
    /// Ring length for combatant positions in a new encounter
    pub event_size: i32,

    /// Lowest damage roll (inclusive)
    pub damage_min: i32,

    /// Highest damage roll (exclusive)
    pub damage_max: i32,

    /// Largest distance an enemy wanders in one tick, in either direction
    pub move_step: i32,

    /// Ring position enemies are spawned around
    pub spawn_base_offset: i32,

    /// Ring distance per point of template initiative
    ///
    /// Spreads freshly spawned enemies apart so their sprites do not stack.
    pub spawn_initiative_spread: i32,

    /// Ring position players take when joining an encounter
    pub player_spawn_position: i32,

    // === SYNC ===
    /// How recently another player must have polled to count as nearby
    pub liveness_window_secs: f64,

    // === WORLD GENESIS ===
    /// Dungeons created in a fresh region
    pub dungeons_per_region: usize,

    /// Enemy templates seeded per dungeon
    pub templates_per_dungeon: usize,

    /// Capacity of a freshly generated dungeon
    pub dungeon_max_players: usize,

    /// Seconds a dungeon rests between encounters
    pub dungeon_spawn_rate: f64,

    /// Max health of a newly created character
    pub new_character_health: i32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 1.0,

            event_size: 100,
            damage_min: 1,
            damage_max: 5,
            move_step: 3,
            spawn_base_offset: 50,
            spawn_initiative_spread: 7,
            player_spawn_position: 10,

            liveness_window_secs: 10.0,

            dungeons_per_region: 5,
            templates_per_dungeon: 3,
            dungeon_max_players: 1,
            dungeon_spawn_rate: 5.0,
            new_character_health: 50,
        }
    }
}

impl EngineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from TOML text; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a TOML file on disk
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if !(self.tick_seconds > 0.0) {
            return Err(EngineError::Config(format!(
                "tick_seconds ({}) must be positive",
                self.tick_seconds
            )));
        }

        if self.event_size <= 0 {
            return Err(EngineError::Config(format!(
                "event_size ({}) must be positive",
                self.event_size
            )));
        }

        if self.damage_min >= self.damage_max {
            return Err(EngineError::Config(format!(
                "damage_min ({}) should be < damage_max ({})",
                self.damage_min, self.damage_max
            )));
        }

        if self.move_step < 0 {
            return Err(EngineError::Config("move_step must not be negative".into()));
        }

        if self.dungeon_max_players == 0 {
            return Err(EngineError::Config(
                "dungeon_max_players must be at least 1".into(),
            ));
        }

        if self.new_character_health <= 0 {
            return Err(EngineError::Config(
                "new_character_health must be positive".into(),
            ));
        }

        Ok(())
    }
}
