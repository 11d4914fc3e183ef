//! Location - a town or dungeon inside a region
//!
//! Locations are where encounters happen. Dungeons gate new encounters on
//! a cooldown and a player capacity; towns do neither.

use serde::{Deserialize, Serialize};

use crate::core::types::{LocationId, RegionId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LocationKind {
    Town,
    Dungeon,
}

/// A place players can stand in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    pub level: u32,
    pub kind: LocationKind,
    pub region: RegionId,
    /// Live players one encounter may hold; `None` means unlimited
    pub max_players: Option<usize>,
    /// Seconds between the end of one encounter and the next; `None` never gates
    pub spawn_rate: Option<f64>,
    /// When the most recent encounter here ended
    pub last_event: Timestamp,
    pub created_at: Timestamp,
}

impl Location {
    pub fn town(name: String, level: u32, region: RegionId, now: Timestamp) -> Self {
        Self {
            id: LocationId::new(),
            name,
            level,
            kind: LocationKind::Town,
            region,
            max_players: None,
            spawn_rate: None,
            last_event: 0.0,
            created_at: now,
        }
    }

    pub fn dungeon(
        name: String,
        level: u32,
        region: RegionId,
        max_players: usize,
        spawn_rate: f64,
        now: Timestamp,
    ) -> Self {
        Self {
            id: LocationId::new(),
            name,
            level,
            kind: LocationKind::Dungeon,
            region,
            max_players: Some(max_players),
            spawn_rate: Some(spawn_rate),
            last_event: 0.0,
            created_at: now,
        }
    }

    pub fn is_town(&self) -> bool {
        self.kind == LocationKind::Town
    }

    /// Can an encounter with `live_players` players take one more?
    pub fn has_room(&self, live_players: usize) -> bool {
        self.max_players.map_or(true, |max| live_players < max)
    }

    /// Has the spawn cooldown run out at `now`?
    pub fn cooldown_elapsed(&self, now: Timestamp) -> bool {
        match self.spawn_rate {
            Some(rate) => now - self.last_event >= rate,
            None => true,
        }
    }
}
