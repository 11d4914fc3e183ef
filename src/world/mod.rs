//! World model: worlds, regions, locations, templates and encounters

pub mod content;
pub mod event;
pub mod genesis;
pub mod location;
pub mod template;

use serde::{Deserialize, Serialize};

use crate::core::types::{Biome, LocationId, RegionId, Timestamp, WorldId};

pub use content::{ContentGenerator, RegionPlan, SeededContentGenerator, TemplatePlan};
pub use event::{Event, EventLog, PendingLog, Severity};
pub use location::{Location, LocationKind};
pub use template::EnemyTemplate;

/// A named persistent universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct World {
    pub id: WorldId,
    pub name: String,
    pub start_location: Option<LocationId>,
    pub created_at: Timestamp,
}

impl World {
    pub fn new(name: String, now: Timestamp) -> Self {
        Self {
            id: WorldId::new(),
            name,
            start_location: None,
            created_at: now,
        }
    }
}

/// A biome-tagged subdivision of a world
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    pub world: WorldId,
    pub name: String,
    pub biome: Biome,
    pub level: u32,
    pub created_at: Timestamp,
}

impl Region {
    pub fn new(world: WorldId, name: String, biome: Biome, level: u32, now: Timestamp) -> Self {
        Self {
            id: RegionId::new(),
            world,
            name,
            biome,
            level,
            created_at: now,
        }
    }
}
