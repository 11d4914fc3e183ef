//! Enemy templates
//!
//! Design-time prototypes stamped out into live enemies whenever a dungeon
//! opens a new encounter. Written once by world genesis.

use serde::{Deserialize, Serialize};

use crate::core::types::{LocationId, TemplateId, Timestamp};
use crate::entity::combatant::CombatStats;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyTemplate {
    pub id: TemplateId,
    pub location: LocationId,
    pub name: String,
    /// Sprite markup with `{public_id}`, `{top}`, `{left}` and `{dead}` slots
    pub svg: String,
    pub max_health: i32,
    pub level: u32,
    pub stats: CombatStats,
    pub created_at: Timestamp,
}

impl EnemyTemplate {
    pub fn new(
        location: LocationId,
        name: String,
        max_health: i32,
        level: u32,
        stats: CombatStats,
        now: Timestamp,
    ) -> Self {
        Self {
            id: TemplateId::new(),
            location,
            name,
            svg: String::new(),
            max_health,
            level,
            stats,
            created_at: now,
        }
    }

    pub fn with_svg(mut self, svg: String) -> Self {
        self.svg = svg;
        self
    }
}
