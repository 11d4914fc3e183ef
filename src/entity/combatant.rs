//! Combatant - a player character or an enemy inside an encounter
//!
//! Both variants share one record; the `kind` discriminant carries the
//! fields only one side has.

use serde::{Deserialize, Serialize};

use crate::core::types::{AccountId, EntityId, EventId, LocationId, TemplateId, Timestamp};
use crate::world::template::EnemyTemplate;

/// Combat numbers that never change during an encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    pub attack_range: i32,
    pub attack_damage: i32,
    pub speed: i32,
    /// Turn-order weight; higher acts first within a tick
    pub initiative: i32,
    pub max_targets: u32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            attack_range: 1,
            attack_damage: 1,
            speed: 1,
            initiative: 0,
            max_targets: 1,
        }
    }
}

/// Which side of a fight a combatant is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Players,
    Enemies,
}

impl Side {
    pub fn opponent(self) -> Side {
        match self {
            Side::Players => Side::Enemies,
            Side::Enemies => Side::Players,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerState {
    pub owner: AccountId,
    /// Account currently controlling this character
    pub active: Option<AccountId>,
    pub location: Option<LocationId>,
    pub event: Option<EventId>,
    /// Status panel needs a refresh
    pub new_status: bool,
    /// Location panel needs a refresh
    pub new_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyState {
    pub template: TemplateId,
    pub event: EventId,
    pub svg: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CombatantKind {
    Player(PlayerState),
    Enemy(EnemyState),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: EntityId,
    pub name: String,
    pub level: u32,
    pub health: i32,
    pub max_health: i32,
    pub stats: CombatStats,
    pub target: Option<EntityId>,
    /// Cell on the encounter ring; `None` outside an encounter
    pub position: Option<i32>,
    pub left: i32,
    pub top: i32,
    pub dead: Option<Timestamp>,
    pub event_joined: Timestamp,
    pub created_at: Timestamp,
    pub kind: CombatantKind,
}

impl Combatant {
    /// A fresh character at full health, not yet placed in any world
    pub fn player(name: &str, max_health: i32, owner: AccountId, now: Timestamp) -> Self {
        Self {
            id: EntityId::new(),
            name: name.to_string(),
            level: 1,
            health: max_health,
            max_health,
            stats: CombatStats::default(),
            target: None,
            position: None,
            left: 50,
            top: 50,
            dead: None,
            event_joined: 0.0,
            created_at: now,
            kind: CombatantKind::Player(PlayerState {
                owner,
                active: None,
                location: None,
                event: None,
                new_status: false,
                new_location: false,
            }),
        }
    }

    /// Stamp a live enemy out of its template
    pub fn enemy(template: &EnemyTemplate, event: EventId, now: Timestamp) -> Self {
        Self {
            id: EntityId::new(),
            name: template.name.clone(),
            level: template.level,
            health: template.max_health,
            max_health: template.max_health,
            stats: template.stats,
            target: None,
            position: None,
            left: 50,
            top: 50,
            dead: None,
            event_joined: now,
            created_at: now,
            kind: CombatantKind::Enemy(EnemyState {
                template: template.id,
                event,
                svg: template.svg.clone(),
            }),
        }
    }

    pub fn side(&self) -> Side {
        match self.kind {
            CombatantKind::Player(_) => Side::Players,
            CombatantKind::Enemy(_) => Side::Enemies,
        }
    }

    pub fn is_player(&self) -> bool {
        matches!(self.kind, CombatantKind::Player(_))
    }

    pub fn is_enemy(&self) -> bool {
        matches!(self.kind, CombatantKind::Enemy(_))
    }

    pub fn is_dead(&self) -> bool {
        self.dead.is_some()
    }

    /// Encounter this combatant belongs to, if any
    pub fn event(&self) -> Option<EventId> {
        match &self.kind {
            CombatantKind::Player(p) => p.event,
            CombatantKind::Enemy(e) => Some(e.event),
        }
    }

    pub fn as_player(&self) -> Option<&PlayerState> {
        match &self.kind {
            CombatantKind::Player(p) => Some(p),
            CombatantKind::Enemy(_) => None,
        }
    }

    pub fn as_player_mut(&mut self) -> Option<&mut PlayerState> {
        match &mut self.kind {
            CombatantKind::Player(p) => Some(p),
            CombatantKind::Enemy(_) => None,
        }
    }

    /// Health as a whole percentage of max health (0 when max is 0)
    pub fn health_percent(&self) -> u32 {
        if self.max_health <= 0 || self.health <= 0 {
            return 0;
        }
        (self.health as i64 * 100 / self.max_health as i64) as u32
    }

    /// Subtract damage; returns true if this blow dropped health below 1
    pub fn take_damage(&mut self, amount: i32, now: Timestamp) -> bool {
        if self.is_dead() {
            return false;
        }
        self.health -= amount;
        if self.health < 1 {
            self.dead = Some(now);
            return true;
        }
        false
    }

    /// Restore to full health and clear death
    pub fn revive(&mut self) {
        self.health = self.max_health;
        self.dead = None;
        self.target = None;
    }

    /// Display fragment for the encounter board
    pub fn render(&self) -> String {
        let dead = if self.is_dead() { "defeat-animate" } else { "" };
        match &self.kind {
            CombatantKind::Enemy(e) => e
                .svg
                .replace("{public_id}", &self.id.to_string())
                .replace("{top}", &self.top.to_string())
                .replace("{left}", &self.left.to_string())
                .replace("{dead}", dead),
            CombatantKind::Player(_) => format!(
                r#"<div id="{}" class="player {}" style="top:{}%;left:{}%">{}</div>"#,
                self.id, dead, self.top, self.left, self.name
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn goblin() -> EnemyTemplate {
        EnemyTemplate::new(
            LocationId::new(),
            "Goblin".into(),
            10,
            2,
            CombatStats {
                initiative: 3,
                ..CombatStats::default()
            },
            0.0,
        )
        .with_svg(r#"<svg id="{public_id}" style="top:{top}%;left:{left}%" class="{dead}"/>"#.into())
    }

    #[test]
    fn test_enemy_from_template_is_full_health() {
        let template = goblin();
        let enemy = Combatant::enemy(&template, EventId::new(), 7.0);
        assert_eq!(enemy.health, 10);
        assert_eq!(enemy.max_health, 10);
        assert_eq!(enemy.stats.initiative, 3);
        assert_eq!(enemy.side(), Side::Enemies);
        assert!(!enemy.is_dead());
    }

    #[test]
    fn test_health_percent_rises_with_health() {
        let mut player = Combatant::player("Ayla", 40, AccountId::new(), 0.0);
        assert_eq!(player.health_percent(), 100);
        player.health = 10;
        assert_eq!(player.health_percent(), 25);
        player.health = 13;
        assert_eq!(player.health_percent(), 32);
        player.health = 0;
        assert_eq!(player.health_percent(), 0);
        player.max_health = 0;
        assert_eq!(player.health_percent(), 0);
    }

    #[test]
    fn test_damage_kills_below_one() {
        let mut enemy = Combatant::enemy(&goblin(), EventId::new(), 0.0);
        assert!(!enemy.take_damage(9, 1.0));
        assert_eq!(enemy.health, 1);
        assert!(enemy.take_damage(1, 2.0));
        assert_eq!(enemy.dead, Some(2.0));
        // Already dead: no second death
        assert!(!enemy.take_damage(4, 3.0));
        assert_eq!(enemy.dead, Some(2.0));
    }

    #[test]
    fn test_render_fills_slots() {
        let mut enemy = Combatant::enemy(&goblin(), EventId::new(), 0.0);
        enemy.top = 38;
        enemy.left = 57;
        let html = enemy.render();
        assert!(html.contains(&enemy.id.to_string()));
        assert!(html.contains("top:38%"));
        assert!(html.contains("left:57%"));
        assert!(!html.contains("defeat-animate"));

        enemy.dead = Some(1.0);
        assert!(enemy.render().contains("defeat-animate"));
    }

    #[test]
    fn test_revive_restores_health() {
        let mut player = Combatant::player("Ayla", 20, AccountId::new(), 0.0);
        player.take_damage(25, 4.0);
        assert!(player.is_dead());
        player.revive();
        assert_eq!(player.health, 20);
        assert!(!player.is_dead());
    }
}
