pub mod combatant;
pub mod placement;

pub use combatant::{CombatStats, Combatant, CombatantKind, EnemyState, PlayerState, Side};
