//! Event admission
//!
//! Funnels players arriving at a location into at most one encounter. The
//! whole find-or-create decision, and the attach that follows it, runs under
//! the location's lease, so two callers racing for the same location see each
//! other's results instead of both creating an encounter.

use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::core::error::{EngineError, Result};
use crate::core::types::{EntityId, EventId, LocationId, Timestamp};
use crate::entity::combatant::Combatant;
use crate::entity::placement::assign_layout;
use crate::store::{Store, Tables};
use crate::world::{Event, Location, PendingLog, Severity};

/// How an admission decision came out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// An open encounter with room was found
    Joined(EventId),
    /// No encounter qualified; a new one was opened
    Created(EventId),
    /// Nothing open and the location is still cooling down
    Blocked,
}

impl Admission {
    pub fn event(&self) -> Option<EventId> {
        match self {
            Admission::Joined(id) | Admission::Created(id) => Some(*id),
            Admission::Blocked => None,
        }
    }
}

/// Find or open the encounter a newcomer at `location` should join
///
/// Returns `None` while a dungeon's cooldown is still running and no open
/// encounter has room.
pub async fn acquire_or_create_event(
    store: &Store,
    clock: &dyn Clock,
    config: &EngineConfig,
    location: LocationId,
) -> Result<Option<EventId>> {
    let _lease = store.lock_location(location).await;
    let now = clock.now();
    let admission = store.write(|t| decide(t, config, location, now))?;
    Ok(admission.event())
}

/// Admit a player standing at `location` and attach them to the result
pub async fn admit(
    store: &Store,
    clock: &dyn Clock,
    config: &EngineConfig,
    player: EntityId,
    location: LocationId,
) -> Result<Admission> {
    let _lease = store.lock_location(location).await;
    let now = clock.now();

    store.write(|t| {
        // Check the player before anything is created for them
        let current = t.combatant(player)?;
        let already = current.as_player().and_then(|p| p.event);
        if let Some(event) = already {
            if t.event(event).is_ok_and(|e| e.location == location && !e.is_ended()) {
                return Ok(Admission::Joined(event));
            }
        }

        let admission = decide(t, config, location, now)?;
        if let Some(event) = admission.event() {
            attach_player(t, config, player, event, now)?;
        }
        tracing::debug!(%player, %location, ?admission, "admission decided");
        Ok(admission)
    })
}

/// The admission decision itself; the caller holds the location lease
fn decide(
    t: &mut Tables,
    config: &EngineConfig,
    location: LocationId,
    now: Timestamp,
) -> Result<Admission> {
    let loc = t.location(location)?.clone();

    let open = t
        .open_events_at(location)
        .into_iter()
        .map(|e| e.id)
        .find(|id| loc.has_room(t.live_players(*id)));
    if let Some(event) = open {
        return Ok(Admission::Joined(event));
    }

    if !loc.cooldown_elapsed(now) {
        return Ok(Admission::Blocked);
    }

    let event = open_event(t, config, &loc, now);
    Ok(Admission::Created(event))
}

/// Create an encounter at `location`, stamping out its enemies
fn open_event(t: &mut Tables, config: &EngineConfig, location: &Location, now: Timestamp) -> EventId {
    let event = Event::new(location.id, config.event_size, now);
    let id = event.id;
    t.insert_event(event);

    if location.is_town() {
        tracing::debug!(location = %location.name, event = %id, "town gathering opened");
        return id;
    }

    let mut enemies: Vec<Combatant> = t
        .templates_at(location.id)
        .into_iter()
        .map(|template| {
            let mut enemy = Combatant::enemy(template, id, now);
            let spread = config.spawn_base_offset + template.stats.initiative * config.spawn_initiative_spread;
            enemy.position = Some(spread.rem_euclid(config.event_size));
            enemy
        })
        .collect();
    assign_layout(&mut enemies, config.event_size);

    let lines: Vec<PendingLog> = enemies
        .iter()
        .map(|e| PendingLog::new(Severity::Spawn, format!("Encountered level {} {}!", e.level, e.name)))
        .collect();
    let spawned = enemies.len();
    t.update_combatants(enemies);
    t.append_logs(id, lines, now);

    tracing::info!(location = %location.name, event = %id, spawned, "encounter created");
    id
}

/// Attach a player to an encounter at its spawn cell and redo the board layout
pub(crate) fn attach_player(
    t: &mut Tables,
    config: &EngineConfig,
    player: EntityId,
    event: EventId,
    now: Timestamp,
) -> Result<()> {
    let size = t.event(event)?.size;
    let combatant = t.combatant_mut(player)?;
    let position = config.player_spawn_position.rem_euclid(size);
    let state = combatant
        .as_player_mut()
        .ok_or_else(|| EngineError::InvalidTransition(format!("{player} is not a player")))?;
    state.event = Some(event);
    combatant.event_joined = now;
    combatant.position = Some(position);
    combatant.target = None;
    t.relayout(event, size);
    Ok(())
}

/// Detach a player from whatever encounter holds them, returning it
///
/// Pauses the encounter when this was its last live player. The caller holds
/// that encounter's lease.
pub(crate) fn detach_player(t: &mut Tables, player: EntityId, now: Timestamp) -> Result<Option<EventId>> {
    let combatant = t.combatant_mut(player)?;
    let Some(state) = combatant.as_player_mut() else {
        return Ok(None);
    };
    let Some(event) = state.event.take() else {
        return Ok(None);
    };
    combatant.event_joined = 0.0;
    combatant.position = None;
    combatant.target = None;

    if t.live_players(event) == 0 {
        if let Ok(ev) = t.event_mut(event) {
            if ev.active && !ev.is_ended() {
                ev.active = false;
                tracing::debug!(%event, at = now, "encounter paused");
            }
        }
    }
    Ok(Some(event))
}
