//! Tick engine - advances one encounter by the ticks it is owed
//!
//! Encounters only move when somebody polls them. Each call measures how
//! many whole ticks have passed since the encounter clock was last settled,
//! plays exactly that many, and carries the fractional remainder forward:
//!
//! elapsed -> owed ticks -> combat rounds -> wander -> layout -> persist
//!
//! The whole call runs under the encounter's lease, so two members polling at
//! once never play the same tick twice. The row tables are only locked to load
//! and to persist; combat itself runs unlocked.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::core::clock::Clock;
use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::{EntityId, EventId, LocationId, Timestamp};
use crate::engine::admission::detach_player;
use crate::engine::changeset::ChangeSet;
use crate::engine::sync::{log_delta, LogLine, Watermark};
use crate::entity::combatant::Combatant;
use crate::entity::placement::{assign_layout, ring_distance, step_position};
use crate::store::{Store, Tables};
use crate::world::{PendingLog, Severity};

/// Flags for one `advance` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AdvanceOptions {
    /// Ignore the caller's watermark and return the whole log
    pub full: bool,
    /// Settle the encounter clock at `now` exactly, dropping the sub-tick phase
    pub force: bool,
}

/// A combatant as drawn on the encounter board
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySnapshot {
    pub public_id: EntityId,
    pub name: String,
    pub top: i32,
    pub left: i32,
    pub dead: bool,
    pub player: bool,
    pub health_percent: u32,
    pub html: String,
}

impl From<&Combatant> for EntitySnapshot {
    fn from(c: &Combatant) -> Self {
        Self {
            public_id: c.id,
            name: c.name.clone(),
            top: c.top,
            left: c.left,
            dead: c.is_dead(),
            player: c.is_player(),
            health_percent: c.health_percent(),
            html: c.render(),
        }
    }
}

/// What one `advance` call hands back to the poller
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickOutcome {
    pub log: Vec<LogLine>,
    /// Board snapshot; `None` once the encounter is over
    pub entities: Option<Vec<EntitySnapshot>>,
    /// Ticks played during this call
    pub ticks: u64,
    /// The encounter has ended and the caller was detached
    pub ended: bool,
}

/// Result of playing ticks over a roster in memory
#[derive(Debug, Default)]
pub struct TickReport {
    pub ticks: u64,
    pub logs: Vec<PendingLog>,
    /// Panels each damaged player needs refreshed
    pub changes: AHashMap<EntityId, ChangeSet>,
    /// Players killed during these ticks, in order of death
    pub fallen: Vec<EntityId>,
    /// Every enemy died; remaining ticks were dropped
    pub victory: bool,
}

/// Whole ticks owed for `elapsed` seconds and the leftover phase
pub fn owed_ticks(elapsed: f64, tick_seconds: f64) -> (u64, f64) {
    if !(elapsed > 0.0) || !(tick_seconds > 0.0) {
        return (0, elapsed.max(0.0));
    }
    let ticks = (elapsed / tick_seconds).floor();
    let offset = (elapsed - ticks * tick_seconds).max(0.0);
    (ticks as u64, offset)
}

/// Per-call RNG seed for an encounter
pub fn derive_seed(base: u64, event: EventId, now: Timestamp) -> u64 {
    let bits = event.0.as_u128();
    base ^ (bits as u64) ^ ((bits >> 64) as u64).rotate_left(17) ^ now.to_bits()
}

/// Closest living opponent of `roster[i]` on the ring; ties go to roster order
fn nearest_opponent(roster: &[Combatant], i: usize, size: i32) -> Option<usize> {
    let me = &roster[i];
    let from = me.position?;
    let side = me.side().opponent();
    roster
        .iter()
        .enumerate()
        .filter(|(j, c)| *j != i && c.side() == side && !c.is_dead())
        .filter_map(|(j, c)| c.position.map(|p| (ring_distance(from, p, size), j)))
        .min()
        .map(|(_, j)| j)
}

/// Living enemies drift along the ring
fn wander<R: Rng>(roster: &mut [Combatant], rng: &mut R, move_step: i32, size: i32) {
    for enemy in roster.iter_mut().filter(|c| c.is_enemy() && !c.is_dead()) {
        if let Some(position) = enemy.position {
            let step = rng.gen_range(-move_step..=move_step);
            enemy.position = Some(step_position(position, step, size));
        }
    }
}

/// Play `ticks` ticks over an in-memory roster
///
/// Within a tick every living combatant acts once, in roster (initiative)
/// order, striking the nearest living opponent. Deaths take effect at once.
/// The loop stops early when the last enemy dies.
pub fn run_ticks<R: Rng>(
    roster: &mut [Combatant],
    ticks: u64,
    rng: &mut R,
    now: Timestamp,
    config: &EngineConfig,
    size: i32,
) -> TickReport {
    let mut report = TickReport::default();
    let mut enemies_alive = roster.iter().filter(|c| c.is_enemy() && !c.is_dead()).count();

    'ticks: for _ in 0..ticks {
        report.ticks += 1;

        for i in 0..roster.len() {
            if roster[i].is_dead() {
                continue;
            }
            let Some(j) = nearest_opponent(roster, i, size) else {
                continue;
            };

            let damage = rng.gen_range(config.damage_min..config.damage_max);
            let attacker = roster[i].name.clone();
            roster[i].target = Some(roster[j].id);

            let target = &mut roster[j];
            let died = target.take_damage(damage, now);
            report.logs.push(PendingLog::new(
                Severity::Combat,
                format!("{attacker} hits {} for {damage} damage.", target.name),
            ));
            if target.is_player() {
                let entry = report.changes.entry(target.id).or_default();
                *entry = entry.union(ChangeSet::status());
            }

            if died {
                report
                    .logs
                    .push(PendingLog::new(Severity::Death, format!("{} is dead!", target.name)));
                if target.is_player() {
                    report.fallen.push(target.id);
                } else {
                    enemies_alive -= 1;
                }
                if enemies_alive == 0 {
                    report.logs.push(PendingLog::new(
                        Severity::Victory,
                        "All enemies have been defeated!",
                    ));
                    report.victory = true;
                    break 'ticks;
                }
            }
        }

        wander(roster, &mut *rng, config.move_step, size);
    }

    assign_layout(roster, size);
    report
}

/// Advance `event` on behalf of `player`
///
/// The encounter lease is held for the whole call and `now` is read only
/// once it is acquired. The tables themselves are locked twice, briefly: once
/// to load the roster and once to persist the result. Combat in between runs
/// unlocked, so other encounters tick in parallel.
pub async fn advance(
    store: &Store,
    clock: &dyn Clock,
    config: &EngineConfig,
    seed: u64,
    player: EntityId,
    event: EventId,
    opts: AdvanceOptions,
) -> Result<TickOutcome> {
    let _lease = store.lock_event(event).await;
    let now = clock.now();

    let mut owed = match store.write(|t| settle(t, config, player, event, opts, now))? {
        Settle::Done(outcome) => return Ok(outcome),
        Settle::Owed(owed) => owed,
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let report = run_ticks(&mut owed.roster, owed.ticks, &mut rng, now, config, owed.size);
    tracing::debug!(%event, owed = owed.ticks, played = report.ticks, lines = report.logs.len(), "ticks played");

    let settled_at = if opts.force { now } else { now - owed.offset };
    store.write(|t| persist(t, player, event, owed, report, settled_at, now))
}

/// Combat still to be played, loaded under the encounter lease
struct Owed {
    location: LocationId,
    size: i32,
    roster: Vec<Combatant>,
    ticks: u64,
    offset: f64,
    watermark: Watermark,
}

enum Settle {
    Done(TickOutcome),
    Owed(Owed),
}

fn caller_watermark(t: &Tables, caller: &Combatant, full: bool) -> Watermark {
    if full {
        return Watermark::Full;
    }
    let last_refresh = caller
        .as_player()
        .and_then(|p| p.active)
        .and_then(|account| t.account(account).ok())
        .map_or(0.0, |a| a.last_refresh);
    Watermark::since(last_refresh.max(caller.event_joined))
}

/// Living combatants only; the fallen were announced in the log
fn board(t: &Tables, event: EventId) -> Vec<EntitySnapshot> {
    t.roster(event)
        .iter()
        .filter(|c| !c.is_dead())
        .map(EntitySnapshot::from)
        .collect()
}

/// Close out a won encounter and release the caller
fn finish(
    t: &mut Tables,
    location: LocationId,
    event: EventId,
    player: EntityId,
    now: Timestamp,
) -> Result<()> {
    t.location_mut(location)?.last_event = now;
    t.event_mut(event)?.end(now);
    detach_player(t, player, now)?;
    tracing::info!(%event, %location, at = now, "encounter ended");
    Ok(())
}

/// Handle every case that needs no combat, or load what is owed
fn settle(
    t: &mut Tables,
    config: &EngineConfig,
    player: EntityId,
    event: EventId,
    opts: AdvanceOptions,
    now: Timestamp,
) -> Result<Settle> {
    let ev = t.event(event)?.clone();
    let location = t.location(ev.location)?.clone();
    let caller = t.combatant(player)?.clone();
    let watermark = caller_watermark(t, &caller, opts.full);

    // Towns are social only: report who else is here
    if location.is_town() {
        let others = t
            .roster(event)
            .iter()
            .filter(|c| c.id != player)
            .map(EntitySnapshot::from)
            .collect();
        return Ok(Settle::Done(TickOutcome {
            entities: Some(others),
            ..TickOutcome::default()
        }));
    }

    if ev.is_ended() {
        detach_player(t, player, now)?;
        return Ok(Settle::Done(TickOutcome {
            log: log_delta(t.logs_for(event), watermark),
            ended: true,
            ..TickOutcome::default()
        }));
    }

    let roster = t.roster(event);
    let enemies = roster.iter().filter(|c| c.is_enemy() && !c.is_dead()).count();

    if enemies == 0 {
        finish(t, location.id, event, player, now)?;
        return Ok(Settle::Done(TickOutcome {
            log: log_delta(t.logs_for(event), watermark),
            ended: true,
            ..TickOutcome::default()
        }));
    }

    // No combat is owed for time spent paused
    if !ev.active {
        let resumed = t.event_mut(event)?;
        resumed.active = true;
        resumed.last_update = now;
        tracing::debug!(%event, at = now, "encounter resumed");
        return Ok(Settle::Done(TickOutcome {
            log: log_delta(t.logs_for(event), watermark),
            entities: Some(board(t, event)),
            ..TickOutcome::default()
        }));
    }

    let (ticks, offset) = owed_ticks(now - ev.last_update, config.tick_seconds);
    if ticks == 0 {
        return Ok(Settle::Done(TickOutcome {
            log: log_delta(t.logs_for(event), watermark),
            entities: Some(board(t, event)),
            ..TickOutcome::default()
        }));
    }

    Ok(Settle::Owed(Owed {
        location: location.id,
        size: ev.size,
        roster,
        ticks,
        offset,
        watermark,
    }))
}

/// Write a played roster back and settle the encounter clock
fn persist(
    t: &mut Tables,
    player: EntityId,
    event: EventId,
    owed: Owed,
    report: TickReport,
    settled_at: Timestamp,
    now: Timestamp,
) -> Result<TickOutcome> {
    t.merge_combat_state(owed.roster);
    for (id, change) in &report.changes {
        if let Ok(combatant) = t.combatant_mut(*id) {
            change.apply(combatant);
        }
    }
    for fallen in &report.fallen {
        detach_player(t, *fallen, now)?;
    }
    t.append_logs(event, report.logs, now);
    // Players may have joined while combat ran
    t.relayout(event, owed.size);
    t.event_mut(event)?.last_update = settled_at;

    if report.victory {
        finish(t, owed.location, event, player, now)?;
        return Ok(TickOutcome {
            log: log_delta(t.logs_for(event), owed.watermark),
            ticks: report.ticks,
            ended: true,
            ..TickOutcome::default()
        });
    }

    if t.live_players(event) == 0 {
        let paused = t.event_mut(event)?;
        if paused.active {
            paused.active = false;
            tracing::debug!(%event, "encounter paused, no live players");
        }
    }

    Ok(TickOutcome {
        log: log_delta(t.logs_for(event), owed.watermark),
        entities: Some(board(t, event)),
        ticks: report.ticks,
        ended: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{AccountId, LocationId};
    use crate::entity::combatant::CombatStats;
    use crate::world::EnemyTemplate;
    use proptest::prelude::*;

    fn enemy(name: &str, health: i32, position: i32, event: EventId) -> Combatant {
        let template = EnemyTemplate::new(
            LocationId::new(),
            name.into(),
            health,
            1,
            CombatStats::default(),
            0.0,
        );
        let mut e = Combatant::enemy(&template, event, 0.0);
        e.position = Some(position);
        e
    }

    fn hero(health: i32, position: i32, event: EventId) -> Combatant {
        let mut p = Combatant::player("Ayla", health, AccountId::new(), 0.0);
        if let Some(state) = p.as_player_mut() {
            state.event = Some(event);
        }
        p.position = Some(position);
        p
    }

    #[test]
    fn test_owed_ticks_keeps_phase() {
        let (ticks, offset) = owed_ticks(3.75, 1.0);
        assert_eq!(ticks, 3);
        assert!((offset - 0.75).abs() < 1e-9);

        assert_eq!(owed_ticks(0.4, 1.0).0, 0);
        assert_eq!(owed_ticks(-2.0, 1.0), (0, 0.0));
        assert_eq!(owed_ticks(5.0, 2.0).0, 2);
    }

    #[test]
    fn test_nearest_opponent_uses_ring_distance() {
        let event = EventId::new();
        let roster = vec![
            hero(30, 2, event),
            enemy("Far", 10, 40, event),
            enemy("Wrapped", 10, 97, event),
        ];
        assert_eq!(nearest_opponent(&roster, 0, 100), Some(2));
        // Enemies never pick each other
        assert_eq!(nearest_opponent(&roster, 1, 100), Some(0));
    }

    #[test]
    fn test_zero_ticks_changes_nothing() {
        let event = EventId::new();
        let mut roster = vec![hero(30, 10, event), enemy("Rat", 10, 50, event)];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let report = run_ticks(&mut roster, 0, &mut rng, 5.0, &EngineConfig::default(), 100);
        assert_eq!(report.ticks, 0);
        assert!(report.logs.is_empty());
        assert_eq!(roster[1].health, 10);
        assert_eq!(roster[1].position, Some(50));
    }

    #[test]
    fn test_victory_stops_early() {
        let event = EventId::new();
        let mut roster = vec![hero(1000, 10, event), enemy("Rat", 1, 12, event)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let report = run_ticks(&mut roster, 50, &mut rng, 5.0, &EngineConfig::default(), 100);

        assert!(report.victory);
        assert_eq!(report.ticks, 1);
        assert!(roster[1].is_dead());
        let last = report.logs.last().unwrap();
        assert_eq!(last.severity, Severity::Victory);
        assert!(report.logs.iter().any(|l| l.text == "Rat is dead!"));
    }

    #[test]
    fn test_player_death_is_reported() {
        let event = EventId::new();
        let mut roster = vec![enemy("Ogre", 1000, 12, event), hero(1, 10, event)];
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let report = run_ticks(&mut roster, 3, &mut rng, 5.0, &EngineConfig::default(), 100);

        assert!(!report.victory);
        assert_eq!(report.fallen, vec![roster[1].id]);
        assert_eq!(report.changes.get(&roster[1].id), Some(&ChangeSet::status()));
        // With nobody left to fight the ogre keeps wandering
        assert_eq!(report.ticks, 3);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let event = EventId::new();
        let base = vec![
            hero(200, 10, event),
            enemy("Rat", 30, 40, event),
            enemy("Bat", 30, 70, event),
        ];
        let mut a = base.clone();
        let mut b = base;
        let config = EngineConfig::default();
        let ra = run_ticks(&mut a, 6, &mut ChaCha8Rng::seed_from_u64(11), 5.0, &config, 100);
        let rb = run_ticks(&mut b, 6, &mut ChaCha8Rng::seed_from_u64(11), 5.0, &config, 100);

        assert_eq!(ra.logs, rb.logs);
        let pos_a: Vec<_> = a.iter().map(|c| (c.health, c.position)).collect();
        let pos_b: Vec<_> = b.iter().map(|c| (c.health, c.position)).collect();
        assert_eq!(pos_a, pos_b);
    }

    proptest! {
        #[test]
        fn prop_owed_ticks_conserve_time(
            elapsed in 0.0f64..100_000.0,
            tick_seconds in 0.1f64..10.0
        ) {
            let (ticks, offset) = owed_ticks(elapsed, tick_seconds);
            prop_assert!(offset >= 0.0);
            prop_assert!(offset < tick_seconds + 1e-6);
            let rebuilt = ticks as f64 * tick_seconds + offset;
            prop_assert!((rebuilt - elapsed).abs() < 1e-6);
        }

        #[test]
        fn prop_damage_stays_in_range(seed in any::<u64>(), ticks in 1u64..20) {
            let event = EventId::new();
            let mut roster = vec![hero(10_000, 10, event), enemy("Slab", 10_000, 11, event)];
            let config = EngineConfig::default();
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            run_ticks(&mut roster, ticks, &mut rng, 1.0, &config, 100);

            // Two strikes per tick, each in [damage_min, damage_max)
            for c in &roster {
                let taken = c.max_health - c.health;
                prop_assert!(taken >= ticks as i32 * config.damage_min);
                prop_assert!(taken < ticks as i32 * config.damage_max);
                prop_assert!(c.position.map_or(false, |p| (0..100).contains(&p)));
            }
        }
    }
}
