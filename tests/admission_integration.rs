//! Admission integration tests
//!
//! Many players arriving at one location at once must end up in at most one
//! encounter per capacity slot, never in duplicates.

use std::sync::Arc;

use qumud::core::clock::ManualClock;
use qumud::core::config::EngineConfig;
use qumud::core::types::{AccountId, EntityId, LocationId, RegionId};
use qumud::engine::admission::{acquire_or_create_event, admit, Admission};
use qumud::entity::combatant::{CombatStats, Combatant};
use qumud::store::Store;
use qumud::world::{EnemyTemplate, Location};

fn seed_dungeon(store: &Store, max_players: usize, spawn_rate: f64) -> LocationId {
    store
        .write(|t| {
            let crypt = Location::dungeon("Crypt".into(), 1, RegionId::new(), max_players, spawn_rate, 0.0);
            let id = crypt.id;
            for (name, initiative) in [("Rat", 1), ("Bat", 2), ("Toad", 3)] {
                let stats = CombatStats {
                    initiative,
                    ..CombatStats::default()
                };
                t.insert_template(EnemyTemplate::new(id, name.into(), 10, 1, stats, 0.0));
            }
            t.insert_location(crypt);
            Ok(id)
        })
        .unwrap()
}

fn seed_player(store: &Store, name: &str, location: LocationId) -> EntityId {
    store
        .write(|t| {
            let account = AccountId::new();
            let mut player = Combatant::player(name, 50, account, 0.0);
            if let Some(state) = player.as_player_mut() {
                state.active = Some(account);
                state.location = Some(location);
            }
            let id = player.id;
            t.insert_combatant(player);
            Ok(id)
        })
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creation_makes_one_event() {
    let store = Arc::new(Store::new());
    let clock = Arc::new(ManualClock::new(10.0));
    let config = Arc::new(EngineConfig::default());
    let location = seed_dungeon(&store, 100, 5.0);

    let mut tasks = Vec::new();
    for _ in 0..32 {
        let (store, clock, config) = (store.clone(), clock.clone(), config.clone());
        tasks.push(tokio::spawn(async move {
            acquire_or_create_event(&store, clock.as_ref(), &config, location)
                .await
                .unwrap()
        }));
    }

    let mut seen = Vec::new();
    for task in tasks {
        seen.push(task.await.unwrap().expect("cooldown has elapsed"));
    }
    seen.dedup();
    assert_eq!(seen.len(), 1);
    assert_eq!(store.read(|t| Ok(t.events_at(location).len())).unwrap(), 1);
    // Exactly one set of enemies was spawned
    assert_eq!(store.read(|t| Ok(t.roster(seen[0]).len())).unwrap(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admits_share_one_event() {
    let store = Arc::new(Store::new());
    let clock = Arc::new(ManualClock::new(10.0));
    let config = Arc::new(EngineConfig::default());
    let location = seed_dungeon(&store, 100, 5.0);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let player = seed_player(&store, &format!("Hero{i}"), location);
        let (store, clock, config) = (store.clone(), clock.clone(), config.clone());
        tasks.push(tokio::spawn(async move {
            admit(&store, clock.as_ref(), &config, player, location).await.unwrap()
        }));
    }

    let mut created = 0;
    for task in tasks {
        if let Admission::Created(_) = task.await.unwrap() {
            created += 1;
        }
    }
    assert_eq!(created, 1);

    store
        .read(|t| {
            let events = t.events_at(location);
            assert_eq!(events.len(), 1);
            assert_eq!(t.live_players(events[0].id), 16);
            Ok(())
        })
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_admits_respect_capacity() {
    let store = Arc::new(Store::new());
    let clock = Arc::new(ManualClock::new(10.0));
    let config = Arc::new(EngineConfig::default());
    let location = seed_dungeon(&store, 2, 5.0);

    let mut tasks = Vec::new();
    for i in 0..8 {
        let player = seed_player(&store, &format!("Hero{i}"), location);
        let (store, clock, config) = (store.clone(), clock.clone(), config.clone());
        tasks.push(tokio::spawn(async move {
            admit(&store, clock.as_ref(), &config, player, location).await.unwrap()
        }));
    }
    for task in tasks {
        assert!(task.await.unwrap().event().is_some());
    }

    store
        .read(|t| {
            let events = t.events_at(location);
            assert_eq!(events.len(), 4);
            for event in events {
                assert_eq!(t.live_players(event.id), 2);
            }
            Ok(())
        })
        .unwrap();
}

#[tokio::test]
async fn test_full_event_is_skipped() {
    let store = Store::new();
    let clock = ManualClock::new(10.0);
    let config = EngineConfig::default();
    let location = seed_dungeon(&store, 1, 5.0);

    let a = seed_player(&store, "Ayla", location);
    let b = seed_player(&store, "Bram", location);
    let c = seed_player(&store, "Cato", location);

    let first = admit(&store, &clock, &config, a, location).await.unwrap();
    let second = admit(&store, &clock, &config, b, location).await.unwrap();
    assert!(matches!(first, Admission::Created(_)));
    assert!(matches!(second, Admission::Created(_)));
    assert_ne!(first.event(), second.event());

    // Both encounters full and the cooldown restarted: nothing to join
    store
        .write(|t| {
            t.location_mut(location)?.last_event = 9.0;
            Ok(())
        })
        .unwrap();
    let third = admit(&store, &clock, &config, c, location).await.unwrap();
    assert_eq!(third, Admission::Blocked);
    assert_eq!(
        store.read(|t| Ok(t.combatant(c)?.event())).unwrap(),
        None
    );
}

#[tokio::test]
async fn test_cooldown_boundary_is_inclusive() {
    let store = Store::new();
    let config = EngineConfig::default();
    let location = seed_dungeon(&store, 2, 5.0);

    let early = ManualClock::new(4.999);
    assert_eq!(
        acquire_or_create_event(&store, &early, &config, location).await.unwrap(),
        None
    );

    let on_time = ManualClock::new(5.0);
    assert!(acquire_or_create_event(&store, &on_time, &config, location)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_ended_event_is_not_rejoined() {
    let store = Store::new();
    let clock = ManualClock::new(10.0);
    let config = EngineConfig::default();
    let location = seed_dungeon(&store, 2, 5.0);

    let first = acquire_or_create_event(&store, &clock, &config, location)
        .await
        .unwrap()
        .unwrap();
    store
        .write(|t| {
            t.event_mut(first)?.end(10.0);
            t.location_mut(location)?.last_event = 10.0;
            Ok(())
        })
        .unwrap();

    clock.set(12.0);
    assert_eq!(
        acquire_or_create_event(&store, &clock, &config, location).await.unwrap(),
        None
    );

    clock.set(15.0);
    let next = acquire_or_create_event(&store, &clock, &config, location)
        .await
        .unwrap()
        .unwrap();
    assert_ne!(next, first);
}
