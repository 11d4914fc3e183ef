//! World genesis
//!
//! A world is created once per name. The first request builds its starting
//! region: one town (the start location) and a handful of dungeons, each
//! seeded with enemy templates from the content generator.

use crate::core::config::EngineConfig;
use crate::core::error::Result;
use crate::core::types::{Timestamp, WorldId};
use crate::store::Store;
use crate::world::content::ContentGenerator;
use crate::world::{EnemyTemplate, Location, Region, World};

/// Outcome of `get_or_create_world`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Genesis {
    pub world: WorldId,
    pub created: bool,
}

/// Fetch the world called `name`, creating and populating it if needed
pub fn get_or_create_world(
    store: &Store,
    generator: &dyn ContentGenerator,
    config: &EngineConfig,
    name: &str,
    now: Timestamp,
) -> Result<Genesis> {
    store.write(|t| {
        if let Some(world) = t.world_by_name(name) {
            return Ok(Genesis {
                world: world.id,
                created: false,
            });
        }

        let mut world = World::new(name.to_string(), now);
        let plan = generator.generate_region(name, 1);
        let region = Region::new(world.id, plan.name.clone(), plan.biome, 1, now);

        for town in &plan.towns {
            let location = Location::town(town.name.clone(), town.level, region.id, now);
            world.start_location.get_or_insert(location.id);
            t.insert_location(location);
        }

        for dungeon in &plan.dungeons {
            let location = Location::dungeon(
                dungeon.name.clone(),
                dungeon.level,
                region.id,
                config.dungeon_max_players,
                config.dungeon_spawn_rate,
                now,
            );
            let seed = format!("{name}/{}", dungeon.name);
            let templates = generator.generate_enemy_templates(
                &seed,
                dungeon.level,
                plan.biome,
                config.templates_per_dungeon,
            );
            for template in templates {
                let row = EnemyTemplate::new(
                    location.id,
                    template.name,
                    template.max_health,
                    dungeon.level,
                    template.stats,
                    now,
                )
                .with_svg(template.svg);
                t.insert_template(row);
            }
            t.insert_location(location);
        }

        tracing::info!(
            world = name,
            region = %plan.name,
            biome = plan.biome.name(),
            dungeons = plan.dungeons.len(),
            "world created"
        );

        let id = world.id;
        t.insert_region(region);
        t.insert_world(world);
        Ok(Genesis {
            world: id,
            created: true,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::content::SeededContentGenerator;
    use crate::world::LocationKind;

    #[test]
    fn test_world_created_once() {
        let store = Store::new();
        let config = EngineConfig::default();
        let generator = SeededContentGenerator::new(config.dungeons_per_region);

        let first = get_or_create_world(&store, &generator, &config, "Avalon", 1.0).unwrap();
        let second = get_or_create_world(&store, &generator, &config, "Avalon", 2.0).unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.world, second.world);
    }

    #[test]
    fn test_region_is_populated() {
        let store = Store::new();
        let config = EngineConfig::default();
        let generator = SeededContentGenerator::new(config.dungeons_per_region);
        let genesis = get_or_create_world(&store, &generator, &config, "Avalon", 1.0).unwrap();

        store
            .read(|t| {
                let world = t.world(genesis.world)?;
                let start = t.location(world.start_location.expect("start location"))?;
                assert_eq!(start.kind, LocationKind::Town);

                let regions = t.regions_in(world.id);
                assert_eq!(regions.len(), 1);
                let locations = t.locations_in(regions[0].id);
                assert_eq!(locations.len(), 1 + config.dungeons_per_region);

                for dungeon in locations.iter().filter(|l| !l.is_town()) {
                    assert_eq!(t.templates_at(dungeon.id).len(), config.templates_per_dungeon);
                    assert_eq!(dungeon.max_players, Some(config.dungeon_max_players));
                }
                Ok(())
            })
            .unwrap();
    }
}
