//! Procedural content collaborator
//!
//! World genesis asks a `ContentGenerator` for region layouts and enemy
//! templates. The shipped generator draws from small word tables with a
//! seeded ChaCha stream, so the same seed always yields the same world.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::types::Biome;
use crate::entity::combatant::CombatStats;

/// A location the generator wants created
#[derive(Debug, Clone, PartialEq)]
pub struct LocationPlan {
    pub name: String,
    pub level: u32,
}

/// Layout of a freshly generated region
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPlan {
    pub name: String,
    pub biome: Biome,
    pub towns: Vec<LocationPlan>,
    pub dungeons: Vec<LocationPlan>,
}

/// Prototype for one kind of enemy
#[derive(Debug, Clone, PartialEq)]
pub struct TemplatePlan {
    pub name: String,
    pub svg: String,
    pub max_health: i32,
    pub stats: CombatStats,
}

pub trait ContentGenerator: Send + Sync {
    fn generate_region(&self, seed: &str, level: u32) -> RegionPlan;

    fn generate_enemy_templates(
        &self,
        seed: &str,
        level: u32,
        biome: Biome,
        count: usize,
    ) -> Vec<TemplatePlan>;
}

const REGION_PREFIXES: &[&str] = &["Ash", "Gloam", "Briar", "Frost", "Dun", "Mire", "Sun", "Thorn"];
const REGION_SUFFIXES: &[&str] = &["reach", "vale", "march", "wold", "moor", "fells"];
const TOWN_NAMES: &[&str] = &["Brindle", "Harrowgate", "Oakmere", "Saltcross", "Wenlock", "Kettleby"];
const DUNGEON_NOUNS: &[&str] = &["Crypt", "Warren", "Hollow", "Pit", "Barrow", "Sink", "Deep"];
const DUNGEON_ADJECTIVES: &[&str] = &["Sunken", "Howling", "Ashen", "Rotting", "Silent", "Broken"];

fn creatures(biome: Biome) -> &'static [&'static str] {
    match biome {
        Biome::Desert => &["Sand Wyrm", "Dune Jackal", "Scorpid", "Dust Wraith"],
        Biome::Forest => &["Dire Wolf", "Thornling", "Bramble Bear", "Moss Troll"],
        Biome::Plains => &["Gnoll", "Plains Boar", "Hawkling", "Bandit"],
        Biome::Mountains => &["Rock Goblin", "Crag Harpy", "Stone Ogre", "Cave Bat"],
        Biome::Swamp => &["Bog Lurker", "Leech Swarm", "Mire Hag", "Toadkin"],
        Biome::Tundra => &["Frost Wolf", "Ice Imp", "Yeti", "Snow Stalker"],
    }
}

fn tint(biome: Biome) -> &'static str {
    match biome {
        Biome::Desert => "#c9a25b",
        Biome::Forest => "#3f7a3a",
        Biome::Plains => "#9bb04a",
        Biome::Mountains => "#7d7d8a",
        Biome::Swamp => "#4f5d3a",
        Biome::Tundra => "#bcd6e8",
    }
}

/// Fold an arbitrary seed string into a ChaCha seed
fn rng_for(seed: &str, stream: u64) -> ChaCha8Rng {
    let mut bytes = [0u8; 32];
    for (i, b) in seed.bytes().enumerate() {
        bytes[i % 32] = bytes[i % 32].wrapping_mul(31).wrapping_add(b);
    }
    let mut rng = ChaCha8Rng::from_seed(bytes);
    rng.set_stream(stream);
    rng
}

fn pick<'a>(rng: &mut ChaCha8Rng, words: &'a [&'a str]) -> &'a str {
    words.choose(rng).copied().unwrap_or("Nameless")
}

/// Word-table generator
#[derive(Debug, Clone)]
pub struct SeededContentGenerator {
    pub dungeons_per_region: usize,
}

impl SeededContentGenerator {
    pub fn new(dungeons_per_region: usize) -> Self {
        Self {
            dungeons_per_region,
        }
    }
}

impl Default for SeededContentGenerator {
    fn default() -> Self {
        Self::new(5)
    }
}

impl ContentGenerator for SeededContentGenerator {
    fn generate_region(&self, seed: &str, level: u32) -> RegionPlan {
        let mut rng = rng_for(seed, 0);
        let biome = *Biome::ALL.choose(&mut rng).unwrap_or(&Biome::Plains);
        let name = format!(
            "{}{}",
            pick(&mut rng, REGION_PREFIXES),
            pick(&mut rng, REGION_SUFFIXES)
        );

        let towns = vec![LocationPlan {
            name: pick(&mut rng, TOWN_NAMES).to_string(),
            level,
        }];

        let dungeons = (0..self.dungeons_per_region)
            .map(|i| LocationPlan {
                name: format!(
                    "The {} {} {}",
                    pick(&mut rng, DUNGEON_ADJECTIVES),
                    pick(&mut rng, DUNGEON_NOUNS),
                    roman(i + 1)
                ),
                level: rng.gen_range(level..level + 4),
            })
            .collect();

        RegionPlan {
            name,
            biome,
            towns,
            dungeons,
        }
    }

    fn generate_enemy_templates(
        &self,
        seed: &str,
        level: u32,
        biome: Biome,
        count: usize,
    ) -> Vec<TemplatePlan> {
        let mut rng = rng_for(seed, 1 + level as u64);
        (0..count)
            .map(|_| {
                let name = pick(&mut rng, creatures(biome)).to_string();
                let max_health = 6 + 2 * level as i32 + rng.gen_range(0..5);
                let stats = CombatStats {
                    initiative: rng.gen_range(0..6),
                    speed: rng.gen_range(1..4),
                    ..CombatStats::default()
                };
                TemplatePlan {
                    svg: sprite(biome),
                    name,
                    max_health,
                    stats,
                }
            })
            .collect()
    }
}

fn sprite(biome: Biome) -> String {
    format!(
        r#"<svg id="{{public_id}}" class="enemy {{dead}}" style="top:{{top}}%;left:{{left}}%" viewBox="0 0 10 10"><circle cx="5" cy="5" r="4" fill="{}"/></svg>"#,
        tint(biome)
    )
}

fn roman(n: usize) -> &'static str {
    const NUMERALS: [&str; 10] = ["I", "II", "III", "IV", "V", "VI", "VII", "VIII", "IX", "X"];
    NUMERALS.get(n.saturating_sub(1)).copied().unwrap_or("X")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_is_deterministic_per_seed() {
        let gen = SeededContentGenerator::default();
        let a = gen.generate_region("Avalon", 1);
        let b = gen.generate_region("Avalon", 1);
        assert_eq!(a, b);
        assert_eq!(a.towns.len(), 1);
        assert_eq!(a.dungeons.len(), 5);
    }

    #[test]
    fn test_dungeon_levels_stay_near_region_level() {
        let gen = SeededContentGenerator::new(8);
        let plan = gen.generate_region("Lowlands", 3);
        assert!(plan.dungeons.iter().all(|d| (3..7).contains(&d.level)));
    }

    #[test]
    fn test_templates_have_sprite_slots() {
        let gen = SeededContentGenerator::default();
        let templates = gen.generate_enemy_templates("crypt", 2, Biome::Swamp, 3);
        assert_eq!(templates.len(), 3);
        for t in &templates {
            assert!(t.max_health >= 10);
            assert!(t.svg.contains("{public_id}"));
            assert!(t.svg.contains("{top}"));
            assert!(t.svg.contains("{dead}"));
        }
    }
}
