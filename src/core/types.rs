//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Wall-clock time in seconds since the Unix epoch.
///
/// Fractional seconds matter: the tick engine keeps the sub-tick phase
/// of an encounter's clock between polls.
pub type Timestamp = f64;

macro_rules! public_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

public_id!(
    /// Unique identifier for worlds
    WorldId
);
public_id!(
    /// Unique identifier for regions
    RegionId
);
public_id!(
    /// Unique identifier for locations (towns and dungeons)
    LocationId
);
public_id!(
    /// Unique identifier for encounters
    EventId
);
public_id!(
    /// Public identifier for combatants, players and enemies alike
    EntityId
);
public_id!(
    /// Unique identifier for enemy templates
    TemplateId
);
public_id!(
    /// Unique identifier for accounts
    AccountId
);

/// Monotonic row id for append-only tables (event log, chat).
///
/// Rows stamped with the same timestamp are ordered by this id.
pub type RowId = u64;

/// Region biome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Biome {
    Desert,
    Forest,
    Plains,
    Mountains,
    Swamp,
    Tundra,
}

impl Biome {
    pub const ALL: [Biome; 6] = [
        Biome::Desert,
        Biome::Forest,
        Biome::Plains,
        Biome::Mountains,
        Biome::Swamp,
        Biome::Tundra,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Biome::Desert => "Desert",
            Biome::Forest => "Forest",
            Biome::Plains => "Plains",
            Biome::Mountains => "Mountains",
            Biome::Swamp => "Swamp",
            Biome::Tundra => "Tundra",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = EventId::new();
        let b = EventId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashMap;
        let id = LocationId::new();
        let mut map: HashMap<LocationId, &str> = HashMap::new();
        map.insert(id, "crypt");
        assert_eq!(map.get(&id), Some(&"crypt"));
    }

    #[test]
    fn test_id_display_is_uuid() {
        let id = EntityId::new();
        assert_eq!(id.to_string(), id.0.to_string());
    }

    #[test]
    fn test_biome_names() {
        assert_eq!(Biome::ALL.len(), 6);
        assert_eq!(Biome::Swamp.name(), "Swamp");
    }
}
