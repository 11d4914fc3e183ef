use thiserror::Error;

/// Kind of record a lookup failed to find
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resource {
    World(String),
    Region(crate::core::types::RegionId),
    Location(crate::core::types::LocationId),
    Event(crate::core::types::EventId),
    Entity(crate::core::types::EntityId),
    Account(crate::core::types::AccountId),
    ActiveCharacter(crate::core::types::AccountId),
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Not found: {0:?}")]
    NotFound(Resource),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store lock poisoned")]
    StorePoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl EngineError {
    /// Errors a poll should absorb into an empty payload instead of failing.
    ///
    /// A missing row usually means an encounter expired between admission
    /// and ticking; the next poll retries admission.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, EngineError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
