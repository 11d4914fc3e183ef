//! Events (encounters) and their append-only log

use serde::{Deserialize, Serialize};

use crate::core::types::{EventId, LocationId, RowId, Timestamp};

/// A live, time-stepped encounter bound to one location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub location: LocationId,
    /// Ring length for combatant positions
    pub size: i32,
    /// False while paused (no live players)
    pub active: bool,
    /// Simulation clock: time the last owed tick was settled
    pub last_update: Timestamp,
    /// Set once the encounter is over for good
    pub ended: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl Event {
    pub fn new(location: LocationId, size: i32, now: Timestamp) -> Self {
        Self {
            id: EventId::new(),
            location,
            size,
            active: true,
            last_update: now,
            ended: None,
            created_at: now,
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.is_some()
    }

    /// Terminate the encounter
    pub fn end(&mut self, now: Timestamp) {
        self.ended = Some(now);
        self.active = false;
    }
}

/// Display class of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Spawn,
    Combat,
    Death,
    Victory,
}

impl Severity {
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Info => "log-info",
            Severity::Spawn => "log-spawn",
            Severity::Combat => "log-combat",
            Severity::Death => "log-death",
            Severity::Victory => "log-victory",
        }
    }
}

/// One immutable line of an encounter's log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog {
    pub id: RowId,
    pub event: EventId,
    pub created_at: Timestamp,
    pub severity: Severity,
    pub text: String,
}

/// A log line produced during a tick, not yet stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingLog {
    pub severity: Severity,
    pub text: String,
}

impl PendingLog {
    pub fn new(severity: Severity, text: impl Into<String>) -> Self {
        Self {
            severity,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_is_live() {
        let event = Event::new(LocationId::new(), 100, 42.5);
        assert!(event.active);
        assert!(!event.is_ended());
        assert_eq!(event.last_update, 42.5);
    }

    #[test]
    fn test_end_deactivates() {
        let mut event = Event::new(LocationId::new(), 100, 0.0);
        event.end(9.0);
        assert!(event.is_ended());
        assert!(!event.active);
        assert_eq!(event.ended, Some(9.0));
    }

    #[test]
    fn test_severity_serializes_lowercase() {
        let json = serde_json::to_string(&Severity::Victory).unwrap();
        assert_eq!(json, "\"victory\"");
        assert_eq!(Severity::Death.css_class(), "log-death");
    }
}
