//! Log and delta sync
//!
//! Every account remembers when it last polled. A row is new for a caller
//! when it was created at or after that watermark; a full request skips the
//! check and gets everything. Rows created during a poll are sent again on
//! the next one, so clients de-duplicate on row id.

use serde::Serialize;

use crate::core::types::{RowId, Timestamp};
use crate::world::{EventLog, Severity};

/// What a caller has already seen
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Watermark {
    /// Initial payload; nothing has been seen
    Full,
    /// Rows created at or after this instant are new
    Since(Timestamp),
}

impl Watermark {
    pub fn since(t: Timestamp) -> Self {
        Watermark::Since(t)
    }

    pub fn admits(&self, created_at: Timestamp) -> bool {
        match self {
            Watermark::Full => true,
            Watermark::Since(t) => created_at >= *t,
        }
    }

    /// The later of two watermarks; `Full` loses to any `Since`
    pub fn max(self, other: Watermark) -> Watermark {
        match (self, other) {
            (Watermark::Full, w) | (w, Watermark::Full) => w,
            (Watermark::Since(a), Watermark::Since(b)) => Watermark::Since(a.max(b)),
        }
    }
}

/// Does the newest row clear the watermark?
pub fn has_new<T>(
    rows: &[T],
    watermark: Watermark,
    created_at: impl Fn(&T) -> Timestamp,
) -> bool {
    match watermark {
        Watermark::Full => true,
        Watermark::Since(_) => rows
            .iter()
            .map(&created_at)
            .fold(None, |acc: Option<Timestamp>, t| Some(acc.map_or(t, |a| a.max(t))))
            .is_some_and(|newest| watermark.admits(newest)),
    }
}

/// Rows new for this caller, or `None` when nothing changed
///
/// A full request always yields `Some`, possibly empty.
pub fn delta<T>(
    rows: Vec<T>,
    watermark: Watermark,
    created_at: impl Fn(&T) -> Timestamp,
) -> Option<Vec<T>> {
    if !has_new(&rows, watermark, &created_at) {
        return None;
    }
    let fresh: Vec<T> = rows
        .into_iter()
        .filter(|row| watermark.admits(created_at(row)))
        .collect();
    match watermark {
        Watermark::Full => Some(fresh),
        Watermark::Since(_) if fresh.is_empty() => None,
        Watermark::Since(_) => Some(fresh),
    }
}

/// One log line as sent to a client
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogLine {
    pub id: RowId,
    pub text: String,
    pub severity: Severity,
    pub class: &'static str,
    pub created_at: Timestamp,
}

impl From<EventLog> for LogLine {
    fn from(row: EventLog) -> Self {
        Self {
            id: row.id,
            class: row.severity.css_class(),
            severity: row.severity,
            text: row.text,
            created_at: row.created_at,
        }
    }
}

/// Encounter log rows for a caller, oldest first
pub fn log_delta(rows: Vec<EventLog>, watermark: Watermark) -> Vec<LogLine> {
    delta(rows, watermark, |row| row.created_at)
        .unwrap_or_default()
        .into_iter()
        .map(LogLine::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::EventId;

    fn rows(times: &[Timestamp]) -> Vec<EventLog> {
        let event = EventId::new();
        times
            .iter()
            .enumerate()
            .map(|(i, t)| EventLog {
                id: i as RowId + 1,
                event,
                created_at: *t,
                severity: Severity::Combat,
                text: format!("line {i}"),
            })
            .collect()
    }

    #[test]
    fn test_full_returns_everything() {
        let lines = log_delta(rows(&[1.0, 2.0, 3.0]), Watermark::Full);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].id, 1);
    }

    #[test]
    fn test_since_is_inclusive() {
        let lines = log_delta(rows(&[1.0, 2.0, 2.0, 3.0]), Watermark::since(2.0));
        let ids: Vec<RowId> = lines.iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![2, 3, 4]);
    }

    #[test]
    fn test_watermark_after_latest_is_empty() {
        assert!(log_delta(rows(&[1.0, 2.0]), Watermark::since(2.5)).is_empty());
        assert!(delta(rows(&[1.0]), Watermark::since(9.0), |r| r.created_at).is_none());
    }

    #[test]
    fn test_full_on_empty_is_some() {
        let empty: Vec<EventLog> = Vec::new();
        assert_eq!(delta(empty, Watermark::Full, |r| r.created_at).map(|v| v.len()), Some(0));
    }

    #[test]
    fn test_has_new_checks_newest_row() {
        let r = rows(&[5.0, 1.0]);
        assert!(has_new(&r, Watermark::since(4.0), |row| row.created_at));
        assert!(!has_new(&r, Watermark::since(6.0), |row| row.created_at));
    }

    #[test]
    fn test_watermark_max() {
        assert_eq!(Watermark::Full.max(Watermark::since(3.0)), Watermark::since(3.0));
        assert_eq!(Watermark::since(3.0).max(Watermark::since(7.0)), Watermark::since(7.0));
        assert_eq!(Watermark::Full.max(Watermark::Full), Watermark::Full);
    }

    #[test]
    fn test_log_line_carries_class() {
        let line = LogLine::from(rows(&[1.0]).remove(0));
        assert_eq!(line.class, "log-combat");
    }
}
