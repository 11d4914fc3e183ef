//! Shared-world combat event engine
//!
//! - `admission`: find-or-create the encounter for a location
//! - `tick`: catch-up simulation of one encounter
//! - `sync`: watermark deltas for logs and chat
//! - `poll`: per-request orchestration
//! - `changeset`: status/location refresh flags

pub mod admission;
pub mod changeset;
pub mod poll;
pub mod sync;
pub mod tick;

pub use admission::{acquire_or_create_event, admit, Admission};
pub use changeset::ChangeSet;
pub use poll::{Engine, PollMode, PollRequest, PollResponse};
pub use sync::{LogLine, Watermark};
pub use tick::{advance, run_ticks, AdvanceOptions, EntitySnapshot, TickOutcome, TickReport};
