//! In-process transactional store
//!
//! `Store` pairs the row tables with two lease tables: one keyed by
//! location (admission decisions) and one keyed by event (tick processing).
//! Table access itself is short and synchronous; leases are what callers
//! hold across a whole decision.

pub mod lease;
pub mod tables;

use std::sync::RwLock;

use crate::core::error::{EngineError, Result};
use crate::core::types::{EventId, LocationId};

pub use lease::{Lease, LeaseTable};
pub use tables::Tables;

#[derive(Debug, Default)]
pub struct Store {
    tables: RwLock<Tables>,
    location_leases: LeaseTable<LocationId>,
    event_leases: LeaseTable<EventId>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a read-only query against the tables
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> Result<R>) -> Result<R> {
        let tables = self.tables.read().map_err(|_| EngineError::StorePoisoned)?;
        f(&tables)
    }

    /// Run a mutation atomically with respect to every other reader and writer
    pub fn write<R>(&self, f: impl FnOnce(&mut Tables) -> Result<R>) -> Result<R> {
        let mut tables = self.tables.write().map_err(|_| EngineError::StorePoisoned)?;
        f(&mut tables)
    }

    /// Exclusive lease on a location row for an admission decision
    pub async fn lock_location(&self, id: LocationId) -> Lease<LocationId> {
        self.location_leases.acquire(id).await
    }

    /// Exclusive lease on an event row for tick processing
    pub async fn lock_event(&self, id: EventId) -> Lease<EventId> {
        self.event_leases.acquire(id).await
    }
}
