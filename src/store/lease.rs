//! Keyed exclusive leases
//!
//! `LeaseTable<K>` hands out one async mutex per logical key (a location id
//! or an event id). Holding a `Lease` is the in-process equivalent of a
//! `SELECT ... FOR UPDATE` on that row: other callers asking for the same key
//! wait until it is dropped, callers on different keys never wait.

use ahash::AHashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

pub struct LeaseTable<K> {
    slots: Arc<Mutex<AHashMap<K, Slot>>>,
}

impl<K> LeaseTable<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    pub fn new() -> Self {
        Self {
            slots: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Wait for exclusive use of `key`
    pub async fn acquire(&self, key: K) -> Lease<K> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = slot.lock_owned().await;
        tracing::trace!(?key, "lease acquired");

        Lease {
            key,
            guard: Some(guard),
            slots: Arc::clone(&self.slots),
        }
    }

    /// Keys with a live slot (held or waited on)
    pub fn active_keys(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or(0)
    }
}

impl<K> Default for LeaseTable<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> fmt::Debug for LeaseTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaseTable").finish_non_exhaustive()
    }
}

/// Exclusive hold on one key, released on drop
pub struct Lease<K: Eq + Hash> {
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
    slots: Arc<Mutex<AHashMap<K, Slot>>>,
}

impl<K: Eq + Hash> Lease<K> {
    pub fn key(&self) -> &K {
        &self.key
    }
}

impl<K: Eq + Hash> Drop for Lease<K> {
    fn drop(&mut self) {
        // Release first so the strong count below only sees the table and waiters.
        self.guard.take();

        let Ok(mut slots) = self.slots.lock() else {
            return;
        };
        let idle = slots
            .get(&self.key)
            .is_some_and(|slot| Arc::strong_count(slot) == 1);
        if idle {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_lease_released_on_drop() {
        let table: LeaseTable<u32> = LeaseTable::new();
        {
            let lease = table.acquire(7).await;
            assert_eq!(*lease.key(), 7);
            assert_eq!(table.active_keys(), 1);
        }
        assert_eq!(table.active_keys(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let table = Arc::new(LeaseTable::<u32>::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let table = Arc::clone(&table);
            let inside = Arc::clone(&inside);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _lease = table.acquire(1).await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(table.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let table: LeaseTable<u32> = LeaseTable::new();
        let _a = table.acquire(1).await;
        let b = tokio::time::timeout(Duration::from_millis(100), table.acquire(2)).await;
        assert!(b.is_ok());
    }
}
