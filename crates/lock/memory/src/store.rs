use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

use warden_lock::error::LockError;
use warden_lock::store::LockStore;
use warden_lock::ttl::LockTtl;

/// Deadline used when a lease is too long to add to the current instant.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

fn deadline(ttl: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(ttl).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Internal entry representing a lock record.
#[derive(Debug, Clone)]
struct LockEntry {
    value: String,
    expires_at: Instant,
}

impl LockEntry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// In-memory [`LockStore`] backed by a [`DashMap`].
///
/// Expiry is lazy: expired entries are evicted by the next operation that
/// touches the same key. All compare-and-act operations run under the
/// DashMap shard lock for that key, so they are atomic with respect to
/// concurrent callers in the same process.
///
/// Expiry follows the tokio clock, so tests using a paused runtime can drive
/// lease expiry with `tokio::time::advance`.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    entries: Arc<DashMap<String, LockEntry>>,
}

impl MemoryLockStore {
    /// Create a new, empty in-memory lock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `key` if its lease has run out.
    fn evict_expired(&self, key: &str) {
        self.entries.remove_if(key, |_, entry| entry.is_expired());
    }

    /// Number of live (unexpired) records.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| !e.is_expired()).count()
    }

    /// Whether no live records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        self.evict_expired(key);

        match self.entries.entry(key.to_owned()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(vacant) => {
                vacant.insert(LockEntry {
                    value: value.to_owned(),
                    expires_at: deadline(ttl),
                });
                Ok(true)
            }
        }
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, LockError> {
        Ok(self
            .entries
            .remove_if(key, |_, entry| {
                !entry.is_expired() && entry.value == expected
            })
            .is_some())
    }

    async fn compare_and_set_expiry(
        &self,
        key: &str,
        expected: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        self.evict_expired(key);

        let Some(mut entry) = self.entries.get_mut(key) else {
            return Ok(false);
        };
        if entry.value != expected || entry.is_expired() {
            return Ok(false);
        }
        entry.expires_at = deadline(ttl);
        Ok(true)
    }

    async fn exists(&self, key: &str) -> Result<bool, LockError> {
        self.evict_expired(key);
        Ok(self.entries.contains_key(key))
    }

    async fn remaining_ttl(&self, key: &str) -> Result<LockTtl, LockError> {
        self.evict_expired(key);
        match self.entries.get(key) {
            Some(entry) => Ok(LockTtl::Remaining(
                entry.expires_at.saturating_duration_since(Instant::now()),
            )),
            None => Ok(LockTtl::Missing),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, LockError> {
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| !entry.is_expired()))
    }
}
