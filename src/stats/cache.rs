//! An in-memory cache with per-entry TTLs and lazy expiry.
//!
//! Entries are keyed by [`CacheKey`] (resource kind plus optional id) and
//! carry their own TTL, since each resource kind has its own freshness
//! requirement. Expired entries are treated as absent but are not eagerly
//! deleted; removal happens only on overwrite, explicit invalidation, or
//! [`TtlCache::sweep`].

use super::resource::{CacheKey, CachedValue};
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::HashMap;
use std::sync::Mutex;

const LOG_TARGET: &str = "     cache";

/// One cached value with its fetch time and TTL. Immutable once stored;
/// replaced wholesale by the next successful fetch.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: CachedValue,
    fetched_at: DateTime<Utc>,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.fetched_at);
        // A future fetched_at means clock skew; treat as fresh.
        age.num_seconds() < 0 || age.to_std().unwrap_or(Duration::MAX) < self.ttl
    }
}

/// A thread-safe TTL cache. The lock is held only for map operations, never
/// across an await point.
#[derive(Debug, Default)]
pub struct TtlCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl TtlCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the value for `key` if a fresh entry exists.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let entries = self.entries.lock().expect("cache lock not poisoned");
        let entry = entries.get(key)?;
        if entry.is_fresh(Utc::now()) {
            log::debug!(target: LOG_TARGET, "Cache hit for {key}");
            Some(entry.value.clone())
        } else {
            log::debug!(target: LOG_TARGET, "Cache entry for {key} expired");
            None
        }
    }

    /// Whether a fresh entry exists for `key`.
    #[must_use]
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        let entries = self.entries.lock().expect("cache lock not poisoned");
        entries.get(key).is_some_and(|e| e.is_fresh(Utc::now()))
    }

    /// Store `value` under `key` with the given TTL, replacing any prior
    /// entry. Concurrent stores for the same key resolve last-write-wins by
    /// completion time.
    pub fn set(&self, key: CacheKey, value: CachedValue, ttl: Duration) {
        let entry = CacheEntry {
            value,
            fetched_at: Utc::now(),
            ttl,
        };
        let mut entries = self.entries.lock().expect("cache lock not poisoned");
        let _ = entries.insert(key, entry);
    }

    /// Remove the entry for `key`, fresh or not.
    pub fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.lock().expect("cache lock not poisoned");
        let _ = entries.remove(key);
    }

    /// Remove every entry. Used by the facade's forced refresh.
    pub fn invalidate_all(&self) {
        let mut entries = self.entries.lock().expect("cache lock not poisoned");
        entries.clear();
    }

    /// Remove expired entries, returning how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache lock not poisoned");
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    #[cfg(test)]
    fn raw_len(&self) -> usize {
        self.entries.lock().expect("cache lock not poisoned").len()
    }
}
