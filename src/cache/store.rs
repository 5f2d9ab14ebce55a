//! Concurrent entry storage.
//!
//! [`EntryStore`] maps keys to timestamped values. It is shared by request
//! tasks (reads and writes) and the sweeper (deletes only) without any
//! locking on the caller's side.

use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

/// A stored value and the moment it was written.
///
/// Entries are never mutated; a write for an existing key replaces the whole
/// entry, timestamp included.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: Bytes,
    created_at: Instant,
}

impl CacheEntry {
    fn new(value: Bytes) -> Self {
        Self {
            value,
            created_at: Instant::now(),
        }
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Returns the instant after which the entry is stale, or `None` when it
    /// cannot be represented.
    fn expires_at(&self, ttl: Duration) -> Option<Instant> {
        self.created_at.checked_add(ttl)
    }
}

/// Outcome of checking one entry during a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Freshness {
    Fresh,
    Expired,
    Anomalous,
}

/// Sharded concurrent map from cache key to [`CacheEntry`].
#[derive(Debug, Default)]
pub struct EntryStore {
    entries: DashMap<String, CacheEntry>,
}

impl EntryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key` with the current time, replacing any
    /// previous entry.
    pub fn write(&self, key: impl Into<String>, value: Bytes) {
        self.entries.insert(key.into(), CacheEntry::new(value));
    }

    /// Returns the value for `key` whatever its age. Reading never refreshes
    /// an entry.
    pub fn read(&self, key: &str) -> Option<Bytes> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns a copy of the full entry for `key`.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry older than `ttl` as of `now`.
    ///
    /// Expired keys are collected under shard read locks first and then
    /// removed one at a time with a re-check, so a key rewritten in between
    /// keeps its fresh value. Entries whose expiry cannot be computed are
    /// logged and left in place. Returns the number of entries removed.
    pub fn remove_expired(&self, ttl: Duration, now: Instant) -> usize {
        let mut expired = Vec::new();
        for item in self.entries.iter() {
            match freshness(item.value(), ttl, now) {
                Freshness::Fresh => {}
                Freshness::Expired => expired.push(item.key().clone()),
                Freshness::Anomalous => {
                    warn!(key = %item.key(), ttl = ?ttl, "cache entry expiry overflows; skipping");
                }
            }
        }

        expired
            .into_iter()
            .filter(|key| {
                self.entries
                    .remove_if(key, |_, entry| freshness(entry, ttl, now) == Freshness::Expired)
                    .is_some()
            })
            .count()
    }
}

fn freshness(entry: &CacheEntry, ttl: Duration, now: Instant) -> Freshness {
    match entry.expires_at(ttl) {
        Some(deadline) if now > deadline => Freshness::Expired,
        Some(_) => Freshness::Fresh,
        None => Freshness::Anomalous,
    }
}
