//! In-memory key-value cache backed by DashMap

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-local lookaside cache with optional per-entry TTL.
///
/// Concurrent writers may race on population; last writer wins, which is
/// harmless because every cached value is an idempotent recomputation of
/// the same query.
pub struct MemoryCache {
    entries: Arc<DashMap<String, Entry>>,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self, now: Instant) -> bool {
        self.expires_at.map(|at| now > at).unwrap_or(false)
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        let cache = Self {
            entries: Arc::new(DashMap::new()),
        };
        cache.spawn_sweeper();
        cache
    }

    /// Returns the cached value, treating an expired entry as a miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entry = self.entries.get(key)?;
        if entry.expired(Instant::now()) {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.value.clone())
    }

    /// Stores a value with no expiry.
    pub fn set(&self, key: String, value: Vec<u8>) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Stores a value that expires after `ttl`.
    pub fn set_with_ttl(&self, key: String, value: Vec<u8>, ttl: Duration) {
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }

    pub fn exists(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Removes every entry whose key starts with `prefix`. Used to evict
    /// the list-query cache family after an insert.
    pub fn delete_prefix(&self, prefix: &str) {
        self.entries.retain(|key, _| !key.starts_with(prefix));
    }

    fn spawn_sweeper(&self) {
        let entries = self.entries.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let now = Instant::now();
                entries.retain(|_, entry| !entry.expired(now));
            }
        });
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}
