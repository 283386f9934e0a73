//! In-process TTL cache for aggregated results.
//!
//! Entries carry an absolute expiry instant. A read that finds an expired
//! entry evicts it and reports a miss, so `clear_expired` is housekeeping
//! only and never needed for correctness.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::debug;

/// Upper bound for a single TTL, keeps `Instant` arithmetic in range
const MAX_TTL: Duration = Duration::from_secs(10 * 365 * 24 * 60 * 60);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Cache statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired_evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }
}

/// Key/value store with per-entry time-to-live
///
/// Writers race last-write-wins; a stored value is never modified in place.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    hits: AtomicU64,
    misses: AtomicU64,
    expired_evictions: AtomicU64,
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired_evictions: AtomicU64::new(0),
        }
    }

    /// Get a live entry, evicting it first if it has expired
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();

        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!(key = key, "Cache hit");
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.evict_if_expired(key);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(key = key, expired = expired, "Cache miss");
        None
    }

    /// Store a value for `ttl_seconds`, replacing any previous entry
    pub fn set(&self, key: impl Into<String>, value: V, ttl_seconds: u64) {
        self.set_with_ttl(key, value, Duration::from_secs(ttl_seconds));
    }

    /// Store a value for `ttl`, replacing any previous entry
    pub fn set_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let key = key.into();
        let expires_at = Instant::now() + ttl.min(MAX_TTL);

        debug!(key = %key, ttl_ms = ttl.as_millis() as u64, "Cache stored");
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove an entry; returns whether one was present
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Whether a live entry exists for `key`
    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remaining lifetime in whole seconds (rounded up), or -1 if absent
    pub fn remaining_ttl(&self, key: &str) -> i64 {
        let now = Instant::now();

        let remaining = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.expires_at - now),
            Some(_) => None,
            None => return -1,
        };

        match remaining {
            Some(left) => {
                let secs = left.as_secs() + u64::from(left.subsec_nanos() > 0);
                secs as i64
            }
            None => {
                self.evict_if_expired(key);
                -1
            }
        }
    }

    /// Sweep all expired entries; returns how many were removed
    pub fn clear_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));

        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            self.expired_evictions
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!(removed = removed, "Swept expired cache entries");
        }
        removed
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_evictions: self.expired_evictions.load(Ordering::Relaxed),
        }
    }

    fn evict_if_expired(&self, key: &str) {
        // Re-check under the shard lock: a concurrent set may have refreshed it
        let now = Instant::now();
        if self
            .entries
            .remove_if(key, |_, entry| entry.is_expired(now))
            .is_some()
        {
            self.expired_evictions.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Periodically sweep expired entries until the returned task is aborted
pub fn spawn_sweeper<V>(cache: Arc<TtlCache<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            cache.clear_expired();
        }
    })
}
