//! TTL Cache Module
//!
//! One named map from string keys to timestamped values. Readers pass the
//! TTL they accept; an entry found too old is removed on that read.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tick::Clock;
use tracing::trace;

use crate::cache::{CacheEntry, CacheStats};

struct Inner<V> {
    entries: HashMap<String, CacheEntry<V>>,
    stats: CacheStats,
}

// == TTL Cache ==
/// Thread-safe TTL cache.
///
/// Every operation takes the same exclusive lock and only does in-memory map
/// work under it, so no call ever waits on I/O.
pub struct TtlCache<V> {
    inner: Mutex<Inner<V>>,
    clock: Clock,
}

impl<V: Clone> TtlCache<V> {
    // == Constructor ==
    /// Creates an empty cache reading time from `clock`.
    pub fn new(clock: Clock) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                stats: CacheStats::new(),
            }),
            clock,
        }
    }

    // == Get ==
    /// Returns the value for `key` if it is younger than `ttl`.
    ///
    /// An entry at least `ttl` old is removed and counted as a miss. A zero
    /// `ttl` therefore always misses.
    pub fn get(&self, key: &str, ttl: Duration) -> Option<V> {
        let now = self.clock.system_time();
        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(ttl, now) => {
                inner.stats.record_hit();
                Some(entry.value.clone())
            }
            Some(_) => {
                inner.entries.remove(key);
                inner.stats.record_miss();
                inner.stats.record_expirations(1);
                trace!(key, "Expired entry evicted on read");
                None
            }
            None => {
                inner.stats.record_miss();
                None
            }
        }
    }

    // == Set ==
    /// Stores `value` stamped with the current time, replacing any previous
    /// entry for `key` whether or not it had expired.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let mut inner = self.inner.lock();
        let now = self.clock.system_time();
        inner.entries.insert(key.into(), CacheEntry::new(value, now));
    }

    // == Clear ==
    /// Removes one entry, or every entry when `key` is `None`. Clearing an
    /// absent key is a no-op.
    pub fn clear(&self, key: Option<&str>) {
        let mut inner = self.inner.lock();
        match key {
            Some(key) => {
                inner.entries.remove(key);
            }
            None => inner.entries.clear(),
        }
    }

    // == Sweep Expired ==
    /// Removes every entry at least `ttl` old and returns how many went.
    ///
    /// Optional housekeeping for keys that are rarely read again; `get`
    /// behaves the same whether or not sweeps run.
    pub fn sweep_expired(&self, ttl: Duration) -> usize {
        let now = self.clock.system_time();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| !entry.is_expired(ttl, now));
        let removed = before - inner.entries.len();
        inner.stats.record_expirations(removed);
        removed
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let mut stats = inner.stats.clone();
        stats.set_total_entries(inner.entries.len());
        stats
    }

    // == Length ==
    /// Number of stored entries, expired ones included until they are read
    /// or swept.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }
}
