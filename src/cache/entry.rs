//! Cache Entry Module
//!
//! Defines the structure for individual cache entries. The TTL is not part
//! of the entry: each reader decides how old is too old.

use std::time::{Duration, SystemTime};

// == Cache Entry ==
/// A stored value and the time it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Wall-clock time of the `set` that stored it
    pub stored_at: SystemTime,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, stored_at: SystemTime) -> Self {
        Self { value, stored_at }
    }

    // == Age ==
    /// Time elapsed since storage. A clock that went backwards reads as zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.stored_at).unwrap_or(Duration::ZERO)
    }

    // == Is Expired ==
    /// Checks the entry against a caller-supplied TTL.
    ///
    /// Boundary condition: an entry whose age equals the TTL is expired, so a
    /// zero TTL makes every entry expired.
    pub fn is_expired(&self, ttl: Duration, now: SystemTime) -> bool {
        self.age(now) >= ttl
    }

    // == Time To Live ==
    /// Remaining lifetime under `ttl`, zero once expired.
    pub fn ttl_remaining(&self, ttl: Duration, now: SystemTime) -> Duration {
        ttl.saturating_sub(self.age(now))
    }
}
