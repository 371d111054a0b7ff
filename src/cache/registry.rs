//! Cache Registry Module
//!
//! One TTL cache per data domain, each with its own default TTL. The set of
//! domains is fixed at construction; only cache contents change afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::Value as JsonValue;
use tick::Clock;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, TtlCache};
use crate::error::Error;

// == Domain ==
/// A category of cached data with its own cache and freshness policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Menu,
    Rating,
    NonVeg,
    Payment,
    Feedback,
    Waste,
    Notification,
    FeatureToggle,
    Poll,
}

impl Domain {
    pub const ALL: [Domain; 9] = [
        Domain::Menu,
        Domain::Rating,
        Domain::NonVeg,
        Domain::Payment,
        Domain::Feedback,
        Domain::Waste,
        Domain::Notification,
        Domain::FeatureToggle,
        Domain::Poll,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Menu => "menu",
            Domain::Rating => "rating",
            Domain::NonVeg => "non_veg",
            Domain::Payment => "payment",
            Domain::Feedback => "feedback",
            Domain::Waste => "waste",
            Domain::Notification => "notification",
            Domain::FeatureToggle => "feature_toggle",
            Domain::Poll => "poll",
        }
    }

    /// Built-in freshness for the domain. Live ratings and notifications go
    /// stale fastest; feedback and waste summaries are daily.
    pub fn default_ttl(&self) -> Duration {
        let secs = match self {
            Domain::Menu | Domain::NonVeg | Domain::Payment | Domain::Poll => 3600,
            Domain::Rating | Domain::Notification => 1800,
            Domain::Feedback | Domain::Waste | Domain::FeatureToggle => 86_400,
        };
        Duration::from_secs(secs)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Domain {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Domain::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| Error::UnknownDomain(s.to_string()))
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

// == Domain Cache ==
/// Handle to one domain's cache, reading with the domain's TTL unless told
/// otherwise.
pub struct DomainCache<'r, V> {
    domain: Domain,
    ttl: Duration,
    cache: &'r TtlCache<V>,
}

impl<V> Clone for DomainCache<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for DomainCache<'_, V> {}

impl<'r, V: Clone> DomainCache<'r, V> {
    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Reads with the domain's default TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        self.cache.get(key, self.ttl)
    }

    pub fn get_with_ttl(&self, key: &str, ttl: Duration) -> Option<V> {
        self.cache.get(key, ttl)
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        self.cache.set(key, value);
    }

    pub fn clear(&self, key: Option<&str>) {
        self.cache.clear(key);
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

impl<'r> DomainCache<'r, JsonValue> {
    /// Reads and decodes a value stored with [`set_as`](Self::set_as).
    ///
    /// A value that no longer decodes as `T` is dropped and reported as a
    /// miss, so the caller refetches it.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(
                    domain = %self.domain,
                    key,
                    error = %e,
                    "Cached value has unexpected shape, dropping"
                );
                self.cache.clear(Some(key));
                None
            }
        }
    }

    /// Encodes and stores a value. Values that do not serialize are not
    /// cached.
    pub fn set_as<T: Serialize>(&self, key: impl Into<String>, value: &T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(encoded) => self.cache.set(key, encoded),
            Err(e) => warn!(domain = %self.domain, key = %key, error = %e, "Value not cacheable"),
        }
    }
}

// == Cache Registry ==
/// All domain caches of the process.
///
/// Construct once at startup and share it (`Arc<CacheRegistry>`) with the
/// services and maintenance tasks that need it.
pub struct CacheRegistry<V = JsonValue> {
    caches: HashMap<Domain, TtlCache<V>>,
    ttls: HashMap<Domain, Duration>,
}

impl<V: Clone> CacheRegistry<V> {
    // == Constructor ==
    /// Every domain with its built-in TTL.
    pub fn new(clock: Clock) -> Self {
        Self::with_ttls(HashMap::new(), clock)
    }

    /// Every domain, with `overrides` replacing built-in TTLs where present.
    pub fn with_ttls(overrides: HashMap<Domain, Duration>, clock: Clock) -> Self {
        let caches = Domain::ALL
            .into_iter()
            .map(|d| (d, TtlCache::new(clock.clone())))
            .collect();
        let ttls = Domain::ALL
            .into_iter()
            .map(|d| (d, overrides.get(&d).copied().unwrap_or_else(|| d.default_ttl())))
            .collect();
        Self { caches, ttls }
    }

    /// Builds the registry from the per-domain TTLs in `config`.
    pub fn from_config(config: &crate::config::Config, clock: Clock) -> Self {
        Self::with_ttls(config.cache_ttls.clone(), clock)
    }

    // == Domain Access ==
    pub fn domain(&self, domain: Domain) -> DomainCache<'_, V> {
        DomainCache {
            domain,
            ttl: self.ttl(domain),
            cache: &self.caches[&domain],
        }
    }

    /// Looks a domain up by name.
    ///
    /// # Panics
    /// On a name that is not a registered domain: that is a wiring bug in
    /// the caller, not a condition to recover from. Parse untrusted input
    /// with [`Domain::from_str`] instead.
    pub fn domain_named(&self, name: &str) -> DomainCache<'_, V> {
        match name.parse() {
            Ok(domain) => self.domain(domain),
            Err(e) => panic!("cache contract violation: {}", e),
        }
    }

    pub fn ttl(&self, domain: Domain) -> Duration {
        self.ttls[&domain]
    }

    // == Clear ==
    /// Empties one domain's cache, e.g. after a write that changed its data.
    pub fn clear_domain(&self, domain: Domain) {
        self.caches[&domain].clear(None);
        debug!(%domain, "Cache domain cleared");
    }

    /// Empties every domain's cache.
    pub fn clear_all(&self) {
        for cache in self.caches.values() {
            cache.clear(None);
        }
        info!(domains = self.caches.len(), "All cache domains cleared");
    }

    // == Sweep ==
    /// Sweeps every domain with its own TTL, returning entries removed.
    pub fn sweep_expired(&self) -> usize {
        Domain::ALL
            .into_iter()
            .map(|d| self.caches[&d].sweep_expired(self.ttl(d)))
            .sum()
    }

    // == Stats ==
    /// Per-domain statistics in a stable order.
    pub fn stats(&self) -> Vec<(Domain, CacheStats)> {
        Domain::ALL
            .into_iter()
            .map(|d| (d, self.caches[&d].stats()))
            .collect()
    }
}
