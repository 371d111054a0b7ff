//! Cache Module
//!
//! In-memory TTL caches, one per data domain. Expired entries are evicted
//! when read; an optional sweep reclaims entries nobody reads again.
//!
//! Time comes from an injected [`tick::Clock`]: `Clock::new_tokio()` in the
//! server, a `ClockControl` in tests.

mod entry;
mod registry;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use registry::{CacheRegistry, Domain, DomainCache};
pub use stats::CacheStats;
pub use store::TtlCache;
