//! Response DTOs for the admin API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;

use crate::cache::{CacheStats, Domain};
use crate::db::PoolStatus;

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// "healthy" or "degraded"
    pub status: String,
    /// "ok", or the error met while pinging the database
    pub database: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a healthy response with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            database: "ok".to_string(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            status: "degraded".to_string(),
            database: reason.into(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Statistics of one domain cache
#[derive(Debug, Clone, Serialize)]
pub struct DomainStatsResponse {
    pub domain: Domain,
    /// TTL applied to reads, in seconds
    pub ttl_secs: u64,
    pub hits: u64,
    pub misses: u64,
    pub expirations: u64,
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl DomainStatsResponse {
    pub fn new(domain: Domain, ttl_secs: u64, stats: &CacheStats) -> Self {
        Self {
            domain,
            ttl_secs,
            hits: stats.hits,
            misses: stats.misses,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub domains: Vec<DomainStatsResponse>,
    pub pool: PoolStatus,
    pub timestamp: String,
}

impl StatsResponse {
    pub fn new(domains: Vec<DomainStatsResponse>, pool: PoolStatus) -> Self {
        Self {
            domains,
            pool,
            timestamp: now_rfc3339(),
        }
    }
}

/// Response body for the invalidation endpoints (DELETE /cache...)
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    /// Success message
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<Domain>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ClearResponse {
    pub fn all() -> Self {
        Self {
            message: "All cache domains cleared".to_string(),
            domain: None,
            key: None,
        }
    }

    pub fn domain(domain: Domain) -> Self {
        Self {
            message: format!("Cache domain '{}' cleared", domain),
            domain: Some(domain),
            key: None,
        }
    }

    pub fn key(domain: Domain, key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' cleared from '{}'", key, domain),
            domain: Some(domain),
            key: Some(key),
        }
    }
}
