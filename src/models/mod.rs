//! Response models for the admin API
//!
//! DTOs serialized into HTTP response bodies.

pub mod responses;

// Re-export commonly used types
pub use responses::{ClearResponse, DomainStatsResponse, HealthResponse, StatsResponse};
