//! API Module
//!
//! Admin HTTP surface over the cache registry and the connection pool.
//!
//! # Endpoints
//! - `GET /health` - Database health check
//! - `GET /stats` - Cache and pool statistics
//! - `DELETE /cache` - Clear every domain
//! - `DELETE /cache/:domain` - Clear one domain
//! - `DELETE /cache/:domain/:key` - Clear one key

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
