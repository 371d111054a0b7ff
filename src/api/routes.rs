//! API Routes
//!
//! Configures the Axum router with the admin endpoints.

use axum::{
    routing::{delete, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_all_handler, clear_domain_handler, clear_key_handler, health_handler, stats_handler,
    AppState,
};
use crate::db::Driver;

/// Creates the admin router.
///
/// # Endpoints
/// - `GET /health` - Database ping through the pool
/// - `GET /stats` - Per-domain cache statistics and pool status
/// - `DELETE /cache` - Clear every domain
/// - `DELETE /cache/:domain` - Clear one domain
/// - `DELETE /cache/:domain/:key` - Clear one key
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router<D: Driver>(state: AppState<D>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler::<D>))
        .route("/stats", get(stats_handler::<D>))
        .route("/cache", delete(clear_all_handler::<D>))
        .route("/cache/:domain", delete(clear_domain_handler::<D>))
        .route("/cache/:domain/:key", delete(clear_key_handler::<D>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
