//! API Handlers
//!
//! HTTP request handlers for each admin endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::warn;

use crate::cache::{CacheRegistry, Domain};
use crate::db::{Driver, QueryFacade};
use crate::error::Result;
use crate::models::{ClearResponse, DomainStatsResponse, HealthResponse, StatsResponse};

/// Application state shared across all handlers.
///
/// Holds the same registry and facade the services use, so the admin
/// surface sees and invalidates live data.
pub struct AppState<D: Driver> {
    pub cache: Arc<CacheRegistry>,
    pub db: QueryFacade<D>,
}

impl<D: Driver> Clone for AppState<D> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            db: self.db.clone(),
        }
    }
}

impl<D: Driver> AppState<D> {
    pub fn new(cache: Arc<CacheRegistry>, db: QueryFacade<D>) -> Self {
        Self { cache, db }
    }
}

/// Handler for GET /health
///
/// Pings the database through the pool: 200 when a connection could be
/// checked out and validated, 503 otherwise.
pub async fn health_handler<D: Driver>(
    State(state): State<AppState<D>>,
) -> (StatusCode, Json<HealthResponse>) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::healthy())),
        Err(e) => {
            warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::degraded(e.to_string())),
            )
        }
    }
}

/// Handler for GET /stats
///
/// Returns per-domain cache statistics and the pool status.
pub async fn stats_handler<D: Driver>(State(state): State<AppState<D>>) -> Json<StatsResponse> {
    let domains = state
        .cache
        .stats()
        .into_iter()
        .map(|(domain, stats)| {
            DomainStatsResponse::new(domain, state.cache.ttl(domain).as_secs(), &stats)
        })
        .collect();

    Json(StatsResponse::new(domains, state.db.pool().status()))
}

/// Handler for DELETE /cache
pub async fn clear_all_handler<D: Driver>(
    State(state): State<AppState<D>>,
) -> Json<ClearResponse> {
    state.cache.clear_all();
    Json(ClearResponse::all())
}

/// Handler for DELETE /cache/:domain
///
/// An unknown domain name is a 404 here rather than a panic: the name comes
/// from an operator, not from wiring.
pub async fn clear_domain_handler<D: Driver>(
    State(state): State<AppState<D>>,
    Path(domain): Path<String>,
) -> Result<Json<ClearResponse>> {
    let domain: Domain = domain.parse()?;
    state.cache.clear_domain(domain);
    Ok(Json(ClearResponse::domain(domain)))
}

/// Handler for DELETE /cache/:domain/:key
pub async fn clear_key_handler<D: Driver>(
    State(state): State<AppState<D>>,
    Path((domain, key)): Path<(String, String)>,
) -> Result<Json<ClearResponse>> {
    let domain: Domain = domain.parse()?;
    state.cache.domain(domain).clear(Some(key.as_str()));
    Ok(Json(ClearResponse::key(domain, key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock::{Faults, MockDriver};
    use crate::db::{ConnectionPool, PoolConfig};
    use crate::error::Error;
    use serde_json::json;
    use std::time::Duration;
    use tick::Clock;

    async fn state(faults: Faults) -> AppState<MockDriver> {
        let config = PoolConfig {
            max_size: 2,
            acquire_timeout: Duration::from_millis(100),
        };
        let pool = ConnectionPool::connect(MockDriver::new(faults), config)
            .await
            .unwrap();
        AppState::new(
            Arc::new(CacheRegistry::new(Clock::new_frozen())),
            QueryFacade::new(pool),
        )
    }

    #[tokio::test]
    async fn test_health_handler() {
        let state = state(Faults::default()).await;

        let (status, response) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.status, "healthy");
    }

    #[tokio::test]
    async fn test_health_handler_degraded_when_database_down() {
        let faults = Faults::default();
        let state = state(faults.clone()).await;
        faults.set_fail_ping(true);
        faults.set_fail_connect(true);

        let (status, response) = health_handler(State(state)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status, "degraded");
    }

    #[tokio::test]
    async fn test_stats_handler() {
        let state = state(Faults::default()).await;
        state.cache.domain(Domain::Menu).set("menu_Lunch", json!(["Dal"]));
        state.cache.domain(Domain::Menu).get("menu_Lunch");

        let response = stats_handler(State(state)).await;
        assert_eq!(response.domains.len(), Domain::ALL.len());
        let menu = &response.domains[0];
        assert_eq!(menu.domain, Domain::Menu);
        assert_eq!(menu.hits, 1);
        assert_eq!(menu.total_entries, 1);
        assert_eq!(response.pool.max_size, 2);
        assert_eq!(response.pool.idle, 2);
    }

    #[tokio::test]
    async fn test_clear_domain_handler() {
        let state = state(Faults::default()).await;
        state.cache.domain(Domain::Rating).set("avg_ratings_Lunch", json!(4.5));
        state.cache.domain(Domain::Menu).set("menu_Lunch", json!(["Dal"]));

        let result =
            clear_domain_handler(State(state.clone()), Path("rating".to_string())).await;
        assert!(result.is_ok());

        assert!(state.cache.domain(Domain::Rating).get("avg_ratings_Lunch").is_none());
        assert!(state.cache.domain(Domain::Menu).get("menu_Lunch").is_some());
    }

    #[tokio::test]
    async fn test_clear_unknown_domain() {
        let state = state(Faults::default()).await;

        let result = clear_domain_handler(State(state), Path("snacks".to_string())).await;
        assert!(matches!(result, Err(Error::UnknownDomain(_))));
    }

    #[tokio::test]
    async fn test_clear_key_handler() {
        let state = state(Faults::default()).await;
        let polls = state.cache.domain(Domain::Poll);
        polls.set("poll_Lunch", json!({"yes": 3}));
        polls.set("poll_Dinner", json!({"yes": 1}));

        let result = clear_key_handler(
            State(state.clone()),
            Path(("poll".to_string(), "poll_Lunch".to_string())),
        )
        .await;
        assert!(result.is_ok());

        assert!(polls.get("poll_Lunch").is_none());
        assert!(polls.get("poll_Dinner").is_some());
    }

    #[tokio::test]
    async fn test_clear_all_handler() {
        let state = state(Faults::default()).await;
        for domain in Domain::ALL {
            state.cache.domain(domain).set("k", json!(1));
        }

        let response = clear_all_handler(State(state.clone())).await;
        assert!(response.domain.is_none());

        assert!(state
            .cache
            .stats()
            .iter()
            .all(|(_, stats)| stats.total_entries == 0));
    }
}
