//! ManageIt Core - caching and data access for the mess management backend
//!
//! Per-domain TTL caches in front of a pooled, transactional database layer,
//! plus an admin HTTP surface and cache maintenance tasks.

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheRegistry, Domain};
pub use config::Config;
pub use db::{QueryFacade, QueryMode, SqliteFacade};
pub use error::{Error, Result};
pub use tasks::{spawn_nightly_clear_task, spawn_sweep_task};
