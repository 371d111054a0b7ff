//! Configuration Module
//!
//! Loads pool, cache and server settings from environment variables once at
//! startup.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::cache::Domain;
use crate::db::PoolConfig;

/// Process configuration.
///
/// All values can be configured via environment variables with sensible
/// defaults; unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    /// `sqlite://<path>` or a bare file path
    pub database_url: String,
    /// Fixed number of pooled connections
    pub pool_size: usize,
    /// How long a caller waits for a free connection
    pub acquire_timeout: Duration,
    /// Lock-wait limit handed to the driver
    pub statement_timeout: Duration,
    /// Per-domain TTL overrides; domains not listed keep their built-in TTL
    pub cache_ttls: HashMap<Domain, Duration>,
    /// Seconds between expired-entry sweeps, 0 disables
    pub sweep_interval: u64,
    /// HTTP port of the admin surface
    pub server_port: u16,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` - Database location (default: sqlite://manageit.db)
    /// - `DB_POOL_SIZE` - Pooled connections (default: 8)
    /// - `DB_ACQUIRE_TIMEOUT_MS` - Checkout wait in ms (default: 5000)
    /// - `DB_STATEMENT_TIMEOUT_MS` - Lock wait in ms (default: 5000)
    /// - `CACHE_TTL_<DOMAIN>` - TTL override in seconds, e.g. `CACHE_TTL_RATING`
    /// - `SWEEP_INTERVAL` - Sweep frequency in seconds (default: 300)
    /// - `SERVER_PORT` - Admin HTTP port (default: 3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_ttls = Domain::ALL
            .into_iter()
            .filter_map(|domain| {
                let var = format!("CACHE_TTL_{}", domain.as_str().to_uppercase());
                parse_var::<u64>(&var).map(|secs| (domain, Duration::from_secs(secs)))
            })
            .collect();

        Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            pool_size: parse_var("DB_POOL_SIZE")
                .filter(|&n: &usize| n > 0)
                .unwrap_or(defaults.pool_size),
            acquire_timeout: parse_var("DB_ACQUIRE_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.acquire_timeout),
            statement_timeout: parse_var("DB_STATEMENT_TIMEOUT_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.statement_timeout),
            cache_ttls,
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
        }
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_size: self.pool_size,
            acquire_timeout: self.acquire_timeout,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite://manageit.db".to_string(),
            pool_size: 8,
            acquire_timeout: Duration::from_millis(5000),
            statement_timeout: Duration::from_millis(5000),
            cache_ttls: HashMap::new(),
            sweep_interval: 300,
            server_port: 3000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.database_url, "sqlite://manageit.db");
        assert_eq!(config.pool_size, 8);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.sweep_interval, 300);
        assert_eq!(config.server_port, 3000);
        assert!(config.cache_ttls.is_empty());
    }

    #[test]
    fn test_pool_config() {
        let config = Config {
            pool_size: 2,
            acquire_timeout: Duration::from_millis(100),
            ..Config::default()
        };
        let pool = config.pool_config();
        assert_eq!(pool.max_size, 2);
        assert_eq!(pool.acquire_timeout, Duration::from_millis(100));
    }

    // Single test touching the environment so parallel tests don't race
    #[test]
    fn test_config_from_env() {
        env::set_var("DB_POOL_SIZE", "0");
        env::set_var("SERVER_PORT", "not-a-port");
        env::set_var("CACHE_TTL_RATING", "60");
        env::set_var("CACHE_TTL_NON_VEG", "120");
        env::remove_var("DATABASE_URL");

        let config = Config::from_env();
        assert_eq!(config.pool_size, 8, "zero pool size falls back");
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.database_url, "sqlite://manageit.db");
        assert_eq!(
            config.cache_ttls.get(&Domain::Rating),
            Some(&Duration::from_secs(60))
        );
        assert_eq!(
            config.cache_ttls.get(&Domain::NonVeg),
            Some(&Duration::from_secs(120))
        );
        assert!(!config.cache_ttls.contains_key(&Domain::Menu));

        env::remove_var("DB_POOL_SIZE");
        env::remove_var("SERVER_PORT");
        env::remove_var("CACHE_TTL_RATING");
        env::remove_var("CACHE_TTL_NON_VEG");
    }
}
