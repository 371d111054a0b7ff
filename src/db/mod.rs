//! Data Access Module
//!
//! Pooled, transactional access to the backing database.
//!
//! # Layers
//! - [`Driver`] / [`Connection`]: seam to a concrete database (SQLite shipped)
//! - [`ConnectionPool`]: bounded set of validated connections
//! - [`TransactionalExecutor`]: commit/rollback with guaranteed release
//! - [`QueryFacade`]: `execute(query, params, mode)` for service code

mod driver;
mod executor;
mod pool;
mod query;
mod sqlite;
mod value;

#[cfg(test)]
pub(crate) mod mock;

pub use driver::{Connection, Driver, DriverError, DriverErrorKind};
pub use executor::{Cursor, TransactionalExecutor, TxKind};
pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection};
pub use query::{QueryFacade, QueryMode, QueryOutput};
pub use sqlite::{SqliteConnection, SqliteDriver};
pub use value::{Params, Row, Value};

use crate::config::Config;
use crate::error::Result;

/// Facade over the shipped SQLite driver.
pub type SqliteFacade = QueryFacade<SqliteDriver>;

/// Builds the SQLite driver and warms the pool from configuration.
pub async fn connect(config: &Config) -> Result<SqliteFacade> {
    let driver = SqliteDriver::from_url(&config.database_url, config.statement_timeout);
    let pool = ConnectionPool::connect(driver, config.pool_config()).await?;
    Ok(QueryFacade::new(pool))
}
