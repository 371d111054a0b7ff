//! Transactional Executor
//!
//! Runs a closure inside one database transaction on a pooled connection.
//! The connection always goes back to the pool, or is discarded when the
//! session could not be cleaned up; the closure's own error is what the
//! caller sees.

use tracing::{debug, warn};

use crate::db::{Connection, ConnectionPool, Driver, DriverError, Params, PooledConnection, Row};
use crate::error::{DataAccessError, Error, Result};

// == Transaction Kind ==
/// Whether a successful transaction is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    /// Ended with a rollback; nothing to persist
    Read,
    /// Committed on success
    Mutate,
}

// == Cursor ==
/// Statement handle derived from a checked-out connection.
///
/// Records the last statement it ran so a failure can be reported with the
/// query that caused it.
pub struct Cursor<'c, C: Connection> {
    conn: &'c mut C,
    last_query: Option<String>,
    rowcount: Option<u64>,
}

impl<'c, C: Connection> Cursor<'c, C> {
    fn new(conn: &'c mut C) -> Self {
        Self {
            conn,
            last_query: None,
            rowcount: None,
        }
    }

    /// First row of the result, if any.
    pub fn fetch_one(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> std::result::Result<Option<Row>, DriverError> {
        Ok(self.fetch_all(sql, params)?.into_iter().next())
    }

    /// All rows, in result order.
    pub fn fetch_all(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> std::result::Result<Vec<Row>, DriverError> {
        self.last_query = Some(sql.to_string());
        let rows = self.conn.query(sql, params)?;
        self.rowcount = Some(rows.len() as u64);
        Ok(rows)
    }

    /// Runs a mutating statement, returning the affected-row count.
    pub fn execute(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> std::result::Result<u64, DriverError> {
        self.last_query = Some(sql.to_string());
        let affected = self.conn.execute(sql, params)?;
        self.rowcount = Some(affected);
        Ok(affected)
    }

    /// Rows returned or affected by the last statement.
    pub fn rowcount(&self) -> Option<u64> {
        self.rowcount
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    fn into_last_query(self) -> Option<String> {
        self.last_query
    }
}

// == Transactional Executor ==
pub struct TransactionalExecutor<D: Driver> {
    pool: ConnectionPool<D>,
}

impl<D: Driver> Clone for TransactionalExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<D: Driver> TransactionalExecutor<D> {
    pub fn new(pool: ConnectionPool<D>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ConnectionPool<D> {
        &self.pool
    }

    // == With Transaction ==
    /// Acquires a connection, begins a transaction and runs `operation` on a
    /// blocking thread.
    ///
    /// - `operation` fails: rollback, then return its error.
    /// - `operation` succeeds: commit for [`TxKind::Mutate`], rollback for
    ///   [`TxKind::Read`].
    ///
    /// The connection is released on every path. If begin, commit or
    /// rollback fails the connection is discarded instead. A panic inside
    /// `operation` is resumed on the caller after the connection is
    /// discarded.
    pub async fn with_transaction<T, F>(&self, kind: TxKind, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Cursor<'_, D::Conn>) -> std::result::Result<T, DriverError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        let mut lease = self.pool.acquire().await?;

        let joined = tokio::task::spawn_blocking(move || {
            let result = run_transaction(&mut lease, kind, operation);
            lease.release();
            result
        })
        .await;

        match joined {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => Err(Error::Internal(format!("transaction task failed: {}", e))),
        }
    }
}

fn run_transaction<D, T, F>(
    lease: &mut PooledConnection<D>,
    kind: TxKind,
    operation: F,
) -> Result<T>
where
    D: Driver,
    F: FnOnce(&mut Cursor<'_, D::Conn>) -> std::result::Result<T, DriverError>,
{
    // Stays set until the transaction is closed cleanly
    lease.taint();

    let conn: &mut D::Conn = &mut **lease;
    if let Err(e) = conn.begin() {
        warn!(error = %e, "BEGIN failed, discarding connection");
        return Err(DataAccessError::with_query("BEGIN", e).into());
    }

    let mut cursor = Cursor::new(conn);
    let outcome = operation(&mut cursor);
    let last_query = cursor.into_last_query();

    match outcome {
        Err(cause) => {
            match conn.rollback() {
                Ok(()) => {
                    lease.clear_taint();
                    debug!(error = %cause, "Transaction rolled back");
                }
                Err(e) => {
                    warn!(error = %e, cause = %cause, "Rollback failed, discarding connection");
                }
            }
            Err(DataAccessError {
                query: last_query,
                cause,
            }
            .into())
        }
        Ok(value) => match kind {
            TxKind::Mutate => match conn.commit() {
                Ok(()) => {
                    lease.clear_taint();
                    Ok(value)
                }
                Err(e) => {
                    warn!(error = %e, "COMMIT failed, discarding connection");
                    if let Err(rb) = conn.rollback() {
                        debug!(error = %rb, "Rollback after failed commit also failed");
                    }
                    Err(DataAccessError::with_query("COMMIT", e).into())
                }
            },
            TxKind::Read => {
                match conn.rollback() {
                    Ok(()) => lease.clear_taint(),
                    Err(e) => {
                        warn!(error = %e, "Could not close read transaction, discarding connection")
                    }
                }
                Ok(value)
            }
        },
    }
}
