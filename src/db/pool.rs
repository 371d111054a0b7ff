//! Connection Pool Module
//!
//! A fixed-size pool of driver connections. Capacity is enforced by a
//! semaphore: every checked-out connection holds one permit, so
//! `idle + in_use` never exceeds `max_size`. Every checkout pings the
//! connection first and reconnects once if the ping fails.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

use crate::db::{Connection, Driver, DriverError};
use crate::error::{DataAccessError, Error, Result};

// == Pool Config ==
/// Sizing and timeout settings, fixed at construction.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of connections opened at warm-up and the hard upper bound
    pub max_size: usize,
    /// How long `acquire` waits for a free connection before failing
    pub acquire_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 8,
            acquire_timeout: Duration::from_secs(5),
        }
    }
}

// == Pool Status ==
/// Point-in-time snapshot of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
    pub max_size: usize,
    /// Connections waiting in the idle set
    pub idle: usize,
    /// Connections currently checked out
    pub in_use: usize,
    /// Open connections (idle, checked out, or being validated)
    pub live: usize,
}

struct PoolInner<D: Driver> {
    driver: D,
    idle: Mutex<VecDeque<D::Conn>>,
    permits: Arc<Semaphore>,
    live: AtomicUsize,
    config: PoolConfig,
}

impl<D: Driver> PoolInner<D> {
    fn open(&self) -> std::result::Result<D::Conn, DriverError> {
        let conn = self.driver.connect()?;
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    fn forget(&self, conn: D::Conn) {
        drop(conn);
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Hands out a validated connection. Runs on a blocking thread while the
    /// caller already holds a permit.
    fn checkout(&self) -> std::result::Result<D::Conn, DriverError> {
        let candidate = self.idle.lock().pop_back();

        let first_failure = match candidate {
            Some(mut conn) => match conn.ping() {
                Ok(()) => return Ok(conn),
                Err(e) => {
                    self.forget(conn);
                    warn!(error = %e, "Pooled connection failed liveness check, reconnecting");
                    e
                }
            },
            // A slot was freed by a discard; replace it lazily
            None => match self.open() {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!(error = %e, "Failed to open replacement connection, retrying once");
                    e
                }
            },
        };

        self.open().map_err(|e| {
            warn!(first = %first_failure, error = %e, "Reconnect failed");
            e
        })
    }
}

// == Connection Pool ==
/// Bounded, shareable pool of database connections.
pub struct ConnectionPool<D: Driver> {
    inner: Arc<PoolInner<D>>,
}

impl<D: Driver> Clone for ConnectionPool<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Driver> ConnectionPool<D> {
    // == Constructor ==
    /// Creates the pool and opens all `max_size` connections up front.
    ///
    /// Any connection failure during warm-up is returned; the process should
    /// not serve traffic without a working pool.
    pub async fn connect(driver: D, config: PoolConfig) -> Result<Self> {
        if config.max_size == 0 {
            return Err(Error::Config("pool size must be at least 1".to_string()));
        }

        let inner = Arc::new(PoolInner {
            driver,
            idle: Mutex::new(VecDeque::with_capacity(config.max_size)),
            permits: Arc::new(Semaphore::new(config.max_size)),
            live: AtomicUsize::new(0),
            config,
        });

        let warm = inner.clone();
        let warmed = tokio::task::spawn_blocking(move || {
            for _ in 0..warm.config.max_size {
                let conn = warm.open()?;
                warm.idle.lock().push_back(conn);
            }
            Ok::<_, DriverError>(())
        })
        .await
        .map_err(|e| Error::Internal(format!("pool warm-up task failed: {}", e)))?;

        warmed.map_err(DataAccessError::new)?;

        info!(
            max_size = inner.config.max_size,
            acquire_timeout = ?inner.config.acquire_timeout,
            "Connection pool ready"
        );

        Ok(Self { inner })
    }

    // == Acquire ==
    /// Checks out a live connection, waiting up to the acquire timeout.
    ///
    /// Cancelling the returned future is safe: a checkout already running
    /// on the blocking pool finishes into a lease that is dropped, which puts
    /// the connection back and frees the slot.
    ///
    /// # Errors
    /// - `PoolExhausted` if no connection frees up in time
    /// - `PoolClosed` once [`close`](Self::close) has been called
    /// - `DataAccess` with a `ConnectionLost` cause if the liveness check and
    ///   the single reconnect attempt both fail
    pub async fn acquire(&self) -> Result<PooledConnection<D>> {
        let timeout = self.inner.config.acquire_timeout;
        let permit =
            match tokio::time::timeout(timeout, self.inner.permits.clone().acquire_owned()).await {
                Ok(Ok(permit)) => permit,
                Ok(Err(_)) => return Err(Error::PoolClosed),
                Err(_) => {
                    warn!(waited = ?timeout, "Connection pool exhausted");
                    return Err(Error::PoolExhausted { waited: timeout });
                }
            };

        // The permit travels with the checkout so it is held until the
        // connection is back in the idle set or closed.
        let inner = self.inner.clone();
        let checkout = tokio::task::spawn_blocking(move || {
            let conn = inner.checkout()?;
            Ok::<_, DriverError>(PooledConnection {
                conn: Some(conn),
                tainted: false,
                pool: inner,
                _permit: permit,
            })
        });

        let lease = match checkout.await {
            Ok(checked) => checked.map_err(DataAccessError::new)?,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => return Err(Error::Internal(format!("checkout task failed: {}", e))),
        };

        debug!("Connection checked out");
        Ok(lease)
    }

    // == Status ==
    pub fn status(&self) -> PoolStatus {
        let max_size = self.inner.config.max_size;
        PoolStatus {
            max_size,
            idle: self.inner.idle.lock().len(),
            in_use: max_size - self.inner.permits.available_permits(),
            live: self.inner.live.load(Ordering::SeqCst),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    // == Close ==
    /// Stops handing out connections and closes the idle ones. Connections
    /// still checked out are closed when their lease ends.
    pub fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<_> = self.inner.idle.lock().drain(..).collect();
        let count = drained.len();
        for conn in drained {
            self.inner.forget(conn);
        }
        info!(closed = count, "Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.inner.permits.is_closed()
    }
}

// == Pooled Connection ==
/// Exclusive lease on one pooled connection.
///
/// Dropping the lease returns the connection to the idle set, or closes it if
/// it was marked tainted. Either way the pool slot is freed.
pub struct PooledConnection<D: Driver> {
    conn: Option<D::Conn>,
    tainted: bool,
    pool: Arc<PoolInner<D>>,
    // Dropped after `Drop::drop` has put the connection back
    _permit: OwnedSemaphorePermit,
}

impl<D: Driver> PooledConnection<D> {
    /// Returns the connection to the pool (or closes it if tainted).
    pub fn release(self) {
        drop(self);
    }

    /// Closes the connection instead of returning it. The pool opens a
    /// replacement on a later checkout.
    pub fn discard(mut self) {
        self.tainted = true;
    }

    /// Marks the session as unsafe to reuse until [`clear_taint`] is called.
    ///
    /// [`clear_taint`]: PooledConnection::clear_taint
    pub fn taint(&mut self) {
        self.tainted = true;
    }

    pub fn clear_taint(&mut self) {
        self.tainted = false;
    }

    pub fn is_tainted(&self) -> bool {
        self.tainted
    }
}

impl<D: Driver> Deref for PooledConnection<D> {
    type Target = D::Conn;

    fn deref(&self) -> &D::Conn {
        self.conn.as_ref().expect("connection is present until the lease ends")
    }
}

impl<D: Driver> DerefMut for PooledConnection<D> {
    fn deref_mut(&mut self) -> &mut D::Conn {
        self.conn.as_mut().expect("connection is present until the lease ends")
    }
}

impl<D: Driver> Drop for PooledConnection<D> {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };

        if self.tainted || self.pool.permits.is_closed() {
            self.pool.forget(conn);
            debug!("Connection discarded");
        } else {
            self.pool.idle.lock().push_back(conn);
            debug!("Connection returned to pool");
        }
    }
}
