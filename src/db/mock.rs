//! In-memory driver with switchable faults, for pool and executor tests.
//!
//! Statements are not parsed. `execute` appends the SQL text to a pending
//! log (and fails with a constraint error if the text contains `FAIL`);
//! `commit` moves pending entries into the committed log, `rollback` drops
//! them. `query` returns one row per committed entry.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::db::{Connection, Driver, DriverError, DriverErrorKind, Params, Row, Value};

#[derive(Default)]
struct FaultState {
    fail_connect: AtomicBool,
    fail_ping: AtomicBool,
    fail_begin: AtomicBool,
    fail_commit: AtomicBool,
    fail_rollback: AtomicBool,
    ping_delay_ms: AtomicU64,
    connects: AtomicUsize,
    pings: AtomicUsize,
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
    committed: Mutex<Vec<String>>,
}

/// Shared fault switches and counters.
#[derive(Clone, Default)]
pub struct Faults {
    state: Arc<FaultState>,
}

macro_rules! switch {
    ($setter:ident, $field:ident) => {
        pub fn $setter(&self, on: bool) {
            self.state.$field.store(on, Ordering::SeqCst);
        }
    };
}

macro_rules! counter {
    ($getter:ident, $field:ident) => {
        pub fn $getter(&self) -> usize {
            self.state.$field.load(Ordering::SeqCst)
        }
    };
}

impl Faults {
    switch!(set_fail_connect, fail_connect);
    switch!(set_fail_ping, fail_ping);
    switch!(set_fail_begin, fail_begin);
    switch!(set_fail_commit, fail_commit);
    switch!(set_fail_rollback, fail_rollback);

    counter!(connects, connects);
    counter!(pings, pings);
    counter!(commits, commits);
    counter!(rollbacks, rollbacks);
    counter!(closed, closed);

    /// Makes every later ping block its thread for `delay`.
    pub fn set_ping_delay(&self, delay: Duration) {
        let ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.state.ping_delay_ms.store(ms, Ordering::SeqCst);
    }

    pub fn committed(&self) -> Vec<String> {
        self.state.committed.lock().clone()
    }

    /// Marks one caller as holding a connection, tracking the peak.
    pub fn enter(&self) {
        let now = self.state.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn leave(&self) {
        self.state.active.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak_concurrency(&self) -> usize {
        self.state.peak.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool, kind: DriverErrorKind, what: &str) -> Result<(), DriverError> {
        if flag.load(Ordering::SeqCst) {
            Err(DriverError::new(kind, format!("injected {} failure", what)))
        } else {
            Ok(())
        }
    }
}

pub struct MockDriver {
    faults: Faults,
    next_id: AtomicUsize,
}

impl MockDriver {
    pub fn new(faults: Faults) -> Self {
        Self {
            faults,
            next_id: AtomicUsize::new(0),
        }
    }
}

impl Driver for MockDriver {
    type Conn = MockConnection;

    fn connect(&self) -> Result<MockConnection, DriverError> {
        let s = &self.faults.state;
        self.faults
            .check(&s.fail_connect, DriverErrorKind::ConnectionLost, "connect")?;
        s.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            faults: self.faults.clone(),
            pending: Vec::new(),
        })
    }
}

pub struct MockConnection {
    id: usize,
    faults: Faults,
    pending: Vec<String>,
}

impl MockConnection {
    pub fn id(&self) -> usize {
        self.id
    }
}

impl Connection for MockConnection {
    fn ping(&mut self) -> Result<(), DriverError> {
        let s = &self.faults.state;
        s.pings.fetch_add(1, Ordering::SeqCst);
        let delay = s.ping_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        self.faults
            .check(&s.fail_ping, DriverErrorKind::ConnectionLost, "ping")
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        let s = &self.faults.state;
        self.faults
            .check(&s.fail_begin, DriverErrorKind::ConnectionLost, "begin")?;
        self.pending.clear();
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        let s = &self.faults.state;
        self.faults
            .check(&s.fail_commit, DriverErrorKind::Other, "commit")?;
        s.commits.fetch_add(1, Ordering::SeqCst);
        s.committed.lock().append(&mut self.pending);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        let s = &self.faults.state;
        self.faults
            .check(&s.fail_rollback, DriverErrorKind::ConnectionLost, "rollback")?;
        s.rollbacks.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
        Ok(())
    }

    fn query(&mut self, _sql: &str, _params: &Params) -> Result<Vec<Row>, DriverError> {
        let columns: Arc<[String]> = vec!["statement".to_string()].into();
        Ok(self
            .faults
            .committed()
            .into_iter()
            .map(|sql| Row::new(columns.clone(), vec![Value::Text(sql)]))
            .collect())
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError> {
        if sql.contains("FAIL") {
            return Err(DriverError::new(
                DriverErrorKind::Constraint,
                "injected constraint failure",
            ));
        }
        self.pending.push(sql.to_string());
        Ok(params.len().max(1) as u64)
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.faults.state.closed.fetch_add(1, Ordering::SeqCst);
    }
}
