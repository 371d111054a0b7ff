//! Driver Module
//!
//! The seam between the pool/executor and a concrete database. A driver opens
//! connections; a connection runs parameterized statements and controls its
//! own transaction.

use std::fmt;

use crate::db::{Params, Row};

// == Driver Error Kind ==
/// Coarse classification of a driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The session is gone (cannot open, I/O failure, closed socket)
    ConnectionLost,
    /// Unique, foreign key, not-null or check constraint violated
    Constraint,
    /// Malformed statement, unknown column, bad parameter binding
    Statement,
    /// Database locked or busy past the statement timeout
    Busy,
    /// Anything else the driver reports
    Other,
}

impl fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverErrorKind::ConnectionLost => "connection lost",
            DriverErrorKind::Constraint => "constraint violation",
            DriverErrorKind::Statement => "statement error",
            DriverErrorKind::Busy => "database busy",
            DriverErrorKind::Other => "driver error",
        };
        f.write_str(name)
    }
}

// == Driver Error ==
/// Error reported by a [`Driver`] or [`Connection`].
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {source}")]
pub struct DriverError {
    kind: DriverErrorKind,
    source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl DriverError {
    /// Creates a driver error from a kind and any message or error value.
    pub fn new<E>(kind: DriverErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    {
        Self {
            kind,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> DriverErrorKind {
        self.kind
    }

    pub fn is_connection_lost(&self) -> bool {
        self.kind == DriverErrorKind::ConnectionLost
    }

    /// Connectivity and lock contention may clear up on retry; constraint and
    /// statement errors will not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            DriverErrorKind::ConnectionLost | DriverErrorKind::Busy
        )
    }
}

// == Driver Traits ==
/// Opens new database sessions. Shared by the pool across threads.
pub trait Driver: Send + Sync + 'static {
    type Conn: Connection;

    /// Opens a fresh session.
    fn connect(&self) -> Result<Self::Conn, DriverError>;
}

/// A single live database session.
///
/// A connection is only ever used by one thread at a time; the pool hands it
/// out exclusively and calls are strictly sequential.
pub trait Connection: Send + 'static {
    /// Lightweight round-trip used as the liveness check on checkout.
    fn ping(&mut self) -> Result<(), DriverError>;

    fn begin(&mut self) -> Result<(), DriverError>;

    fn commit(&mut self) -> Result<(), DriverError>;

    fn rollback(&mut self) -> Result<(), DriverError>;

    /// Runs a row-returning statement with bound parameters.
    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, DriverError>;

    /// Runs a mutating statement with bound parameters, returning the number
    /// of affected rows.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_driver_error_display() {
        let err = DriverError::new(DriverErrorKind::Constraint, "UNIQUE constraint failed");
        assert_eq!(
            err.to_string(),
            "constraint violation: UNIQUE constraint failed"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_transient_kinds() {
        assert!(DriverError::new(DriverErrorKind::ConnectionLost, "gone").is_transient());
        assert!(DriverError::new(DriverErrorKind::Busy, "locked").is_transient());
        assert!(!DriverError::new(DriverErrorKind::Statement, "syntax").is_transient());
        assert!(!DriverError::new(DriverErrorKind::Constraint, "dup").is_transient());
    }
}
