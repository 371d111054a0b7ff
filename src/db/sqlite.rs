//! SQLite Driver
//!
//! [`Driver`] implementation on top of rusqlite. Each connection is a separate
//! session on the same database file; transactions are explicit
//! `BEGIN`/`COMMIT`/`ROLLBACK` so the executor decides the outcome.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::types::{ToSql, ToSqlOutput, ValueRef};
use rusqlite::{ErrorCode, OpenFlags, Statement};

use crate::db::{Connection, Driver, DriverError, DriverErrorKind, Params, Row, Value};

// == SQLite Driver ==
/// Opens rusqlite sessions against one database file.
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteDriver {
    pub fn new(path: impl AsRef<Path>, busy_timeout: Duration) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            busy_timeout,
        }
    }

    /// Builds a driver from a `sqlite://<path>` URL or a bare file path.
    pub fn from_url(url: &str, busy_timeout: Duration) -> Self {
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);
        Self::new(path, busy_timeout)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Driver for SqliteDriver {
    type Conn = SqliteConnection;

    fn connect(&self) -> Result<SqliteConnection, DriverError> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX
            | OpenFlags::SQLITE_OPEN_URI;

        let conn = rusqlite::Connection::open_with_flags(&self.path, flags)
            .map_err(|e| DriverError::new(DriverErrorKind::ConnectionLost, e))?;

        // The busy timeout doubles as the statement-level timeout for lock waits
        conn.busy_timeout(self.busy_timeout).map_err(classify)?;
        conn.pragma_update(None, "foreign_keys", true)
            .map_err(classify)?;

        tracing::debug!(path = %self.path.display(), "Opened SQLite session");

        Ok(SqliteConnection { conn })
    }
}

// == SQLite Connection ==
/// One rusqlite session.
#[derive(Debug)]
pub struct SqliteConnection {
    conn: rusqlite::Connection,
}

impl Connection for SqliteConnection {
    fn ping(&mut self) -> Result<(), DriverError> {
        self.conn
            .query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map(|_| ())
            .map_err(|e| DriverError::new(DriverErrorKind::ConnectionLost, e))
    }

    fn begin(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("BEGIN").map_err(classify)
    }

    fn commit(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("COMMIT").map_err(classify)
    }

    fn rollback(&mut self) -> Result<(), DriverError> {
        self.conn.execute_batch("ROLLBACK").map_err(classify)
    }

    fn query(&mut self, sql: &str, params: &Params) -> Result<Vec<Row>, DriverError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(classify)?;
        bind(&mut stmt, params)?;

        let columns: Arc<[String]> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect::<Vec<_>>()
            .into();

        let mut rows = stmt.raw_query();
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(classify)? {
            let mut values = Vec::with_capacity(columns.len());
            for i in 0..columns.len() {
                values.push(from_value_ref(row.get_ref(i).map_err(classify)?));
            }
            out.push(Row::new(columns.clone(), values));
        }
        Ok(out)
    }

    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, DriverError> {
        let mut stmt = self.conn.prepare_cached(sql).map_err(classify)?;
        bind(&mut stmt, params)?;
        let changed = stmt.raw_execute().map_err(classify)?;
        Ok(changed as u64)
    }
}

// == Binding ==
fn bind(stmt: &mut Statement<'_>, params: &Params) -> Result<(), DriverError> {
    let expected = stmt.parameter_count();

    match params {
        Params::None => {
            if expected != 0 {
                return Err(statement_error(format!(
                    "statement expects {} parameters, none given",
                    expected
                )));
            }
        }
        Params::Positional(values) => {
            if values.len() != expected {
                return Err(statement_error(format!(
                    "statement expects {} parameters, {} given",
                    expected,
                    values.len()
                )));
            }
            for (i, value) in values.iter().enumerate() {
                stmt.raw_bind_parameter(i + 1, value).map_err(classify)?;
            }
        }
        Params::Named(pairs) => {
            let mut bound = vec![false; expected];
            for (name, value) in pairs {
                let index = stmt
                    .parameter_index(name)
                    .map_err(classify)?
                    .ok_or_else(|| statement_error(format!("unknown parameter {}", name)))?;
                stmt.raw_bind_parameter(index, value).map_err(classify)?;
                bound[index - 1] = true;
            }
            // SQLite would run the statement with NULL in any slot left over
            if let Some(slot) = bound.iter().position(|b| !b) {
                let name = stmt
                    .parameter_name(slot + 1)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("?{}", slot + 1));
                return Err(statement_error(format!("parameter {} is not bound", name)));
            }
        }
    }
    Ok(())
}

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(v) => ToSqlOutput::Borrowed(ValueRef::Integer(*v)),
            Value::Real(v) => ToSqlOutput::Borrowed(ValueRef::Real(*v)),
            Value::Text(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            Value::Blob(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
        })
    }
}

fn from_value_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(v) => Value::Text(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => Value::Blob(v.to_vec()),
    }
}

// == Error Classification ==
fn statement_error(message: String) -> DriverError {
    DriverError::new(DriverErrorKind::Statement, message)
}

fn classify(err: rusqlite::Error) -> DriverError {
    let kind = match &err {
        rusqlite::Error::SqliteFailure(e, _) => match e.code {
            ErrorCode::ConstraintViolation => DriverErrorKind::Constraint,
            ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked => DriverErrorKind::Busy,
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::SystemIoFailure
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::ReadOnly => DriverErrorKind::ConnectionLost,
            ErrorCode::Unknown | ErrorCode::ApiMisuse | ErrorCode::TypeMismatch => {
                DriverErrorKind::Statement
            }
            _ => DriverErrorKind::Other,
        },
        rusqlite::Error::SqlInputError { .. }
        | rusqlite::Error::InvalidParameterCount(..)
        | rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::InvalidColumnIndex(_)
        | rusqlite::Error::InvalidColumnName(_)
        | rusqlite::Error::ExecuteReturnedResults
        | rusqlite::Error::MultipleStatement => DriverErrorKind::Statement,
        _ => DriverErrorKind::Other,
    };
    DriverError::new(kind, err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (TempDir, SqliteConnection) {
        let dir = TempDir::new().unwrap();
        let driver = SqliteDriver::new(dir.path().join("test.db"), Duration::from_secs(1));
        let mut conn = driver.connect().unwrap();
        conn.execute(
            "CREATE TABLE students (s_id TEXT PRIMARY KEY, name TEXT NOT NULL, mess TEXT)",
            &Params::None,
        )
        .unwrap();
        (dir, conn)
    }

    #[test]
    fn test_from_url_strips_scheme() {
        let driver = SqliteDriver::from_url("sqlite://data/mess.db", Duration::from_secs(1));
        assert_eq!(driver.path(), Path::new("data/mess.db"));

        let driver = SqliteDriver::from_url("mess.db", Duration::from_secs(1));
        assert_eq!(driver.path(), Path::new("mess.db"));
    }

    #[test]
    fn test_ping() {
        let (_dir, mut conn) = open();
        assert!(conn.ping().is_ok());
    }

    #[test]
    fn test_execute_and_query_positional() {
        let (_dir, mut conn) = open();

        let n = conn
            .execute(
                "INSERT INTO students (s_id, name, mess) VALUES (?1, ?2, ?3)",
                &crate::params!["S001", "Asha", "mess1"],
            )
            .unwrap();
        assert_eq!(n, 1);

        let rows = conn
            .query(
                "SELECT s_id, name, mess FROM students WHERE s_id = ?1",
                &crate::params!["S001"],
            )
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name").and_then(Value::as_str), Some("Asha"));
        assert_eq!(rows[0].columns(), ["s_id", "name", "mess"]);
    }

    #[test]
    fn test_named_parameters() {
        let (_dir, mut conn) = open();
        conn.execute(
            "INSERT INTO students (s_id, name, mess) VALUES (:id, :name, NULL)",
            &Params::named([(":id", "S002"), (":name", "Ravi")]),
        )
        .unwrap();

        let rows = conn
            .query(
                "SELECT mess FROM students WHERE s_id = :id",
                &Params::named([(":id", "S002")]),
            )
            .unwrap();
        assert!(rows[0].get("mess").unwrap().is_null());
    }

    #[test]
    fn test_named_parameter_left_unbound() {
        let (_dir, mut conn) = open();
        let err = conn
            .execute(
                "INSERT INTO students (s_id, name, mess) VALUES (:id, :name, :mess)",
                &Params::named([(":id", "S007"), (":name", "Divya")]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Statement);
        assert!(err.to_string().contains(":mess"));

        let rows = conn
            .query("SELECT COUNT(*) AS n FROM students", &Params::None)
            .unwrap();
        assert_eq!(rows[0].get("n").and_then(Value::as_i64), Some(0));
    }

    #[test]
    fn test_unknown_named_parameter() {
        let (_dir, mut conn) = open();
        let err = conn
            .query(
                "SELECT name FROM students WHERE s_id = :id",
                &Params::named([(":id", "S001"), (":sid", "S001")]),
            )
            .unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Statement);
    }

    #[test]
    fn test_parameter_values_are_not_interpolated() {
        let (_dir, mut conn) = open();
        let hostile = "x'); DROP TABLE students; --";
        conn.execute(
            "INSERT INTO students (s_id, name) VALUES (?1, ?2)",
            &crate::params!["S003", hostile],
        )
        .unwrap();

        let rows = conn
            .query("SELECT name FROM students", &Params::None)
            .unwrap();
        assert_eq!(rows[0].get("name").and_then(Value::as_str), Some(hostile));
    }

    #[test]
    fn test_unique_violation_is_constraint() {
        let (_dir, mut conn) = open();
        let insert = "INSERT INTO students (s_id, name) VALUES (?1, ?2)";
        conn.execute(insert, &crate::params!["S004", "Meera"]).unwrap();

        let err = conn
            .execute(insert, &crate::params!["S004", "Meera"])
            .unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Constraint);
    }

    #[test]
    fn test_syntax_error_is_statement() {
        let (_dir, mut conn) = open();
        let err = conn.query("SELEKT 1", &Params::None).unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Statement);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let (_dir, mut conn) = open();
        let err = conn
            .execute(
                "INSERT INTO students (s_id, name) VALUES (?1, ?2)",
                &crate::params!["S005"],
            )
            .unwrap_err();
        assert_eq!(err.kind(), DriverErrorKind::Statement);
    }

    #[test]
    fn test_rollback_discards_changes() {
        let (_dir, mut conn) = open();
        conn.begin().unwrap();
        conn.execute(
            "INSERT INTO students (s_id, name) VALUES (?1, ?2)",
            &crate::params!["S006", "Kiran"],
        )
        .unwrap();
        conn.rollback().unwrap();

        let rows = conn
            .query("SELECT COUNT(*) AS n FROM students", &Params::None)
            .unwrap();
        assert_eq!(rows[0].get("n").and_then(Value::as_i64), Some(0));
    }
}
