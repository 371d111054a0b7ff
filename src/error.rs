//! Error types for the cache and data-access layer
//!
//! Provides unified error handling using thiserror.

use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::db::DriverError;

// == Data Access Error ==
/// A driver-level failure, carried unmodified together with the statement
/// that triggered it (when one was running).
#[derive(Error, Debug)]
#[error("{}", describe(.query, .cause))]
pub struct DataAccessError {
    /// The statement template that failed, if the failure happened mid-query
    pub query: Option<String>,
    /// Underlying driver error
    #[source]
    pub cause: DriverError,
}

fn describe(query: &Option<String>, cause: &DriverError) -> String {
    match query {
        Some(query) => format!("data access failed on `{}`: {}", query, cause),
        None => format!("data access failed: {}", cause),
    }
}

impl DataAccessError {
    /// Wraps a driver error that is not tied to a statement (connect, ping, commit).
    pub fn new(cause: DriverError) -> Self {
        Self { query: None, cause }
    }

    /// Wraps a driver error raised while running `query`.
    pub fn with_query(query: impl Into<String>, cause: DriverError) -> Self {
        Self {
            query: Some(query.into()),
            cause,
        }
    }
}

// == Error Enum ==
/// Unified error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    /// No pooled connection became available within the acquire timeout
    #[error("connection pool exhausted after waiting {waited:?}")]
    PoolExhausted { waited: Duration },

    /// The pool was closed; no further connections are handed out
    #[error("connection pool is closed")]
    PoolClosed,

    /// Any driver failure: connectivity, constraint, syntax
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// A cache domain name that is not part of the registry
    #[error("unknown cache domain: {0}")]
    UnknownDomain(String),

    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (background worker failed)
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures a caller may reasonably retry with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::PoolExhausted { .. } => true,
            Error::DataAccess(e) => e.cause.is_transient(),
            _ => false,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::PoolExhausted { .. } | Error::PoolClosed => StatusCode::SERVICE_UNAVAILABLE,
            Error::DataAccess(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::UnknownDomain(_) => StatusCode::NOT_FOUND,
            Error::Config(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        }));

        if matches!(self, Error::PoolExhausted { .. }) {
            return (status, [(header::RETRY_AFTER, "1")], body).into_response();
        }

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the crate.
pub type Result<T> = std::result::Result<T, Error>;
