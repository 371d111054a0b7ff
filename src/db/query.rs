//! Query Facade
//!
//! The entry point service code uses to read and write data. Every call runs
//! in its own transaction on a pooled connection.

use tracing::debug;

use crate::db::{
    ConnectionPool, Cursor, Driver, DriverError, Params, Row, TransactionalExecutor, TxKind,
};
use crate::error::Result;

// == Query Mode ==
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// First matching row, or none
    FetchOne,
    /// Every matching row in order
    FetchAll,
    /// Affected-row count; commits
    Mutate,
}

// == Query Output ==
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutput {
    Row(Option<Row>),
    Rows(Vec<Row>),
    Affected(u64),
}

impl QueryOutput {
    pub fn into_row(self) -> Option<Row> {
        match self {
            QueryOutput::Row(row) => row,
            QueryOutput::Rows(rows) => rows.into_iter().next(),
            QueryOutput::Affected(_) => None,
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            QueryOutput::Row(row) => row.into_iter().collect(),
            QueryOutput::Rows(rows) => rows,
            QueryOutput::Affected(_) => Vec::new(),
        }
    }

    pub fn affected(&self) -> Option<u64> {
        match self {
            QueryOutput::Affected(n) => Some(*n),
            _ => None,
        }
    }
}

// == Query Facade ==
pub struct QueryFacade<D: Driver> {
    executor: TransactionalExecutor<D>,
}

impl<D: Driver> Clone for QueryFacade<D> {
    fn clone(&self) -> Self {
        Self {
            executor: self.executor.clone(),
        }
    }
}

impl<D: Driver> QueryFacade<D> {
    pub fn new(pool: ConnectionPool<D>) -> Self {
        Self {
            executor: TransactionalExecutor::new(pool),
        }
    }

    pub fn pool(&self) -> &ConnectionPool<D> {
        self.executor.pool()
    }

    pub fn executor(&self) -> &TransactionalExecutor<D> {
        &self.executor
    }

    // == Execute ==
    /// Runs one parameterized statement in its own transaction.
    ///
    /// `query` is a statement template; `params` are bound by the driver.
    ///
    /// # Errors
    /// `DataAccess` carrying the driver error and the query, or
    /// `PoolExhausted` when no connection frees up in time.
    pub async fn execute(
        &self,
        query: impl Into<String>,
        params: Params,
        mode: QueryMode,
    ) -> Result<QueryOutput> {
        let query = query.into();
        let kind = match mode {
            QueryMode::Mutate => TxKind::Mutate,
            QueryMode::FetchOne | QueryMode::FetchAll => TxKind::Read,
        };

        debug!(?mode, params = params.len(), "Executing query");

        self.executor
            .with_transaction(kind, move |cursor| match mode {
                QueryMode::FetchOne => cursor.fetch_one(&query, &params).map(QueryOutput::Row),
                QueryMode::FetchAll => cursor.fetch_all(&query, &params).map(QueryOutput::Rows),
                QueryMode::Mutate => cursor.execute(&query, &params).map(QueryOutput::Affected),
            })
            .await
    }

    pub async fn fetch_one(&self, query: impl Into<String>, params: Params) -> Result<Option<Row>> {
        self.execute(query, params, QueryMode::FetchOne)
            .await
            .map(QueryOutput::into_row)
    }

    pub async fn fetch_all(&self, query: impl Into<String>, params: Params) -> Result<Vec<Row>> {
        self.execute(query, params, QueryMode::FetchAll)
            .await
            .map(QueryOutput::into_rows)
    }

    /// Returns the number of affected rows.
    pub async fn mutate(&self, query: impl Into<String>, params: Params) -> Result<u64> {
        let output = self.execute(query, params, QueryMode::Mutate).await?;
        Ok(output.affected().unwrap_or(0))
    }

    // == Transaction ==
    /// Runs several statements in one committed transaction.
    ///
    /// For maintenance jobs that must delete or insert as a unit; ordinary
    /// service calls go through [`execute`](Self::execute).
    pub async fn transaction<T, F>(&self, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Cursor<'_, D::Conn>) -> std::result::Result<T, DriverError>
            + Send
            + 'static,
        T: Send + 'static,
    {
        self.executor
            .with_transaction(TxKind::Mutate, operation)
            .await
    }

    // == Ping ==
    /// Checks out (and thereby validates) one connection.
    pub async fn ping(&self) -> Result<()> {
        self.pool().acquire().await?.release();
        Ok(())
    }
}
