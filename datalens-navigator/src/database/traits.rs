//! Database provider trait
//!
//! This trait defines what the HTTP layer needs from a database backend:
//! resolving a connection for a request and running the generated queries.

use crate::query::RenderedQuery;
use crate::schema::DataSourceCredentials;
use async_trait::async_trait;
use thiserror::Error;

/// A connection resolved for one request, with the schema its tables live in
#[derive(Debug, Clone)]
pub struct ResolvedConnection<C> {
    pub connection: C,
    pub schema: String,
}

/// Database provider trait for executing navigator queries
#[async_trait]
pub trait DatabaseProvider: Send + Sync + 'static {
    /// Handle used to run queries, typically a connection pool
    type Connection: Send + Sync;

    /// Resolve the connection for a request
    ///
    /// # Arguments
    ///
    /// * `source` - Credentials overriding the configured default connection
    async fn resolve(
        &self,
        source: Option<&DataSourceCredentials>,
    ) -> Result<ResolvedConnection<Self::Connection>, DatabaseError>;

    /// Run a query and return its rows as JSON objects keyed by column name
    async fn fetch_rows(
        &self,
        connection: &Self::Connection,
        query: &RenderedQuery,
    ) -> Result<Vec<serde_json::Value>, DatabaseError>;

    /// Run a `COUNT(*) AS total` query
    async fn fetch_count(
        &self,
        connection: &Self::Connection,
        query: &RenderedQuery,
    ) -> Result<u64, DatabaseError>;

    /// Open a single connection with the given credentials and run `SELECT 1`
    async fn test_connection(&self, source: &DataSourceCredentials) -> Result<(), DatabaseError>;
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Query execution failed; carries the driver's message
    #[error("{0}")]
    Query(String),

    /// Connection could not be established
    #[error("{0}")]
    Connection(String),

    /// Data source credentials are malformed
    #[error("Invalid data source: {0}")]
    InvalidDataSource(String),

    /// Connection attempt exceeded the connect timeout
    #[error("Connection timeout exceeded")]
    Timeout,
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut => DatabaseError::Timeout,
            sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolClosed => {
                DatabaseError::Connection(error.to_string())
            }
            other => DatabaseError::Query(other.to_string()),
        }
    }
}
