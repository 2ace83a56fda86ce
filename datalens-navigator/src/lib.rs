//! # datalens-navigator
//!
//! Browse curated views ("data lenses") over data-warehouse tables through a
//! JSON API, easily integrable as an Axum layer.
//!
//! ## Features
//!
//! - Lens-driven table and column configuration with typed columns
//!   (`text`, `number`, `datetime`, `boolean`)
//! - Filtering with per-column value lists, multi-key sorting with a total order
//! - Keyset pagination with client-held cursors and a matching row count
//! - Distinct-value lookups for filter dropdowns
//! - Per-request PostgreSQL connections from JDBC-style credentials, pooled
//!   and bounded
//!
//! ## Security Warning
//!
//! - No authentication/authorization built-in; mount behind your own
//! - Responses echo the generated SQL and its parameters
//! - Database error messages are returned to the caller unredacted
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use datalens_navigator::{ConnectionDefaults, DataLensLayer, InMemoryCatalog, PoolManager, PoolSettings};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let pools = Arc::new(PoolManager::new(ConnectionDefaults::default(), PoolSettings::default()));
//!     let catalog = InMemoryCatalog::load("catalog.json").await.unwrap();
//!
//!     let app = Router::new()
//!         .route("/", get(|| async { "Hello, World!" }))
//!         .merge(DataLensLayer::postgres("/datalens", pools.clone(), catalog).into_router());
//!
//!     // Serve the application, then `pools.close_all().await` on shutdown...
//! }
//! ```

// Public modules
pub mod api;
pub mod catalog;
pub mod database;
pub mod layer;
pub mod query;
pub mod schema;

// Public exports
pub use catalog::{CatalogError, InMemoryCatalog, LensCatalog};
pub use database::{
    ConnectionDefaults, DatabaseError, DatabaseProvider, PoolManager, PoolSettings, PostgresProvider,
    ResolvedConnection,
};
pub use layer::DataLensLayer;
pub use query::{FilterMap, PageQuery, QueryError, RenderedQuery, SqlParam};
pub use schema::{ColumnConfig, ColumnType, DataLens, DataSourceCredentials, SortDirection, TableConfig};

// Error type
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Query(#[from] QueryError),
}

pub type Result<T> = std::result::Result<T, Error>;
