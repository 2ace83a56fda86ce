//! DataLensLayer - Main Axum integration layer
//!
//! This module provides the main entry point for mounting the navigator API
//! into an Axum application.

use crate::api::{create_api_router, AppState};
use crate::catalog::LensCatalog;
use crate::database::{DatabaseProvider, PoolManager, PostgresProvider};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Main layer for integrating the navigator API into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use datalens_navigator::{ConnectionDefaults, DataLensLayer, InMemoryCatalog, PoolManager, PoolSettings};
/// use std::sync::Arc;
///
/// # async fn example() {
/// let pools = Arc::new(PoolManager::new(ConnectionDefaults::default(), PoolSettings::default()));
/// let catalog = InMemoryCatalog::load("catalog.json").await.unwrap();
/// let app = Router::new().merge(DataLensLayer::postgres("/datalens", pools, catalog).into_router());
/// # }
/// ```
pub struct DataLensLayer<DB: DatabaseProvider, C: LensCatalog> {
    base_path: String,
    database: Arc<DB>,
    catalog: Arc<C>,
}

impl<DB: DatabaseProvider, C: LensCatalog> DataLensLayer<DB, C> {
    /// Create a new navigator API at the given base path
    ///
    /// # Arguments
    ///
    /// * `base_path` - URL path the API is mounted under (e.g., "/datalens"); may be empty
    /// * `database` - The database provider implementation
    /// * `catalog` - Source of lens configurations and data source credentials
    pub fn new(base_path: impl Into<String>, database: DB, catalog: C) -> Self {
        Self {
            base_path: base_path.into(),
            database: Arc::new(database),
            catalog: Arc::new(catalog),
        }
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router serves the API at `{base_path}/api/*` with
    /// permissive CORS.
    pub fn into_router(self) -> Router {
        let state = AppState {
            database: self.database,
            catalog: self.catalog,
        };
        let base_path = self.base_path.trim_end_matches('/');

        Router::new()
            .nest(&format!("{}/api", base_path), create_api_router(state))
            .layer(CorsLayer::permissive())
    }
}

impl<C: LensCatalog> DataLensLayer<PostgresProvider, C> {
    /// Create a navigator API backed by PostgreSQL
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the API will be mounted
    /// * `pools` - Pool manager, shared so the host can close it at shutdown
    /// * `catalog` - Lens catalog
    pub fn postgres(base_path: impl Into<String>, pools: Arc<PoolManager>, catalog: C) -> Self {
        Self::new(base_path, PostgresProvider::new(pools), catalog)
    }
}
