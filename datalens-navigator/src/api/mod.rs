//! REST API endpoints
//!
//! This module contains all API endpoint handlers of the navigator.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

use crate::catalog::{CatalogError, LensCatalog};
use crate::database::{DatabaseError, DatabaseProvider};
use crate::query::QueryError;
use crate::schema::{DataLens, DataSourceCredentials, TableConfig};

pub mod data;
pub mod datasources;
pub mod distinct;
pub mod lenses;

// Re-export handlers for convenience
pub use data::get_data_handler;
pub use datasources::test_connection_handler;
pub use distinct::distinct_values_handler;
pub use lenses::get_data_lens_handler;

/// Shared state of the API handlers
pub struct AppState<DB, C> {
    pub database: Arc<DB>,
    pub catalog: Arc<C>,
}

impl<DB, C> Clone for AppState<DB, C> {
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            catalog: self.catalog.clone(),
        }
    }
}

/// Create the API router with all endpoints
///
/// # Arguments
///
/// * `state` - Database provider and lens catalog shared by all handlers
pub fn create_api_router<DB: DatabaseProvider, C: LensCatalog>(state: AppState<DB, C>) -> Router {
    Router::new()
        .route("/data", get(get_data_handler::<DB, C>))
        .route("/distinct-values", get(distinct_values_handler::<DB, C>))
        .route("/datalenses/{id}", get(get_data_lens_handler::<DB, C>))
        .route("/datasources/test-connection", post(test_connection_handler::<DB, C>))
        .with_state(state)
}

/// Error returned by the API handlers, rendered as `{ "error": message }`
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed request parameter
    #[error("{0}")]
    BadRequest(String),

    /// Lens, table, column or data source not found
    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<QueryError> for ApiError {
    fn from(error: QueryError) -> Self {
        match error {
            QueryError::UnknownColumn(_) => ApiError::NotFound(error.to_string()),
            _ => ApiError::BadRequest(error.to_string()),
        }
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Database(DatabaseError::InvalidDataSource(_)) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Catalog(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        (
            status,
            Json(serde_json::json!({
                "error": self.to_string()
            })),
        )
            .into_response()
    }
}

/// Value of a required parameter, rejecting absent and empty values
fn required<'a>(value: &'a Option<String>, message: &str) -> Result<&'a str, ApiError> {
    value
        .as_deref()
        .filter(|value| !value.is_empty())
        .ok_or_else(|| ApiError::BadRequest(message.to_string()))
}

/// Load a lens and one of its tables
async fn load_table<C: LensCatalog>(
    catalog: &C,
    lens_id: &str,
    table: &str,
) -> Result<(DataLens, TableConfig), ApiError> {
    let lens = catalog
        .data_lens(lens_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("DataLens configuration not found".to_string()))?;

    let table = lens
        .table(table)
        .cloned()
        .ok_or_else(|| ApiError::NotFound("Table not found in DataLens configuration".to_string()))?;

    Ok((lens, table))
}

/// Credentials to query with
///
/// Precedence: explicit `dataSource` JSON, then `dataSourceId`, then the
/// lens's own data source. `None` means the configured default connection.
async fn resolve_credentials<C: LensCatalog>(
    catalog: &C,
    data_source: Option<&str>,
    data_source_id: Option<&str>,
    lens: &DataLens,
) -> Result<Option<DataSourceCredentials>, ApiError> {
    if let Some(raw) = data_source.filter(|raw| !raw.is_empty()) {
        let credentials = serde_json::from_str(raw)
            .map_err(|error| ApiError::BadRequest(format!("Invalid dataSource: {}", error)))?;
        return Ok(Some(credentials));
    }

    let id = data_source_id
        .filter(|id| !id.is_empty())
        .or(lens.datasource_id.as_deref());

    match id {
        Some(id) => catalog
            .data_source(id)
            .await?
            .map(Some)
            .ok_or_else(|| ApiError::NotFound(format!("Data source not found: {}", id))),
        None => Ok(None),
    }
}
