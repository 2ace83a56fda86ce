//! Lens configuration endpoint

use axum::{
    extract::{Path, State},
    response::Json,
};

use crate::api::{ApiError, AppState};
use crate::catalog::LensCatalog;
use crate::database::DatabaseProvider;
use crate::schema::DataLensResponse;

/// Handler for GET /api/datalenses/{id}
///
/// Returns the tables and columns a lens exposes, for the navigator's table
/// list.
pub async fn get_data_lens_handler<DB: DatabaseProvider, C: LensCatalog>(
    State(state): State<AppState<DB, C>>,
    Path(lens_id): Path<String>,
) -> Result<Json<DataLensResponse>, ApiError> {
    let lens = state
        .catalog
        .data_lens(&lens_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("DataLens configuration not found".to_string()))?;

    Ok(Json(DataLensResponse {
        id: lens.id,
        datasource_id: lens.datasource_id,
        tables: lens.tables,
    }))
}
