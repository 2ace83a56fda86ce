//! Distinct column values endpoint, used to populate filter dropdowns

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::api::{load_table, required, resolve_credentials, ApiError, AppState};
use crate::catalog::LensCatalog;
use crate::database::DatabaseProvider;
use crate::query::{distinct_values_query, FilterMap};
use crate::schema::DistinctValuesRequest;

/// Handler for GET /api/distinct-values
///
/// Returns up to 1000 distinct values of one column, optionally narrowed by
/// a case-insensitive substring and by the filters already applied to the
/// other columns.
///
/// Query parameters:
/// - table, column, datalensId: required
/// - searchTerm: substring to match against the column's text form
/// - filters, dataSource, dataSourceId: as for GET /api/data
///
/// Response: a flat JSON array, e.g. `["acme", "globex"]`
pub async fn distinct_values_handler<DB: DatabaseProvider, C: LensCatalog>(
    State(state): State<AppState<DB, C>>,
    Query(request): Query<DistinctValuesRequest>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let table_name = required(&request.table, "Table and column are required")?;
    let column = required(&request.column, "Table and column are required")?;
    let lens_id = required(&request.datalens_id, "DataLens ID is required")?;

    let filters = match request.filters.as_deref() {
        Some(raw) => FilterMap::from_json(raw)?,
        None => FilterMap::new(),
    };

    let (lens, table) = load_table(state.catalog.as_ref(), lens_id, table_name).await?;
    if table.column(column).is_none() {
        return Err(ApiError::NotFound("Column not found in table".to_string()));
    }

    let credentials = resolve_credentials(
        state.catalog.as_ref(),
        request.data_source.as_deref(),
        request.data_source_id.as_deref(),
        &lens,
    )
    .await?;
    let resolved = state.database.resolve(credentials.as_ref()).await?;

    let query = distinct_values_query(
        &table,
        &resolved.schema,
        column,
        request.search_term.as_deref(),
        &filters,
    )?;

    let rows = state.database.fetch_rows(&resolved.connection, &query).await?;
    let values = rows
        .into_iter()
        .map(|mut row| {
            row.get_mut(column)
                .map(serde_json::Value::take)
                .unwrap_or(serde_json::Value::Null)
        })
        .collect();

    Ok(Json(values))
}
