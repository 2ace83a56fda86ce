//! Paginated table data endpoint

use axum::{
    extract::{Query, State},
    response::Json,
};

use crate::api::{load_table, required, resolve_credentials, ApiError, AppState};
use crate::catalog::LensCatalog;
use crate::database::DatabaseProvider;
use crate::query::{FilterMap, PageQuery};
use crate::schema::{DataRequest, DataResponse, QueryEcho, SortDirection};

/// Page size used when the request does not name one
pub const DEFAULT_PAGE_SIZE: i64 = 100;

/// Maximum allowed page size to bound memory usage
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Handler for GET /api/data
///
/// Fetches one keyset-paginated page of a lens table.
///
/// Query parameters:
/// - table: Table name as configured in the lens (required)
/// - datalensId: Lens providing the table configuration (required)
/// - pageSize: Rows per page (default: 100, max: 1000)
/// - sortField: Column to sort by (optional)
/// - sortDirection: "asc" or "desc" (default: "asc")
/// - filters: JSON map of column name to selected values
/// - lastKey: Cursor returned with the previous page
/// - dataSource: JSON `{jdbc_url, username, password}` connection override
/// - dataSourceId: Registered data source to query instead
///
/// Response:
/// ```json
/// {
///   "data": [{ "id": 1, "customer": "acme" }],
///   "hasMore": false,
///   "lastKey": "1",
///   "totalCount": 1,
///   "query": { "sql": "SELECT id, customer FROM public.orders ...", "params": [100] }
/// }
/// ```
pub async fn get_data_handler<DB: DatabaseProvider, C: LensCatalog>(
    State(state): State<AppState<DB, C>>,
    Query(request): Query<DataRequest>,
) -> Result<Json<DataResponse>, ApiError> {
    let table_name = required(&request.table, "Table is required")?;
    let lens_id = required(&request.datalens_id, "DataLens ID is required")?;

    let page_size = parse_page_size(request.page_size.as_deref())?;
    let sort_direction = match request.sort_direction.as_deref().filter(|value| !value.is_empty()) {
        Some(value) => value.parse::<SortDirection>().map_err(ApiError::BadRequest)?,
        None => SortDirection::Asc,
    };
    let filters = match request.filters.as_deref() {
        Some(raw) => FilterMap::from_json(raw)?,
        None => FilterMap::new(),
    };

    let (lens, table) = load_table(state.catalog.as_ref(), lens_id, table_name).await?;
    let credentials = resolve_credentials(
        state.catalog.as_ref(),
        request.data_source.as_deref(),
        request.data_source_id.as_deref(),
        &lens,
    )
    .await?;

    let resolved = state.database.resolve(credentials.as_ref()).await?;

    let queries = PageQuery::new(&table, &resolved.schema, &filters)
        .sort(request.sort_field.as_deref(), sort_direction)
        .after(request.last_key.as_deref())
        .page_size(page_size)
        .build()?;

    let (mut data, total_count) = tokio::try_join!(
        state.database.fetch_rows(&resolved.connection, &queries.data),
        state.database.fetch_count(&resolved.connection, &queries.count),
    )?;

    let last_key = data
        .last()
        .and_then(|row| row.get(&table.sort_column))
        .and_then(cursor_string);

    // A sort column outside the displayed columns is selected for the cursor only
    if table.column(&table.sort_column).is_none() {
        for row in data.iter_mut().filter_map(serde_json::Value::as_object_mut) {
            row.remove(&table.sort_column);
        }
    }

    Ok(Json(DataResponse {
        has_more: data.len() as i64 == page_size,
        last_key,
        total_count,
        data,
        query: QueryEcho {
            sql: queries.data.sql,
            params: queries.data.params,
        },
    }))
}

fn parse_page_size(raw: Option<&str>) -> Result<i64, ApiError> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(DEFAULT_PAGE_SIZE);
    };

    match raw.parse::<i64>() {
        Ok(size) if size >= 1 => Ok(size.min(MAX_PAGE_SIZE)),
        _ => Err(ApiError::BadRequest(format!("Invalid page size: {}", raw))),
    }
}

/// String form of a sort column value, `None` for SQL NULL
fn cursor_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}
