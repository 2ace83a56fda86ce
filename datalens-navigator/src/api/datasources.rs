//! Data source connection test endpoint

use axum::{extract::State, response::Json};

use crate::api::{required, ApiError, AppState};
use crate::catalog::LensCatalog;
use crate::database::{DatabaseError, DatabaseProvider};
use crate::schema::{DataSourceCredentials, TestConnectionRequest, TestConnectionResponse};

/// Handler for POST /api/datasources/test-connection
///
/// Opens a single connection with the submitted credentials and runs
/// `SELECT 1`. Nothing is pooled or stored.
///
/// Request body:
/// ```json
/// {
///   "jdbcUrl": "jdbc:postgresql://db:5432/analytics",
///   "username": "reader",
///   "password": "secret"
/// }
/// ```
///
/// Response: `{ "success": true }`, or `{ "error": "..." }` with status 500
/// carrying the driver's message.
pub async fn test_connection_handler<DB: DatabaseProvider, C: LensCatalog>(
    State(state): State<AppState<DB, C>>,
    Json(request): Json<TestConnectionRequest>,
) -> Result<Json<TestConnectionResponse>, ApiError> {
    const MISSING: &str = "Missing required fields";

    let credentials = DataSourceCredentials {
        jdbc_url: required(&request.jdbc_url, MISSING)?.to_string(),
        username: required(&request.username, MISSING)?.to_string(),
        password: required(&request.password, MISSING)?.to_string(),
    };

    match state.database.test_connection(&credentials).await {
        Ok(()) => Ok(Json(TestConnectionResponse { success: true })),
        // A malformed URL is a connection failure from the caller's point of view
        Err(DatabaseError::InvalidDataSource(message)) => {
            Err(DatabaseError::Connection(message).into())
        }
        Err(error) => Err(error.into()),
    }
}
