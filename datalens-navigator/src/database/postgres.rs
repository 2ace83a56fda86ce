//! PostgreSQL database provider implementation

use crate::database::pool::PoolManager;
use crate::database::traits::{DatabaseError, DatabaseProvider, ResolvedConnection};
use crate::query::{RenderedQuery, SqlParam};
use crate::schema::DataSourceCredentials;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgRow, PgTypeKind};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row, TypeInfo, ValueRef};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// PostgreSQL database provider
pub struct PostgresProvider {
    pools: Arc<PoolManager>,
}

impl PostgresProvider {
    /// Create a new PostgreSQL provider
    ///
    /// # Arguments
    ///
    /// * `pools` - Pool manager shared with the rest of the process
    pub fn new(pools: Arc<PoolManager>) -> Self {
        Self { pools }
    }

    pub fn pools(&self) -> &Arc<PoolManager> {
        &self.pools
    }

    /// Bind a parameter with the Postgres type matching its variant
    fn bind_param<'q>(
        query: Query<'q, Postgres, PgArguments>,
        param: &SqlParam,
    ) -> Query<'q, Postgres, PgArguments> {
        match param {
            SqlParam::Text(value) => query.bind(value.clone()),
            SqlParam::Numeric(value) => query.bind(value.clone()),
            SqlParam::Bool(value) => query.bind(*value),
            SqlParam::BigInt(value) => query.bind(*value),
        }
    }

    /// Execute a query and log its text, parameters, duration and row count
    async fn run(pool: &PgPool, rendered: &RenderedQuery) -> Result<Vec<PgRow>, DatabaseError> {
        let start_time = Instant::now();

        let mut query = sqlx::query(&rendered.sql);
        for param in &rendered.params {
            query = Self::bind_param(query, param);
        }
        let result = query.fetch_all(pool).await;

        let elapsed_milliseconds = start_time.elapsed().as_millis() as u64;

        match result {
            Ok(rows) => {
                info!(
                    sql = %rendered.sql,
                    params = ?rendered.params,
                    elapsed_milliseconds,
                    rows = rows.len(),
                    "executed query"
                );
                Ok(rows)
            }
            Err(error) => {
                error!(
                    sql = %rendered.sql,
                    params = ?rendered.params,
                    elapsed_milliseconds,
                    error = %error,
                    "query failed"
                );
                Err(error.into())
            }
        }
    }

    /// Convert a PostgreSQL row to a JSON object
    fn row_to_json(row: &PgRow) -> Result<Value, DatabaseError> {
        let mut map = serde_json::Map::new();

        for column in row.columns() {
            let ordinal = column.ordinal();
            let column_name = column.name();

            if row.try_get_raw(ordinal)?.is_null() {
                map.insert(column_name.to_string(), Value::Null);
                continue;
            }

            // Enum labels travel as text
            if let PgTypeKind::Enum(_) = column.type_info().kind() {
                let label = row.try_get_unchecked::<String, _>(ordinal)?;
                map.insert(column_name.to_string(), Value::String(label));
                continue;
            }

            let value: Value = match column.type_info().name() {
                "BOOL" => Value::Bool(row.try_get::<bool, _>(ordinal)?),
                "INT2" => Value::Number(row.try_get::<i16, _>(ordinal)?.into()),
                "INT4" => Value::Number(row.try_get::<i32, _>(ordinal)?.into()),
                "INT8" => Value::Number(row.try_get::<i64, _>(ordinal)?.into()),
                "FLOAT4" => float_to_json(row.try_get::<f32, _>(ordinal)? as f64),
                "FLOAT8" => float_to_json(row.try_get::<f64, _>(ordinal)?),
                // Kept as text to preserve precision
                "NUMERIC" => Value::String(row.try_get::<BigDecimal, _>(ordinal)?.to_string()),
                "TEXT" | "VARCHAR" | "CHAR" | "NAME" | "BPCHAR" => {
                    Value::String(row.try_get::<String, _>(ordinal)?)
                }
                "TIMESTAMPTZ" => Value::String(
                    row.try_get::<DateTime<Utc>, _>(ordinal)?
                        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                        .to_string(),
                ),
                "TIMESTAMP" => Value::String(
                    row.try_get::<NaiveDateTime, _>(ordinal)?
                        .format("%Y-%m-%dT%H:%M:%S%.3f")
                        .to_string(),
                ),
                "DATE" => Value::String(row.try_get::<NaiveDate, _>(ordinal)?.to_string()),
                "TIME" => Value::String(row.try_get::<NaiveTime, _>(ordinal)?.to_string()),
                "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(ordinal)?.to_string()),
                "JSON" | "JSONB" => row.try_get::<Value, _>(ordinal)?,
                "BYTEA" => {
                    let bytes: Vec<u8> = row.try_get(ordinal)?;
                    Value::String(format!("[BLOB: {} bytes]", bytes.len()))
                }
                type_name => match row.try_get::<String, _>(ordinal) {
                    Ok(text) => Value::String(text),
                    Err(error) => {
                        warn!(
                            column = column_name,
                            column_type = type_name,
                            error = %error,
                            "returning null for a column type that cannot be decoded"
                        );
                        Value::Null
                    }
                },
            };

            map.insert(column_name.to_string(), value);
        }

        Ok(Value::Object(map))
    }
}

fn float_to_json(value: f64) -> Value {
    serde_json::Number::from_f64(value)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[async_trait]
impl DatabaseProvider for PostgresProvider {
    type Connection = PgPool;

    async fn resolve(
        &self,
        source: Option<&DataSourceCredentials>,
    ) -> Result<ResolvedConnection<PgPool>, DatabaseError> {
        self.pools.resolve(source).await
    }

    async fn fetch_rows(&self, connection: &PgPool, query: &RenderedQuery) -> Result<Vec<Value>, DatabaseError> {
        let rows = Self::run(connection, query).await?;
        rows.iter().map(Self::row_to_json).collect()
    }

    async fn fetch_count(&self, connection: &PgPool, query: &RenderedQuery) -> Result<u64, DatabaseError> {
        let rows = Self::run(connection, query).await?;
        let total: i64 = match rows.first() {
            Some(row) => row.try_get("total")?,
            None => 0,
        };
        Ok(total.max(0) as u64)
    }

    async fn test_connection(&self, source: &DataSourceCredentials) -> Result<(), DatabaseError> {
        self.pools.test_connection(source).await
    }
}
