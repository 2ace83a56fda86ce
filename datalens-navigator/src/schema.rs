//! Lens configuration, request and response types
//!
//! Table and column configuration is stored with the lens in snake_case (the
//! shape the organizer writes). Request and response bodies use camelCase.

use crate::query::SqlParam;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Configuration of one table exposed through a data lens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name in the target database
    pub name: String,

    /// Column used as the pagination key and final tie-break
    pub sort_column: String,

    /// Column identifying a row (informational)
    #[serde(default)]
    pub key_column: String,

    /// Columns shown by the navigator, in display order
    pub columns: Vec<ColumnConfig>,
}

impl TableConfig {
    /// Look up a configured column by name
    pub fn column(&self, name: &str) -> Option<&ColumnConfig> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Type of the sort column, or the permissive fallback when the sort
    /// column is not part of the displayed columns
    pub fn sort_column_type(&self) -> ColumnType {
        self.column(&self.sort_column)
            .map(|column| column.column_type.clone())
            .unwrap_or_else(|| ColumnType::Other(String::new()))
    }
}

/// A configured column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnConfig {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Logical column type tag
///
/// Unrecognized tags are kept as [`ColumnType::Other`] and handled without
/// casts or coercion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    Text,
    Number,
    Datetime,
    Boolean,
    Other(String),
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "text" => ColumnType::Text,
            "number" => ColumnType::Number,
            "datetime" => ColumnType::Datetime,
            "boolean" => ColumnType::Boolean,
            _ => ColumnType::Other(tag),
        }
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        match column_type {
            ColumnType::Text => "text".to_string(),
            ColumnType::Number => "number".to_string(),
            ColumnType::Datetime => "datetime".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Other(tag) => tag,
        }
    }
}

/// Stored lens configuration
///
/// Older lenses store a bare array of tables, newer ones wrap it in an object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum LensConfig {
    Tables(Vec<TableConfig>),
    Wrapped {
        #[serde(default)]
        tables: Vec<TableConfig>,
    },
}

impl LensConfig {
    pub fn into_tables(self) -> Vec<TableConfig> {
        match self {
            LensConfig::Tables(tables) | LensConfig::Wrapped { tables } => tables,
        }
    }
}

/// A curated view over one data source
#[derive(Debug, Clone, PartialEq)]
pub struct DataLens {
    pub id: String,

    /// Data source the lens was created against, if recorded
    pub datasource_id: Option<String>,

    pub tables: Vec<TableConfig>,
}

impl DataLens {
    pub fn table(&self, name: &str) -> Option<&TableConfig> {
        self.tables.iter().find(|table| table.name == name)
    }
}

/// Connection credentials of a registered data source
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceCredentials {
    /// JDBC-style URL, e.g. `jdbc:postgresql://host:5432/warehouse`
    pub jdbc_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for DataSourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataSourceCredentials")
            .field("jdbc_url", &self.jdbc_url)
            .field("username", &self.username)
            .field("password", &"*****")
            .finish()
    }
}

/// Sort direction requested by the navigator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if value.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(format!("Invalid sort direction: {}", value))
        }
    }
}

/// Query parameters of `GET /api/data`
///
/// Everything arrives as raw strings so that malformed values produce the
/// JSON error envelope instead of an extractor rejection.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataRequest {
    pub table: Option<String>,
    pub datalens_id: Option<String>,
    pub page_size: Option<String>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<String>,

    /// JSON-encoded map of column name to selected values
    pub filters: Option<String>,

    /// Sort column value of the last row of the previous page
    pub last_key: Option<String>,

    /// JSON-encoded [`DataSourceCredentials`] overriding the lens data source
    pub data_source: Option<String>,

    /// Registered data source to query instead of the lens data source
    pub data_source_id: Option<String>,
}

/// Generated SQL echoed back to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryEcho {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Response of `GET /api/data`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataResponse {
    /// Rows of the current page as JSON objects
    pub data: Vec<serde_json::Value>,

    /// Whether the page was full, i.e. another page may follow
    pub has_more: bool,

    /// Cursor for the next page
    pub last_key: Option<String>,

    /// Number of rows matching the filters, ignoring pagination
    pub total_count: u64,

    pub query: QueryEcho,
}

/// Query parameters of `GET /api/distinct-values`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinctValuesRequest {
    pub table: Option<String>,
    pub column: Option<String>,
    pub datalens_id: Option<String>,
    pub search_term: Option<String>,
    pub filters: Option<String>,
    pub data_source: Option<String>,
    pub data_source_id: Option<String>,
}

/// Response of `GET /api/datalenses/{id}`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DataLensResponse {
    pub id: String,
    pub datasource_id: Option<String>,
    pub tables: Vec<TableConfig>,
}

/// Body of `POST /api/datasources/test-connection`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConnectionRequest {
    pub jdbc_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestConnectionResponse {
    pub success: bool,
}
