//! Column type registry
//!
//! Maps a column's logical type to the casts used when selecting, ordering
//! and comparing it, and to the coercion applied to raw request values before
//! they are bound.

use crate::query::QueryError;
use crate::schema::ColumnType;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Serialize, Serializer};
use std::str::FromStr;

/// `to_char` pattern producing ISO-8601 text with milliseconds
pub const DATETIME_OUTPUT_FORMAT: &str = r#"YYYY-MM-DD"T"HH24:MI:SS.MS"Z""#;

/// A positional query parameter
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Numeric(BigDecimal),
    Bool(bool),
    BigInt(i64),
}

impl Serialize for SqlParam {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlParam::Text(value) => serializer.serialize_str(value),
            SqlParam::Bool(value) => serializer.serialize_bool(*value),
            SqlParam::BigInt(value) => serializer.serialize_i64(*value),
            SqlParam::Numeric(value) => {
                let text = value.to_string();
                match text.parse::<serde_json::Number>() {
                    Ok(number) => number.serialize(serializer),
                    Err(_) => serializer.serialize_str(&text),
                }
            }
        }
    }
}

impl ColumnType {
    /// Cast applied when the column is ordered or compared against the cursor
    pub fn order_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Number => Some("numeric"),
            ColumnType::Datetime => Some("timestamptz"),
            ColumnType::Text => Some("text"),
            ColumnType::Boolean | ColumnType::Other(_) => None,
        }
    }

    /// Cast applied to the sort column when it orders a page and when it is
    /// compared against the cursor
    ///
    /// Unrecognized types are keyed on their text form, matching the text
    /// the cursor is bound as.
    pub fn key_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Other(_) => Some("text"),
            _ => self.order_cast(),
        }
    }

    /// Cast applied to filter placeholders
    pub fn param_cast(&self) -> Option<&'static str> {
        match self {
            ColumnType::Datetime => Some("timestamp"),
            ColumnType::Boolean => Some("bool"),
            _ => None,
        }
    }

    /// Coerce one raw filter value
    ///
    /// Never fails: a value that does not fit the type is bound as text and
    /// left for the database to judge.
    pub fn coerce_value(&self, raw: &str) -> SqlParam {
        match self {
            ColumnType::Boolean => SqlParam::Bool(raw == "true"),
            ColumnType::Number => BigDecimal::from_str(raw.trim())
                .map(SqlParam::Numeric)
                .unwrap_or_else(|_| SqlParam::Text(raw.to_string())),
            _ => SqlParam::Text(raw.to_string()),
        }
    }

    /// Coerce a pagination cursor for comparison with the sort column
    pub fn coerce_cursor(&self, raw: &str) -> Result<SqlParam, QueryError> {
        match self {
            ColumnType::Number => BigDecimal::from_str(raw.trim())
                .map(SqlParam::Numeric)
                .map_err(|_| QueryError::InvalidCursor(format!("'{}' is not a number", raw))),
            ColumnType::Datetime => parse_timestamp(raw)
                .map(|timestamp| {
                    SqlParam::Text(timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
                })
                .ok_or_else(|| QueryError::InvalidCursor(format!("'{}' is not a timestamp", raw))),
            ColumnType::Boolean => Ok(SqlParam::Bool(raw == "true")),
            _ => Ok(SqlParam::Text(raw.to_string())),
        }
    }
}

/// Column reference with the type's ordering cast, e.g. `price::numeric`
pub fn cast_expression(column: &str, column_type: &ColumnType) -> String {
    let column = crate::query::quote_identifier(column);
    match column_type.order_cast() {
        Some(cast) => format!("{}::{}", column, cast),
        None => column,
    }
}

/// Parse an ISO-8601 timestamp; values without an offset are taken as UTC
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();

    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(timestamp.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(timestamp.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|timestamp| timestamp.and_utc())
}
