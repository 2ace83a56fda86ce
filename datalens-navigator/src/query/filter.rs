//! Filter predicate builder
//!
//! The same builder feeds the page query, the count query and the
//! distinct-values query.

use crate::query::ast::{CompareOp, Expr, Predicate};
use crate::query::render::{Render, RenderedQuery, Renderer};
use crate::query::QueryError;
use crate::schema::{ColumnConfig, ColumnType};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Selected values per column: OR within a column, AND across columns
///
/// Columns iterate in name order, which fixes parameter numbering for a given
/// filter set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterMap(BTreeMap<String, Vec<String>>);

impl FilterMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the JSON-encoded `filters` request parameter
    ///
    /// Scalar values are taken in their string form and `null` entries are
    /// skipped. Entries whose value is not an array are ignored.
    pub fn from_json(raw: &str) -> Result<Self, QueryError> {
        if raw.trim().is_empty() {
            return Ok(Self::new());
        }

        let value: Value =
            serde_json::from_str(raw).map_err(|error| QueryError::InvalidFilters(error.to_string()))?;
        let Value::Object(entries) = value else {
            return Err(QueryError::InvalidFilters(
                "expected an object of column names to value lists".to_string(),
            ));
        };

        let mut filters = BTreeMap::new();
        for (column, values) in entries {
            let Value::Array(values) = values else {
                debug!(column = %column, "ignoring filter entry that is not a list");
                continue;
            };

            let values = values
                .into_iter()
                .filter_map(|value| match value {
                    Value::String(text) => Some(text),
                    Value::Number(number) => Some(number.to_string()),
                    Value::Bool(flag) => Some(flag.to_string()),
                    _ => None,
                })
                .collect();
            filters.insert(column, values);
        }

        Ok(Self(filters))
    }

    pub fn insert(&mut self, column: impl Into<String>, values: Vec<String>) {
        self.0.insert(column.into(), values);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for FilterMap {
    fn from_iter<I: IntoIterator<Item = (K, Vec<String>)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(column, values)| (column.into(), values)).collect())
    }
}

/// Build one predicate per usable filter entry
///
/// Entries naming a column outside `columns`, or with no values, are dropped.
pub fn build_filter_predicates(filters: &FilterMap, columns: &[ColumnConfig]) -> Vec<Predicate> {
    filters
        .iter()
        .filter_map(|(name, values)| {
            let Some(column) = columns.iter().find(|column| &column.name == name) else {
                warn!(column = %name, "dropping filter on column outside the table configuration");
                return None;
            };
            if values.is_empty() {
                return None;
            }
            Some(column_predicate(column, values))
        })
        .collect()
}

/// Render the filter predicates alone, joined with `AND` and numbered from `$1`
pub fn render_filter(filters: &FilterMap, columns: &[ColumnConfig]) -> RenderedQuery {
    let mut renderer = Renderer::new();
    build_filter_predicates(filters, columns).render(&mut renderer);
    renderer.finish()
}

fn column_predicate(column: &ColumnConfig, values: &[String]) -> Predicate {
    let column_type = &column.column_type;
    let left = match column_type {
        ColumnType::Boolean => Expr::column(&column.name).cast_as("bool"),
        // Values of unrecognized types are bound as text, so compare text forms
        ColumnType::Other(_) => Expr::column(&column.name).cast(Some("text")),
        _ => Expr::column(&column.name),
    };

    let mut params: Vec<Expr> = values
        .iter()
        .map(|value| Expr::param(column_type.coerce_value(value), column_type.param_cast()))
        .collect();

    if params.len() == 1 {
        Predicate::Compare {
            left,
            op: CompareOp::Eq,
            right: params.remove(0),
        }
    } else {
        Predicate::InList {
            left,
            values: params,
        }
    }
}
