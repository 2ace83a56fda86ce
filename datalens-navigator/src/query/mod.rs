//! Dynamic query construction
//!
//! Lens configuration plus runtime filter, sort and cursor parameters are
//! turned into a small clause tree ([`ast::Select`]) which is rendered to
//! PostgreSQL text with positional parameters. Placeholder numbers are
//! assigned while rendering, so the parameter list always lines up with the
//! `$n` markers no matter which clauses are present.

pub mod assembler;
pub mod ast;
pub mod filter;
pub mod render;
pub mod types;

pub use assembler::{distinct_values_query, AssembledQueries, PageQuery, DISTINCT_VALUES_LIMIT};
pub use filter::{build_filter_predicates, render_filter, FilterMap};
pub use render::{quote_identifier, RenderedQuery};
pub use types::{cast_expression, SqlParam, DATETIME_OUTPUT_FORMAT};

use thiserror::Error;

/// Errors raised while validating request parameters for query construction
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// Filters parameter is not a JSON object of value lists
    #[error("Invalid filters: {0}")]
    InvalidFilters(String),

    /// Pagination cursor cannot be interpreted for the sort column type
    #[error("Invalid pagination cursor: {0}")]
    InvalidCursor(String),

    /// Page size is not a positive integer
    #[error("Invalid page size: {0}")]
    InvalidPageSize(String),

    /// Column is not part of the table configuration
    #[error("Column not found in table: {0}")]
    UnknownColumn(String),
}
