//! Query assembler
//!
//! Builds the keyset-paginated page query, the matching count query and the
//! distinct-values query for a configured table.

use crate::query::ast::{CompareOp, Expr, OrderByItem, Predicate, Select, SelectItem, TableRef};
use crate::query::filter::{build_filter_predicates, FilterMap};
use crate::query::render::{Render, RenderedQuery};
use crate::query::types::{SqlParam, DATETIME_OUTPUT_FORMAT};
use crate::query::QueryError;
use crate::schema::{ColumnConfig, ColumnType, SortDirection, TableConfig};

/// Maximum number of rows returned by the distinct-values query
pub const DISTINCT_VALUES_LIMIT: i64 = 1000;

/// Cursor value clients send when they have no cursor
const UNDEFINED_CURSOR: &str = "undefined";

/// Page and count queries built from one request
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledQueries {
    pub data: RenderedQuery,
    pub count: RenderedQuery,
}

/// Parameters of one page request against a configured table
#[derive(Debug, Clone)]
pub struct PageQuery<'a> {
    pub table: &'a TableConfig,
    pub schema: &'a str,
    pub filters: &'a FilterMap,
    pub sort_field: Option<&'a str>,
    pub sort_direction: SortDirection,
    pub last_key: Option<&'a str>,
    pub page_size: i64,
}

impl<'a> PageQuery<'a> {
    pub fn new(table: &'a TableConfig, schema: &'a str, filters: &'a FilterMap) -> Self {
        Self {
            table,
            schema,
            filters,
            sort_field: None,
            sort_direction: SortDirection::Asc,
            last_key: None,
            page_size: 100,
        }
    }

    pub fn sort(mut self, sort_field: Option<&'a str>, sort_direction: SortDirection) -> Self {
        self.sort_field = sort_field;
        self.sort_direction = sort_direction;
        self
    }

    pub fn after(mut self, last_key: Option<&'a str>) -> Self {
        self.last_key = last_key;
        self
    }

    pub fn page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Build the page query and the count query
    ///
    /// The count query shares only the filter predicates; the cursor
    /// predicate, ordering and limit apply to the page query alone.
    pub fn build(&self) -> Result<AssembledQueries, QueryError> {
        if self.page_size < 1 {
            return Err(QueryError::InvalidPageSize(self.page_size.to_string()));
        }

        let table = self.table;
        let from = table_ref(self.schema, table);
        let filters = build_filter_predicates(self.filters, &table.columns);

        let mut count = Select::new(
            from.clone(),
            vec![SelectItem {
                expr: Expr::CountAll,
                alias: Some("total".to_string()),
            }],
        );
        count.predicates = filters.clone();

        let mut data = Select::new(from, page_projection(table));
        data.predicates = filters;

        let sort_field = self.effective_sort_field();
        // Direction the sort column itself is ordered in
        let sort_column_direction = match sort_field {
            Some(_) => SortDirection::Asc,
            None => self.sort_direction,
        };

        if let Some(last_key) = self.cursor() {
            let sort_type = table.sort_column_type();
            let op = match sort_column_direction {
                SortDirection::Asc => CompareOp::Gt,
                SortDirection::Desc => CompareOp::Lt,
            };
            data.predicates.push(Predicate::Compare {
                left: Expr::column(&table.sort_column).cast(sort_type.key_cast()),
                op,
                right: Expr::param(sort_type.coerce_cursor(last_key)?, sort_type.key_cast()),
            });
        }

        data.order_by = self.order_by(sort_field, sort_column_direction);
        data.limit = Some(Expr::param(SqlParam::BigInt(self.page_size), Some("bigint")));

        Ok(AssembledQueries {
            data: data.to_query(),
            count: count.to_query(),
        })
    }

    /// Requested sort field when it differs from the sort column and is configured
    fn effective_sort_field(&self) -> Option<&'a ColumnConfig> {
        let table = self.table;
        self.sort_field
            .filter(|field| !field.is_empty() && *field != table.sort_column)
            .and_then(|field| table.column(field))
    }

    fn cursor(&self) -> Option<&'a str> {
        self.last_key
            .filter(|key| !key.is_empty() && *key != UNDEFINED_CURSOR)
    }

    /// Requested field, then the sort column, then every other column
    ///
    /// The trailing columns make the order total so consecutive pages agree
    /// on where rows with equal sort values fall.
    fn order_by(
        &self,
        sort_field: Option<&ColumnConfig>,
        sort_column_direction: SortDirection,
    ) -> Vec<OrderByItem> {
        let table = self.table;
        let mut order_by = Vec::with_capacity(table.columns.len() + 1);

        if let Some(field) = sort_field {
            order_by.push(order_item(&field.name, field.column_type.order_cast(), self.sort_direction));
        }
        order_by.push(order_item(
            &table.sort_column,
            table.sort_column_type().key_cast(),
            sort_column_direction,
        ));

        for column in &table.columns {
            let listed = column.name == table.sort_column
                || sort_field.is_some_and(|field| field.name == column.name);
            if !listed {
                order_by.push(order_item(&column.name, column.column_type.order_cast(), SortDirection::Asc));
            }
        }

        order_by
    }
}

/// Build the distinct-values query for one configured column
///
/// The optional search term is matched case-insensitively against the
/// column's text form and is bound before the filter parameters.
pub fn distinct_values_query(
    table: &TableConfig,
    schema: &str,
    column: &str,
    search_term: Option<&str>,
    filters: &FilterMap,
) -> Result<RenderedQuery, QueryError> {
    let column_config = table
        .column(column)
        .ok_or_else(|| QueryError::UnknownColumn(column.to_string()))?;

    let mut select = Select::new(
        table_ref(schema, table),
        projection(std::slice::from_ref(column_config)),
    );
    select.distinct = true;

    if let Some(term) = search_term.filter(|term| !term.is_empty()) {
        select.predicates.push(Predicate::ILike {
            left: Expr::column(column).cast(Some("text")),
            pattern: Expr::param(SqlParam::Text(format!("%{}%", term)), None),
        });
    }
    select
        .predicates
        .extend(build_filter_predicates(filters, &table.columns));

    select.order_by.push(OrderByItem {
        expr: Expr::column(column),
        direction: SortDirection::Asc,
    });
    select.limit = Some(Expr::param(SqlParam::BigInt(DISTINCT_VALUES_LIMIT), Some("bigint")));

    Ok(select.to_query())
}

fn table_ref(schema: &str, table: &TableConfig) -> TableRef {
    TableRef {
        schema: schema.to_string(),
        name: table.name.clone(),
    }
}

/// Displayed columns, followed by the sort column when it is not displayed
///
/// The last row's sort column value is the next page's cursor, so it is
/// always selected.
fn page_projection(table: &TableConfig) -> Vec<SelectItem> {
    let mut items = projection(&table.columns);
    if table.column(&table.sort_column).is_none() {
        items.push(SelectItem {
            expr: Expr::column(&table.sort_column),
            alias: None,
        });
    }
    items
}

/// Datetime columns are rendered as ISO-8601 text under their own name
fn projection(columns: &[ColumnConfig]) -> Vec<SelectItem> {
    columns
        .iter()
        .map(|column| match column.column_type {
            ColumnType::Datetime => SelectItem {
                expr: Expr::ToChar {
                    column: column.name.clone(),
                    format: DATETIME_OUTPUT_FORMAT,
                },
                alias: Some(column.name.clone()),
            },
            _ => SelectItem {
                expr: Expr::column(&column.name),
                alias: None,
            },
        })
        .collect()
}

fn order_item(name: &str, cast: Option<&'static str>, direction: SortDirection) -> OrderByItem {
    OrderByItem {
        expr: Expr::column(name).cast(cast),
        direction,
    }
}
