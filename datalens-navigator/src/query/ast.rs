//! Clause tree for the queries issued by the navigator

use crate::query::SqlParam;
use crate::schema::SortDirection;

/// Schema-qualified table reference
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub schema: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column identifier
    Column(String),

    /// Postgres shorthand cast, `expr::type`
    Cast { expr: Box<Expr>, sql_type: &'static str },

    /// Standard cast, `CAST(expr AS type)`
    CastAs { expr: Box<Expr>, sql_type: &'static str },

    /// Bound parameter, numbered when rendered
    Param {
        value: SqlParam,
        cast: Option<&'static str>,
    },

    /// `to_char(column, 'format')`
    ToChar { column: String, format: &'static str },

    /// `COUNT(*)`
    CountAll,
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn param(value: SqlParam, cast: Option<&'static str>) -> Self {
        Expr::Param { value, cast }
    }

    /// Wrap in a shorthand cast when one is given
    pub fn cast(self, sql_type: Option<&'static str>) -> Self {
        match sql_type {
            Some(sql_type) => Expr::Cast {
                expr: Box::new(self),
                sql_type,
            },
            None => self,
        }
    }

    pub fn cast_as(self, sql_type: &'static str) -> Self {
        Expr::CastAs {
            expr: Box::new(self),
            sql_type,
        }
    }
}

/// Projected expression with an optional alias
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expr: Expr,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Gt,
    Lt,
}

impl CompareOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare { left: Expr, op: CompareOp, right: Expr },
    InList { left: Expr, values: Vec<Expr> },
    ILike { left: Expr, pattern: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderByItem {
    pub expr: Expr,
    pub direction: SortDirection,
}

/// A `SELECT` statement; `predicates` are joined with `AND`
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: TableRef,
    pub predicates: Vec<Predicate>,
    pub order_by: Vec<OrderByItem>,
    pub limit: Option<Expr>,
}

impl Select {
    pub fn new(from: TableRef, items: Vec<SelectItem>) -> Self {
        Self {
            distinct: false,
            items,
            from,
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }
}
