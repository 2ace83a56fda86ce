//! Rendering of the clause tree to PostgreSQL text

use crate::query::ast::{Expr, OrderByItem, Predicate, Select, SelectItem, TableRef};
use crate::query::SqlParam;

/// SQL text with its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedQuery {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

/// Accumulates SQL text and numbers parameters in emission order
#[derive(Debug, Default)]
pub struct Renderer {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_param(&mut self, value: &SqlParam) {
        self.params.push(value.clone());
        self.sql.push('$');
        self.sql.push_str(&self.params.len().to_string());
    }

    pub fn finish(self) -> RenderedQuery {
        RenderedQuery {
            sql: self.sql,
            params: self.params,
        }
    }
}

pub trait Render {
    fn render(&self, r: &mut Renderer);

    fn to_query(&self) -> RenderedQuery {
        let mut renderer = Renderer::new();
        self.render(&mut renderer);
        renderer.finish()
    }
}

/// Quote an identifier unless it is a plain lowercase name
///
/// Embedded double quotes are doubled.
pub fn quote_identifier(identifier: &str) -> String {
    let mut chars = identifier.chars();
    let plain = matches!(chars.next(), Some(first) if first == '_' || first.is_ascii_lowercase())
        && chars.all(|c| c == '_' || c == '$' || c.is_ascii_lowercase() || c.is_ascii_digit());

    if plain {
        identifier.to_string()
    } else {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }
}

impl Render for Expr {
    fn render(&self, r: &mut Renderer) {
        match self {
            Expr::Column(name) => r.sql.push_str(&quote_identifier(name)),
            Expr::Cast { expr, sql_type } => {
                expr.render(r);
                r.sql.push_str("::");
                r.sql.push_str(sql_type);
            }
            Expr::CastAs { expr, sql_type } => {
                r.sql.push_str("CAST(");
                expr.render(r);
                r.sql.push_str(" AS ");
                r.sql.push_str(sql_type);
                r.sql.push(')');
            }
            Expr::Param { value, cast } => {
                r.push_param(value);
                if let Some(cast) = cast {
                    r.sql.push_str("::");
                    r.sql.push_str(cast);
                }
            }
            Expr::ToChar { column, format } => {
                r.sql.push_str("to_char(");
                r.sql.push_str(&quote_identifier(column));
                r.sql.push_str(", '");
                r.sql.push_str(&format.replace('\'', "''"));
                r.sql.push_str("')");
            }
            Expr::CountAll => r.sql.push_str("COUNT(*)"),
        }
    }
}

impl Render for SelectItem {
    fn render(&self, r: &mut Renderer) {
        self.expr.render(r);
        if let Some(alias) = &self.alias {
            r.sql.push_str(" as ");
            r.sql.push_str(&quote_identifier(alias));
        }
    }
}

impl Render for TableRef {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str(&quote_identifier(&self.schema));
        r.sql.push('.');
        r.sql.push_str(&quote_identifier(&self.name));
    }
}

impl Render for Predicate {
    fn render(&self, r: &mut Renderer) {
        match self {
            Predicate::Compare { left, op, right } => {
                left.render(r);
                r.sql.push(' ');
                r.sql.push_str(op.as_sql());
                r.sql.push(' ');
                right.render(r);
            }
            Predicate::InList { left, values } => {
                left.render(r);
                r.sql.push_str(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        r.sql.push_str(", ");
                    }
                    value.render(r);
                }
                r.sql.push(')');
            }
            Predicate::ILike { left, pattern } => {
                left.render(r);
                r.sql.push_str(" ILIKE ");
                pattern.render(r);
            }
        }
    }
}

impl Render for [Predicate] {
    fn render(&self, r: &mut Renderer) {
        for (i, predicate) in self.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(" AND ");
            }
            predicate.render(r);
        }
    }
}

impl Render for OrderByItem {
    fn render(&self, r: &mut Renderer) {
        self.expr.render(r);
        r.sql.push(' ');
        r.sql.push_str(self.direction.as_sql());
    }
}

impl Render for Select {
    fn render(&self, r: &mut Renderer) {
        r.sql.push_str("SELECT ");
        if self.distinct {
            r.sql.push_str("DISTINCT ");
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                r.sql.push_str(", ");
            }
            item.render(r);
        }

        r.sql.push_str(" FROM ");
        self.from.render(r);

        if !self.predicates.is_empty() {
            r.sql.push_str(" WHERE ");
            self.predicates.render(r);
        }

        if !self.order_by.is_empty() {
            r.sql.push_str(" ORDER BY ");
            for (i, order) in self.order_by.iter().enumerate() {
                if i > 0 {
                    r.sql.push_str(", ");
                }
                order.render(r);
            }
        }

        if let Some(limit) = &self.limit {
            r.sql.push_str(" LIMIT ");
            limit.render(r);
        }
    }
}
