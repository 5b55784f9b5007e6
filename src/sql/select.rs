use std::fmt;

use super::expr::{quote_ident, Renderer, SqlExpr};
use super::params::{Param, ParamSet};
use crate::error::CompileError;
use crate::expr::Direction;

/// One projected expression.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectItem {
    /// Projected expression.
    pub expr: SqlExpr,
    /// Output name.
    pub alias: Option<String>,
}

/// What a FROM clause reads.
#[derive(Clone, Debug, PartialEq)]
pub enum FromSource {
    /// Physical table.
    Table(String),
    /// Nested view.
    Subquery(Box<SelectQuery>),
}

/// FROM clause.
#[derive(Clone, Debug, PartialEq)]
pub struct FromClause {
    /// Source relation.
    pub source: FromSource,
    /// Alias the rest of the query refers to.
    pub alias: String,
}

/// Join flavor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    /// `LEFT JOIN`
    Left,
    /// `INNER JOIN`
    Inner,
}

/// Self-join or lookup join.
#[derive(Clone, Debug, PartialEq)]
pub struct Join {
    /// Join flavor.
    pub kind: JoinKind,
    /// Joined relation.
    pub source: FromSource,
    /// Alias of the joined table.
    pub alias: String,
    /// Join condition.
    pub on: SqlExpr,
}

/// ORDER BY term.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderTerm {
    /// Sorted expression.
    pub expr: SqlExpr,
    /// Direction.
    pub direction: Direction,
}

/// A SELECT statement under construction.
#[derive(Clone, Debug, PartialEq)]
pub struct SelectQuery {
    /// Projection.
    pub items: Vec<SelectItem>,
    /// FROM clause.
    pub from: FromClause,
    /// Joins, in order.
    pub joins: Vec<Join>,
    /// WHERE terms, combined with AND.
    pub conditions: Vec<SqlExpr>,
    /// ORDER BY terms.
    pub order_by: Vec<OrderTerm>,
    /// Bound parameters, including those of nested views.
    pub params: ParamSet,
}

impl SelectQuery {
    /// `SELECT ... FROM table AS alias`
    pub fn from_table(table: &str, alias: &str) -> Self {
        Self {
            items: Vec::new(),
            from: FromClause {
                source: FromSource::Table(table.to_string()),
                alias: alias.to_string(),
            },
            joins: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            params: ParamSet::new(),
        }
    }

    /// Alias of the FROM clause.
    pub fn alias(&self) -> &str {
        &self.from.alias
    }

    /// Adds a projected expression.
    pub fn select(&mut self, expr: SqlExpr, alias: Option<&str>) -> &mut Self {
        self.items.push(SelectItem {
            expr,
            alias: alias.map(str::to_string),
        });
        self
    }

    /// Projects `from_alias.column` under its own name.
    pub fn select_column(&mut self, column: &str) -> &mut Self {
        let expr = SqlExpr::column(&self.from.alias, column);
        self.select(expr, Some(column))
    }

    /// Whether an output name is already projected.
    pub fn projects(&self, name: &str) -> bool {
        self.items.iter().any(|item| match (&item.alias, &item.expr) {
            (Some(alias), _) => alias == name,
            (None, SqlExpr::Column { column, .. }) => column == name,
            _ => false,
        })
    }

    /// Adds a join.
    pub fn join(&mut self, kind: JoinKind, table: &str, alias: &str, on: SqlExpr) -> &mut Self {
        self.joins.push(Join {
            kind,
            source: FromSource::Table(table.to_string()),
            alias: alias.to_string(),
            on,
        });
        self
    }

    /// Joins a nested view and moves its parameters onto this query.
    pub fn join_view(
        &mut self,
        kind: JoinKind,
        mut view: SelectQuery,
        alias: &str,
        on: SqlExpr,
    ) -> Result<&mut Self, CompileError> {
        self.params.merge(std::mem::take(&mut view.params))?;
        self.joins.push(Join {
            kind,
            source: FromSource::Subquery(Box::new(view)),
            alias: alias.to_string(),
            on,
        });
        Ok(self)
    }

    /// Adds a WHERE term.
    pub fn and_where(&mut self, condition: SqlExpr) -> &mut Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an ORDER BY term.
    pub fn order(&mut self, expr: SqlExpr, direction: Direction) -> &mut Self {
        self.order_by.push(OrderTerm { expr, direction });
        self
    }

    /// Binds a parameter and returns an expression referencing it.
    pub fn bind(&mut self, semantic: &str, param: Param) -> Result<SqlExpr, CompileError> {
        Ok(SqlExpr::Param(self.params.bind(semantic, param)?))
    }

    /// Replaces the FROM source with `view` under the same alias and moves
    /// the view's parameters onto this query.
    pub fn replace_from(&mut self, mut view: SelectQuery) -> Result<(), CompileError> {
        let inner = std::mem::take(&mut view.params);
        self.params.merge(inner)?;
        self.from.source = FromSource::Subquery(Box::new(view));
        Ok(())
    }

    /// Renders SQL text and the driver-level parameter list.
    pub fn render(&self) -> Result<RenderedQuery, CompileError> {
        let mut renderer = Renderer::new(&self.params);
        self.write(&mut renderer)?;
        let (sql, params) = renderer.finish();
        Ok(RenderedQuery { sql, params })
    }

    fn write(&self, r: &mut Renderer<'_>) -> Result<(), CompileError> {
        r.push("SELECT ");
        if self.items.is_empty() {
            r.push("*");
        }
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                r.push(", ");
            }
            r.expr(&item.expr)?;
            if let Some(alias) = &item.alias {
                let implicit = matches!(
                    &item.expr,
                    SqlExpr::Column { column, .. } if column == alias
                );
                if !implicit {
                    r.push(" AS ");
                    r.push(&quote_ident(alias));
                }
            }
        }
        r.push(" FROM ");
        Self::write_source(&self.from.source, r)?;
        r.push(" AS ");
        r.push(&quote_ident(&self.from.alias));
        for join in &self.joins {
            r.push(match join.kind {
                JoinKind::Left => " LEFT JOIN ",
                JoinKind::Inner => " INNER JOIN ",
            });
            Self::write_source(&join.source, r)?;
            r.push(" AS ");
            r.push(&quote_ident(&join.alias));
            r.push(" ON ");
            r.expr(&join.on)?;
        }
        if !self.conditions.is_empty() {
            r.push(" WHERE ");
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    r.push(" AND ");
                }
                r.expr(condition)?;
            }
        }
        if !self.order_by.is_empty() {
            r.push(" ORDER BY ");
            for (i, term) in self.order_by.iter().enumerate() {
                if i > 0 {
                    r.push(", ");
                }
                r.expr(&term.expr)?;
                r.push(" ");
                r.push(term.direction.sql());
            }
        }
        Ok(())
    }
}

impl SelectQuery {
    fn write_source(source: &FromSource, r: &mut Renderer<'_>) -> Result<(), CompileError> {
        match source {
            FromSource::Table(table) => r.push(&quote_ident(table)),
            FromSource::Subquery(view) => {
                r.push("(");
                view.write(r)?;
                r.push(")");
            }
        }
        Ok(())
    }
}

/// Final SQL plus named driver parameters (`:name` form).
#[derive(Clone, Debug, PartialEq)]
pub struct RenderedQuery {
    /// SQL text.
    pub sql: String,
    /// Placeholder name and value, in first-use order.
    pub params: Vec<(String, rusqlite::types::Value)>,
}

impl fmt::Display for RenderedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.sql)?;
        for (name, value) in &self.params {
            let shown = match value {
                rusqlite::types::Value::Null => "NULL".to_string(),
                rusqlite::types::Value::Integer(v) => v.to_string(),
                rusqlite::types::Value::Real(v) => v.to_string(),
                rusqlite::types::Value::Text(v) => format!("'{v}'"),
                rusqlite::types::Value::Blob(v) => format!("<{} bytes>", v.len()),
            };
            writeln!(f, "  {name} = {shown}")?;
        }
        Ok(())
    }
}
