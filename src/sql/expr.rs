use std::fmt::Write as _;

use rustc_hash::FxHashSet;

use super::params::ParamSet;
use crate::error::CompileError;

/// Binary comparison operator in SQL.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `<>`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
}

impl CompareOp {
    fn sql(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
        }
    }
}

/// Relational expression tree.
#[derive(Clone, Debug, PartialEq)]
pub enum SqlExpr {
    /// Column reference, optionally qualified by a table alias.
    Column {
        /// Table alias.
        table: Option<String>,
        /// Column name.
        column: String,
    },
    /// Named parameter; list parameters expand to one placeholder per item.
    Param(String),
    /// Integer constant.
    Integer(i64),
    /// Text constant.
    Text(String),
    /// `TRUE` / `FALSE`.
    Const(bool),
    /// `left op right`
    Compare {
        /// Operator.
        op: CompareOp,
        /// Left side.
        left: Box<SqlExpr>,
        /// Right side.
        right: Box<SqlExpr>,
    },
    /// `expr [NOT] IN (items...)`
    InList {
        /// Tested expression.
        expr: Box<SqlExpr>,
        /// Candidate values.
        items: Vec<SqlExpr>,
        /// `NOT IN`.
        negated: bool,
    },
    /// `expr IS [NOT] NULL`
    IsNull {
        /// Tested expression.
        expr: Box<SqlExpr>,
        /// `IS NOT NULL`.
        negated: bool,
    },
    /// Conjunction; empty is `TRUE`.
    And(Vec<SqlExpr>),
    /// Disjunction; empty is `FALSE`.
    Or(Vec<SqlExpr>),
    /// `NOT (expr)`
    Not(Box<SqlExpr>),
    /// `COALESCE(a, b, ...)`
    Coalesce(Vec<SqlExpr>),
    /// `CASE WHEN cond THEN then ELSE otherwise END`
    Case {
        /// Condition.
        when: Box<SqlExpr>,
        /// Value when the condition holds.
        then: Box<SqlExpr>,
        /// Value otherwise.
        otherwise: Box<SqlExpr>,
    },
}

impl SqlExpr {
    /// `alias.column`
    pub fn column(table: &str, column: &str) -> Self {
        SqlExpr::Column {
            table: Some(table.to_string()),
            column: column.to_string(),
        }
    }

    /// Unqualified column.
    pub fn bare(column: &str) -> Self {
        SqlExpr::Column {
            table: None,
            column: column.to_string(),
        }
    }

    /// `left op right`
    pub fn compare(op: CompareOp, left: SqlExpr, right: SqlExpr) -> Self {
        SqlExpr::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left = right`
    pub fn eq(left: SqlExpr, right: SqlExpr) -> Self {
        Self::compare(CompareOp::Eq, left, right)
    }

    /// `expr IN (items)`
    pub fn in_list(expr: SqlExpr, items: Vec<SqlExpr>) -> Self {
        SqlExpr::InList {
            expr: Box::new(expr),
            items,
            negated: false,
        }
    }

    /// `expr IS NULL`
    pub fn is_null(expr: SqlExpr) -> Self {
        SqlExpr::IsNull {
            expr: Box::new(expr),
            negated: false,
        }
    }

    /// `expr IS NOT NULL`
    pub fn is_not_null(expr: SqlExpr) -> Self {
        SqlExpr::IsNull {
            expr: Box::new(expr),
            negated: true,
        }
    }

    /// `CASE WHEN when THEN then ELSE otherwise END`
    pub fn case(when: SqlExpr, then: SqlExpr, otherwise: SqlExpr) -> Self {
        SqlExpr::Case {
            when: Box::new(when),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    /// Collects the columns referenced through `alias`.
    pub fn columns_of<'e>(&'e self, alias: &str, out: &mut Vec<&'e str>) {
        match self {
            SqlExpr::Column {
                table: Some(table),
                column,
            } if table == alias => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            SqlExpr::Column { .. }
            | SqlExpr::Param(_)
            | SqlExpr::Integer(_)
            | SqlExpr::Text(_)
            | SqlExpr::Const(_) => {}
            SqlExpr::Compare { left, right, .. } => {
                left.columns_of(alias, out);
                right.columns_of(alias, out);
            }
            SqlExpr::InList { expr, items, .. } => {
                expr.columns_of(alias, out);
                items.iter().for_each(|item| item.columns_of(alias, out));
            }
            SqlExpr::IsNull { expr, .. } | SqlExpr::Not(expr) => expr.columns_of(alias, out),
            SqlExpr::And(items) | SqlExpr::Or(items) | SqlExpr::Coalesce(items) => {
                items.iter().for_each(|item| item.columns_of(alias, out));
            }
            SqlExpr::Case {
                when,
                then,
                otherwise,
            } => {
                when.columns_of(alias, out);
                then.columns_of(alias, out);
                otherwise.columns_of(alias, out);
            }
        }
    }
}

/// Double-quotes an identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quotes a text constant.
pub fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

/// Writes SQL text and records which parameters it references.
pub(crate) struct Renderer<'p> {
    pub(crate) out: String,
    params: &'p ParamSet,
    bound: Vec<(String, rusqlite::types::Value)>,
    seen: FxHashSet<String>,
}

impl<'p> Renderer<'p> {
    pub(crate) fn new(params: &'p ParamSet) -> Self {
        Self {
            out: String::new(),
            params,
            bound: Vec::new(),
            seen: FxHashSet::default(),
        }
    }

    pub(crate) fn finish(self) -> (String, Vec<(String, rusqlite::types::Value)>) {
        (self.out, self.bound)
    }

    pub(crate) fn push(&mut self, text: &str) {
        self.out.push_str(text);
    }

    /// Placeholders for `name`, one per item for list parameters.
    fn placeholders(&mut self, name: &str) -> Result<Vec<String>, CompileError> {
        let param = self
            .params
            .get(name)
            .ok_or_else(|| CompileError::UnboundParam {
                name: name.to_string(),
            })?;
        let values = param.sql_values();
        let names: Vec<String> = if param.is_list() {
            (0..values.len()).map(|i| format!(":{name}_{i}")).collect()
        } else {
            vec![format!(":{name}")]
        };
        if self.seen.insert(name.to_string()) {
            self.bound.extend(names.iter().cloned().zip(values));
        }
        Ok(names)
    }

    pub(crate) fn expr(&mut self, expr: &SqlExpr) -> Result<(), CompileError> {
        match expr {
            SqlExpr::Column { table, column } => {
                if let Some(table) = table {
                    self.out.push_str(&quote_ident(table));
                    self.out.push('.');
                }
                self.out.push_str(&quote_ident(column));
            }
            SqlExpr::Param(name) => {
                let names = self.placeholders(name)?;
                self.out.push_str(&names.join(", "));
            }
            SqlExpr::Integer(v) => {
                let _ = write!(self.out, "{v}");
            }
            SqlExpr::Text(v) => self.out.push_str(&quote_text(v)),
            SqlExpr::Const(true) => self.out.push_str("TRUE"),
            SqlExpr::Const(false) => self.out.push_str("FALSE"),
            SqlExpr::Compare { op, left, right } => {
                self.expr(left)?;
                self.out.push(' ');
                self.out.push_str(op.sql());
                self.out.push(' ');
                self.expr(right)?;
            }
            SqlExpr::InList {
                expr,
                items,
                negated,
            } => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        SqlExpr::Param(name) => rendered.extend(self.placeholders(name)?),
                        other => {
                            let saved = std::mem::take(&mut self.out);
                            self.expr(other)?;
                            rendered.push(std::mem::replace(&mut self.out, saved));
                        }
                    }
                }
                if rendered.is_empty() {
                    // `x IN ()` is not valid SQL; an empty set matches nothing.
                    self.out.push_str(if *negated { "TRUE" } else { "FALSE" });
                    return Ok(());
                }
                self.expr(expr)?;
                self.out
                    .push_str(if *negated { " NOT IN (" } else { " IN (" });
                self.out.push_str(&rendered.join(", "));
                self.out.push(')');
            }
            SqlExpr::IsNull { expr, negated } => {
                self.expr(expr)?;
                self.out
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            SqlExpr::And(items) => self.junction(items, " AND ", "TRUE")?,
            SqlExpr::Or(items) => self.junction(items, " OR ", "FALSE")?,
            SqlExpr::Not(inner) => {
                self.out.push_str("NOT (");
                self.expr(inner)?;
                self.out.push(')');
            }
            SqlExpr::Coalesce(items) => {
                self.out.push_str("COALESCE(");
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(", ");
                    }
                    self.expr(item)?;
                }
                self.out.push(')');
            }
            SqlExpr::Case {
                when,
                then,
                otherwise,
            } => {
                self.out.push_str("CASE WHEN ");
                self.expr(when)?;
                self.out.push_str(" THEN ");
                self.expr(then)?;
                self.out.push_str(" ELSE ");
                self.expr(otherwise)?;
                self.out.push_str(" END");
            }
        }
        Ok(())
    }

    fn junction(
        &mut self,
        items: &[SqlExpr],
        sep: &str,
        empty: &str,
    ) -> Result<(), CompileError> {
        match items {
            [] => self.out.push_str(empty),
            [only] => self.expr(only)?,
            _ => {
                self.out.push('(');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        self.out.push_str(sep);
                    }
                    self.expr(item)?;
                }
                self.out.push(')');
            }
        }
        Ok(())
    }
}

/// Renders a standalone expression; used for diagnostics and tests.
pub fn render_expr(
    expr: &SqlExpr,
    params: &ParamSet,
) -> Result<(String, Vec<(String, rusqlite::types::Value)>), CompileError> {
    let mut renderer = Renderer::new(params);
    renderer.expr(expr)?;
    Ok(renderer.finish())
}
