//! Minimal relational query builder.
//!
//! Identifiers are always double-quoted and values are always bound as named
//! parameters. Parameter names are derived from content, so queries built
//! independently can be nested into one statement without renaming.

mod expr;
mod params;
mod select;

pub use expr::{quote_ident, quote_text, render_expr, CompareOp, SqlExpr};
pub use params::{param_name, Param, ParamSet};
pub use select::{
    FromClause, FromSource, Join, JoinKind, OrderTerm, RenderedQuery, SelectItem, SelectQuery,
};
