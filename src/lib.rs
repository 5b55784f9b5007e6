//! Strata answers nested graph queries against a relational schema.
//!
//! Filter and order arguments written in a small expression language are
//! validated against an immutable schema, compiled to SQL predicates and sort
//! keys, and attached to batched relational queries. Relation fields are
//! resolved in two phases (collect, then resolve) so that every sibling row at
//! a tree level shares one statement per target table.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Filter/order compilation: validation, predicate compiler, order traversal.
pub mod compile;
/// Engine configuration loaded from TOML.
pub mod config;
/// Context aspects (workspace, language) and the view composer.
pub mod context;
/// Error taxonomy shared by every layer.
pub mod error;
/// Query assembly and the relational executor seam.
pub mod exec;
/// Expression AST, lexer, and parser.
pub mod expr;
/// Buffered relationship resolution.
pub mod resolve;
/// Reference execution driver walking a selection tree.
pub mod runtime;
/// Immutable schema graph and relational metadata.
pub mod schema;
/// Minimal relational query builder and renderer.
pub mod sql;
/// Values and rows flowing between the database and the resolvers.
pub mod value;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use expr::{DefaultParser, ExpressionNode, ExpressionParser};
pub use runtime::{Execution, Selection};
pub use schema::Schema;
pub use value::{Row, RowKey, Value};
