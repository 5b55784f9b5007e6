//! Buffered relationship resolution.
//!
//! Relation fields resolve in two phases. The runtime first calls `collect`
//! for every sibling row at a tree level, which only records keys in the
//! field's buffer. The first `resolve` then flushes the buffer with one
//! statement per target table, and every later `resolve` at the same field
//! path is a lookup into the resolved buffer.
//!
//! Buffers live in a [`RequestCache`] keyed by [`FieldPathId`], so state is
//! addressed by where the field sits in the selection tree rather than by
//! resolver identity, and is dropped with the request.

mod buffer;
mod cache;
mod column;
pub mod dispatch;
mod entity;
mod keys;
mod relation;
mod sort;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::context::{AspectContext, ColumnSet};
use crate::error::{Error, ValidationError};
use crate::exec::{QueryAssembler, QueryExecutor};
use crate::expr::{ExpressionNode, ExpressionParser};
use crate::schema::Schema;
use crate::value::{Row, Value};

pub use buffer::{KeySet, ResolvedBuffer, ResolverBuffer};
pub use cache::RequestCache;
pub use column::ColumnResolver;
pub use dispatch::{resolver_for, root_resolver};
pub use entity::EntityResolver;
pub use keys::parse_inline_keys;
pub use relation::{KeyStrategy, RelationResolver};
pub use sort::post_fetch_sort;

/// Stable position of a field in the selection tree, e.g. `pages.contents`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldPathId(String);

impl FieldPathId {
    /// Path of a root field.
    pub fn root(field: &str) -> Self {
        Self(field.to_string())
    }

    /// Path of `field` below this one.
    pub fn child(&self, field: &str) -> Self {
        Self(format!("{}.{field}", self.0))
    }

    /// Dotted form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Type of a declared argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgumentType {
    /// Filter expression text.
    Filter,
    /// Order expression text.
    Order,
}

/// Argument a field accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArgumentDef {
    /// Argument name.
    pub name: &'static str,
    /// What the text parses to.
    pub ty: ArgumentType,
}

/// Arguments accepted by relation and root fields.
pub const QUERY_ARGUMENTS: &[ArgumentDef] = &[
    ArgumentDef {
        name: "filter",
        ty: ArgumentType::Filter,
    },
    ArgumentDef {
        name: "order",
        ty: ArgumentType::Order,
    },
];

/// Parsed arguments of one field invocation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Arguments {
    /// Parsed `filter` argument.
    pub filter: Option<ExpressionNode>,
    /// Parsed `order` argument.
    pub order: Option<ExpressionNode>,
}

impl Arguments {
    /// Parses raw string arguments against the field's declared arguments.
    pub fn parse(
        field: &str,
        defs: &[ArgumentDef],
        raw: &BTreeMap<String, String>,
        parser: &dyn ExpressionParser,
    ) -> Result<Self, Error> {
        let mut args = Arguments::default();
        for (name, text) in raw {
            let def = defs
                .iter()
                .find(|d| d.name == name)
                .ok_or_else(|| ValidationError::UnknownArgument {
                    name: name.clone(),
                    field: field.to_string(),
                })?;
            match def.ty {
                ArgumentType::Filter => args.filter = parser.parse_filter(text)?,
                ArgumentType::Order => args.order = parser.parse_order(text)?,
            }
        }
        Ok(args)
    }
}

/// What the runtime knows about the field being resolved.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldInfo {
    /// Requested field name.
    pub field_name: String,
    /// Buffer handle.
    pub path: FieldPathId,
    /// Scalar columns the selection reads from produced rows.
    pub columns: ColumnSet,
}

impl FieldInfo {
    /// Info for `field_name` at `path`.
    pub fn new(field_name: &str, path: FieldPathId, columns: ColumnSet) -> Self {
        Self {
            field_name: field_name.to_string(),
            path,
            columns,
        }
    }
}

/// Request-scoped state handed to every resolver call.
pub struct ResolveContext<'a> {
    /// Immutable schema.
    pub schema: &'a Schema,
    /// Engine configuration.
    pub config: &'a EngineConfig,
    /// Active aspects.
    pub aspects: &'a AspectContext,
    /// Per-request buffer store.
    pub cache: RequestCache,
    /// Statement executor.
    pub executor: &'a dyn QueryExecutor,
    /// Set to abort before the next statement.
    pub cancel: Option<Arc<AtomicBool>>,
}

impl<'a> ResolveContext<'a> {
    /// Fresh context with an empty cache.
    pub fn new(
        schema: &'a Schema,
        config: &'a EngineConfig,
        aspects: &'a AspectContext,
        executor: &'a dyn QueryExecutor,
    ) -> Self {
        Self {
            schema,
            config,
            aspects,
            cache: RequestCache::new(),
            executor,
            cancel: None,
        }
    }

    /// Attaches a cancel token.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Statement builder for this request.
    pub fn assembler(&self) -> QueryAssembler<'a> {
        QueryAssembler::new(self.schema, self.config, self.aspects)
    }

    /// Fails with [`Error::Cancelled`] once the token is set.
    pub fn check_cancel(&self) -> Result<(), Error> {
        if let Some(flag) = &self.cancel {
            if flag.load(Ordering::SeqCst) {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }
}

/// Field resolver protocol driven by the runtime.
pub trait FieldResolver: Send + Sync {
    /// Field this resolver was built for.
    fn field_name(&self) -> &str;

    /// Declared arguments.
    fn arguments(&self) -> &'static [ArgumentDef];

    /// Records what `source` will need. `None` marks the root invocation.
    fn collect(
        &self,
        source: Option<&Row>,
        args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<(), Error>;

    /// Produces the field value for `source`.
    fn resolve(
        &self,
        source: Option<&Row>,
        args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<Value, Error>;
}

pub(crate) fn check_field(expected: &str, info: &FieldInfo) -> Result<(), Error> {
    if expected != info.field_name {
        return Err(crate::error::ResolverError::FieldMismatch {
            expected: expected.to_string(),
            found: info.field_name.clone(),
        }
        .into());
    }
    Ok(())
}
