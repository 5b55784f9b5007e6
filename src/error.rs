//! Error taxonomy.
//!
//! Four categories surface to callers: syntax errors from the expression
//! parser, validation errors for well-formed expressions that reference
//! unknown or incompatible schema elements, compiler errors for expression
//! shapes the compiler does not understand, and resolver contract violations.
//! The first two are user-facing; compiler and resolver errors fail the whole
//! request.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed expression text.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("syntax error at offset {offset}: {message}")]
pub struct SyntaxError {
    /// Byte offset of the offending token in the source text.
    pub offset: usize,
    /// Human-readable description.
    pub message: String,
}

impl SyntaxError {
    pub(crate) fn new(offset: usize, message: impl Into<String>) -> Self {
        Self {
            offset,
            message: message.into(),
        }
    }
}

/// Well-formed expressions that reference unknown or incompatible schema elements.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Constraint names a type the schema does not know.
    #[error("unknown type '{name}'")]
    UnknownType { name: String },
    /// Constraint names a leaf (scalar) type.
    #[error("leaf type '{name}' not supported in constraint")]
    LeafTypeConstraint { name: String },
    /// Constraint names an abstract (interface) type.
    #[error("abstract type '{name}' not supported in constraint")]
    AbstractTypeConstraint { name: String },
    /// Field is not declared by any candidate type.
    #[error("unknown field '{field}' on {types}")]
    UnknownField { field: String, types: String },
    /// Multi-segment field path.
    #[error("nested field '{path}' not supported")]
    NestedFieldNotSupported { path: String },
    /// Order item references a composite field.
    #[error("field '{field}' of type '{ty}' cannot be ordered; only scalar fields are orderable")]
    FieldNotOrderable { field: String, ty: String },
    /// Filter references a composite field.
    #[error("field '{field}' of type '{ty}' cannot be filtered; only scalar fields are filterable")]
    FieldNotFilterable { field: String, ty: String },
    /// Constraint type is not among the types the field can produce.
    #[error("type '{name}' is out of scope; expected one of {expected}")]
    ConstraintOutOfScope { name: String, expected: String },
    /// Literal operand does not match the field's scalar type.
    #[error("field '{field}' of type '{expected}' cannot be compared with {found} literal")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },
    /// Null literal used where only `=`/`!=` accept it.
    #[error("{context} does not accept null literals")]
    NullNotAllowed { context: &'static str },
    /// `in` with an empty list.
    #[error("in requires at least one literal")]
    InListEmpty,
    /// `in` list exceeds the configured limit.
    #[error("in list exceeds maximum of {max} literals (got {count})")]
    InListTooLarge { count: usize, max: usize },
    /// Expression nesting exceeds the configured limit.
    #[error("expression exceeds depth {max} (got {depth})")]
    PredicateTooDeep { depth: usize, max: usize },
    /// Order expression lists too many items.
    #[error("order exceeds {max} items (got {count})")]
    TooManyOrderItems { count: usize, max: usize },
    /// Expression node in a position where it has no meaning.
    #[error("unexpected {found} in {context}")]
    UnexpectedExpression {
        found: &'static str,
        context: &'static str,
    },
    /// Field does not declare the argument.
    #[error("field '{field}' has no argument '{name}'")]
    UnknownArgument { name: String, field: String },
    /// Field or entity does not exist on the requested type.
    #[error("type '{ty}' has no field '{field}'")]
    UnknownSelection { field: String, ty: String },
}

impl ValidationError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::UnknownType { .. } => "UnknownType",
            ValidationError::LeafTypeConstraint { .. } => "LeafTypeConstraint",
            ValidationError::AbstractTypeConstraint { .. } => "AbstractTypeConstraint",
            ValidationError::UnknownField { .. } => "UnknownField",
            ValidationError::NestedFieldNotSupported { .. } => "NestedFieldNotSupported",
            ValidationError::FieldNotOrderable { .. } => "FieldNotOrderable",
            ValidationError::FieldNotFilterable { .. } => "FieldNotFilterable",
            ValidationError::ConstraintOutOfScope { .. } => "ConstraintOutOfScope",
            ValidationError::TypeMismatch { .. } => "TypeMismatch",
            ValidationError::NullNotAllowed { .. } => "NullNotAllowed",
            ValidationError::InListEmpty => "InListEmpty",
            ValidationError::InListTooLarge { .. } => "InListTooLarge",
            ValidationError::PredicateTooDeep { .. } => "PredicateTooDeep",
            ValidationError::TooManyOrderItems { .. } => "TooManyOrderItems",
            ValidationError::UnexpectedExpression { .. } => "UnexpectedExpression",
            ValidationError::UnknownArgument { .. } => "UnknownArgument",
            ValidationError::UnknownSelection { .. } => "UnknownSelection",
        }
    }
}

/// Expression shapes the compiler cannot lower. Indicates parser/compiler skew.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Node kind has no predicate meaning in this position.
    #[error("{kind} node is not supported in {context}")]
    UnsupportedNode {
        kind: &'static str,
        context: &'static str,
    },
    /// Comparison operands do not form a column/value pair.
    #[error("invalid comparison operands: {0}")]
    InvalidOperand(&'static str),
    /// Two different values were bound under one parameter name.
    #[error("parameter '{name}' bound twice with different values")]
    ParamConflict { name: String },
    /// Rendered SQL references a parameter that was never bound.
    #[error("parameter '{name}' referenced but never bound")]
    UnboundParam { name: String },
}

impl CompileError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::UnsupportedNode { .. } => "UnsupportedNode",
            CompileError::InvalidOperand(_) => "InvalidOperand",
            CompileError::ParamConflict { .. } => "ParamConflict",
            CompileError::UnboundParam { .. } => "UnboundParam",
        }
    }
}

/// Broken resolver contract. Always fatal for the request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Resolver invoked for a field it was not built for.
    #[error("resolver for '{expected}' invoked for field '{found}'")]
    FieldMismatch { expected: String, found: String },
    /// Fetched row lacks a column the batched query must return.
    #[error("row from '{table}' is missing column '{column}'")]
    MissingColumn { table: String, column: String },
    /// Key value cannot identify a row.
    #[error("malformed key '{value}': {reason}")]
    MalformedKey { value: String, reason: &'static str },
    /// Buffer is in a state the protocol does not allow for this call.
    #[error("buffer '{handle}' {detail}")]
    BufferState { handle: String, detail: &'static str },
}

impl ResolverError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ResolverError::FieldMismatch { .. } => "FieldMismatch",
            ResolverError::MissingColumn { .. } => "MissingColumn",
            ResolverError::MalformedKey { .. } => "MalformedKey",
            ResolverError::BufferState { .. } => "BufferState",
        }
    }
}

/// Problems in a schema definition, detected by the build step.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// Identifier is not `[A-Za-z_][A-Za-z0-9_]*`.
    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),
    /// Reference to a table that is not defined.
    #[error("unknown table '{0}'")]
    UnknownTable(String),
    /// Reference to a type that is not defined.
    #[error("unknown type '{0}'")]
    UnknownType(String),
    /// Type must be an object type in this position.
    #[error("type '{0}' is not an object type")]
    NotAnObject(String),
    /// Two definitions share a name.
    #[error("duplicate definition '{0}'")]
    Duplicate(String),
    /// Column referenced by metadata is not declared on its table.
    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },
    /// Sort direction token is not `asc`/`ascending`/`desc`/`descending`.
    #[error("table '{table}' has invalid sort direction '{direction}'")]
    InvalidDirection { table: String, direction: String },
    /// Field is neither scalar nor relation, or both.
    #[error("field '{owner}.{field}': {reason}")]
    InvalidField {
        owner: String,
        field: String,
        reason: &'static str,
    },
}

/// Failures while loading configuration or schema documents.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// File is not valid TOML for the expected structure.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// In-memory document is not valid TOML for the expected structure.
    #[error("failed to parse config: {0}")]
    ParseStr(#[from] toml::de::Error),
    /// Value is syntactically valid but semantically rejected.
    #[error("invalid config value for '{key}': {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Umbrella error for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Expression text could not be parsed.
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    /// Expression references unknown or incompatible schema elements.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Expression could not be lowered to SQL.
    #[error(transparent)]
    Compile(#[from] CompileError),
    /// Resolver protocol was violated.
    #[error(transparent)]
    Resolver(#[from] ResolverError),
    /// Schema definition is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The relational layer failed.
    #[error("database: {0}")]
    Sql(#[from] rusqlite::Error),
    /// A batched fetch was cancelled before it completed.
    #[error("batched fetch cancelled")]
    Cancelled,
}

impl Error {
    /// Returns a machine-readable code for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Syntax(_) => "SyntaxError",
            Error::Validation(err) => err.code(),
            Error::Compile(err) => err.code(),
            Error::Resolver(err) => err.code(),
            Error::Schema(_) => "SchemaError",
            Error::Config(_) => "ConfigError",
            Error::Sql(_) => "DatabaseError",
            Error::Cancelled => "Cancelled",
        }
    }

    /// Syntax and validation errors are safe to show to the client verbatim.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Syntax(_) | Error::Validation(_))
    }

    /// Fatal errors abort the request and are never retried automatically.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Compile(_) | Error::Resolver(_))
    }
}

/// Formats an error with its machine-readable code as a prefix.
pub struct ErrorWithCode<'a>(pub &'a Error);

impl fmt::Display for ErrorWithCode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.0.code(), self.0)
    }
}
