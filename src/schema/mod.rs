//! Immutable type graph and the relational metadata behind it.
//!
//! A [`Schema`] is built once from a [`SchemaDefinition`] and then shared by
//! reference (usually `Arc<Schema>`) with every compiler and resolver. Nothing
//! in it changes during a request.

mod definition;
#[cfg(test)]
pub(crate) mod fixture;

use std::collections::BTreeMap;

pub use definition::{
    FieldDefinition, MaxDefinition, SchemaDefinition, SortDefinition, StorageKind,
    TableDefinition, TypeDefinition,
};

use crate::expr::{Direction, Literal};
use crate::value::Value;

/// Built-in leaf types.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ScalarType {
    /// 64-bit integer.
    Int,
    /// 64-bit float.
    Float,
    /// Text.
    String,
    /// Boolean, stored as 0/1.
    Boolean,
}

impl ScalarType {
    /// All built-in leaf types.
    pub const ALL: [ScalarType; 4] = [
        ScalarType::Int,
        ScalarType::Float,
        ScalarType::String,
        ScalarType::Boolean,
    ];

    /// Type name as written in expressions and definitions.
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::Int => "Int",
            ScalarType::Float => "Float",
            ScalarType::String => "String",
            ScalarType::Boolean => "Boolean",
        }
    }

    /// Looks up a built-in leaf type by name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// Whether a non-null literal can be compared with a field of this type.
    pub fn accepts(self, literal: &Literal) -> bool {
        matches!(
            (self, literal),
            (ScalarType::Int, Literal::Int(_))
                | (ScalarType::Float, Literal::Int(_) | Literal::Float(_))
                | (ScalarType::String, Literal::String(_))
                | (ScalarType::Boolean, Literal::Bool(_))
        )
    }
}

/// Cardinality bounds of a relation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Multiplicity {
    /// Minimum number of related rows.
    pub min: u32,
    /// Maximum number of related rows; `None` is unbounded.
    pub max: Option<u32>,
}

impl Multiplicity {
    /// `{min: 0, max: 1}`
    pub const OPTIONAL: Multiplicity = Multiplicity { min: 0, max: Some(1) };
    /// `{min: 1, max: 1}`
    pub const REQUIRED: Multiplicity = Multiplicity { min: 1, max: Some(1) };
    /// `{min: 0, max: many}`
    pub const MANY: Multiplicity = Multiplicity { min: 0, max: None };

    /// More than one related row is allowed, so results are lists.
    pub fn is_list(&self) -> bool {
        self.max.map_or(true, |max| max > 1)
    }

    /// The relation never resolves to null.
    pub fn is_non_null(&self) -> bool {
        self.min > 0
    }

    /// Shapes ordered candidates into the field value.
    ///
    /// Empty: `[]` when `min > 0` or `max > 1`, else null. Non-empty: the list
    /// when `max > 1`, else the first candidate.
    pub fn shape(&self, mut candidates: Vec<Value>) -> Value {
        if candidates.is_empty() {
            if self.is_non_null() || self.is_list() {
                Value::List(Vec::new())
            } else {
                Value::Null
            }
        } else if self.is_list() {
            Value::List(candidates)
        } else {
            candidates.swap_remove(0)
        }
    }
}

/// One column of a table's default ordering.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SortColumn {
    /// Column name.
    pub column: String,
    /// Direction.
    pub direction: Direction,
}

/// Columns driving the workspace overlay of a versioned table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersioningColumns {
    /// Points from an overlay row to the live row it shadows.
    pub origin: String,
    /// Workspace id (0 = live).
    pub workspace: String,
    /// Version state.
    pub state: String,
    /// Columns a move pointer may change (parent and ordering columns).
    pub position: Vec<String>,
}

/// Columns driving the language overlay of a localized table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LocalizationColumns {
    /// Language id.
    pub language: String,
    /// Points from a translation to its default-language row.
    pub source: String,
}

/// Relational metadata for one table.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TableMeta {
    /// Table name.
    pub name: String,
    /// Primary identity column.
    pub identity: String,
    /// Every column of the table.
    pub columns: Vec<String>,
    /// Ordering used when a query has no order argument.
    pub default_sort: Vec<SortColumn>,
    /// Present when the table takes part in workspace versioning.
    pub versioning: Option<VersioningColumns>,
    /// Present when the table stores translations.
    pub localization: Option<LocalizationColumns>,
}

impl TableMeta {
    /// Whether `column` is declared on this table.
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Columns every view must carry so outer layers can keep working:
    /// identity plus the versioning and localization columns.
    pub fn system_columns(&self) -> Vec<&str> {
        let mut out = vec![self.identity.as_str()];
        if let Some(v) = &self.versioning {
            out.extend([v.origin.as_str(), v.workspace.as_str(), v.state.as_str()]);
            out.extend(v.position.iter().map(String::as_str));
        }
        if let Some(l) = &self.localization {
            out.extend([l.language.as_str(), l.source.as_str()]);
        }
        out.dedup();
        out
    }
}

/// Static equality a relation always applies to its target rows.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchField {
    /// Target column.
    pub column: String,
    /// Required value.
    pub value: Value,
}

/// How a relation's keys are stored.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RelationStorage {
    /// Target rows carry the parent identity in `column`.
    ForeignKey {
        /// Column on the target table.
        column: String,
    },
    /// The source row stores a comma-separated `table_identifier` list.
    Inline {
        /// Column on the source table.
        column: String,
    },
    /// Target rows link two parents; either endpoint matches.
    Symmetric {
        /// First endpoint column on the target table.
        column: String,
        /// Second endpoint column on the target table.
        mirror: String,
    },
}

/// Relation field metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct RelationMeta {
    /// Cardinality bounds.
    pub multiplicity: Multiplicity,
    /// Target object type names; more than one makes the relation heterogeneous.
    pub targets: Vec<String>,
    /// Key storage shape.
    pub storage: RelationStorage,
    /// Static equality constraints on target rows.
    pub match_fields: Vec<MatchField>,
}

impl RelationMeta {
    /// Targets span more than one type.
    pub fn is_heterogeneous(&self) -> bool {
        self.targets.len() > 1
    }

    /// Declared target types joined for diagnostics.
    pub fn target_names(&self) -> String {
        self.targets.join("|")
    }
}

/// What a field resolves to.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// Leaf value read from a column.
    Scalar {
        /// Leaf type.
        ty: ScalarType,
        /// Backing column.
        column: String,
    },
    /// Related rows.
    Relation(RelationMeta),
}

/// A field of an object type.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Field name.
    pub name: String,
    /// Leaf or relation.
    pub kind: FieldKind,
}

impl FieldDef {
    /// Backing column of a scalar field.
    pub fn column(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Scalar { column, .. } => Some(column),
            FieldKind::Relation(_) => None,
        }
    }

    /// Leaf type of a scalar field.
    pub fn scalar(&self) -> Option<ScalarType> {
        match &self.kind {
            FieldKind::Scalar { ty, .. } => Some(*ty),
            FieldKind::Relation(_) => None,
        }
    }

    /// Type name for diagnostics.
    pub fn type_name(&self) -> String {
        match &self.kind {
            FieldKind::Scalar { ty, .. } => ty.name().to_string(),
            FieldKind::Relation(rel) => rel.target_names(),
        }
    }
}

/// Concrete type backed by one table.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectType {
    /// Type name.
    pub name: String,
    /// Backing table.
    pub table: String,
    /// Fields by name.
    pub fields: BTreeMap<String, FieldDef>,
    /// Interfaces the type implements.
    pub interfaces: Vec<String>,
}

impl ObjectType {
    /// Field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.get(name)
    }
}

/// Abstract type; never the target of a constraint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterfaceType {
    /// Type name.
    pub name: String,
    /// Object types implementing the interface.
    pub implementors: Vec<String>,
}

/// Any named type.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeDef {
    /// Built-in leaf.
    Scalar(ScalarType),
    /// Concrete, table-backed.
    Object(ObjectType),
    /// Abstract.
    Interface(InterfaceType),
}

/// Immutable type graph plus table metadata.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Schema {
    types: BTreeMap<String, TypeDef>,
    tables: BTreeMap<String, TableMeta>,
}

impl Schema {
    /// Any type by name.
    pub fn type_def(&self, name: &str) -> Option<&TypeDef> {
        self.types.get(name)
    }

    /// Object type by name.
    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(TypeDef::Object(obj)) => Some(obj),
            _ => None,
        }
    }

    /// Table metadata by table name.
    pub fn table(&self, name: &str) -> Option<&TableMeta> {
        self.tables.get(name)
    }

    /// Table backing an object type.
    pub fn table_for_type(&self, type_name: &str) -> Option<&TableMeta> {
        self.object(type_name).and_then(|obj| self.tables.get(&obj.table))
    }

    /// Object type backed by `table`.
    pub fn object_for_table(&self, table: &str) -> Option<&ObjectType> {
        self.types.values().find_map(|ty| match ty {
            TypeDef::Object(obj) if obj.table == table => Some(obj),
            _ => None,
        })
    }

    /// All object types, ordered by name.
    pub fn objects(&self) -> impl Iterator<Item = &ObjectType> {
        self.types.values().filter_map(|ty| match ty {
            TypeDef::Object(obj) => Some(obj),
            _ => None,
        })
    }

    /// All tables, ordered by name.
    pub fn tables(&self) -> impl Iterator<Item = &TableMeta> {
        self.tables.values()
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
