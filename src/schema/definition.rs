//! Serde form of a schema and the build step that validates it.
//!
//! ```toml
//! interfaces = ["Record"]
//!
//! [tables.pages]
//! identity = "uid"
//! columns = ["uid", "pid", "title", "sorting"]
//! default_sort = [{ column = "sorting" }]
//! versioning = {}
//! localization = {}
//!
//! [types.Page]
//! table = "pages"
//! implements = ["Record"]
//!
//! [types.Page.fields]
//! uid = { scalar = "Int" }
//! title = { scalar = "String" }
//! contents = { relation = ["Content"], column = "pid", max = "many" }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{
    is_identifier, FieldDef, FieldKind, InterfaceType, LocalizationColumns, MatchField,
    Multiplicity, ObjectType, RelationMeta, RelationStorage, ScalarType, Schema, SortColumn,
    TableMeta, TypeDef, VersioningColumns,
};
use crate::config::EngineConfig;
use crate::error::{ConfigError, Error, SchemaError};
use crate::expr::Direction;
use crate::value::Value;

/// Root of a schema document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchemaDefinition {
    /// Abstract type names.
    pub interfaces: Vec<String>,
    /// Tables by name.
    pub tables: BTreeMap<String, TableDefinition>,
    /// Object types by name.
    pub types: BTreeMap<String, TypeDefinition>,
}

/// One table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableDefinition {
    /// Identity column, `uid` unless given.
    #[serde(default = "default_identity")]
    pub identity: String,
    /// Every column.
    pub columns: Vec<String>,
    /// Default ordering.
    #[serde(default)]
    pub default_sort: Vec<SortDefinition>,
    /// Present for versioned tables; unset names fall back to the engine config.
    #[serde(default)]
    pub versioning: Option<VersioningDefinition>,
    /// Present for localized tables; unset names fall back to the engine config.
    #[serde(default)]
    pub localization: Option<LocalizationDefinition>,
}

fn default_identity() -> String {
    "uid".to_string()
}

/// One default sort column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortDefinition {
    /// Column name.
    pub column: String,
    /// `asc`/`ascending`/`desc`/`descending`; ascending when absent.
    #[serde(default)]
    pub direction: Option<String>,
}

/// Versioning column overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VersioningDefinition {
    /// Origin column.
    pub origin: Option<String>,
    /// Workspace column.
    pub workspace: Option<String>,
    /// State column.
    pub state: Option<String>,
    /// Columns changed by move pointers; defaults to the default sort columns.
    pub position: Option<Vec<String>>,
}

/// Localization column overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizationDefinition {
    /// Language column.
    pub language: Option<String>,
    /// Translation source column.
    pub source: Option<String>,
}

/// One object type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDefinition {
    /// Backing table.
    pub table: String,
    /// Implemented interfaces.
    #[serde(default)]
    pub implements: Vec<String>,
    /// Fields by name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDefinition>,
}

/// Relation key storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    /// Foreign key on the target table.
    #[default]
    ForeignKey,
    /// Comma-separated key list on the source row.
    Inline,
    /// Two endpoint columns on the target table.
    Symmetric,
}

/// Upper cardinality bound: a number or `"many"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxDefinition {
    /// Bounded.
    Count(u32),
    /// Must be `"many"`.
    Word(String),
}

/// One field: either `scalar` or `relation` must be set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FieldDefinition {
    /// Leaf type name.
    pub scalar: Option<String>,
    /// Target types (object or interface names).
    pub relation: Option<Vec<String>>,
    /// Backing column for scalars (defaults to the field name); key column
    /// for relations.
    pub column: Option<String>,
    /// Second endpoint for symmetric relations.
    pub mirror: Option<String>,
    /// Relation key storage.
    pub storage: StorageKind,
    /// Lower cardinality bound.
    pub min: u32,
    /// Upper cardinality bound; 1 when absent.
    pub max: Option<MaxDefinition>,
    /// Static equality constraints on target rows.
    #[serde(rename = "match")]
    pub match_fields: BTreeMap<String, Value>,
}

impl SchemaDefinition {
    /// Parses a schema document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Reads a schema document from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Schema {
    /// Parses and builds a schema document.
    pub fn from_toml_str(contents: &str, config: &EngineConfig) -> Result<Arc<Schema>, Error> {
        let def = SchemaDefinition::from_toml_str(contents)?;
        Ok(Schema::build(&def, config)?)
    }

    /// Reads and builds a schema document.
    pub fn load(path: &Path, config: &EngineConfig) -> Result<Arc<Schema>, Error> {
        let def = SchemaDefinition::load(path)?;
        Ok(Schema::build(&def, config)?)
    }

    /// Validates a definition and freezes it into an immutable schema.
    pub fn build(
        def: &SchemaDefinition,
        config: &EngineConfig,
    ) -> Result<Arc<Schema>, SchemaError> {
        let mut tables = BTreeMap::new();
        for (name, table) in &def.tables {
            tables.insert(name.clone(), build_table(name, table, config)?);
        }

        let mut types: BTreeMap<String, TypeDef> = ScalarType::ALL
            .into_iter()
            .map(|ty| (ty.name().to_string(), TypeDef::Scalar(ty)))
            .collect();

        let mut implementors: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for name in &def.interfaces {
            check_identifier(name)?;
            if types.contains_key(name) || def.types.contains_key(name) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
            implementors.insert(name.as_str(), Vec::new());
        }
        for (name, ty) in &def.types {
            check_identifier(name)?;
            if types.contains_key(name) {
                return Err(SchemaError::Duplicate(name.clone()));
            }
            if !tables.contains_key(&ty.table) {
                return Err(SchemaError::UnknownTable(ty.table.clone()));
            }
            for iface in &ty.implements {
                match implementors.get_mut(iface.as_str()) {
                    Some(list) => list.push(name.clone()),
                    None => return Err(SchemaError::UnknownType(iface.clone())),
                }
            }
        }
        let mut seen_tables = BTreeSet::new();
        for ty in def.types.values() {
            if !seen_tables.insert(ty.table.as_str()) {
                return Err(SchemaError::Duplicate(ty.table.clone()));
            }
        }

        for (name, ty) in &def.types {
            let own_table = &tables[&ty.table];
            let mut fields = BTreeMap::new();
            for (field_name, field) in &ty.fields {
                check_identifier(field_name)?;
                let kind = build_field(
                    name,
                    field_name,
                    field,
                    own_table,
                    def,
                    &implementors,
                    &tables,
                )?;
                fields.insert(
                    field_name.clone(),
                    FieldDef {
                        name: field_name.clone(),
                        kind,
                    },
                );
            }
            types.insert(
                name.clone(),
                TypeDef::Object(ObjectType {
                    name: name.clone(),
                    table: ty.table.clone(),
                    fields,
                    interfaces: ty.implements.clone(),
                }),
            );
        }
        for (name, list) in implementors {
            types.insert(
                name.to_string(),
                TypeDef::Interface(InterfaceType {
                    name: name.to_string(),
                    implementors: list,
                }),
            );
        }

        Ok(Arc::new(Schema { types, tables }))
    }
}

fn check_identifier(name: &str) -> Result<(), SchemaError> {
    if is_identifier(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(name.to_string()))
    }
}

fn require_column(table: &TableMeta, column: &str) -> Result<(), SchemaError> {
    if table.has_column(column) {
        Ok(())
    } else {
        Err(SchemaError::UnknownColumn {
            table: table.name.clone(),
            column: column.to_string(),
        })
    }
}

fn build_table(
    name: &str,
    def: &TableDefinition,
    config: &EngineConfig,
) -> Result<TableMeta, SchemaError> {
    check_identifier(name)?;
    for column in &def.columns {
        check_identifier(column)?;
    }
    let mut default_sort = Vec::with_capacity(def.default_sort.len());
    for sort in &def.default_sort {
        let direction = match &sort.direction {
            None => Direction::Ascending,
            Some(token) => Direction::parse(token).ok_or_else(|| SchemaError::InvalidDirection {
                table: name.to_string(),
                direction: token.clone(),
            })?,
        };
        default_sort.push(SortColumn {
            column: sort.column.clone(),
            direction,
        });
    }
    let versioning = def.versioning.as_ref().map(|v| {
        let defaults = &config.versioning;
        VersioningColumns {
            origin: v.origin.clone().unwrap_or_else(|| defaults.origin.clone()),
            workspace: v.workspace.clone().unwrap_or_else(|| defaults.workspace.clone()),
            state: v.state.clone().unwrap_or_else(|| defaults.state.clone()),
            position: v
                .position
                .clone()
                .unwrap_or_else(|| default_sort.iter().map(|s| s.column.clone()).collect()),
        }
    });
    let localization = def.localization.as_ref().map(|l| {
        let defaults = &config.localization;
        LocalizationColumns {
            language: l.language.clone().unwrap_or_else(|| defaults.language.clone()),
            source: l.source.clone().unwrap_or_else(|| defaults.source.clone()),
        }
    });
    let table = TableMeta {
        name: name.to_string(),
        identity: def.identity.clone(),
        columns: def.columns.clone(),
        default_sort,
        versioning,
        localization,
    };
    for column in table.system_columns() {
        require_column(&table, column)?;
    }
    for sort in &table.default_sort {
        require_column(&table, &sort.column)?;
    }
    Ok(table)
}

fn build_field(
    owner: &str,
    field_name: &str,
    field: &FieldDefinition,
    own_table: &TableMeta,
    def: &SchemaDefinition,
    implementors: &BTreeMap<&str, Vec<String>>,
    tables: &BTreeMap<String, TableMeta>,
) -> Result<FieldKind, SchemaError> {
    let invalid = |reason: &'static str| SchemaError::InvalidField {
        owner: owner.to_string(),
        field: field_name.to_string(),
        reason,
    };
    match (&field.scalar, &field.relation) {
        (Some(scalar), None) => {
            let ty = ScalarType::from_name(scalar)
                .ok_or_else(|| SchemaError::UnknownType(scalar.clone()))?;
            let column = field.column.clone().unwrap_or_else(|| field_name.to_string());
            require_column(own_table, &column)?;
            Ok(FieldKind::Scalar { ty, column })
        }
        (None, Some(raw_targets)) => {
            let mut targets = Vec::new();
            for target in raw_targets {
                if def.types.contains_key(target) {
                    targets.push(target.clone());
                } else if let Some(list) = implementors.get(target.as_str()) {
                    targets.extend(list.iter().cloned());
                } else if ScalarType::from_name(target).is_some() {
                    return Err(SchemaError::NotAnObject(target.clone()));
                } else {
                    return Err(SchemaError::UnknownType(target.clone()));
                }
            }
            let mut seen = BTreeSet::new();
            targets.retain(|t| seen.insert(t.clone()));
            if targets.is_empty() {
                return Err(invalid("relation has no target types"));
            }
            let target_tables: Vec<&TableMeta> = targets
                .iter()
                .map(|t| &tables[&def.types[t].table])
                .collect();

            let column = field
                .column
                .clone()
                .ok_or_else(|| invalid("relation requires a key column"))?;
            let storage = match field.storage {
                StorageKind::ForeignKey => {
                    for table in &target_tables {
                        require_column(table, &column)?;
                    }
                    RelationStorage::ForeignKey { column }
                }
                StorageKind::Inline => {
                    require_column(own_table, &column)?;
                    RelationStorage::Inline { column }
                }
                StorageKind::Symmetric => {
                    let mirror = field
                        .mirror
                        .clone()
                        .ok_or_else(|| invalid("symmetric relation requires a mirror column"))?;
                    for table in &target_tables {
                        require_column(table, &column)?;
                        require_column(table, &mirror)?;
                    }
                    RelationStorage::Symmetric { column, mirror }
                }
            };
            if field.mirror.is_some() && !matches!(storage, RelationStorage::Symmetric { .. }) {
                return Err(invalid("mirror is only valid for symmetric relations"));
            }

            let mut match_fields = Vec::new();
            for (column, value) in &field.match_fields {
                for table in &target_tables {
                    require_column(table, column)?;
                }
                if matches!(value, Value::Null | Value::List(_) | Value::Object(_)) {
                    return Err(invalid("match values must be scalars"));
                }
                match_fields.push(MatchField {
                    column: column.clone(),
                    value: value.clone(),
                });
            }

            let max = match &field.max {
                None => Some(1),
                Some(MaxDefinition::Count(n)) => Some(*n),
                Some(MaxDefinition::Word(word)) if word == "many" => None,
                Some(MaxDefinition::Word(_)) => {
                    return Err(invalid("max must be a number or \"many\""))
                }
            };
            if let Some(max) = max {
                if max == 0 || field.min > max {
                    return Err(invalid("cardinality bounds are inconsistent"));
                }
            }
            Ok(FieldKind::Relation(RelationMeta {
                multiplicity: Multiplicity {
                    min: field.min,
                    max,
                },
                targets,
                storage,
                match_fields,
            }))
        }
        (Some(_), Some(_)) => Err(invalid("field cannot be both scalar and relation")),
        (None, None) => Err(invalid("field must be scalar or relation")),
    }
}
