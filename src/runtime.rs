//! Reference execution driver.
//!
//! Walks a selection tree one level at a time. For every relation field at a
//! level the driver first collects keys from all sibling rows, then resolves
//! each row (the first resolve flushes the batch), then descends into the
//! union of produced child rows, so one statement per field and target table
//! serves every parent at that depth.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::compile::{validate_filter, validate_order, TypeScope};
use crate::config::EngineConfig;
use crate::context::{AspectContext, ColumnSet};
use crate::error::{Error, ResolverError, ValidationError};
use crate::exec::QueryExecutor;
use crate::expr::{DefaultParser, ExpressionParser};
use crate::resolve::{
    resolver_for, root_resolver, Arguments, FieldInfo, FieldPathId, FieldResolver, ResolveContext,
    QUERY_ARGUMENTS,
};
use crate::schema::{FieldKind, ObjectType, RelationMeta, RelationStorage, Schema};
use crate::value::{Row, Value};

/// One requested field with raw arguments and sub-selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Field name.
    pub field: String,
    /// Raw argument text by name, parsed on input.
    pub arguments: BTreeMap<String, String>,
    /// Requested sub-fields.
    pub children: Vec<Selection>,
}

impl Selection {
    /// Selection of `field` with no arguments or children.
    pub fn new(field: &str) -> Self {
        Self {
            field: field.to_string(),
            ..Self::default()
        }
    }

    /// Adds a raw argument.
    pub fn argument(mut self, name: &str, text: &str) -> Self {
        self.arguments.insert(name.to_string(), text.to_string());
        self
    }

    /// Adds a sub-selection.
    pub fn child(mut self, child: Selection) -> Self {
        self.children.push(child);
        self
    }

    /// Adds scalar sub-fields.
    pub fn fields<'f>(mut self, names: impl IntoIterator<Item = &'f str>) -> Self {
        self.children.extend(names.into_iter().map(Selection::new));
        self
    }
}

/// Validated selection: arguments parsed, children split by kind.
#[derive(Debug)]
struct Prepared {
    field: String,
    args: Arguments,
    scalars: Vec<String>,
    relations: Vec<Prepared>,
}

/// How produced child values map back onto their parent rows.
enum Slot {
    Absent,
    Null,
    One(usize),
    Many(std::ops::Range<usize>),
}

/// Executes selection trees against one schema.
pub struct Execution<'a> {
    schema: &'a Schema,
    config: &'a EngineConfig,
    aspects: AspectContext,
    parser: &'a dyn ExpressionParser,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Execution<'a> {
    /// Driver with no aspects and the default expression parser.
    pub fn new(schema: &'a Schema, config: &'a EngineConfig) -> Self {
        Self {
            schema,
            config,
            aspects: AspectContext::new(),
            parser: &DefaultParser,
            cancel: None,
        }
    }

    /// Sets the request's aspects.
    pub fn with_aspects(mut self, aspects: AspectContext) -> Self {
        self.aspects = aspects;
        self
    }

    /// Replaces the expression parser.
    pub fn with_parser(mut self, parser: &'a dyn ExpressionParser) -> Self {
        self.parser = parser;
        self
    }

    /// Attaches a cancel token checked before every statement.
    pub fn with_cancel(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Runs `root` as a root field listing rows of `entity`.
    ///
    /// The whole tree is validated before the first statement. Returns a list
    /// of objects holding exactly the selected fields.
    pub fn run(
        &self,
        executor: &dyn QueryExecutor,
        root: &Selection,
        entity: &str,
    ) -> Result<Value, Error> {
        let entity_type = self
            .schema
            .object(entity)
            .ok_or_else(|| ValidationError::UnknownType {
                name: entity.to_string(),
            })?;
        let scope = TypeScope::entity(self.schema, entity)?;
        let prepared = self.prepare(root, &scope)?;

        let mut ctx = ResolveContext::new(self.schema, self.config, &self.aspects, executor);
        if let Some(cancel) = &self.cancel {
            ctx = ctx.with_cancel(Arc::clone(cancel));
        }
        let resolver = root_resolver(self.schema, &root.field, entity)?;
        let path = FieldPathId::root(&root.field);
        let info = FieldInfo::new(
            &root.field,
            path.clone(),
            self.columns_for(&[entity_type], &prepared),
        );
        resolver.collect(None, &prepared.args, &mut ctx, &info)?;
        let rows = into_rows(resolver.resolve(None, &prepared.args, &mut ctx, &info)?);
        info!(
            field = root.field.as_str(),
            rows = rows.len(),
            "runtime.root"
        );
        let objects = self.level(&mut ctx, &path, &prepared, &rows)?;
        info!(
            field = root.field.as_str(),
            statements = executor.statements_executed(),
            "runtime.complete"
        );
        Ok(Value::List(objects.into_iter().map(Value::Object).collect()))
    }

    fn prepare(&self, selection: &Selection, scope: &TypeScope<'_>) -> Result<Prepared, Error> {
        let args = Arguments::parse(
            &selection.field,
            QUERY_ARGUMENTS,
            &selection.arguments,
            self.parser,
        )?;
        validate_filter(args.filter.as_ref(), scope, &self.config.limits)?;
        validate_order(args.order.as_ref(), scope, &self.config.limits)?;

        let mut prepared = Prepared {
            field: selection.field.clone(),
            args,
            scalars: Vec::new(),
            relations: Vec::new(),
        };
        for child in &selection.children {
            let owners = TypeScope::owners(scope.candidates(), &child.field);
            if owners.is_empty() {
                return Err(ValidationError::UnknownSelection {
                    field: child.field.clone(),
                    ty: scope.candidate_names(),
                }
                .into());
            }
            let relations: Vec<&RelationMeta> = owners
                .iter()
                .filter_map(|(_, def)| match &def.kind {
                    FieldKind::Relation(rel) => Some(rel),
                    FieldKind::Scalar { .. } => None,
                })
                .collect();
            if relations.is_empty() {
                Arguments::parse(&child.field, &[], &child.arguments, self.parser)?;
                if let Some(grandchild) = child.children.first() {
                    return Err(ValidationError::UnknownSelection {
                        field: grandchild.field.clone(),
                        ty: owners[0].1.type_name(),
                    }
                    .into());
                }
                prepared.scalars.push(child.field.clone());
                continue;
            }
            let mut merged: Option<Prepared> = None;
            for rel in relations {
                let child_scope = TypeScope::relation(self.schema, rel);
                let next = self.prepare(child, &child_scope)?;
                merged = Some(match merged.take() {
                    None => next,
                    Some(mut existing) => {
                        // Same field on several parent types: children may
                        // come from either set of targets.
                        for scalar in next.scalars {
                            if !existing.scalars.contains(&scalar) {
                                existing.scalars.push(scalar);
                            }
                        }
                        existing
                    }
                });
            }
            if let Some(next) = merged {
                prepared.relations.push(next);
            }
        }
        Ok(prepared)
    }

    /// Columns a level's statements must project for `prepared`'s fields.
    fn columns_for(&self, types: &[&ObjectType], prepared: &Prepared) -> ColumnSet {
        if prepared.scalars.is_empty() {
            return ColumnSet::All;
        }
        let mut columns = BTreeSet::new();
        for ty in types {
            for name in &prepared.scalars {
                if let Some(FieldKind::Scalar { column, .. }) = ty.field(name).map(|f| &f.kind) {
                    columns.insert(column.clone());
                }
            }
            for rel in &prepared.relations {
                if let Some(FieldKind::Relation(meta)) = ty.field(&rel.field).map(|f| &f.kind) {
                    if let RelationStorage::Inline { column } = &meta.storage {
                        columns.insert(column.clone());
                    }
                }
            }
        }
        ColumnSet::Only(columns)
    }

    fn type_of(&self, row: &Row, path: &FieldPathId) -> Result<&'a ObjectType, Error> {
        let alias = self.config.output.source_alias.as_str();
        row.get(alias)
            .and_then(Value::as_str)
            .and_then(|table| self.schema.object_for_table(table))
            .ok_or_else(|| {
                ResolverError::MissingColumn {
                    table: path.to_string(),
                    column: alias.to_string(),
                }
                .into()
            })
    }

    fn level(
        &self,
        ctx: &mut ResolveContext<'_>,
        path: &FieldPathId,
        prepared: &Prepared,
        rows: &[Row],
    ) -> Result<Vec<Row>, Error> {
        let types: Vec<&ObjectType> = rows
            .iter()
            .map(|row| self.type_of(row, path))
            .collect::<Result<_, _>>()?;
        let mut out: Vec<Row> = vec![Row::new(); rows.len()];
        let no_args = Arguments::default();

        for name in &prepared.scalars {
            let mut resolvers: FxHashMap<&str, Box<dyn FieldResolver>> = FxHashMap::default();
            let info = FieldInfo::new(name, path.child(name), ColumnSet::All);
            for (i, row) in rows.iter().enumerate() {
                let ty = types[i];
                if ty.field(name).is_none() {
                    continue;
                }
                if !resolvers.contains_key(ty.name.as_str()) {
                    resolvers.insert(&ty.name, resolver_for(self.schema, ty, name)?);
                }
                if let Some(resolver) = resolvers.get(ty.name.as_str()) {
                    let value = resolver.resolve(Some(row), &no_args, ctx, &info)?;
                    out[i].insert(name.clone(), value);
                }
            }
        }

        for child in &prepared.relations {
            let child_path = path.child(&child.field);
            let mut owners: Vec<&ObjectType> = Vec::new();
            for ty in types.iter().copied() {
                if ty.field(&child.field).is_some() && !owners.iter().any(|o| o.name == ty.name) {
                    owners.push(ty);
                }
            }
            let qualified = owners.len() > 1;
            let mut resolvers: FxHashMap<&str, (Box<dyn FieldResolver>, FieldInfo)> =
                FxHashMap::default();
            for owner in owners.iter().copied() {
                let Some(FieldKind::Relation(rel)) = owner.field(&child.field).map(|f| &f.kind) else {
                    continue;
                };
                let targets = TypeScope::relation(self.schema, rel);
                let handle = if qualified {
                    path.child(&format!("{}:{}", owner.name, child.field))
                } else {
                    child_path.clone()
                };
                let info = FieldInfo::new(
                    &child.field,
                    handle,
                    self.columns_for(targets.candidates(), child),
                );
                resolvers.insert(&owner.name, (resolver_for(self.schema, owner, &child.field)?, info));
            }

            for (i, row) in rows.iter().enumerate() {
                if let Some((resolver, info)) = resolvers.get(types[i].name.as_str()) {
                    resolver.collect(Some(row), &child.args, ctx, info)?;
                }
            }
            let mut flat: Vec<Row> = Vec::new();
            let mut slots: Vec<Slot> = Vec::with_capacity(rows.len());
            for (i, row) in rows.iter().enumerate() {
                let Some((resolver, info)) = resolvers.get(types[i].name.as_str()) else {
                    slots.push(Slot::Absent);
                    continue;
                };
                let slot = match resolver.resolve(Some(row), &child.args, ctx, info)? {
                    Value::Object(child_row) => {
                        flat.push(child_row);
                        Slot::One(flat.len() - 1)
                    }
                    Value::List(items) => {
                        let start = flat.len();
                        flat.extend(into_rows(Value::List(items)));
                        Slot::Many(start..flat.len())
                    }
                    _ => Slot::Null,
                };
                slots.push(slot);
            }
            debug!(
                path = child_path.as_str(),
                parents = rows.len(),
                children = flat.len(),
                "runtime.level"
            );

            let mut rendered: Vec<Option<Row>> = self
                .level(ctx, &child_path, child, &flat)?
                .into_iter()
                .map(Some)
                .collect();
            for (i, slot) in slots.into_iter().enumerate() {
                let value = match slot {
                    Slot::Absent => continue,
                    Slot::Null => Value::Null,
                    Slot::One(pos) => rendered[pos].take().map(Value::Object).unwrap_or_default(),
                    Slot::Many(range) => Value::List(
                        range
                            .filter_map(|pos| rendered[pos].take().map(Value::Object))
                            .collect(),
                    ),
                };
                out[i].insert(child.field.clone(), value);
            }
        }
        Ok(out)
    }
}

fn into_rows(value: Value) -> Vec<Row> {
    match value {
        Value::List(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect(),
        Value::Object(row) => vec![row],
        _ => Vec::new(),
    }
}
