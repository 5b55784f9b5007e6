use tracing::{debug, trace};

use super::buffer::{KeySet, ResolvedBuffer, ResolverBuffer};
use super::keys::parse_inline_keys;
use super::sort::post_fetch_sort;
use super::{check_field, ArgumentDef, Arguments, FieldInfo, FieldResolver, ResolveContext, QUERY_ARGUMENTS};
use crate::compile::{validate_filter, validate_order, SortPlan, TypeScope};
use crate::error::{Error, ResolverError};
use crate::schema::{RelationMeta, TableMeta};
use crate::value::{Row, RowKey, Value};

/// How a relation derives keys from a parent row and matches target rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyStrategy {
    /// The parent identity is matched against target `columns`; a row is
    /// indexed under the value of each of them.
    ParentIdentity {
        /// One column for a foreign key, two for a symmetric association.
        columns: Vec<String>,
    },
    /// The parent stores target references in `column`; target rows are
    /// matched and indexed by their own identity.
    Inline {
        /// Column on the parent table.
        column: String,
        /// Table for references without a table prefix.
        default_table: String,
    },
}

/// Batched resolver for one relation field.
#[derive(Clone, Debug)]
pub struct RelationResolver {
    field: String,
    owner_table: String,
    owner_identity: String,
    relation: RelationMeta,
    strategy: KeyStrategy,
    target_tables: Vec<String>,
}

impl RelationResolver {
    /// Resolver for `field` of rows in `owner`.
    pub fn new(
        field: &str,
        owner: &TableMeta,
        relation: RelationMeta,
        strategy: KeyStrategy,
        target_tables: Vec<String>,
    ) -> Self {
        Self {
            field: field.to_string(),
            owner_table: owner.name.clone(),
            owner_identity: owner.identity.clone(),
            relation,
            strategy,
            target_tables,
        }
    }

    /// Key strategy picked at construction.
    pub fn strategy(&self) -> &KeyStrategy {
        &self.strategy
    }

    /// Relation metadata.
    pub fn relation(&self) -> &RelationMeta {
        &self.relation
    }

    fn keys_of(&self, source: &Row) -> Result<Vec<(String, RowKey)>, ResolverError> {
        match &self.strategy {
            KeyStrategy::ParentIdentity { .. } => {
                let value = self.owner_column(source, &self.owner_identity)?;
                let key = RowKey::from_value(value)?;
                Ok(self
                    .target_tables
                    .iter()
                    .map(|table| (table.clone(), key.clone()))
                    .collect())
            }
            KeyStrategy::Inline {
                column,
                default_table,
            } => match self.owner_column(source, column)? {
                Value::Null => Ok(Vec::new()),
                Value::String(stored) => {
                    let allowed: Vec<&str> = self.target_tables.iter().map(String::as_str).collect();
                    parse_inline_keys(stored, default_table, &allowed)
                }
                Value::Int(id) => Ok(vec![(default_table.clone(), RowKey::Int(*id))]),
                other => Err(ResolverError::MalformedKey {
                    value: other.to_string(),
                    reason: "inline references must be text or an integer",
                }),
            },
        }
    }

    fn owner_column<'r>(&self, source: &'r Row, column: &str) -> Result<&'r Value, ResolverError> {
        source.get(column).ok_or_else(|| ResolverError::MissingColumn {
            table: self.owner_table.clone(),
            column: column.to_string(),
        })
    }

    /// Runs the batched fetch for every collected key, one statement per
    /// target table. A no-op once the buffer is resolved. On failure the
    /// buffer keeps its keys and stays collecting.
    pub fn flush(
        &self,
        args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<(), Error> {
        let keys = match ctx.cache.get(&info.path) {
            Some(ResolverBuffer::Resolved(_)) => return Ok(()),
            Some(ResolverBuffer::Collecting(keys)) => keys.clone(),
            None => KeySet::new(),
        };

        let scope = TypeScope::relation(ctx.schema, &self.relation);
        validate_filter(args.filter.as_ref(), &scope, &ctx.config.limits)?;
        validate_order(args.order.as_ref(), &scope, &ctx.config.limits)?;
        let plan = SortPlan::plan(
            args.order.as_ref(),
            &scope,
            &ctx.config.output.sort_alias_prefix,
        );
        let source_alias = ctx.config.output.source_alias.as_str();

        debug!(
            path = info.path.as_str(),
            keys = keys.len(),
            "resolver.flush.start"
        );
        let assembler = ctx.assembler();
        let mut resolved = ResolvedBuffer::new(keys.clone(), plan.clone());
        for (table, table_keys) in keys.tables() {
            let target = scope
                .candidates()
                .iter()
                .copied()
                .find(|obj| obj.table == table)
                .ok_or_else(|| ResolverError::BufferState {
                    handle: info.path.to_string(),
                    detail: "holds keys for a table outside the relation",
                })?;
            let mut query = assembler.table(target)?;
            let identity = query.table().identity.clone();
            query.project(&info.columns).project_source();
            match &self.strategy {
                KeyStrategy::ParentIdentity { columns } => {
                    for column in columns {
                        query.project_column(column, None);
                    }
                    let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
                    query.keys_in(&columns, table_keys)?;
                }
                KeyStrategy::Inline { .. } => {
                    query.keys_in(&[identity.as_str()], table_keys)?;
                }
            }
            query.match_fields(&self.relation.match_fields)?;
            query.filter(args.filter.as_ref())?;
            query.sort(&plan, &scope, args.order.as_ref());
            let query = query.build()?;

            if let Err(err) = ctx.check_cancel() {
                debug!(path = info.path.as_str(), table, "resolver.flush.cancelled");
                return Err(err);
            }
            let rows = assembler.dispatch(ctx.executor, &query)?;
            trace!(
                path = info.path.as_str(),
                table,
                rows = rows.len(),
                "resolver.flush.table"
            );
            for row in rows {
                self.index_row(&mut resolved, table, &identity, source_alias, row)?;
            }
        }
        debug!(
            path = info.path.as_str(),
            rows = resolved.len(),
            "resolver.flush.complete"
        );
        ctx.cache
            .set(info.path.clone(), ResolverBuffer::Resolved(resolved));
        Ok(())
    }

    fn index_row(
        &self,
        buffer: &mut ResolvedBuffer,
        table: &str,
        identity: &str,
        source_alias: &str,
        row: Row,
    ) -> Result<(), ResolverError> {
        let missing = |column: &str| ResolverError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        };
        if row.get(source_alias).and_then(Value::as_str) != Some(table) {
            return Err(missing(source_alias));
        }
        let mut slots: Vec<(Option<&str>, RowKey)> = Vec::with_capacity(2);
        match &self.strategy {
            KeyStrategy::ParentIdentity { columns } => {
                for column in columns {
                    let value = row.get(column.as_str()).ok_or_else(|| missing(column))?;
                    // A symmetric row matched on one endpoint may leave the other empty.
                    if !value.is_null() {
                        slots.push((None, RowKey::from_value(value)?));
                    }
                }
            }
            KeyStrategy::Inline { .. } => {
                let value = row.get(identity).ok_or_else(|| missing(identity))?;
                slots.push((Some(table), RowKey::from_value(value)?));
            }
        }
        let pos = buffer.push(row);
        for (table, key) in slots {
            buffer.index(table, key, pos);
        }
        Ok(())
    }
}

impl FieldResolver for RelationResolver {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn arguments(&self) -> &'static [ArgumentDef] {
        QUERY_ARGUMENTS
    }

    fn collect(
        &self,
        source: Option<&Row>,
        _args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<(), Error> {
        check_field(&self.field, info)?;
        let Some(source) = source else {
            return Ok(());
        };
        let keys = self.keys_of(source)?;
        let buffer = ctx.cache.entry(&info.path);
        let mut added = 0usize;
        for (table, key) in keys {
            if buffer.collect(info.path.as_str(), &table, key)? {
                added += 1;
            }
        }
        trace!(path = info.path.as_str(), added, "resolver.collect");
        Ok(())
    }

    fn resolve(
        &self,
        source: Option<&Row>,
        args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<Value, Error> {
        check_field(&self.field, info)?;
        let source = source.ok_or_else(|| ResolverError::BufferState {
            handle: info.path.to_string(),
            detail: "resolved without a source row",
        })?;
        let keys = self.keys_of(source)?;
        if !ctx.cache.get(&info.path).is_some_and(ResolverBuffer::is_resolved) {
            self.flush(args, ctx, info)?;
        }
        let Some(ResolverBuffer::Resolved(buffer)) = ctx.cache.get(&info.path) else {
            return Err(ResolverError::BufferState {
                handle: info.path.to_string(),
                detail: "is not resolved after flush",
            }
            .into());
        };

        let mut positions: Vec<usize> = Vec::new();
        for (table, key) in &keys {
            if !buffer.keys().contains(table, key) {
                return Err(ResolverError::BufferState {
                    handle: info.path.to_string(),
                    detail: "was asked for a key it never collected",
                }
                .into());
            }
            let slot = match &self.strategy {
                KeyStrategy::ParentIdentity { .. } => buffer.lookup(None, key),
                KeyStrategy::Inline { .. } => buffer.lookup(Some(table), key),
            };
            for pos in slot {
                if !positions.contains(pos) {
                    positions.push(*pos);
                }
            }
        }
        // Inline lookups follow stored order unless some order applies, which
        // is fetch order for push-down and the post-fetch sort otherwise.
        if matches!(self.strategy, KeyStrategy::Inline { .. }) && *buffer.plan() != SortPlan::None {
            positions.sort_unstable();
        }

        let mut rows: Vec<&Row> = positions.iter().filter_map(|pos| buffer.row(*pos)).collect();
        if let SortPlan::PostFetch(sort_keys) = buffer.plan() {
            post_fetch_sort(&mut rows, sort_keys, &ctx.config.output.source_alias);
        }
        let candidates = rows.into_iter().map(|row| Value::Object(row.clone())).collect();
        Ok(self.relation.multiplicity.shape(candidates))
    }
}
