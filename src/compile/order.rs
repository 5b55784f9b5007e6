//! Order validation, traversal and the push-down/post-fetch decision.

use std::collections::BTreeSet;

use super::scope::{join_names, TypeScope};
use crate::config::Limits;
use crate::error::{CompileError, Error, ValidationError};
use crate::expr::{Direction, ExpressionNode, OrderItem};
use crate::schema::FieldKind;

/// One resolved sort key for one table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderKey {
    /// Index of the order item that produced the key.
    pub item: usize,
    /// Table the key applies to.
    pub table: String,
    /// Field name (the column name for metadata defaults).
    pub field: String,
    /// Backing column.
    pub column: String,
    /// Direction.
    pub direction: Direction,
}

/// In-memory sort key over rows from several tables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PostFetchKey {
    /// Output alias carrying the value in fetched rows.
    pub alias: String,
    /// Source tables whose rows contribute a value; others sort as null.
    pub tables: BTreeSet<String>,
    /// Direction.
    pub direction: Direction,
}

/// How a relation's rows get ordered.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum SortPlan {
    /// Keep fetch/storage order.
    #[default]
    None,
    /// `ORDER BY` on the single target table.
    PushDown(Vec<OrderKey>),
    /// Stable multi-key sort after buffering.
    PostFetch(Vec<PostFetchKey>),
}

fn order_items(ast: &ExpressionNode) -> Result<&[OrderItem], CompileError> {
    match ast {
        ExpressionNode::OrderList(items) => Ok(items),
        ExpressionNode::OrderItem(item) => Ok(std::slice::from_ref(item)),
        other => Err(CompileError::UnsupportedNode {
            kind: other.kind(),
            context: "order",
        }),
    }
}

/// Checks an order expression against the types in `scope`.
///
/// Per item, in order: nested path, unknown constraint type, leaf or abstract
/// constraint, constraint outside the scope, unknown field, composite field.
pub fn validate_order(
    ast: Option<&ExpressionNode>,
    scope: &TypeScope<'_>,
    limits: &Limits,
) -> Result<(), Error> {
    let Some(ast) = ast else {
        return Ok(());
    };
    let items = order_items(ast)?;
    if items.len() > limits.max_order_items {
        return Err(ValidationError::TooManyOrderItems {
            count: items.len(),
            max: limits.max_order_items,
        }
        .into());
    }
    for item in items {
        let Some(field) = item.path.single() else {
            return Err(ValidationError::NestedFieldNotSupported {
                path: item.path.dotted(),
            }
            .into());
        };
        let narrowed = scope.narrow(item.effective_constraint())?;
        let owners = TypeScope::owners(&narrowed, field);
        if owners.is_empty() {
            return Err(ValidationError::UnknownField {
                field: field.to_string(),
                types: join_names(&narrowed),
            }
            .into());
        }
        for (_, def) in owners {
            if let FieldKind::Relation(_) = def.kind {
                return Err(ValidationError::FieldNotOrderable {
                    field: field.to_string(),
                    ty: def.type_name(),
                }
                .into());
            }
        }
    }
    Ok(())
}

/// Lazily resolves an order expression into per-table keys.
///
/// Without an expression the single target table's declared default sort is
/// used; with several target tables there is no default. Items that do not
/// apply to a table (constraint elsewhere, field not declared) are skipped
/// for that table. Expects a validated expression.
pub fn items<'a>(
    ast: Option<&'a ExpressionNode>,
    scope: &'a TypeScope<'a>,
) -> Box<dyn Iterator<Item = OrderKey> + 'a> {
    match ast {
        None => {
            let tables = scope.tables();
            if tables.len() != 1 {
                return Box::new(std::iter::empty());
            }
            let Some(meta) = scope.schema().table(tables[0]) else {
                return Box::new(std::iter::empty());
            };
            Box::new(meta.default_sort.iter().enumerate().map(|(i, sort)| OrderKey {
                item: i,
                table: meta.name.clone(),
                field: sort.column.clone(),
                column: sort.column.clone(),
                direction: sort.direction,
            }))
        }
        Some(ast) => {
            let items = order_items(ast).unwrap_or(&[]);
            Box::new(items.iter().enumerate().flat_map(move |(i, item)| {
                let field = item.path.single().unwrap_or_default();
                let narrowed = scope.narrow(item.effective_constraint()).unwrap_or_default();
                TypeScope::owners(&narrowed, field)
                    .into_iter()
                    .filter_map(move |(obj, def)| {
                        def.column().map(|column| OrderKey {
                            item: i,
                            table: obj.table.clone(),
                            field: field.to_string(),
                            column: column.to_string(),
                            direction: item.direction,
                        })
                    })
            }))
        }
    }
}

impl SortPlan {
    /// Decides between push-down and post-fetch ordering.
    ///
    /// `alias_prefix` names the projected columns the post-fetch sort reads.
    pub fn plan(ast: Option<&ExpressionNode>, scope: &TypeScope<'_>, alias_prefix: &str) -> SortPlan {
        if !scope.is_heterogeneous() {
            let keys: Vec<OrderKey> = items(ast, scope).collect();
            return if keys.is_empty() {
                SortPlan::None
            } else {
                SortPlan::PushDown(keys)
            };
        }

        let mut keys: Vec<PostFetchKey> = Vec::new();
        match ast {
            Some(_) => {
                let mut current: Option<usize> = None;
                for key in items(ast, scope) {
                    if current == Some(key.item) {
                        if let Some(last) = keys.last_mut() {
                            last.tables.insert(key.table);
                        }
                        continue;
                    }
                    current = Some(key.item);
                    keys.push(PostFetchKey {
                        alias: format!("{alias_prefix}{}", key.field),
                        tables: BTreeSet::from([key.table]),
                        direction: key.direction,
                    });
                }
            }
            None => {
                // Per-table defaults, merged where tables share a column.
                for table in scope.tables() {
                    let Some(meta) = scope.schema().table(table) else {
                        continue;
                    };
                    for sort in &meta.default_sort {
                        let alias = format!("{alias_prefix}{}", sort.column);
                        match keys
                            .iter_mut()
                            .find(|k| k.alias == alias && k.direction == sort.direction)
                        {
                            Some(existing) => {
                                existing.tables.insert(table.to_string());
                            }
                            None => keys.push(PostFetchKey {
                                alias,
                                tables: BTreeSet::from([table.to_string()]),
                                direction: sort.direction,
                            }),
                        }
                    }
                }
            }
        }
        if keys.is_empty() {
            SortPlan::None
        } else {
            SortPlan::PostFetch(keys)
        }
    }

    /// Columns a query on `table` must project for this plan, as
    /// `(column, alias)` pairs.
    pub fn projections<'p>(
        &'p self,
        table: &'p str,
        scope: &'p TypeScope<'p>,
        ast: Option<&'p ExpressionNode>,
        alias_prefix: &'p str,
    ) -> Vec<(String, String)> {
        match self {
            SortPlan::None => Vec::new(),
            SortPlan::PushDown(keys) => keys
                .iter()
                .filter(|k| k.table == table)
                .map(|k| (k.column.clone(), format!("{alias_prefix}{}", k.field)))
                .collect(),
            SortPlan::PostFetch(_) => {
                let mut out: Vec<(String, String)> = Vec::new();
                let keys: Vec<OrderKey> = match ast {
                    Some(_) => items(ast, scope).filter(|k| k.table == table).collect(),
                    None => scope
                        .schema()
                        .table(table)
                        .map(|meta| {
                            meta.default_sort
                                .iter()
                                .map(|sort| OrderKey {
                                    item: 0,
                                    table: table.to_string(),
                                    field: sort.column.clone(),
                                    column: sort.column.clone(),
                                    direction: sort.direction,
                                })
                                .collect()
                        })
                        .unwrap_or_default(),
                };
                for key in keys {
                    let alias = format!("{alias_prefix}{}", key.field);
                    if !out.iter().any(|(_, a)| *a == alias) {
                        out.push((key.column, alias));
                    }
                }
                out
            }
        }
    }
}
