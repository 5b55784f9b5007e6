use std::collections::BTreeSet;

use tracing::debug;

use crate::compile::{Domain, PredicateCompiler, SortPlan, TypeScope};
use crate::config::EngineConfig;
use crate::context::{AspectContext, ColumnSet, ViewComposer};
use crate::error::{Error, SchemaError};
use crate::expr::ExpressionNode;
use crate::schema::{MatchField, ObjectType, Schema, TableMeta};
use crate::sql::{Param, SelectQuery, SqlExpr};
use crate::value::{Row, RowKey};

use super::QueryExecutor;

/// Alias of the queried table in every assembled statement.
pub const DEFAULT_ALIAS: &str = "t";

/// Builds per-table statements for one request.
pub struct QueryAssembler<'a> {
    schema: &'a Schema,
    config: &'a EngineConfig,
    aspects: &'a AspectContext,
}

impl<'a> QueryAssembler<'a> {
    /// Assembler bound to a schema, engine config and the request's aspects.
    pub fn new(schema: &'a Schema, config: &'a EngineConfig, aspects: &'a AspectContext) -> Self {
        Self {
            schema,
            config,
            aspects,
        }
    }

    /// Starts a statement reading rows of `target`.
    pub fn table(&self, target: &'a ObjectType) -> Result<TableQuery<'a>, Error> {
        let table = self
            .schema
            .table(&target.table)
            .ok_or_else(|| SchemaError::UnknownTable(target.table.clone()))?;
        Ok(TableQuery {
            target,
            table,
            config: self.config,
            aspects: self.aspects,
            query: SelectQuery::from_table(&table.name, DEFAULT_ALIAS),
            read: BTreeSet::new(),
            all_columns: false,
        })
    }

    /// Renders and executes `query`.
    pub fn dispatch(
        &self,
        executor: &dyn QueryExecutor,
        query: &SelectQuery,
    ) -> Result<Vec<Row>, Error> {
        let rendered = query.render()?;
        debug!(
            sql = rendered.sql.as_str(),
            params = rendered.params.len(),
            "assembly.dispatch"
        );
        Ok(executor.execute(&rendered)?)
    }
}

/// One statement under construction.
///
/// Every column the statement reads from the table is tracked so that
/// context views project exactly those (plus the table's system columns).
pub struct TableQuery<'a> {
    target: &'a ObjectType,
    table: &'a TableMeta,
    config: &'a EngineConfig,
    aspects: &'a AspectContext,
    query: SelectQuery,
    read: BTreeSet<String>,
    all_columns: bool,
}

impl<'a> TableQuery<'a> {
    /// Table being read.
    pub fn table(&self) -> &'a TableMeta {
        self.table
    }

    /// Projects the identity plus `columns`. `ColumnSet::All` projects every
    /// column of the table.
    pub fn project(&mut self, columns: &ColumnSet) -> &mut Self {
        if *columns == ColumnSet::All {
            self.all_columns = true;
        }
        let table = self.table;
        self.project_column(&table.identity, None);
        for column in columns.resolve(table) {
            let wanted = match columns {
                ColumnSet::All => true,
                ColumnSet::Only(set) => set.contains(column),
            };
            if wanted {
                self.project_column(column, None);
            }
        }
        self
    }

    /// Projects `column`, under `alias` when given. Already projected output
    /// names are skipped.
    pub fn project_column(&mut self, column: &str, alias: Option<&str>) -> &mut Self {
        let name = alias.unwrap_or(column);
        if !self.query.projects(name) {
            let expr = SqlExpr::column(DEFAULT_ALIAS, column);
            self.query.select(expr, Some(name));
        }
        self.read.insert(column.to_string());
        self
    }

    /// Projects the table name as a literal discriminator column.
    pub fn project_source(&mut self) -> &mut Self {
        let alias = self.config.output.source_alias.as_str();
        if !self.query.projects(alias) {
            self.query
                .select(SqlExpr::Text(self.table.name.clone()), Some(alias));
        }
        self
    }

    /// Restricts rows to those whose `columns` (any of them) hold one of
    /// `keys`.
    pub fn keys_in(&mut self, columns: &[&str], keys: &[RowKey]) -> Result<&mut Self, Error> {
        let list = key_param(keys);
        let bound = self.query.bind(&format!("{}.keys", self.table.name), list)?;
        let mut legs: Vec<SqlExpr> = columns
            .iter()
            .map(|column| {
                self.read.insert(column.to_string());
                SqlExpr::in_list(SqlExpr::column(DEFAULT_ALIAS, column), vec![bound.clone()])
            })
            .collect();
        let condition = if legs.len() == 1 {
            legs.remove(0)
        } else {
            SqlExpr::Or(legs)
        };
        self.query.and_where(condition);
        Ok(self)
    }

    /// Applies a relation's static equality constraints.
    pub fn match_fields(&mut self, fields: &[MatchField]) -> Result<&mut Self, Error> {
        for field in fields {
            let column = SqlExpr::column(DEFAULT_ALIAS, &field.column);
            self.read.insert(field.column.clone());
            let condition = match Param::from_value(&field.value) {
                Some(param) => {
                    let semantic = format!("{}.{}", self.table.name, field.column);
                    SqlExpr::eq(column, self.query.bind(&semantic, param)?)
                }
                None => SqlExpr::is_null(column),
            };
            self.query.and_where(condition);
        }
        Ok(self)
    }

    /// Compiles `ast` against the target type and adds it to WHERE.
    pub fn filter(&mut self, ast: Option<&ExpressionNode>) -> Result<&mut Self, Error> {
        let predicate = PredicateCompiler::new(self.target, DEFAULT_ALIAS, &mut self.query.params)
            .compile(ast, Domain::Normal)?;
        if let Some(predicate) = predicate {
            let mut columns = Vec::new();
            predicate.columns_of(DEFAULT_ALIAS, &mut columns);
            self.read.extend(columns.into_iter().map(str::to_string));
            self.query.and_where(predicate);
        }
        Ok(self)
    }

    /// Projects the columns `plan` reads and, for push-down plans, adds
    /// `ORDER BY` terms for this table.
    pub fn sort(
        &mut self,
        plan: &SortPlan,
        scope: &TypeScope<'_>,
        ast: Option<&ExpressionNode>,
    ) -> &mut Self {
        let prefix = self.config.output.sort_alias_prefix.as_str();
        for (column, alias) in plan.projections(&self.table.name, scope, ast, prefix) {
            self.project_column(&column, Some(&alias));
        }
        if let SortPlan::PushDown(keys) = plan {
            for key in keys.iter().filter(|k| k.table == self.table.name) {
                self.query
                    .order(SqlExpr::column(DEFAULT_ALIAS, &key.column), key.direction);
            }
        }
        self
    }

    /// Wraps the table in its context views and returns the statement.
    pub fn build(mut self) -> Result<SelectQuery, Error> {
        let columns = if self.all_columns {
            ColumnSet::All
        } else {
            ColumnSet::Only(self.read)
        };
        ViewComposer::new(self.config, self.aspects).apply(&mut self.query, self.table, &columns)?;
        Ok(self.query)
    }
}

fn key_param(keys: &[RowKey]) -> Param {
    let ints: Option<Vec<i64>> = keys
        .iter()
        .map(|k| match k {
            RowKey::Int(v) => Some(*v),
            RowKey::Text(_) => None,
        })
        .collect();
    match ints {
        Some(ints) => Param::IntList(ints),
        None => Param::TextList(keys.iter().map(RowKey::to_string).collect()),
    }
}
