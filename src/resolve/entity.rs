use tracing::debug;

use super::{check_field, ArgumentDef, Arguments, FieldInfo, FieldResolver, ResolveContext, QUERY_ARGUMENTS};
use crate::compile::{validate_filter, validate_order, SortPlan, TypeScope};
use crate::error::Error;
use crate::value::{Row, Value};

/// Resolver for a root entity field such as `pages(filter:, order:)`.
///
/// Filter and order are scoped to the entity's own type and the result is
/// always a list.
#[derive(Clone, Debug)]
pub struct EntityResolver {
    field: String,
    type_name: String,
}

impl EntityResolver {
    /// Root field `field` listing rows of `type_name`.
    pub fn new(field: &str, type_name: &str) -> Self {
        Self {
            field: field.to_string(),
            type_name: type_name.to_string(),
        }
    }

    /// Entity type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl FieldResolver for EntityResolver {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn arguments(&self) -> &'static [ArgumentDef] {
        QUERY_ARGUMENTS
    }

    fn collect(
        &self,
        _source: Option<&Row>,
        _args: &Arguments,
        _ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<(), Error> {
        check_field(&self.field, info)
    }

    fn resolve(
        &self,
        _source: Option<&Row>,
        args: &Arguments,
        ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<Value, Error> {
        check_field(&self.field, info)?;
        let scope = TypeScope::entity(ctx.schema, &self.type_name)?;
        validate_filter(args.filter.as_ref(), &scope, &ctx.config.limits)?;
        validate_order(args.order.as_ref(), &scope, &ctx.config.limits)?;
        let plan = SortPlan::plan(
            args.order.as_ref(),
            &scope,
            &ctx.config.output.sort_alias_prefix,
        );

        let assembler = ctx.assembler();
        let mut rows = Vec::new();
        for target in scope.candidates().iter().copied() {
            let mut query = assembler.table(target)?;
            query.project(&info.columns).project_source();
            query.filter(args.filter.as_ref())?;
            query.sort(&plan, &scope, args.order.as_ref());
            let query = query.build()?;
            ctx.check_cancel()?;
            rows.extend(assembler.dispatch(ctx.executor, &query)?);
        }
        debug!(
            field = self.field.as_str(),
            rows = rows.len(),
            "resolver.entity"
        );
        Ok(Value::List(rows.into_iter().map(Value::Object).collect()))
    }
}
