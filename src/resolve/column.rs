use super::{check_field, ArgumentDef, Arguments, FieldInfo, FieldResolver, ResolveContext};
use crate::error::{Error, ResolverError};
use crate::value::{Row, Value};

/// Reads a scalar field from its parent row.
#[derive(Clone, Debug)]
pub struct ColumnResolver {
    field: String,
    table: String,
    column: String,
}

impl ColumnResolver {
    /// Resolver for `field` backed by `table.column`.
    pub fn new(field: &str, table: &str, column: &str) -> Self {
        Self {
            field: field.to_string(),
            table: table.to_string(),
            column: column.to_string(),
        }
    }
}

impl FieldResolver for ColumnResolver {
    fn field_name(&self) -> &str {
        &self.field
    }

    fn arguments(&self) -> &'static [ArgumentDef] {
        &[]
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
        source: Option<&Row>,
        _args: &Arguments,
        _ctx: &mut ResolveContext<'_>,
        info: &FieldInfo,
    ) -> Result<Value, Error> {
        check_field(&self.field, info)?;
        let Some(source) = source else {
            return Ok(Value::Null);
        };
        source.get(&self.column).cloned().ok_or_else(|| {
            ResolverError::MissingColumn {
                table: self.table.clone(),
                column: self.column.clone(),
            }
            .into()
        })
    }
}
