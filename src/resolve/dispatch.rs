//! Picks the resolver for a field from its metadata.
//!
//! Selection is one `match` over the field kind and relation storage. Shape
//! and ordering follow from the relation itself: the multiplicity decides
//! null/scalar/list shaping and the number of target tables decides between
//! push-down and post-fetch ordering.

use super::{ColumnResolver, EntityResolver, FieldResolver, KeyStrategy, RelationResolver};
use crate::compile::TypeScope;
use crate::error::{Error, SchemaError, ValidationError};
use crate::schema::{FieldKind, ObjectType, RelationStorage, Schema};

/// Resolver for `field` on rows of `owner`.
pub fn resolver_for(
    schema: &Schema,
    owner: &ObjectType,
    field: &str,
) -> Result<Box<dyn FieldResolver>, Error> {
    let def = owner
        .field(field)
        .ok_or_else(|| ValidationError::UnknownSelection {
            field: field.to_string(),
            ty: owner.name.clone(),
        })?;
    let relation = match &def.kind {
        FieldKind::Scalar { column, .. } => {
            return Ok(Box::new(ColumnResolver::new(field, &owner.table, column)));
        }
        FieldKind::Relation(relation) => relation,
    };

    let owner_table = schema
        .table(&owner.table)
        .ok_or_else(|| SchemaError::UnknownTable(owner.table.clone()))?;
    let target_tables: Vec<String> = TypeScope::relation(schema, relation)
        .tables()
        .into_iter()
        .map(str::to_string)
        .collect();
    let strategy = match &relation.storage {
        RelationStorage::ForeignKey { column } => KeyStrategy::ParentIdentity {
            columns: vec![column.clone()],
        },
        RelationStorage::Symmetric { column, mirror } => KeyStrategy::ParentIdentity {
            columns: vec![column.clone(), mirror.clone()],
        },
        RelationStorage::Inline { column } => {
            let default_table = target_tables
                .first()
                .cloned()
                .ok_or_else(|| SchemaError::UnknownType(relation.target_names()))?;
            KeyStrategy::Inline {
                column: column.clone(),
                default_table,
            }
        }
    };
    Ok(Box::new(RelationResolver::new(
        field,
        owner_table,
        relation.clone(),
        strategy,
        target_tables,
    )))
}

/// Resolver for a root field listing every row of `type_name`.
pub fn root_resolver(schema: &Schema, field: &str, type_name: &str) -> Result<EntityResolver, Error> {
    if schema.object(type_name).is_none() {
        return Err(ValidationError::UnknownType {
            name: type_name.to_string(),
        }
        .into());
    }
    Ok(EntityResolver::new(field, type_name))
}
