use crate::error::ValidationError;
use crate::schema::{FieldDef, ObjectType, RelationMeta, Schema, TypeDef};

/// Where an expression is evaluated: the set of object types its fields and
/// `on Type` constraints may refer to.
#[derive(Clone, Debug)]
pub struct TypeScope<'s> {
    schema: &'s Schema,
    candidates: Vec<&'s ObjectType>,
}

impl<'s> TypeScope<'s> {
    /// Root entity query: the only type in scope is the entity's own.
    pub fn entity(schema: &'s Schema, type_name: &str) -> Result<Self, ValidationError> {
        let obj = schema
            .object(type_name)
            .ok_or_else(|| ValidationError::UnknownType {
                name: type_name.to_string(),
            })?;
        Ok(Self {
            schema,
            candidates: vec![obj],
        })
    }

    /// Relation query: every declared target type is in scope.
    pub fn relation(schema: &'s Schema, relation: &RelationMeta) -> Self {
        let candidates = relation
            .targets
            .iter()
            .filter_map(|name| schema.object(name))
            .collect();
        Self { schema, candidates }
    }

    /// Schema the scope was built from.
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    /// Every type in scope.
    pub fn candidates(&self) -> &[&'s ObjectType] {
        &self.candidates
    }

    /// Distinct tables behind the candidate types.
    pub fn tables(&self) -> Vec<&'s str> {
        let mut out: Vec<&'s str> = Vec::with_capacity(self.candidates.len());
        for obj in &self.candidates {
            if !out.contains(&obj.table.as_str()) {
                out.push(obj.table.as_str());
            }
        }
        out
    }

    /// Spans more than one table.
    pub fn is_heterogeneous(&self) -> bool {
        self.tables().len() > 1
    }

    /// Narrows the scope by an optional `on Type` constraint.
    ///
    /// Checks, in order: the type exists, it is neither a leaf nor abstract,
    /// and it is one of the types in scope.
    pub fn narrow(&self, constraint: Option<&str>) -> Result<Vec<&'s ObjectType>, ValidationError> {
        let Some(name) = constraint else {
            return Ok(self.candidates.clone());
        };
        match self.schema.type_def(name) {
            None => Err(ValidationError::UnknownType {
                name: name.to_string(),
            }),
            Some(TypeDef::Scalar(_)) => Err(ValidationError::LeafTypeConstraint {
                name: name.to_string(),
            }),
            Some(TypeDef::Interface(_)) => Err(ValidationError::AbstractTypeConstraint {
                name: name.to_string(),
            }),
            Some(TypeDef::Object(obj)) => {
                match self.candidates.iter().find(|c| c.name == obj.name) {
                    Some(found) => Ok(vec![*found]),
                    None => Err(ValidationError::ConstraintOutOfScope {
                        name: name.to_string(),
                        expected: self.candidate_names(),
                    }),
                }
            }
        }
    }

    /// `(type, field)` pairs for every narrowed type declaring `field`.
    pub fn owners(
        types: &[&'s ObjectType],
        field: &str,
    ) -> Vec<(&'s ObjectType, &'s FieldDef)> {
        types
            .iter()
            .copied()
            .filter_map(|obj| obj.field(field).map(|def| (obj, def)))
            .collect()
    }

    /// Candidate type names joined for diagnostics.
    pub fn candidate_names(&self) -> String {
        join_names(&self.candidates)
    }
}

pub(crate) fn join_names(types: &[&ObjectType]) -> String {
    types
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join("|")
}
