//! Filter validation.
//!
//! Runs before compilation so that an invalid filter never reaches the
//! database. Node kinds that can only come from a mismatched parser are
//! reported as compiler errors; everything else is a validation error.

use super::scope::{join_names, TypeScope};
use crate::config::Limits;
use crate::error::{CompileError, Error, ValidationError};
use crate::expr::{ComparisonOp, ExpressionNode, FieldPath, Literal};
use crate::schema::{FieldKind, ScalarType};

/// Checks a filter against the types in `scope`.
pub fn validate_filter(
    ast: Option<&ExpressionNode>,
    scope: &TypeScope<'_>,
    limits: &Limits,
) -> Result<(), Error> {
    let Some(ast) = ast else {
        return Ok(());
    };
    let depth = ast.depth();
    if depth > limits.max_predicate_depth {
        return Err(ValidationError::PredicateTooDeep {
            depth,
            max: limits.max_predicate_depth,
        }
        .into());
    }
    validate_node(ast, scope, limits)
}

fn validate_node(
    node: &ExpressionNode,
    scope: &TypeScope<'_>,
    limits: &Limits,
) -> Result<(), Error> {
    match node {
        ExpressionNode::Connective { left, right, .. } => {
            validate_node(left, scope, limits)?;
            validate_node(right, scope, limits)
        }
        ExpressionNode::Negation { operand } => validate_node(operand, scope, limits),
        ExpressionNode::Comparison { op, left, right } => {
            validate_comparison(*op, left, right, scope, limits)
        }
        ExpressionNode::FieldPath(_)
        | ExpressionNode::Literal(_)
        | ExpressionNode::ListLiteral(_) => Err(ValidationError::UnexpectedExpression {
            found: node.kind(),
            context: "filter",
        }
        .into()),
        ExpressionNode::OrderItem(_) | ExpressionNode::OrderList(_) => {
            Err(CompileError::UnsupportedNode {
                kind: node.kind(),
                context: "filter",
            }
            .into())
        }
    }
}

fn validate_comparison(
    op: ComparisonOp,
    left: &ExpressionNode,
    right: &ExpressionNode,
    scope: &TypeScope<'_>,
    limits: &Limits,
) -> Result<(), Error> {
    let (path, operand) = match (left, right) {
        (ExpressionNode::FieldPath(path), other) | (other, ExpressionNode::FieldPath(path)) => {
            if let ExpressionNode::FieldPath(_) = other {
                return Err(ValidationError::UnexpectedExpression {
                    found: "field path",
                    context: "comparison operand; one side must be a literal",
                }
                .into());
            }
            (path, other)
        }
        _ => {
            return Err(ValidationError::UnexpectedExpression {
                found: "literal",
                context: "comparison without a field",
            }
            .into())
        }
    };
    let types = check_path(path, scope)?;

    match (op, operand) {
        (ComparisonOp::In, ExpressionNode::ListLiteral(items)) => {
            if items.is_empty() {
                return Err(ValidationError::InListEmpty.into());
            }
            if items.len() > limits.max_in_list {
                return Err(ValidationError::InListTooLarge {
                    count: items.len(),
                    max: limits.max_in_list,
                }
                .into());
            }
            for item in items {
                if matches!(item, Literal::Null) {
                    return Err(ValidationError::NullNotAllowed { context: "in list" }.into());
                }
                check_literal(path, &types, item)?;
            }
            Ok(())
        }
        (ComparisonOp::In, other) => Err(ValidationError::UnexpectedExpression {
            found: other.kind(),
            context: "in; expected a list",
        }
        .into()),
        (_, ExpressionNode::ListLiteral(_)) => Err(ValidationError::UnexpectedExpression {
            found: "list literal",
            context: "comparison; lists are only valid with in",
        }
        .into()),
        (ComparisonOp::Eq | ComparisonOp::Neq, ExpressionNode::Literal(Literal::Null)) => Ok(()),
        (_, ExpressionNode::Literal(Literal::Null)) => Err(ValidationError::NullNotAllowed {
            context: "ordering comparison",
        }
        .into()),
        (_, ExpressionNode::Literal(literal)) => check_literal(path, &types, literal),
        (_, other) => Err(ValidationError::UnexpectedExpression {
            found: other.kind(),
            context: "comparison operand",
        }
        .into()),
    }
}

/// Resolves a filter path to the scalar types of every type declaring it.
fn check_path(path: &FieldPath, scope: &TypeScope<'_>) -> Result<Vec<ScalarType>, Error> {
    let Some(field) = path.single() else {
        return Err(ValidationError::NestedFieldNotSupported {
            path: path.dotted(),
        }
        .into());
    };
    let narrowed = scope.narrow(path.constraint.as_deref())?;
    let owners = TypeScope::owners(&narrowed, field);
    if owners.is_empty() {
        return Err(ValidationError::UnknownField {
            field: field.to_string(),
            types: join_names(&narrowed),
        }
        .into());
    }
    let mut types = Vec::with_capacity(owners.len());
    for (_, def) in owners {
        match &def.kind {
            FieldKind::Scalar { ty, .. } => types.push(*ty),
            FieldKind::Relation(_) => {
                return Err(ValidationError::FieldNotFilterable {
                    field: field.to_string(),
                    ty: def.type_name(),
                }
                .into())
            }
        }
    }
    Ok(types)
}

fn check_literal(path: &FieldPath, types: &[ScalarType], literal: &Literal) -> Result<(), Error> {
    for ty in types {
        if !ty.accepts(literal) {
            return Err(ValidationError::TypeMismatch {
                field: path.dotted(),
                expected: ty.name(),
                found: literal.kind(),
            }
            .into());
        }
    }
    Ok(())
}
