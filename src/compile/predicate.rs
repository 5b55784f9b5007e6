//! Filter AST to relational predicate.
//!
//! Negation is pushed down to the leaves instead of emitted as `NOT (...)`:
//! the compiler carries a parity counter, and while it is odd every
//! connective and operator is replaced by its dual. A doubly negated subtree
//! therefore compiles exactly like the original.

use tracing::trace;

use crate::error::CompileError;
use crate::expr::{ComparisonOp, Connective, ExpressionNode, FieldPath, Literal};
use crate::schema::{FieldKind, ObjectType};
use crate::sql::{CompareOp, Param, ParamSet, SqlExpr};

/// Logical domain a subtree is compiled in.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Domain {
    /// As written.
    #[default]
    Normal,
    /// Under an odd number of negations.
    Negated,
}

impl Domain {
    fn from_parity(negations: u32) -> Self {
        if negations % 2 == 0 {
            Domain::Normal
        } else {
            Domain::Negated
        }
    }

    fn parity(self) -> u32 {
        match self {
            Domain::Normal => 0,
            Domain::Negated => 1,
        }
    }
}

/// Compiles filters for one table of the scope.
///
/// For a heterogeneous relation one compiler is built per target type; a
/// comparison on a field the type does not declare, or constrained to another
/// type, becomes a constant (`FALSE` in the normal domain, `TRUE` negated).
pub struct PredicateCompiler<'a> {
    target: &'a ObjectType,
    alias: &'a str,
    params: &'a mut ParamSet,
}

impl<'a> PredicateCompiler<'a> {
    /// Compiler for rows of `target` read through `alias`, binding values
    /// into `params`.
    pub fn new(target: &'a ObjectType, alias: &'a str, params: &'a mut ParamSet) -> Self {
        Self {
            target,
            alias,
            params,
        }
    }

    /// Compiles `ast` in `domain`. No AST means no predicate.
    pub fn compile(
        &mut self,
        ast: Option<&ExpressionNode>,
        domain: Domain,
    ) -> Result<Option<SqlExpr>, CompileError> {
        let Some(ast) = ast else {
            return Ok(None);
        };
        trace!(
            table = self.target.table.as_str(),
            ?domain,
            "compile.predicate"
        );
        self.node(ast, domain.parity()).map(Some)
    }

    fn node(&mut self, node: &ExpressionNode, negations: u32) -> Result<SqlExpr, CompileError> {
        match node {
            ExpressionNode::Connective { op, left, right } => {
                let op = match Domain::from_parity(negations) {
                    Domain::Normal => *op,
                    Domain::Negated => op.dual(),
                };
                let left = self.node(left, negations)?;
                let right = self.node(right, negations)?;
                Ok(join(op, left, right))
            }
            ExpressionNode::Negation { operand } => self.node(operand, negations + 1),
            ExpressionNode::Comparison { op, left, right } => {
                self.comparison(*op, left, right, Domain::from_parity(negations))
            }
            other => Err(CompileError::UnsupportedNode {
                kind: other.kind(),
                context: "filter",
            }),
        }
    }

    fn comparison(
        &mut self,
        op: ComparisonOp,
        left: &ExpressionNode,
        right: &ExpressionNode,
        domain: Domain,
    ) -> Result<SqlExpr, CompileError> {
        let (path, operand, op) = match (left, right) {
            (ExpressionNode::FieldPath(_), ExpressionNode::FieldPath(_)) => {
                return Err(CompileError::InvalidOperand("both operands are fields"))
            }
            (ExpressionNode::FieldPath(path), operand) => (path, operand, op),
            (operand, ExpressionNode::FieldPath(path)) => (path, operand, op.mirrored()),
            _ => return Err(CompileError::InvalidOperand("no field operand")),
        };

        let Some(column) = self.column_for(path)? else {
            return Ok(SqlExpr::Const(domain == Domain::Negated));
        };
        let semantic = format!("{}.{}", self.target.table, column);
        let column = SqlExpr::column(self.alias, &column);

        match operand {
            ExpressionNode::Literal(Literal::Null) => {
                let is_null = match op {
                    ComparisonOp::Eq => true,
                    ComparisonOp::Neq => false,
                    _ => {
                        return Err(CompileError::InvalidOperand(
                            "null operand requires = or !=",
                        ))
                    }
                };
                let is_null = is_null == (domain == Domain::Normal);
                Ok(if is_null {
                    SqlExpr::is_null(column)
                } else {
                    SqlExpr::is_not_null(column)
                })
            }
            ExpressionNode::Literal(literal) => {
                let cmp = match (op, domain) {
                    (ComparisonOp::Eq, Domain::Normal) | (ComparisonOp::Neq, Domain::Negated) => {
                        CompareOp::Eq
                    }
                    (ComparisonOp::Neq, Domain::Normal) | (ComparisonOp::Eq, Domain::Negated) => {
                        CompareOp::Neq
                    }
                    (ComparisonOp::Lt, Domain::Normal) | (ComparisonOp::Gte, Domain::Negated) => {
                        CompareOp::Lt
                    }
                    (ComparisonOp::Gte, Domain::Normal) | (ComparisonOp::Lt, Domain::Negated) => {
                        CompareOp::Gte
                    }
                    (ComparisonOp::Gt, Domain::Normal) | (ComparisonOp::Lte, Domain::Negated) => {
                        CompareOp::Gt
                    }
                    (ComparisonOp::Lte, Domain::Normal) | (ComparisonOp::Gt, Domain::Negated) => {
                        CompareOp::Lte
                    }
                    (ComparisonOp::In, _) => {
                        return Err(CompileError::InvalidOperand("in requires a list"))
                    }
                };
                let param = Param::from_literal(literal)
                    .ok_or(CompileError::InvalidOperand("literal cannot be bound"))?;
                let name = self.params.bind(&semantic, param)?;
                Ok(SqlExpr::compare(cmp, column, SqlExpr::Param(name)))
            }
            ExpressionNode::ListLiteral(items) if op == ComparisonOp::In => {
                let param = Param::from_literals(items)
                    .ok_or(CompileError::InvalidOperand("list items must share one type"))?;
                let name = self.params.bind(&semantic, param)?;
                Ok(SqlExpr::InList {
                    expr: Box::new(column),
                    items: vec![SqlExpr::Param(name)],
                    negated: domain == Domain::Negated,
                })
            }
            ExpressionNode::ListLiteral(_) => Err(CompileError::InvalidOperand(
                "list operand requires in",
            )),
            other => Err(CompileError::UnsupportedNode {
                kind: other.kind(),
                context: "comparison operand",
            }),
        }
    }

    /// Column backing `path` on this compiler's type, or `None` when the
    /// comparison does not apply to it.
    fn column_for(&self, path: &FieldPath) -> Result<Option<String>, CompileError> {
        let Some(field) = path.single() else {
            return Err(CompileError::InvalidOperand("nested field path"));
        };
        if let Some(constraint) = &path.constraint {
            if *constraint != self.target.name {
                return Ok(None);
            }
        }
        match self.target.field(field).map(|def| &def.kind) {
            None => Ok(None),
            Some(FieldKind::Scalar { column, .. }) => Ok(Some(column.clone())),
            Some(FieldKind::Relation(_)) => {
                Err(CompileError::InvalidOperand("relation fields are not comparable"))
            }
        }
    }
}

/// Joins two compiled operands, flattening runs of the same connective.
fn join(op: Connective, left: SqlExpr, right: SqlExpr) -> SqlExpr {
    let mut items = Vec::new();
    for side in [left, right] {
        match (op, side) {
            (Connective::And, SqlExpr::And(inner)) | (Connective::Or, SqlExpr::Or(inner)) => {
                items.extend(inner)
            }
            (_, other) => items.push(other),
        }
    }
    match op {
        Connective::And => SqlExpr::And(items),
        Connective::Or => SqlExpr::Or(items),
    }
}
