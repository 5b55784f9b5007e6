//! Node taxonomy produced by expression parsers.
//!
//! Filter and order arguments both parse into [`ExpressionNode`]. The tree is
//! plain data; all schema-aware checks live in `compile`.

use std::fmt;

/// Boolean connective joining two sub-expressions.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Connective {
    /// Both operands must hold.
    And,
    /// At least one operand must hold.
    Or,
}

impl Connective {
    /// Connective that takes this one's place under negation.
    pub fn dual(self) -> Self {
        match self {
            Connective::And => Connective::Or,
            Connective::Or => Connective::And,
        }
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ComparisonOp {
    /// `=`
    Eq,
    /// `!=` / `not_equals`
    Neq,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `>=`
    Gte,
    /// `in [...]`
    In,
}

impl ComparisonOp {
    /// Operator equivalent to this one when its operands are swapped.
    pub fn mirrored(self) -> Self {
        match self {
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Lte => ComparisonOp::Gte,
            ComparisonOp::Gte => ComparisonOp::Lte,
            other => other,
        }
    }

    /// Token used when printing the operator.
    pub fn symbol(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "!=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gte => ">=",
            ComparisonOp::In => "in",
        }
    }
}

/// Reference to a field, optionally narrowed to one type with `on Type`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldPath {
    /// Dot-separated segments. Only single-segment paths pass validation.
    pub segments: Vec<String>,
    /// Type the path is narrowed to.
    pub constraint: Option<String>,
}

impl FieldPath {
    /// Single-segment path without constraint.
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            segments: vec![field.into()],
            constraint: None,
        }
    }

    /// Same path narrowed to `ty`.
    pub fn on(mut self, ty: impl Into<String>) -> Self {
        self.constraint = Some(ty.into());
        self
    }

    /// Dotted rendering of the segments.
    pub fn dotted(&self) -> String {
        self.segments.join(".")
    }

    /// The field name if the path has exactly one segment.
    pub fn single(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }
}

/// Scalar literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    /// `null`
    Null,
    /// `true` / `false`
    Bool(bool),
    /// Integer literal.
    Int(i64),
    /// Float literal.
    Float(f64),
    /// Backtick-quoted string.
    String(String),
}

impl Literal {
    /// Kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::Bool(_) => "boolean",
            Literal::Int(_) => "int",
            Literal::Float(_) => "float",
            Literal::String(_) => "string",
        }
    }
}

/// Sort direction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Direction {
    /// Smallest first.
    #[default]
    Ascending,
    /// Largest first.
    Descending,
}

impl Direction {
    /// Normalizes `asc`/`ascending`/`desc`/`descending`, ignoring ASCII case.
    pub fn parse(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("asc") || token.eq_ignore_ascii_case("ascending") {
            Some(Direction::Ascending)
        } else if token.eq_ignore_ascii_case("desc") || token.eq_ignore_ascii_case("descending")
        {
            Some(Direction::Descending)
        } else {
            None
        }
    }

    /// SQL keyword.
    pub fn sql(self) -> &'static str {
        match self {
            Direction::Ascending => "ASC",
            Direction::Descending => "DESC",
        }
    }
}

/// One entry of an order expression.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct OrderItem {
    /// Field to sort by.
    pub path: FieldPath,
    /// Type the item applies to; absent means every candidate type.
    pub constraint: Option<String>,
    /// Sort direction.
    pub direction: Direction,
}

impl OrderItem {
    /// Ascending item on a single field.
    pub fn new(field: impl Into<String>, direction: Direction) -> Self {
        Self {
            path: FieldPath::new(field),
            constraint: None,
            direction,
        }
    }

    /// Same item narrowed to `ty`.
    pub fn on(mut self, ty: impl Into<String>) -> Self {
        self.constraint = Some(ty.into());
        self
    }

    /// Item constraint, falling back to one written on the path itself.
    pub fn effective_constraint(&self) -> Option<&str> {
        self.constraint
            .as_deref()
            .or(self.path.constraint.as_deref())
    }
}

/// Parsed filter or order expression.
#[derive(Clone, Debug, PartialEq)]
pub enum ExpressionNode {
    /// `left and right` / `left or right`
    Connective {
        /// Connective kind.
        op: Connective,
        /// Left operand.
        left: Box<ExpressionNode>,
        /// Right operand.
        right: Box<ExpressionNode>,
    },
    /// `not operand`
    Negation {
        /// Negated expression.
        operand: Box<ExpressionNode>,
    },
    /// `left op right`
    Comparison {
        /// Operator.
        op: ComparisonOp,
        /// Left operand.
        left: Box<ExpressionNode>,
        /// Right operand.
        right: Box<ExpressionNode>,
    },
    /// Field reference.
    FieldPath(FieldPath),
    /// Scalar literal.
    Literal(Literal),
    /// `[a, b, c]`, only meaningful as the right side of `in`.
    ListLiteral(Vec<Literal>),
    /// One order entry.
    OrderItem(OrderItem),
    /// Comma-separated order entries.
    OrderList(Vec<OrderItem>),
}

impl ExpressionNode {
    /// `left and right`
    pub fn and(left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Connective {
            op: Connective::And,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `left or right`
    pub fn or(left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Connective {
            op: Connective::Or,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `not operand`
    pub fn not(operand: ExpressionNode) -> Self {
        ExpressionNode::Negation {
            operand: Box::new(operand),
        }
    }

    /// `left op right`
    pub fn compare(op: ComparisonOp, left: ExpressionNode, right: ExpressionNode) -> Self {
        ExpressionNode::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `field op literal` on a single-segment field.
    pub fn field_cmp(field: &str, op: ComparisonOp, literal: Literal) -> Self {
        Self::compare(
            op,
            ExpressionNode::FieldPath(FieldPath::new(field)),
            ExpressionNode::Literal(literal),
        )
    }

    /// Node kind name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            ExpressionNode::Connective { .. } => "connective",
            ExpressionNode::Negation { .. } => "negation",
            ExpressionNode::Comparison { .. } => "comparison",
            ExpressionNode::FieldPath(_) => "field path",
            ExpressionNode::Literal(_) => "literal",
            ExpressionNode::ListLiteral(_) => "list literal",
            ExpressionNode::OrderItem(_) => "order item",
            ExpressionNode::OrderList(_) => "order list",
        }
    }

    /// Nesting depth; leaves count as 1.
    pub fn depth(&self) -> usize {
        match self {
            ExpressionNode::Connective { left, right, .. }
            | ExpressionNode::Comparison { left, right, .. } => {
                1 + left.depth().max(right.depth())
            }
            ExpressionNode::Negation { operand } => 1 + operand.depth(),
            _ => 1,
        }
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, path: &FieldPath) -> fmt::Result {
    f.write_str(&path.dotted())?;
    if let Some(ty) = &path.constraint {
        write!(f, " on {ty}")?;
    }
    Ok(())
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("null"),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{v:.1}"),
            Literal::Float(v) => write!(f, "{v}"),
            Literal::String(v) => write!(f, "`{}`", v.replace('`', "``")),
        }
    }
}

impl fmt::Display for OrderItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_path(f, &self.path)?;
        if let Some(ty) = &self.constraint {
            write!(f, " on {ty}")?;
        }
        match self.direction {
            Direction::Ascending => f.write_str(" ascending"),
            Direction::Descending => f.write_str(" descending"),
        }
    }
}

/// Prints the canonical, fully parenthesized form, which parses back to the
/// same tree.
impl fmt::Display for ExpressionNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionNode::Connective { op, left, right } => {
                let word = match op {
                    Connective::And => "and",
                    Connective::Or => "or",
                };
                write!(f, "({left} {word} {right})")
            }
            ExpressionNode::Negation { operand } => write!(f, "not {operand}"),
            ExpressionNode::Comparison { op, left, right } => {
                write!(f, "{left} {} {right}", op.symbol())
            }
            ExpressionNode::FieldPath(path) => write_path(f, path),
            ExpressionNode::Literal(lit) => write!(f, "{lit}"),
            ExpressionNode::ListLiteral(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            ExpressionNode::OrderItem(item) => write!(f, "{item}"),
            ExpressionNode::OrderList(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            }
        }
    }
}
