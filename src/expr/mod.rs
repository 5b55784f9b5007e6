//! Filter/order expression language.

pub mod ast;
mod lexer;
pub mod parser;

pub use ast::{
    ComparisonOp, Connective, Direction, ExpressionNode, FieldPath, Literal, OrderItem,
};
pub use parser::{DefaultParser, ExpressionParser};
