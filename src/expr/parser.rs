//! Recursive-descent parser for filter and order expressions.
//!
//! ```text
//! filter     := or
//! or         := and ("or" and)*
//! and        := unary ("and" unary)*
//! unary      := "not" unary | "(" or ")" | comparison
//! comparison := operand op operand | operand "in" list
//! operand    := path | literal
//! path       := ident ("." ident)* ("on" Type)?
//! order      := item ("," item)*
//! item       := ident ("." ident)* ("on" Type)? direction?
//! ```

use std::ops::Range;

use logos::Logos;

use super::ast::{ComparisonOp, Direction, ExpressionNode, FieldPath, Literal, OrderItem};
use super::lexer::{unquote, Token};
use crate::error::SyntaxError;

/// Turns expression text into an [`ExpressionNode`].
///
/// Blank input means "no expression" and yields `Ok(None)`, which is distinct
/// from an expression that was rejected.
pub trait ExpressionParser: Send + Sync {
    /// Parses a filter argument.
    fn parse_filter(&self, text: &str) -> Result<Option<ExpressionNode>, SyntaxError>;

    /// Parses an order argument into an [`ExpressionNode::OrderList`].
    fn parse_order(&self, text: &str) -> Result<Option<ExpressionNode>, SyntaxError>;
}

/// Parser for the built-in expression grammar.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultParser;

impl ExpressionParser for DefaultParser {
    fn parse_filter(&self, text: &str) -> Result<Option<ExpressionNode>, SyntaxError> {
        let mut parser = Parser::new(text)?;
        if parser.at_end() {
            return Ok(None);
        }
        let node = parser.parse_or()?;
        parser.expect_end()?;
        Ok(Some(node))
    }

    fn parse_order(&self, text: &str) -> Result<Option<ExpressionNode>, SyntaxError> {
        let mut parser = Parser::new(text)?;
        if parser.at_end() {
            return Ok(None);
        }
        let mut items = vec![parser.parse_order_item()?];
        while parser.eat(&Token::Comma) {
            items.push(parser.parse_order_item()?);
        }
        parser.expect_end()?;
        Ok(Some(ExpressionNode::OrderList(items)))
    }
}

struct Parser<'src> {
    tokens: Vec<(Token<'src>, Range<usize>)>,
    pos: usize,
    len: usize,
}

impl<'src> Parser<'src> {
    fn new(input: &'src str) -> Result<Self, SyntaxError> {
        let mut tokens = Vec::new();
        for (result, span) in Token::lexer(input).spanned() {
            match result {
                Ok(token) => tokens.push((token, span)),
                Err(_) => {
                    return Err(SyntaxError::new(
                        span.start,
                        format!("unexpected character {:?}", &input[span]),
                    ));
                }
            }
        }
        Ok(Self {
            tokens,
            pos: 0,
            len: input.len(),
        })
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token<'src>> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, span)| span.start)
            .unwrap_or(self.len)
    }

    fn bump(&mut self) -> Option<Token<'src>> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token<'_>) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, expected: &str) -> SyntaxError {
        let found = match self.peek() {
            Some(token) => token.describe(),
            None => "end of input".to_string(),
        };
        SyntaxError::new(self.offset(), format!("expected {expected}, found {found}"))
    }

    fn expect(&mut self, expected: &Token<'_>, what: &str) -> Result<(), SyntaxError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(what))
        }
    }

    fn expect_end(&self) -> Result<(), SyntaxError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("end of input"))
        }
    }

    fn parse_or(&mut self) -> Result<ExpressionNode, SyntaxError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = ExpressionNode::or(left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<ExpressionNode, SyntaxError> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::And) {
            let right = self.parse_unary()?;
            left = ExpressionNode::and(left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<ExpressionNode, SyntaxError> {
        if self.eat(&Token::Not) {
            return Ok(ExpressionNode::not(self.parse_unary()?));
        }
        if self.eat(&Token::LParen) {
            let inner = self.parse_or()?;
            self.expect(&Token::RParen, "')'")?;
            return Ok(inner);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<ExpressionNode, SyntaxError> {
        let left = self.parse_operand()?;
        let op = match self.peek() {
            Some(Token::Eq) => ComparisonOp::Eq,
            Some(Token::Neq) => ComparisonOp::Neq,
            Some(Token::Lt) => ComparisonOp::Lt,
            Some(Token::Gt) => ComparisonOp::Gt,
            Some(Token::Lte) => ComparisonOp::Lte,
            Some(Token::Gte) => ComparisonOp::Gte,
            Some(Token::In) => ComparisonOp::In,
            _ => return Err(self.error("comparison operator")),
        };
        self.pos += 1;
        let right = if op == ComparisonOp::In {
            self.parse_list()?
        } else {
            self.parse_operand()?
        };
        Ok(ExpressionNode::compare(op, left, right))
    }

    fn parse_operand(&mut self) -> Result<ExpressionNode, SyntaxError> {
        if let Some(Token::Ident(_)) = self.peek() {
            let mut path = self.parse_segments()?;
            if self.eat(&Token::On) {
                path.constraint = Some(self.parse_type_name()?);
            }
            return Ok(ExpressionNode::FieldPath(path));
        }
        match self.parse_literal()? {
            Some(lit) => Ok(ExpressionNode::Literal(lit)),
            None => Err(self.error("field or literal")),
        }
    }

    fn parse_literal(&mut self) -> Result<Option<Literal>, SyntaxError> {
        let offset = self.offset();
        let literal = match self.peek() {
            Some(Token::Null) => Literal::Null,
            Some(Token::True) => Literal::Bool(true),
            Some(Token::False) => Literal::Bool(false),
            Some(Token::Int(raw)) => match raw.parse::<i64>() {
                Ok(v) => Literal::Int(v),
                Err(_) => {
                    return Err(SyntaxError::new(offset, "integer literal out of range"));
                }
            },
            Some(Token::Float(raw)) => match raw.parse::<f64>() {
                Ok(v) => Literal::Float(v),
                Err(_) => return Err(SyntaxError::new(offset, "invalid float literal")),
            },
            Some(Token::Quoted(raw)) => Literal::String(unquote(raw)),
            _ => return Ok(None),
        };
        self.pos += 1;
        Ok(Some(literal))
    }

    fn parse_list(&mut self) -> Result<ExpressionNode, SyntaxError> {
        self.expect(&Token::LBracket, "'['")?;
        let mut items = Vec::new();
        if !self.eat(&Token::RBracket) {
            loop {
                match self.parse_literal()? {
                    Some(lit) => items.push(lit),
                    None => return Err(self.error("literal")),
                }
                if self.eat(&Token::RBracket) {
                    break;
                }
                self.expect(&Token::Comma, "',' or ']'")?;
            }
        }
        Ok(ExpressionNode::ListLiteral(items))
    }

    fn parse_segments(&mut self) -> Result<FieldPath, SyntaxError> {
        let mut segments = vec![self.parse_ident("field name")?];
        while self.eat(&Token::Dot) {
            segments.push(self.parse_ident("field name")?);
        }
        Ok(FieldPath {
            segments,
            constraint: None,
        })
    }

    fn parse_ident(&mut self, what: &str) -> Result<String, SyntaxError> {
        match self.peek() {
            Some(Token::Ident(name)) => {
                let name = (*name).to_string();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error(what)),
        }
    }

    fn parse_type_name(&mut self) -> Result<String, SyntaxError> {
        self.parse_ident("type name")
    }

    fn parse_order_item(&mut self) -> Result<OrderItem, SyntaxError> {
        let path = self.parse_segments()?;
        let constraint = if self.eat(&Token::On) {
            Some(self.parse_type_name()?)
        } else {
            None
        };
        let direction = match self.peek() {
            Some(Token::Asc) => Direction::Ascending,
            Some(Token::Desc) => Direction::Descending,
            _ => {
                return Ok(OrderItem {
                    path,
                    constraint,
                    direction: Direction::Ascending,
                })
            }
        };
        self.bump();
        Ok(OrderItem {
            path,
            constraint,
            direction,
        })
    }
}
