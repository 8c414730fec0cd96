//! Precedence-climbing parser.
//!
//! After a binary operator, the right side is parsed with a threshold of the
//! operator's precedence plus one for left-associative operators (so equal
//! precedence operators nest to the left) or the same precedence for
//! right-associative ones. A prefix operator in operand position parses its
//! operand with the same threshold it would use for a right side.

use std::fmt;

use crate::error::{QueryError, QueryErrorKind};

use super::tokens::{decode_expression, decoded_column, encode_expression, tokenize, Associativity, Syntax, Token};

/// A parsed expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression<Op> {
    Operand(Token<Op>),
    Prefix {
        operator: Token<Op>,
        operand: Box<Expression<Op>>,
    },
    Operation {
        left: Box<Expression<Op>>,
        operator: Token<Op>,
        right: Box<Expression<Op>>,
    },
}

impl<Op: Copy + PartialEq> Expression<Op> {
    /// The byte range of the expression in the encoded text.
    pub fn span(&self) -> (usize, usize) {
        (self.first_token().offset, self.last_token().end())
    }

    fn first_token(&self) -> &Token<Op> {
        match self {
            Expression::Operand(token) => token,
            Expression::Prefix { operator, .. } => operator,
            Expression::Operation { left, .. } => left.first_token(),
        }
    }

    fn last_token(&self) -> &Token<Op> {
        match self {
            Expression::Operand(token) => token,
            Expression::Prefix { operand, .. } => operand.last_token(),
            Expression::Operation { right, .. } => right.last_token(),
        }
    }

    /// The operand token, if this is a plain operand.
    pub fn as_operand(&self) -> Option<&Token<Op>> {
        match self {
            Expression::Operand(token) => Some(token),
            _ => None,
        }
    }

    /// Whether this is a binary operation with one of the operators.
    pub fn is_operation(&self, operators: &[Op]) -> bool {
        match self {
            Expression::Operation { operator, .. } => operator
                .operator
                .is_some_and(|operator| operators.contains(&operator.id)),
            _ => false,
        }
    }
}

/// Fully parenthesized rendering, for inspecting the tree shape.
impl<Op> fmt::Display for Expression<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Operand(token) => write!(f, "{token}"),
            Expression::Prefix { operator, operand } => write!(f, "({operator}{operand})"),
            Expression::Operation { left, operator, right } => write!(f, "({left} {operator} {right})"),
        }
    }
}

/// A parsed expression together with the encoded text it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<Op> {
    pub encoded: String,
    pub expression: Expression<Op>,
}

/// Encode, tokenize and parse an expression text.
pub fn parse_expression<Op: Copy + PartialEq>(text: &str, syntax: &Syntax<Op>) -> Result<Parsed<Op>, QueryError> {
    let encoded = encode_expression(text);
    let tokens = tokenize(&encoded, syntax)?;
    let mut parser = Parser {
        encoded: &encoded,
        tokens: &tokens,
        position: 0,
    };
    let expression = parser.expression(0)?;
    if let Some(token) = tokens.get(parser.position) {
        return Err(parser.error(QueryErrorKind::ExpectedOperator, "expected: operator", token.offset));
    }
    Ok(Parsed { encoded, expression })
}

fn right_threshold(precedence: u8, associativity: Associativity) -> u8 {
    match associativity {
        Associativity::Left => precedence + 1,
        Associativity::Right => precedence,
    }
}

struct Parser<'a, Op> {
    encoded: &'a str,
    tokens: &'a [Token<Op>],
    position: usize,
}

impl<Op: Copy + PartialEq> Parser<'_, Op> {
    fn expression(&mut self, threshold: u8) -> Result<Expression<Op>, QueryError> {
        let tokens = self.tokens;
        let mut left = self.primary()?;
        while let Some(token) = tokens.get(self.position) {
            let Some(operator) = token.operator else {
                // Two operands in a row; the caller reports the leftover.
                break;
            };
            if operator.precedence < threshold {
                break;
            }
            self.position += 1;
            let right = self.expression(right_threshold(operator.precedence, operator.associativity))?;
            left = Expression::Operation {
                left: Box::new(left),
                operator: token.clone(),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn primary(&mut self) -> Result<Expression<Op>, QueryError> {
        let tokens = self.tokens;
        let Some(token) = tokens.get(self.position) else {
            return Err(self.error(QueryErrorKind::ExpectedOperand, "expected: operand", self.encoded.len()));
        };
        match token.operator {
            None => {
                self.position += 1;
                Ok(Expression::Operand(token.clone()))
            }
            Some(operator) if operator.is_prefix => {
                self.position += 1;
                let operand = self.expression(right_threshold(operator.precedence, operator.associativity))?;
                Ok(Expression::Prefix {
                    operator: token.clone(),
                    operand: Box::new(operand),
                })
            }
            Some(_) => Err(self.error(QueryErrorKind::ExpectedOperand, "expected: operand", token.offset)),
        }
    }

    fn error(&self, kind: QueryErrorKind, message: &str, offset: usize) -> QueryError {
        QueryError::new(
            kind,
            format!(
                "{message}\nin: {}\nat: {}▲",
                decode_expression(self.encoded),
                " ".repeat(decoded_column(self.encoded, offset))
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::tokens::Operator;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Minus,
    }

    #[test]
    fn test_prefix_binds_its_operand_only() {
        let syntax = Syntax::new(r"\s+", r"\w+", vec![Operator::left(Op::Minus, "-", 1).prefix()]).unwrap();
        let parsed = parse_expression("- a - b", &syntax).unwrap();
        assert_eq!(parsed.expression.to_string(), "((-a) - b)");
        assert_eq!(parsed.expression.span(), (0, 7));
    }
}
