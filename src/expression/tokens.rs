//! Expression encoding and tokenizing.
//!
//! Names may contain reserved characters if they are escaped with `\`.
//! Before tokenizing, [`encode_expression`] replaces every escaped character
//! by hex markers, so the tokenizer patterns never see a reserved character
//! inside a name:
//!
//! ```text
//!   a\ b_c   ──encode──►   a_5C_20b_5Fc   ──decode──►   a\ b_c
//! ```
//!
//! An escaped character becomes `_5C` (the backslash) followed by `_XX` (the
//! character's code); a literal `_` becomes `_5F`. Only ASCII
//! non-alphanumeric characters can be escaped; any other backslash is kept
//! as is. Since every `_` in the encoded text starts a marker, decoding is
//! the exact inverse of encoding.

use std::fmt;

use regex::Regex;

use crate::error::{QueryError, QueryErrorKind};

/// Whether a character can follow a `\` escape: ASCII punctuation and ASCII
/// whitespace.
pub fn is_escapable(character: char) -> bool {
    character.is_ascii()
        && !character.is_ascii_alphanumeric()
        && (!character.is_ascii_control() || character.is_ascii_whitespace())
}

fn push_marker(encoded: &mut String, character: char) {
    encoded.push_str(&format!("_{:02X}", character as u32));
}

/// Replace escaped characters (and literal `_`) by hex markers.
pub fn encode_expression(text: &str) -> String {
    let mut encoded = String::with_capacity(text.len());
    let mut characters = text.chars().peekable();
    while let Some(character) = characters.next() {
        match character {
            '\\' => match characters.peek() {
                Some(&next) if is_escapable(next) => {
                    characters.next();
                    push_marker(&mut encoded, '\\');
                    push_marker(&mut encoded, next);
                }
                _ => encoded.push('\\'),
            },
            '_' => push_marker(&mut encoded, '_'),
            other => encoded.push(other),
        }
    }
    encoded
}

/// Replace hex markers by the characters they stand for.
pub fn decode_expression(encoded: &str) -> String {
    let mut decoded = String::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(character) = rest.chars().next() {
        if let Some((marked, length)) = marker_at(rest) {
            decoded.push(marked);
            rest = &rest[length..];
        } else {
            decoded.push(character);
            rest = &rest[character.len_utf8()..];
        }
    }
    decoded
}

/// The character of a `_XX` marker at the start of the text.
fn marker_at(text: &str) -> Option<(char, usize)> {
    let digits = text.strip_prefix('_')?.get(..2)?;
    if !digits.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    let code = u8::from_str_radix(digits, 16).ok()?;
    Some((char::from(code), 3))
}

/// Remove the `\` in front of escaped characters.
pub fn unescape_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut characters = value.chars().peekable();
    while let Some(character) = characters.next() {
        if character == '\\' {
            if let Some(&next) = characters.peek() {
                if is_escapable(next) {
                    characters.next();
                    unescaped.push(next);
                    continue;
                }
            }
        }
        unescaped.push(character);
    }
    unescaped
}

/// The column (in characters of the decoded text) of a byte offset in the
/// encoded text.
pub fn decoded_column(encoded: &str, offset: usize) -> usize {
    decode_expression(&encoded[..offset.min(encoded.len())]).chars().count()
}

// ============================================================================
// SYNTAX
// ============================================================================

/// How same-precedence operators nest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Associativity {
    Left,
    Right,
}

/// An operator of a syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operator<Op> {
    pub id: Op,
    pub token: &'static str,
    /// Higher binds tighter.
    pub precedence: u8,
    pub associativity: Associativity,
    /// Whether the operator may also appear in front of an operand.
    pub is_prefix: bool,
}

impl<Op> Operator<Op> {
    pub const fn left(id: Op, token: &'static str, precedence: u8) -> Self {
        Self {
            id,
            token,
            precedence,
            associativity: Associativity::Left,
            is_prefix: false,
        }
    }

    pub const fn right(id: Op, token: &'static str, precedence: u8) -> Self {
        Self {
            id,
            token,
            precedence,
            associativity: Associativity::Right,
            is_prefix: false,
        }
    }

    pub const fn prefix(mut self) -> Self {
        self.is_prefix = true;
        self
    }
}

/// The patterns and operators a tokenizer works with.
///
/// Patterns are matched against the encoded text, anchored at the current
/// position.
#[derive(Debug, Clone)]
pub struct Syntax<Op> {
    space: Regex,
    operand: Regex,
    operators: Vec<Operator<Op>>,
}

impl<Op: Copy> Syntax<Op> {
    pub fn new(space: &str, operand: &str, operators: Vec<Operator<Op>>) -> Result<Self, regex::Error> {
        Ok(Self {
            space: Regex::new(&format!("^(?:{space})"))?,
            operand: Regex::new(&format!("^(?:{operand})"))?,
            operators,
        })
    }

    pub fn operators(&self) -> &[Operator<Op>] {
        &self.operators
    }

    fn space_length(&self, rest: &str) -> usize {
        self.space.find(rest).map_or(0, |found| found.end())
    }

    fn operand_length(&self, rest: &str) -> usize {
        self.operand.find(rest).map_or(0, |found| found.end())
    }

    fn longest_operator(&self, rest: &str) -> Option<Operator<Op>> {
        self.operators
            .iter()
            .filter(|operator| rest.starts_with(operator.token))
            .max_by_key(|operator| operator.token.len())
            .copied()
    }
}

// ============================================================================
// TOKENS
// ============================================================================

/// A token of an encoded expression.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<Op> {
    /// The encoded text of the token.
    pub text: String,
    /// The operator this token is, or `None` for an operand.
    pub operator: Option<Operator<Op>>,
    /// Byte offset in the encoded expression.
    pub offset: usize,
}

impl<Op> Token<Op> {
    pub fn end(&self) -> usize {
        self.offset + self.text.len()
    }

    pub fn is_operand(&self) -> bool {
        self.operator.is_none()
    }

    /// The text as written, escapes included.
    pub fn decoded(&self) -> String {
        decode_expression(&self.text)
    }

    /// The value of an operand: the decoded text without escapes.
    pub fn value(&self) -> String {
        unescape_value(&self.decoded())
    }
}

impl<Op> fmt::Display for Token<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.decoded())
    }
}

/// Split an encoded expression into tokens.
pub fn tokenize<Op: Copy>(encoded: &str, syntax: &Syntax<Op>) -> Result<Vec<Token<Op>>, QueryError> {
    let mut tokens = Vec::new();
    let mut position = 0;
    loop {
        position += syntax.space_length(&encoded[position..]);
        if position >= encoded.len() {
            return Ok(tokens);
        }
        let rest = &encoded[position..];
        let operand_length = syntax.operand_length(rest);
        let operator = syntax.longest_operator(rest);
        let operator_length = operator.map_or(0, |operator| operator.token.len());
        if operand_length == 0 && operator_length == 0 {
            return Err(unexpected_character(encoded, position));
        }
        let (length, operator) = if operand_length > operator_length {
            (operand_length, None)
        } else {
            (operator_length, operator)
        };
        tokens.push(Token {
            text: rest[..length].to_string(),
            operator,
            offset: position,
        });
        position += length;
    }
}

fn unexpected_character(encoded: &str, position: usize) -> QueryError {
    let rest = &encoded[position..];
    let character = match marker_at(rest) {
        Some((marked, _)) => marked,
        None => rest.chars().next().unwrap_or(' '),
    };
    let column = decoded_column(encoded, position);
    QueryError::new(
        QueryErrorKind::UnexpectedCharacter,
        format!(
            "unexpected character: '{}'\nin: {}\nat: {}▲",
            character.escape_default(),
            decode_expression(encoded),
            " ".repeat(column)
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_requires_two_hex_digits() {
        assert_eq!(marker_at("_5Fx"), Some(('_', 3)));
        assert_eq!(marker_at("_5"), None);
        assert_eq!(marker_at("_zz"), None);
    }

    #[test]
    fn test_lone_backslash_is_literal() {
        assert_eq!(encode_expression("a\\b"), "a\\b");
        assert_eq!(encode_expression("a\\"), "a\\");
        assert_eq!(unescape_value("a\\b"), "a\\b");
    }

    #[test]
    fn test_escaped_value() {
        let encoded = encode_expression("a\\ b");
        assert_eq!(encoded, "a_5C_20b");
        assert_eq!(unescape_value(&decode_expression(&encoded)), "a b");
    }

    #[test]
    fn test_escaped_tab_and_newline() {
        let encoded = encode_expression("a\\\tb\\\nc");
        assert_eq!(encoded, "a_5C_09b_5C_0Ac");
        assert_eq!(unescape_value(&decode_expression(&encoded)), "a\tb\nc");
        assert!(!is_escapable('\u{7}'));
    }
}
