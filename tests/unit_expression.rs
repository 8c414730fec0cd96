//! Unit tests for expression encoding, tokenizing and parsing

use daf::expression::{
    decode_expression, encode_expression, parse_expression, tokenize, Associativity, Operator, Syntax,
};
use daf::QueryErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arithmetic {
    Plus,
    Times,
    Minus,
}

fn arithmetic() -> Syntax<Arithmetic> {
    Syntax::new(
        r"\s+",
        r"[0-9A-Za-z_.]+",
        vec![
            Operator::right(Arithmetic::Plus, "+", 1),
            Operator::left(Arithmetic::Times, "*", 2),
            Operator::left(Arithmetic::Minus, "-", 1).prefix(),
        ],
    )
    .unwrap()
}

#[test]
fn test_encode_escaped_backslash_and_underscore() {
    assert_eq!(encode_expression("\\_"), "_5C_5F");
    assert_eq!(decode_expression("_5C_5F"), "\\_");
}

#[test]
fn test_encode_escaped_space() {
    let encoded = encode_expression("a\\ b_c");
    assert_eq!(encoded, "a_5C_20b_5Fc");
    assert_eq!(decode_expression(&encoded), "a\\ b_c");
}

#[test]
fn test_unexpected_character_points_at_column() {
    let error = parse_expression("1 : x", &arithmetic()).unwrap_err();
    assert_eq!(error.kind, QueryErrorKind::UnexpectedCharacter);
    assert_eq!(error.message, "unexpected character: ':'\nin: 1 : x\nat:   ▲");
}

#[test]
fn test_tokens_keep_offsets() {
    let tokens = tokenize("x + 12", &arithmetic()).unwrap();
    let offsets: Vec<usize> = tokens.iter().map(|token| token.offset).collect();
    assert_eq!(offsets, vec![0, 2, 4]);
    assert!(tokens[0].is_operand());
    assert_eq!(tokens[1].operator.map(|operator| operator.id), Some(Arithmetic::Plus));
    assert_eq!(tokens[1].operator.map(|operator| operator.associativity), Some(Associativity::Right));
}

#[test]
fn test_precedence_and_right_associativity() {
    let parsed = parse_expression("1 + x * 2 + 3", &arithmetic()).unwrap();
    assert_eq!(parsed.expression.to_string(), "(1 + ((x * 2) + 3))");
}

#[test]
fn test_left_associativity() {
    let parsed = parse_expression("1 * x * 2 * 3", &arithmetic()).unwrap();
    assert_eq!(parsed.expression.to_string(), "(((1 * x) * 2) * 3)");
}

#[test]
fn test_prefix_operator() {
    let parsed = parse_expression("- x * 2", &arithmetic()).unwrap();
    assert_eq!(parsed.expression.to_string(), "(-(x * 2))");
}

#[test]
fn test_missing_operand() {
    let error = parse_expression("1 +", &arithmetic()).unwrap_err();
    assert_eq!(error.kind, QueryErrorKind::ExpectedOperand);
}

#[test]
fn test_missing_operator() {
    let error = parse_expression("1 2", &arithmetic()).unwrap_err();
    assert_eq!(error.kind, QueryErrorKind::ExpectedOperator);
}

#[test]
fn test_escaped_operator_is_part_of_name() {
    let parsed = parse_expression("a\\+b + c", &arithmetic()).unwrap();
    assert_eq!(parsed.expression.to_string(), "(a\\+b + c)");
}
