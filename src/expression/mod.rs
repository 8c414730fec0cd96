//! Generic operator expressions.
//!
//! - [`tokens`]: escape encoding, syntax tables and the tokenizer
//! - [`parser`]: precedence-climbing parser producing [`Expression`] trees
//! - [`context`]: walking trees with labeled frames for error diagrams
//!
//! The query language is one syntax built on top of these.

pub mod context;
pub mod parser;
pub mod tokens;

pub use context::{split_list, Context, Span};
pub use parser::{parse_expression, Expression, Parsed};
pub use tokens::{
    decode_expression, encode_expression, is_escapable, tokenize, unescape_value, Associativity, Operator, Syntax,
    Token,
};
