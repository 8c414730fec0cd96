//! The query language.
//!
//! A query looks up a scalar, or a vector or matrix property of one or two
//! axes (optionally masked or pinned to a single entry), and pipes the
//! result through eltwise (`%`) and reduction (`%>`) operations:
//!
//! ```text
//! version
//! cell : age > 1 @ score % Log; base = 2
//! cell, gene : ~ noisy @ UMIs %> Sum
//! cell = C1, gene @ UMIs % Fraction
//! ```
//!
//! - [`syntax`]: operators and precedences
//! - [`operations`]: the registry of operations and their parameters
//! - [`compute`]: numeric kernels
//! - [`ast`]: parsed queries and their canonical rendering
//! - [`parse`]: from text to [`Query`]
//! - [`eval`]: from [`Query`] to [`QueryValue`]

pub mod ast;
pub mod compute;
pub mod eval;
pub mod operations;
pub mod parse;
pub mod syntax;

pub use ast::{AxisSelector, Comparison, Lookup, Mask, Query, Selection, Stage};
pub use eval::{evaluate, NamedMatrix, NamedVector, QueryValue};
pub use operations::{
    Compute, OperationKind, OperationRegistry, OperationSpec, ParameterDefault, ParameterSpec, ParameterValue,
    Parameters,
};
pub use parse::{parse_query, parse_query_with};
pub use syntax::{escape_query_value, query_syntax, QueryOperator};

use crate::data::Scalar;
use crate::error::{DafError, Result};
use crate::format::FormatReader;

/// Parse (with the built-in operations) and evaluate a query.
pub fn query<D: FormatReader + ?Sized>(daf: &D, text: &str) -> Result<QueryValue> {
    evaluate(daf, &parse_query(text)?)
}

fn unexpected(text: &str, expected: &'static str, actual: &QueryValue) -> DafError {
    DafError::UnexpectedQueryResult {
        query: text.to_string(),
        expected,
        actual: actual.shape(),
    }
}

/// Evaluate a query that must produce a scalar.
pub fn query_scalar<D: FormatReader + ?Sized>(daf: &D, text: &str) -> Result<Scalar> {
    match query(daf, text)? {
        QueryValue::Scalar(scalar) => Ok(scalar),
        other => Err(unexpected(text, "scalar", &other)),
    }
}

/// Evaluate a query that must produce a vector.
pub fn query_vector<D: FormatReader + ?Sized>(daf: &D, text: &str) -> Result<NamedVector> {
    match query(daf, text)? {
        QueryValue::Vector(vector) => Ok(vector),
        other => Err(unexpected(text, "vector", &other)),
    }
}

/// Evaluate a query that must produce a matrix.
pub fn query_matrix<D: FormatReader + ?Sized>(daf: &D, text: &str) -> Result<NamedMatrix> {
    match query(daf, text)? {
        QueryValue::Matrix(matrix) => Ok(matrix),
        other => Err(unexpected(text, "matrix", &other)),
    }
}
