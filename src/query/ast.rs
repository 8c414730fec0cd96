//! Parsed queries.
//!
//! `Display` renders the canonical form of a query: single spaces around
//! binary operators, none before `,` and `;`, and every operation parameter
//! listed in declaration order with its default filled in. Parsing the
//! canonical form gives back an equal query.

use std::fmt;
use std::sync::Arc;

use super::operations::{OperationKind, OperationSpec, Parameters};
use super::syntax::{escape_query_value, QueryOperator};

/// A parsed query: what to look up, then the operations to apply.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub lookup: Lookup,
    pub stages: Vec<Stage>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// A scalar property.
    Scalar(String),
    /// A property of one axis (a vector) or two axes (a matrix).
    Axes { axes: Vec<AxisSelector>, property: String },
}

/// One axis of a lookup and which of its entries to use.
#[derive(Debug, Clone, PartialEq)]
pub struct AxisSelector {
    pub axis: String,
    pub selection: Selection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    All,
    Mask(Mask),
    /// A single entry, which removes the axis from the result.
    Pin(String),
}

/// The comparison of a mask term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl Comparison {
    pub fn from_operator(operator: QueryOperator) -> Option<Comparison> {
        let comparison = match operator {
            QueryOperator::Equal => Comparison::Equal,
            QueryOperator::NotEqual => Comparison::NotEqual,
            QueryOperator::Less => Comparison::Less,
            QueryOperator::LessEqual => Comparison::LessEqual,
            QueryOperator::Greater => Comparison::Greater,
            QueryOperator::GreaterEqual => Comparison::GreaterEqual,
            _ => return None,
        };
        Some(comparison)
    }

    pub fn operator(self) -> QueryOperator {
        match self {
            Comparison::Equal => QueryOperator::Equal,
            Comparison::NotEqual => QueryOperator::NotEqual,
            Comparison::Less => QueryOperator::Less,
            Comparison::LessEqual => QueryOperator::LessEqual,
            Comparison::Greater => QueryOperator::Greater,
            Comparison::GreaterEqual => QueryOperator::GreaterEqual,
        }
    }

    /// Whether an ordering between a value and the compared value passes.
    pub fn accepts(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            Comparison::Equal => ordering == Equal,
            Comparison::NotEqual => ordering != Equal,
            Comparison::Less => ordering == Less,
            Comparison::LessEqual => ordering != Greater,
            Comparison::Greater => ordering == Greater,
            Comparison::GreaterEqual => ordering != Less,
        }
    }
}

/// A boolean selection of axis entries, computed from vectors of the axis.
#[derive(Debug, Clone, PartialEq)]
pub enum Mask {
    /// Entries whose value is not zero, false or empty.
    Vector(String),
    Compare {
        vector: String,
        comparison: Comparison,
        value: String,
    },
    /// Entries whose (string) value fully matches a regular expression.
    Match { vector: String, pattern: String },
    Not(Box<Mask>),
    And(Box<Mask>, Box<Mask>),
    Or(Box<Mask>, Box<Mask>),
}

/// An operation applied to the result of the previous stage.
#[derive(Debug, Clone)]
pub struct Stage {
    pub spec: Arc<OperationSpec>,
    pub parameters: Parameters,
}

impl Stage {
    pub fn kind(&self) -> OperationKind {
        self.spec.kind()
    }
}

impl PartialEq for Stage {
    fn eq(&self, other: &Self) -> bool {
        self.spec.name == other.spec.name && self.kind() == other.kind() && self.parameters == other.parameters
    }
}

// ============================================================================
// CANONICAL RENDERING
// ============================================================================

impl fmt::Display for Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mask::Vector(vector) => f.write_str(&escape_query_value(vector)),
            Mask::Compare {
                vector,
                comparison,
                value,
            } => write!(
                f,
                "{} {} {}",
                escape_query_value(vector),
                comparison.operator(),
                escape_query_value(value)
            ),
            Mask::Match { vector, pattern } => {
                write!(f, "{} ~ {}", escape_query_value(vector), escape_query_value(pattern))
            }
            Mask::Not(mask) => write!(f, "~ {mask}"),
            Mask::And(left, right) => write!(f, "{left} & {right}"),
            Mask::Or(left, right) => write!(f, "{left} | {right}"),
        }
    }
}

impl fmt::Display for AxisSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&escape_query_value(&self.axis))?;
        match &self.selection {
            Selection::All => Ok(()),
            Selection::Mask(mask) => write!(f, " : {mask}"),
            Selection::Pin(entry) => write!(f, " = {}", escape_query_value(entry)),
        }
    }
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Scalar(name) => f.write_str(&escape_query_value(name)),
            Lookup::Axes { axes, property } => {
                for (index, axis) in axes.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{axis}")?;
                }
                write!(f, " @ {}", escape_query_value(property))
            }
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let operator = match self.kind() {
            OperationKind::Eltwise => QueryOperator::Eltwise,
            OperationKind::Reduction => QueryOperator::Reduction,
        };
        write!(f, "{operator} {}", self.spec.name)?;
        for (name, value) in self.parameters.iter() {
            write!(f, "; {name} = {value}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lookup)?;
        for stage in &self.stages {
            write!(f, " {stage}")?;
        }
        Ok(())
    }
}
