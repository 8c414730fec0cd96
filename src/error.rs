//! Error types for daf
//!
//! Every error is a precondition violation reported before any mutation takes
//! effect. The `Display` of each variant is a rigid multi-line template (one
//! clause per line) since callers and tests match on the literal text.

use std::fmt;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DafError>;

/// Coarse classification of a [`DafError`], for callers that branch on kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Structural,
    Shape,
    Name,
    Layout,
    Type,
    Chain,
    Concatenation,
    Query,
    Group,
    Efficiency,
}

/// A property of a daf data set, used to describe the subject of an error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Property {
    Scalar {
        name: String,
    },
    Axis {
        axis: String,
    },
    Vector {
        axis: String,
        name: String,
    },
    Matrix {
        rows_axis: String,
        columns_axis: String,
        name: String,
    },
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Scalar { name } => write!(f, "scalar: {name}"),
            Property::Axis { axis } => write!(f, "axis: {axis}"),
            Property::Vector { axis, name } => write!(f, "vector: {name}\nof the axis: {axis}"),
            Property::Matrix {
                rows_axis,
                columns_axis,
                name,
            } => write!(
                f,
                "matrix: {name}\nof the rows axis: {rows_axis}\nand the columns axis: {columns_axis}"
            ),
        }
    }
}

/// All errors returned by daf operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DafError {
    // ------------------------------------------------------------------------
    // Structural
    // ------------------------------------------------------------------------
    #[error("missing scalar: {name}\nin the daf data: {daf}")]
    MissingScalar { name: String, daf: String },

    #[error("existing scalar: {name}\nin the daf data: {daf}")]
    ExistingScalar { name: String, daf: String },

    #[error("missing axis: {axis}\nin the daf data: {daf}")]
    MissingAxis { axis: String, daf: String },

    #[error("existing axis: {axis}\nin the daf data: {daf}")]
    ExistingAxis { axis: String, daf: String },

    #[error("missing vector: {name}\nfor the axis: {axis}\nin the daf data: {daf}")]
    MissingVector {
        axis: String,
        name: String,
        daf: String,
    },

    #[error("existing vector: {name}\nfor the axis: {axis}\nin the daf data: {daf}")]
    ExistingVector {
        axis: String,
        name: String,
        daf: String,
    },

    #[error(
        "missing matrix: {name}\nfor the rows axis: {rows_axis}\nand the columns axis: {columns_axis}\nin the daf data: {daf}"
    )]
    MissingMatrix {
        rows_axis: String,
        columns_axis: String,
        name: String,
        daf: String,
    },

    #[error(
        "existing matrix: {name}\nfor the rows axis: {rows_axis}\nand the columns axis: {columns_axis}\nin the daf data: {daf}"
    )]
    ExistingMatrix {
        rows_axis: String,
        columns_axis: String,
        name: String,
        daf: String,
    },

    #[error("missing entry: {entry}\nof the axis: {axis}\nin the daf data: {daf}")]
    MissingEntry {
        axis: String,
        entry: String,
        daf: String,
    },

    // ------------------------------------------------------------------------
    // Shape
    // ------------------------------------------------------------------------
    #[error(
        "the {what}: {name}\nof length: {length}\nis different from the length: {expected}\nof the axis: {axis}\nin the daf data: {daf}"
    )]
    VectorLengthMismatch {
        what: &'static str,
        axis: String,
        name: String,
        length: usize,
        expected: usize,
        daf: String,
    },

    #[error(
        "the matrix: {name}\nof size: {rows} x {columns}\nis different from the size: {expected_rows} x {expected_columns}\nof the axes: {rows_axis} x {columns_axis}\nin the daf data: {daf}"
    )]
    MatrixDimensionMismatch {
        rows_axis: String,
        columns_axis: String,
        name: String,
        rows: usize,
        columns: usize,
        expected_rows: usize,
        expected_columns: usize,
        daf: String,
    },

    // ------------------------------------------------------------------------
    // Names
    // ------------------------------------------------------------------------
    #[error("entry names of the: {what}\nmismatch the entries of the axis: {axis}\nin the daf data: {daf}")]
    NameMismatch {
        what: &'static str,
        axis: String,
        daf: String,
    },

    #[error("setting the reserved vector: name\nfor the axis: {axis}\nin the daf data: {daf}")]
    ReservedProperty { axis: String, daf: String },

    #[error("non-unique entry: {entry}\nfor the new axis: {axis}\nin the daf data: {daf}")]
    NonUniqueEntries {
        axis: String,
        entry: String,
        daf: String,
    },

    // ------------------------------------------------------------------------
    // Layout and types
    // ------------------------------------------------------------------------
    #[error("unsupported layout: {detail}\nfor the {what}\nin the daf data: {daf}")]
    InvalidLayout {
        what: String,
        detail: String,
        daf: String,
    },

    #[error("type mismatch for the {what}\nexpected type: {expected}\nactual type: {actual}\nin the daf data: {daf}")]
    TypeMismatch {
        what: String,
        expected: String,
        actual: String,
        daf: String,
    },

    #[error("inefficient action: {action}")]
    InefficientAction { action: String },

    // ------------------------------------------------------------------------
    // Chains
    // ------------------------------------------------------------------------
    #[error("empty chain: {name}")]
    EmptyChain { name: String },

    #[error(
        "different entries for the axis: {axis}\nbetween the daf data: {first}\nand the daf data: {second}\nin the daf data: {daf}"
    )]
    InconsistentAxisEntries {
        axis: String,
        first: String,
        second: String,
        daf: String,
    },

    #[error("failed to delete the {property}\nfrom the daf data: {writer}\nbecause it exists in the earlier: {reader}")]
    ShadowedDeletion {
        property: Property,
        writer: String,
        reader: String,
    },

    // ------------------------------------------------------------------------
    // Concatenation
    // ------------------------------------------------------------------------
    #[error("can't concatenate the matrix: {name}\nfor the concatenated rows axis: {rows_axis}\nand the concatenated columns axis: {columns_axis}\nin the daf data: {daf}")]
    NonSquareConcatenation {
        rows_axis: String,
        columns_axis: String,
        name: String,
        daf: String,
    },

    #[error("no empty value for the {property}\nwhich is missing from the daf data: {daf}")]
    MissingEmptyValue { property: Property, daf: String },

    #[error("can't collect the {property}\ninto the dataset axis: {dataset_axis}\nbecause it would require a third dimension\nin the daf data: {daf}")]
    UnsupportedThirdDimension {
        property: Property,
        dataset_axis: String,
        daf: String,
    },

    #[error("can't collect the {property}\nwithout a dataset axis\nin the daf data: {daf}")]
    CannotCollectWithoutDatasetAxis { property: Property, daf: String },

    #[error("invalid concatenation: {detail}\ninto the daf data: {daf}")]
    InvalidConcatenation { detail: String, daf: String },

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("{message}\nin the query: {query}\nin the daf data: {daf}")]
    QueryEvaluation {
        query: String,
        message: String,
        daf: String,
    },

    #[error("conflicting registrations for the {kind} operation: {name}")]
    ConflictingOperation { kind: &'static str, name: String },

    #[error("expected a {expected} result\nbut got a {actual} result\nfor the query: {query}")]
    UnexpectedQueryResult {
        query: String,
        expected: &'static str,
        actual: &'static str,
    },

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------
    #[error("non-string vector: {name}\nof the axis: {axis}\nof type: {dtype}\nin the daf data: {daf}")]
    NonStringVector {
        axis: String,
        name: String,
        dtype: String,
        daf: String,
    },

    #[error("empty value of the vector: {name}\nof the axis: {axis}\nfor the entry: {entry}\nin the daf data: {daf}")]
    EmptyGroupValue {
        axis: String,
        name: String,
        entry: String,
        daf: String,
    },

    #[error("invalid value: {value}\nof the vector: {name}\nof the axis: {axis}\nis missing from the next axis: {next_axis}\nin the daf data: {daf}")]
    UnmappedValue {
        axis: String,
        name: String,
        value: String,
        next_axis: String,
        daf: String,
    },

    #[error("inconsistent values of the vector: {name}\nof the axis: {axis}\nfor the entry: {group}\nof the axis: {implicit_axis}\nin the daf data: {daf}")]
    InconsistentGroupValue {
        axis: String,
        name: String,
        group: String,
        implicit_axis: String,
        daf: String,
    },
}

impl DafError {
    /// The coarse category of this error.
    pub fn category(&self) -> ErrorCategory {
        use DafError::*;
        match self {
            MissingScalar { .. }
            | ExistingScalar { .. }
            | MissingAxis { .. }
            | ExistingAxis { .. }
            | MissingVector { .. }
            | ExistingVector { .. }
            | MissingMatrix { .. }
            | ExistingMatrix { .. }
            | MissingEntry { .. } => ErrorCategory::Structural,
            VectorLengthMismatch { .. } | MatrixDimensionMismatch { .. } => ErrorCategory::Shape,
            NameMismatch { .. } | ReservedProperty { .. } | NonUniqueEntries { .. } => {
                ErrorCategory::Name
            }
            InvalidLayout { .. } => ErrorCategory::Layout,
            TypeMismatch { .. } => ErrorCategory::Type,
            InefficientAction { .. } => ErrorCategory::Efficiency,
            EmptyChain { .. } | InconsistentAxisEntries { .. } | ShadowedDeletion { .. } => {
                ErrorCategory::Chain
            }
            NonSquareConcatenation { .. }
            | MissingEmptyValue { .. }
            | UnsupportedThirdDimension { .. }
            | CannotCollectWithoutDatasetAxis { .. }
            | InvalidConcatenation { .. } => ErrorCategory::Concatenation,
            Query(_)
            | QueryEvaluation { .. }
            | ConflictingOperation { .. }
            | UnexpectedQueryResult { .. } => ErrorCategory::Query,
            NonStringVector { .. }
            | EmptyGroupValue { .. }
            | UnmappedValue { .. }
            | InconsistentGroupValue { .. } => ErrorCategory::Group,
        }
    }
}

// ============================================================================
// QUERY ERRORS
// ============================================================================

/// What went wrong while tokenizing, parsing or validating a query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryErrorKind {
    UnexpectedCharacter,
    ExpectedOperand,
    ExpectedOperator,
    UnexpectedOperator,
    InvalidQuery,
    UnknownOperationType,
    UnknownParameter,
    RepeatedParameter,
    MissingParameter,
    InvalidParameterValue,
}

/// An error in a query (or any expression) text.
///
/// The message is complete: it already contains the pointer diagram showing
/// where in the text the problem is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub message: String,
}

impl QueryError {
    pub fn new(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_scalar_message() {
        let error = DafError::MissingScalar {
            name: "version".to_string(),
            daf: "memory!".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "missing scalar: version\nin the daf data: memory!"
        );
        assert_eq!(error.category(), ErrorCategory::Structural);
    }

    #[test]
    fn test_property_display() {
        let property = Property::Matrix {
            rows_axis: "cell".to_string(),
            columns_axis: "gene".to_string(),
            name: "UMIs".to_string(),
        };
        assert_eq!(
            property.to_string(),
            "matrix: UMIs\nof the rows axis: cell\nand the columns axis: gene"
        );
    }
}
