//! Evaluating a parsed [`Query`] against a store.
//!
//! Lookups fetch the property and apply the axis selections (all entries, a
//! mask, or a single pinned entry that drops the axis). Every stage is then
//! computed in `f64` and converted to the requested (or automatically
//! chosen) element type. Sparse inputs stay sparse through operations that
//! keep zeros at zero.

use tracing::debug;

use crate::daf::DafReader;
use crate::data::{
    inefficient_action, DenseMatrix, MajorAxis, Matrix, Scalar, SparseMatrix, SparseVector, Values, Vector,
};
use crate::error::{DafError, Result};
use crate::format::{AxisEntries, FormatReader};

use super::ast::{AxisSelector, Lookup, Mask, Query, Selection, Stage};
use super::compute::{EltwiseOperation, ReductionOperation};
use super::operations::Compute;
use super::parse::full_match_regex;

/// A vector together with the axis entries it is aligned with.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedVector {
    pub axis: String,
    pub entries: Vec<String>,
    pub vector: Vector,
}

impl NamedVector {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The value of an entry, if it is one of the entries.
    pub fn get(&self, entry: &str) -> Option<Scalar> {
        let index = self.entries.iter().position(|known| known == entry)?;
        Some(self.vector.get(index))
    }
}

/// A matrix together with the axis entries of its rows and columns.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedMatrix {
    pub rows_axis: String,
    pub columns_axis: String,
    pub row_entries: Vec<String>,
    pub column_entries: Vec<String>,
    pub matrix: Matrix,
}

impl NamedMatrix {
    pub fn get(&self, row: &str, column: &str) -> Option<Scalar> {
        let row = self.row_entries.iter().position(|known| known == row)?;
        let column = self.column_entries.iter().position(|known| known == column)?;
        Some(self.matrix.get(row, column))
    }
}

/// The result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue {
    Scalar(Scalar),
    Vector(NamedVector),
    Matrix(NamedMatrix),
}

impl QueryValue {
    pub fn shape(&self) -> &'static str {
        match self {
            QueryValue::Scalar(_) => "scalar",
            QueryValue::Vector(_) => "vector",
            QueryValue::Matrix(_) => "matrix",
        }
    }
}

/// Evaluate a parsed query.
pub fn evaluate<D: FormatReader + ?Sized>(daf: &D, query: &Query) -> Result<QueryValue> {
    let evaluator = Evaluator {
        daf: daf.name(),
        query: query.to_string(),
    };
    let mut value = evaluator.lookup(daf, &query.lookup)?;
    for stage in &query.stages {
        value = evaluator.stage(stage, value)?;
    }
    debug!(daf = daf.name(), query = %evaluator.query, shape = value.shape(), "evaluated query");
    Ok(value)
}

/// Which entries of an axis a selector picked.
enum Picked {
    All,
    Some(Vec<usize>),
    One(usize),
}

impl Picked {
    fn indices(&self, length: usize) -> Vec<usize> {
        match self {
            Picked::All => (0..length).collect(),
            Picked::Some(indices) => indices.clone(),
            Picked::One(index) => vec![*index],
        }
    }
}

fn picked_entries(entries: &AxisEntries, indices: &[usize]) -> Vec<String> {
    indices
        .iter()
        .filter_map(|index| entries.get_index(*index).cloned())
        .collect()
}

fn vector_like(values: Values, sparse: bool) -> Vector {
    if sparse {
        if let Some(sparse) = SparseVector::from_dense(&values) {
            return Vector::Sparse(sparse);
        }
    }
    Vector::Dense(values)
}

fn matrix_like(dense: DenseMatrix, sparse: bool) -> Matrix {
    if sparse {
        if let Some(sparse) = SparseMatrix::from_dense(&dense) {
            return Matrix::Sparse(sparse);
        }
    }
    Matrix::Dense(dense)
}

struct Evaluator<'a> {
    daf: &'a str,
    query: String,
}

impl Evaluator<'_> {
    fn fail(&self, message: impl Into<String>) -> DafError {
        DafError::QueryEvaluation {
            query: self.query.clone(),
            message: message.into(),
            daf: self.daf.to_string(),
        }
    }

    fn numbers(&self, values: &Values, operation: &str) -> Result<Vec<f64>> {
        values.to_f64().ok_or_else(|| {
            self.fail(format!(
                "non-numeric input of type: {}\nfor the operation: {operation}",
                values.dtype()
            ))
        })
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    fn lookup<D: FormatReader + ?Sized>(&self, daf: &D, lookup: &Lookup) -> Result<QueryValue> {
        match lookup {
            Lookup::Scalar(name) => Ok(QueryValue::Scalar(daf.get_scalar(name)?)),
            Lookup::Axes { axes, property } => match axes.as_slice() {
                [axis] => self.vector_lookup(daf, axis, property),
                [rows, columns] => self.matrix_lookup(daf, rows, columns, property),
                _ => Err(self.fail(format!("unsupported number of axes: {}", axes.len()))),
            },
        }
    }

    fn pick<D: FormatReader + ?Sized>(&self, daf: &D, selector: &AxisSelector) -> Result<Picked> {
        match &selector.selection {
            Selection::All => Ok(Picked::All),
            Selection::Mask(mask) => {
                let flags = self.mask(daf, &selector.axis, mask)?;
                Ok(Picked::Some(
                    flags
                        .iter()
                        .enumerate()
                        .filter(|(_, selected)| **selected)
                        .map(|(index, _)| index)
                        .collect(),
                ))
            }
            Selection::Pin(entry) => Ok(Picked::One(daf.axis_index(&selector.axis, entry)?)),
        }
    }

    fn mask<D: FormatReader + ?Sized>(&self, daf: &D, axis: &str, mask: &Mask) -> Result<Vec<bool>> {
        match mask {
            Mask::Vector(name) => {
                let values = daf.get_vector(axis, name)?.to_dense();
                Ok((0..values.len()).map(|index| !values.is_empty_at(index)).collect())
            }
            Mask::Compare {
                vector,
                comparison,
                value,
            } => {
                let values = daf.get_vector(axis, vector)?.to_dense();
                let dtype = values.dtype();
                let Some(target) = Scalar::parse_as(dtype, value) else {
                    return Err(self.fail(format!(
                        "invalid value: {value}\nfor comparing with the vector: {vector}\nof the axis: {axis}\nof type: {dtype}"
                    )));
                };
                Ok((0..values.len())
                    .map(|index| {
                        values
                            .get(index)
                            .partial_cmp(&target)
                            .is_some_and(|ordering| comparison.accepts(ordering))
                    })
                    .collect())
            }
            Mask::Match { vector, pattern } => {
                let regex = full_match_regex(pattern)
                    .map_err(|error| self.fail(format!("invalid regular expression: {pattern}\n{error}")))?;
                let values = daf.get_vector(axis, vector)?.to_dense().to_strings();
                Ok(values.iter().map(|value| regex.is_match(value)).collect())
            }
            Mask::Not(inner) => Ok(self.mask(daf, axis, inner)?.into_iter().map(|flag| !flag).collect()),
            Mask::And(left, right) => {
                let right = self.mask(daf, axis, right)?;
                Ok(self
                    .mask(daf, axis, left)?
                    .into_iter()
                    .zip(right)
                    .map(|(left, right)| left && right)
                    .collect())
            }
            Mask::Or(left, right) => {
                let right = self.mask(daf, axis, right)?;
                Ok(self
                    .mask(daf, axis, left)?
                    .into_iter()
                    .zip(right)
                    .map(|(left, right)| left || right)
                    .collect())
            }
        }
    }

    fn vector_lookup<D: FormatReader + ?Sized>(
        &self,
        daf: &D,
        selector: &AxisSelector,
        property: &str,
    ) -> Result<QueryValue> {
        let entries = daf.get_axis(&selector.axis)?;
        let vector = daf.get_vector(&selector.axis, property)?;
        match self.pick(daf, selector)? {
            Picked::One(index) => Ok(QueryValue::Scalar(vector.get(index))),
            Picked::All => Ok(QueryValue::Vector(NamedVector {
                axis: selector.axis.clone(),
                entries: entries.iter().cloned().collect(),
                vector: vector.as_ref().clone(),
            })),
            Picked::Some(indices) => Ok(QueryValue::Vector(NamedVector {
                axis: selector.axis.clone(),
                entries: picked_entries(&entries, &indices),
                vector: vector_like(vector.to_dense().gather(&indices), vector.is_sparse()),
            })),
        }
    }

    fn matrix_lookup<D: FormatReader + ?Sized>(
        &self,
        daf: &D,
        rows: &AxisSelector,
        columns: &AxisSelector,
        property: &str,
    ) -> Result<QueryValue> {
        let row_entries = daf.get_axis(&rows.axis)?;
        let column_entries = daf.get_axis(&columns.axis)?;
        let matrix = daf.get_matrix(&rows.axis, &columns.axis, property)?;
        let row_pick = self.pick(daf, rows)?;
        let column_pick = self.pick(daf, columns)?;
        let sparse = matrix.is_sparse();

        match (row_pick, column_pick) {
            (Picked::One(row), Picked::One(column)) => Ok(QueryValue::Scalar(matrix.get(row, column))),
            (Picked::One(row), column_pick) => {
                if matrix.major() == MajorAxis::Columns {
                    inefficient_action(&format!("reading a row of the column-major matrix: {property}"))?;
                }
                let indices = column_pick.indices(column_entries.len());
                let values = matrix.to_dense().select(&[row], &indices).values().clone();
                Ok(QueryValue::Vector(NamedVector {
                    axis: columns.axis.clone(),
                    entries: picked_entries(&column_entries, &indices),
                    vector: vector_like(values, sparse),
                }))
            }
            (row_pick, Picked::One(column)) => {
                if matrix.major() == MajorAxis::Rows {
                    inefficient_action(&format!("reading a column of the row-major matrix: {property}"))?;
                }
                let indices = row_pick.indices(row_entries.len());
                let values = matrix.to_dense().select(&indices, &[column]).values().clone();
                Ok(QueryValue::Vector(NamedVector {
                    axis: rows.axis.clone(),
                    entries: picked_entries(&row_entries, &indices),
                    vector: vector_like(values, sparse),
                }))
            }
            (Picked::All, Picked::All) => Ok(QueryValue::Matrix(NamedMatrix {
                rows_axis: rows.axis.clone(),
                columns_axis: columns.axis.clone(),
                row_entries: row_entries.iter().cloned().collect(),
                column_entries: column_entries.iter().cloned().collect(),
                matrix: matrix.as_ref().clone(),
            })),
            (row_pick, column_pick) => {
                let row_indices = row_pick.indices(row_entries.len());
                let column_indices = column_pick.indices(column_entries.len());
                let selected = matrix.to_dense().select(&row_indices, &column_indices);
                Ok(QueryValue::Matrix(NamedMatrix {
                    rows_axis: rows.axis.clone(),
                    columns_axis: columns.axis.clone(),
                    row_entries: picked_entries(&row_entries, &row_indices),
                    column_entries: picked_entries(&column_entries, &column_indices),
                    matrix: matrix_like(selected, sparse),
                }))
            }
        }
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    fn stage(&self, stage: &Stage, value: QueryValue) -> Result<QueryValue> {
        match stage.spec.compute {
            Compute::Eltwise(build) => self.eltwise(stage, build(&stage.parameters).as_ref(), value),
            Compute::Reduction(build) => self.reduction(stage, build(&stage.parameters).as_ref(), value),
        }
    }

    fn eltwise(&self, stage: &Stage, operation: &dyn EltwiseOperation, value: QueryValue) -> Result<QueryValue> {
        let name = stage.spec.name;
        let explicit = stage.parameters.dtype();
        match value {
            QueryValue::Scalar(scalar) => {
                if !operation.applies_to_scalar() {
                    return Err(self.fail(format!("the eltwise operation: {name}\ncan't be applied to a scalar")));
                }
                let Some(number) = scalar.to_f64() else {
                    return Err(self.fail(format!(
                        "non-numeric input of type: {}\nfor the operation: {name}",
                        scalar.dtype()
                    )));
                };
                let dtype = explicit.unwrap_or_else(|| operation.auto_dtype(scalar.dtype()));
                let mut numbers = [number];
                operation.apply(&mut numbers);
                Ok(QueryValue::Scalar(Scalar::from_f64(dtype, numbers[0])))
            }
            QueryValue::Vector(named) => {
                let dtype = explicit.unwrap_or_else(|| operation.auto_dtype(named.vector.dtype()));
                let mut numbers = self.numbers(&named.vector.to_dense(), name)?;
                operation.apply(&mut numbers);
                let sparse = named.vector.is_sparse() && operation.preserves_zero();
                let vector = vector_like(Values::from_f64(dtype, &numbers), sparse);
                Ok(QueryValue::Vector(NamedVector { vector, ..named }))
            }
            QueryValue::Matrix(named) => {
                let dtype = explicit.unwrap_or_else(|| operation.auto_dtype(named.matrix.dtype()));
                let sparse = named.matrix.is_sparse() && operation.preserves_zero();
                let storage = if operation.per_column() {
                    named
                        .matrix
                        .into_storage_or_copy(MajorAxis::Columns, &format!("the {name} operation"))?
                } else {
                    named.matrix.without_labels()
                };
                let dense = storage.to_dense();
                let mut numbers = self.numbers(dense.values(), name)?;
                if !operation.per_column() {
                    operation.apply(&mut numbers);
                } else if dense.nrows() > 0 {
                    numbers
                        .chunks_mut(dense.nrows())
                        .for_each(|column| operation.apply(column));
                }
                let result = DenseMatrix::new(
                    dense.nrows(),
                    dense.ncols(),
                    dense.major(),
                    Values::from_f64(dtype, &numbers),
                )
                .map_err(|message| self.fail(message))?;
                Ok(QueryValue::Matrix(NamedMatrix {
                    matrix: matrix_like(result, sparse),
                    ..named
                }))
            }
        }
    }

    fn reduction(&self, stage: &Stage, operation: &dyn ReductionOperation, value: QueryValue) -> Result<QueryValue> {
        let name = stage.spec.name;
        let explicit = stage.parameters.dtype();
        let empty = || self.fail(format!("empty input\nfor the reduction operation: {name}"));
        match value {
            QueryValue::Scalar(_) => Err(self.fail(format!(
                "the reduction operation: {name}\ncan't be applied to a scalar"
            ))),
            QueryValue::Vector(named) => {
                let dtype = explicit.unwrap_or_else(|| operation.auto_dtype(named.vector.dtype()));
                let numbers = self.numbers(&named.vector.to_dense(), name)?;
                let reduced = operation.reduce(&numbers).ok_or_else(empty)?;
                Ok(QueryValue::Scalar(Scalar::from_f64(dtype, reduced)))
            }
            QueryValue::Matrix(named) => {
                let dtype = explicit.unwrap_or_else(|| operation.auto_dtype(named.matrix.dtype()));
                let storage = named
                    .matrix
                    .into_storage_or_copy(MajorAxis::Columns, &format!("the {name} reduction"))?;
                let dense = storage.to_dense();
                let numbers = self.numbers(dense.values(), name)?;
                let nrows = dense.nrows();
                let mut reduced = Vec::with_capacity(dense.ncols());
                for column in 0..dense.ncols() {
                    let lane = &numbers[column * nrows..(column + 1) * nrows];
                    reduced.push(operation.reduce(lane).ok_or_else(empty)?);
                }
                Ok(QueryValue::Vector(NamedVector {
                    axis: named.columns_axis,
                    entries: named.column_entries,
                    vector: Vector::Dense(Values::from_f64(dtype, &reduced)),
                }))
            }
        }
    }
}
