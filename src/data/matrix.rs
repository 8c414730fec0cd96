//! Matrices: dense or sparse, column-major or row-major, optionally labeled.
//!
//! # Layout
//!
//! ```text
//!   Columns major (column-major / CSC)     Rows major (row-major / CSR)
//!   ┌─────┬─────┬─────┐                    ┌─────────────────┐
//!   │ c0  │ c1  │ c2  │  each column is    ├─────────────────┤ each row is
//!   │     │     │     │  contiguous        ├─────────────────┤ contiguous
//!   └─────┴─────┴─────┘                    └─────────────────┘
//! ```
//!
//! Transposing swaps the dimensions and flips the major axis without moving
//! any data: a column-major `R x C` matrix is the same memory as a row-major
//! `C x R` one. `relayout` is the copying operation that keeps the dimensions
//! and flips the major axis.

use std::fmt;

use super::dtype::{DType, Scalar};
use super::inefficient::inefficient_action;
use super::values::{map_values, Values};
use crate::error::Result;

/// Which dimension of a matrix is contiguous in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MajorAxis {
    /// Column-major: each column is contiguous (sparse: CSC).
    Columns,
    /// Row-major: each row is contiguous (sparse: CSR).
    Rows,
}

impl MajorAxis {
    pub fn flipped(self) -> MajorAxis {
        match self {
            MajorAxis::Columns => MajorAxis::Rows,
            MajorAxis::Rows => MajorAxis::Columns,
        }
    }
}

impl fmt::Display for MajorAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MajorAxis::Columns => f.write_str("column-major"),
            MajorAxis::Rows => f.write_str("row-major"),
        }
    }
}

// ============================================================================
// DENSE
// ============================================================================

/// A dense matrix stored in a single column.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    nrows: usize,
    ncols: usize,
    major: MajorAxis,
    values: Values,
}

impl DenseMatrix {
    pub fn new(nrows: usize, ncols: usize, major: MajorAxis, values: Values) -> std::result::Result<Self, String> {
        if values.len() != nrows * ncols {
            return Err(format!(
                "{} values for a {nrows} x {ncols} matrix",
                values.len()
            ));
        }
        Ok(Self {
            nrows,
            ncols,
            major,
            values,
        })
    }

    /// Build a column-major matrix from its columns (all of `nrows` values
    /// and of the same type).
    pub fn from_columns(nrows: usize, dtype: DType, columns: &[Values]) -> std::result::Result<Self, String> {
        let mut values = Values::empty(dtype);
        for column in columns {
            if column.len() != nrows || column.dtype() != dtype {
                return Err(format!(
                    "column of {} {} values in a matrix of {nrows} {dtype} rows",
                    column.len(),
                    column.dtype()
                ));
            }
            values.extend(column);
        }
        Ok(Self {
            nrows,
            ncols: columns.len(),
            major: MajorAxis::Columns,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn major(&self) -> MajorAxis {
        self.major
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    /// Position of an element in the values column.
    pub fn index(&self, row: usize, column: usize) -> usize {
        match self.major {
            MajorAxis::Columns => column * self.nrows + row,
            MajorAxis::Rows => row * self.ncols + column,
        }
    }

    pub fn get(&self, row: usize, column: usize) -> Scalar {
        self.values.get(self.index(row, column))
    }

    pub fn transposed(self) -> DenseMatrix {
        DenseMatrix {
            nrows: self.ncols,
            ncols: self.nrows,
            major: self.major.flipped(),
            values: self.values,
        }
    }

    /// Copy into the other major axis, keeping the dimensions.
    pub fn relayout(&self) -> DenseMatrix {
        let major = self.major.flipped();
        let order: Vec<usize> = match major {
            MajorAxis::Columns => (0..self.ncols)
                .flat_map(|column| (0..self.nrows).map(move |row| (row, column)))
                .map(|(row, column)| self.index(row, column))
                .collect(),
            MajorAxis::Rows => (0..self.nrows)
                .flat_map(|row| (0..self.ncols).map(move |column| (row, column)))
                .map(|(row, column)| self.index(row, column))
                .collect(),
        };
        DenseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            major,
            values: self.values.gather(&order),
        }
    }

    pub fn column(&self, column: usize) -> Values {
        let order: Vec<usize> = (0..self.nrows).map(|row| self.index(row, column)).collect();
        self.values.gather(&order)
    }

    /// The column-major sub-matrix of the given rows and columns.
    pub fn select(&self, rows: &[usize], columns: &[usize]) -> DenseMatrix {
        let order: Vec<usize> = columns
            .iter()
            .flat_map(|column| rows.iter().map(move |row| (*row, *column)))
            .map(|(row, column)| self.index(row, column))
            .collect();
        DenseMatrix {
            nrows: rows.len(),
            ncols: columns.len(),
            major: MajorAxis::Columns,
            values: self.values.gather(&order),
        }
    }

    pub fn convert(&self, dtype: DType) -> Option<DenseMatrix> {
        Some(DenseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            major: self.major,
            values: self.values.convert(dtype)?,
        })
    }

    /// Append the columns of column-major matrices with the same rows.
    pub fn concat_columns(parts: &[DenseMatrix]) -> Option<DenseMatrix> {
        let first = parts.first()?;
        let mut values = Values::empty(first.dtype());
        let mut ncols = 0;
        for part in parts {
            if part.major != MajorAxis::Columns
                || part.nrows != first.nrows
                || part.dtype() != first.dtype()
            {
                return None;
            }
            values.extend(&part.values);
            ncols += part.ncols;
        }
        Some(DenseMatrix {
            nrows: first.nrows,
            ncols,
            major: MajorAxis::Columns,
            values,
        })
    }
}

// ============================================================================
// SPARSE
// ============================================================================

/// A compressed sparse matrix (CSC for `Columns`, CSR for `Rows`).
///
/// The major dimension is split into "lanes" (columns for CSC); `offsets`
/// has one more entry than there are lanes and `indices` holds the minor
/// position of each stored value.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    nrows: usize,
    ncols: usize,
    major: MajorAxis,
    offsets: Vec<usize>,
    indices: Vec<usize>,
    values: Values,
}

impl SparseMatrix {
    pub fn new(
        nrows: usize,
        ncols: usize,
        major: MajorAxis,
        offsets: Vec<usize>,
        indices: Vec<usize>,
        values: Values,
    ) -> std::result::Result<Self, String> {
        let (lanes, lane_len) = match major {
            MajorAxis::Columns => (ncols, nrows),
            MajorAxis::Rows => (nrows, ncols),
        };
        if values.dtype() == DType::String {
            return Err("sparse matrices can't hold strings".to_string());
        }
        if offsets.len() != lanes + 1 || offsets[0] != 0 {
            return Err(format!("{} offsets for {lanes} lanes", offsets.len()));
        }
        if offsets.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err("sparse offsets are decreasing".to_string());
        }
        if offsets[lanes] != indices.len() || indices.len() != values.len() {
            return Err(format!(
                "{} stored entries for {} indices and {} values",
                offsets[lanes],
                indices.len(),
                values.len()
            ));
        }
        for lane in 0..lanes {
            let lane_indices = &indices[offsets[lane]..offsets[lane + 1]];
            if lane_indices.windows(2).any(|pair| pair[0] >= pair[1])
                || lane_indices.last().is_some_and(|last| *last >= lane_len)
            {
                return Err(format!("invalid sparse indices in lane {lane}"));
            }
        }
        Ok(Self {
            nrows,
            ncols,
            major,
            offsets,
            indices,
            values,
        })
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn major(&self) -> MajorAxis {
        self.major
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    fn lanes(&self) -> usize {
        match self.major {
            MajorAxis::Columns => self.ncols,
            MajorAxis::Rows => self.nrows,
        }
    }

    fn lane_len(&self) -> usize {
        match self.major {
            MajorAxis::Columns => self.nrows,
            MajorAxis::Rows => self.ncols,
        }
    }

    /// Keep only the non-zero entries, in the same major axis.
    pub fn from_dense(dense: &DenseMatrix) -> Option<SparseMatrix> {
        if dense.dtype() == DType::String {
            return None;
        }
        let (lanes, lane_len) = match dense.major {
            MajorAxis::Columns => (dense.ncols, dense.nrows),
            MajorAxis::Rows => (dense.nrows, dense.ncols),
        };
        let mut offsets = Vec::with_capacity(lanes + 1);
        let mut indices = Vec::new();
        let mut positions = Vec::new();
        offsets.push(0);
        for lane in 0..lanes {
            for minor in 0..lane_len {
                let position = lane * lane_len + minor;
                if !dense.values.is_empty_at(position) {
                    indices.push(minor);
                    positions.push(position);
                }
            }
            offsets.push(indices.len());
        }
        Some(SparseMatrix {
            nrows: dense.nrows,
            ncols: dense.ncols,
            major: dense.major,
            offsets,
            indices,
            values: dense.values.gather(&positions),
        })
    }

    /// Expand to a dense matrix in the same major axis.
    pub fn to_dense(&self) -> DenseMatrix {
        let lane_len = self.lane_len();
        let mut positions = Vec::with_capacity(self.nnz());
        for lane in 0..self.lanes() {
            for minor in &self.indices[self.offsets[lane]..self.offsets[lane + 1]] {
                positions.push(lane * lane_len + minor);
            }
        }
        let size = self.nrows * self.ncols;
        let values = map_values!(&self.values, column => scatter(size, &positions, column));
        DenseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            major: self.major,
            values,
        }
    }

    pub fn get(&self, row: usize, column: usize) -> Scalar {
        let (lane, minor) = match self.major {
            MajorAxis::Columns => (column, row),
            MajorAxis::Rows => (row, column),
        };
        let start = self.offsets[lane];
        let lane_indices = &self.indices[start..self.offsets[lane + 1]];
        match lane_indices.binary_search(&minor) {
            Ok(position) => self.values.get(start + position),
            Err(_) => Scalar::zero(self.dtype()),
        }
    }

    pub fn transposed(self) -> SparseMatrix {
        SparseMatrix {
            nrows: self.ncols,
            ncols: self.nrows,
            major: self.major.flipped(),
            offsets: self.offsets,
            indices: self.indices,
            values: self.values,
        }
    }

    /// Copy into the other major axis (CSC <-> CSR), keeping the dimensions.
    pub fn relayout(&self) -> SparseMatrix {
        let lanes = self.lanes();
        let new_lanes = self.lane_len();
        let mut counts = vec![0usize; new_lanes + 1];
        for minor in &self.indices {
            counts[minor + 1] += 1;
        }
        for lane in 0..new_lanes {
            counts[lane + 1] += counts[lane];
        }
        let offsets = counts.clone();
        let mut next = counts;
        let mut indices = vec![0usize; self.nnz()];
        let mut order = vec![0usize; self.nnz()];
        for lane in 0..lanes {
            for position in self.offsets[lane]..self.offsets[lane + 1] {
                let new_lane = self.indices[position];
                let target = next[new_lane];
                next[new_lane] += 1;
                indices[target] = lane;
                order[target] = position;
            }
        }
        SparseMatrix {
            nrows: self.nrows,
            ncols: self.ncols,
            major: self.major.flipped(),
            offsets,
            indices,
            values: self.values.gather(&order),
        }
    }

    pub fn convert(&self, dtype: DType) -> Option<SparseMatrix> {
        if !dtype.is_numeric() {
            return None;
        }
        Some(SparseMatrix {
            values: self.values.convert(dtype)?,
            ..self.clone()
        })
    }

    /// Append the columns of CSC matrices with the same rows.
    pub fn concat_columns(parts: &[SparseMatrix]) -> Option<SparseMatrix> {
        let first = parts.first()?;
        let mut offsets = vec![0];
        let mut indices = Vec::new();
        let mut values = Values::empty(first.dtype());
        let mut ncols = 0;
        for part in parts {
            if part.major != MajorAxis::Columns
                || part.nrows != first.nrows
                || part.dtype() != first.dtype()
            {
                return None;
            }
            let base = indices.len();
            offsets.extend(part.offsets[1..].iter().map(|offset| offset + base));
            indices.extend_from_slice(&part.indices);
            values.extend(&part.values);
            ncols += part.ncols;
        }
        Some(SparseMatrix {
            nrows: first.nrows,
            ncols,
            major: MajorAxis::Columns,
            offsets,
            indices,
            values,
        })
    }
}

fn scatter<T: Clone + Default>(len: usize, positions: &[usize], column: &[T]) -> Vec<T> {
    let mut dense = vec![T::default(); len];
    for (position, value) in positions.iter().zip(column) {
        dense[*position] = value.clone();
    }
    dense
}

// ============================================================================
// MATRIX
// ============================================================================

/// A matrix in one of the supported representations.
///
/// Only `Dense` and `Sparse` are stored; `Labeled` carries row and column
/// entry names that are checked against the axes when the matrix is set.
#[derive(Debug, Clone, PartialEq)]
pub enum Matrix {
    Dense(DenseMatrix),
    Sparse(SparseMatrix),
    Labeled {
        row_names: Vec<String>,
        column_names: Vec<String>,
        inner: Box<Matrix>,
    },
}

impl Matrix {
    pub fn labeled(row_names: Vec<String>, column_names: Vec<String>, inner: impl Into<Matrix>) -> Matrix {
        Matrix::Labeled {
            row_names,
            column_names,
            inner: Box::new(inner.into()),
        }
    }

    /// A column-major dense matrix from its values.
    pub fn dense_columns(nrows: usize, ncols: usize, values: impl Into<Values>) -> std::result::Result<Matrix, String> {
        DenseMatrix::new(nrows, ncols, MajorAxis::Columns, values.into()).map(Matrix::Dense)
    }

    pub fn nrows(&self) -> usize {
        match self {
            Matrix::Dense(dense) => dense.nrows(),
            Matrix::Sparse(sparse) => sparse.nrows(),
            Matrix::Labeled { inner, .. } => inner.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            Matrix::Dense(dense) => dense.ncols(),
            Matrix::Sparse(sparse) => sparse.ncols(),
            Matrix::Labeled { inner, .. } => inner.ncols(),
        }
    }

    pub fn major(&self) -> MajorAxis {
        match self {
            Matrix::Dense(dense) => dense.major(),
            Matrix::Sparse(sparse) => sparse.major(),
            Matrix::Labeled { inner, .. } => inner.major(),
        }
    }

    pub fn dtype(&self) -> DType {
        match self {
            Matrix::Dense(dense) => dense.dtype(),
            Matrix::Sparse(sparse) => sparse.dtype(),
            Matrix::Labeled { inner, .. } => inner.dtype(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        match self {
            Matrix::Dense(_) => false,
            Matrix::Sparse(_) => true,
            Matrix::Labeled { inner, .. } => inner.is_sparse(),
        }
    }

    /// Every (row names, column names) label pair carried, outermost first.
    pub fn all_labels(&self) -> Vec<(&[String], &[String])> {
        let mut labels = Vec::new();
        let mut matrix = self;
        while let Matrix::Labeled {
            row_names,
            column_names,
            inner,
        } = matrix
        {
            labels.push((row_names.as_slice(), column_names.as_slice()));
            matrix = inner;
        }
        labels
    }

    pub fn get(&self, row: usize, column: usize) -> Scalar {
        match self {
            Matrix::Dense(dense) => dense.get(row, column),
            Matrix::Sparse(sparse) => sparse.get(row, column),
            Matrix::Labeled { inner, .. } => inner.get(row, column),
        }
    }

    /// Swap rows and columns (no data movement).
    pub fn transposed(self) -> Matrix {
        match self {
            Matrix::Dense(dense) => Matrix::Dense(dense.transposed()),
            Matrix::Sparse(sparse) => Matrix::Sparse(sparse.transposed()),
            Matrix::Labeled {
                row_names,
                column_names,
                inner,
            } => Matrix::Labeled {
                row_names: column_names,
                column_names: row_names,
                inner: Box::new(inner.transposed()),
            },
        }
    }

    /// Copy into the other major axis (labels are dropped).
    pub fn relayout(&self) -> Matrix {
        match self {
            Matrix::Dense(dense) => Matrix::Dense(dense.relayout()),
            Matrix::Sparse(sparse) => Matrix::Sparse(sparse.relayout()),
            Matrix::Labeled { inner, .. } => inner.relayout(),
        }
    }

    /// The values as a dense matrix in the same major axis.
    pub fn to_dense(&self) -> DenseMatrix {
        match self {
            Matrix::Dense(dense) => dense.clone(),
            Matrix::Sparse(sparse) => sparse.to_dense(),
            Matrix::Labeled { inner, .. } => inner.to_dense(),
        }
    }

    /// Strip labels; fails (returning the actual major axis) if the storage
    /// isn't in the required layout.
    pub fn into_storage_or_fail(self, required: MajorAxis) -> std::result::Result<Matrix, MajorAxis> {
        match self {
            Matrix::Labeled { inner, .. } => inner.into_storage_or_fail(required),
            other if other.major() == required => Ok(other),
            other => Err(other.major()),
        }
    }

    /// Strip labels, copying into the required layout if needed (subject to
    /// the inefficient action policy).
    pub fn into_storage_or_copy(self, required: MajorAxis, action: &str) -> Result<Matrix> {
        let storage = self.without_labels();
        let actual = storage.major();
        if actual == required {
            return Ok(storage);
        }
        inefficient_action(&format!("{action} of a {actual} matrix requires {required}"))?;
        Ok(storage.relayout())
    }

    /// Strip any labels, leaving the storage representation.
    pub fn without_labels(self) -> Matrix {
        match self {
            Matrix::Labeled { inner, .. } => inner.without_labels(),
            other => other,
        }
    }

    pub fn convert(&self, dtype: DType) -> Option<Matrix> {
        match self {
            Matrix::Dense(dense) => dense.convert(dtype).map(Matrix::Dense),
            Matrix::Sparse(sparse) if dtype.is_numeric() => sparse.convert(dtype).map(Matrix::Sparse),
            Matrix::Sparse(sparse) => sparse.to_dense().convert(dtype).map(Matrix::Dense),
            Matrix::Labeled {
                row_names,
                column_names,
                inner,
            } => Some(Matrix::Labeled {
                row_names: row_names.clone(),
                column_names: column_names.clone(),
                inner: Box::new(inner.convert(dtype)?),
            }),
        }
    }
}

impl From<DenseMatrix> for Matrix {
    fn from(dense: DenseMatrix) -> Self {
        Matrix::Dense(dense)
    }
}

impl From<SparseMatrix> for Matrix {
    fn from(sparse: SparseMatrix) -> Self {
        Matrix::Sparse(sparse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DenseMatrix {
        // 2 x 3, column-major: [[1, 0, 3], [0, 5, 0]]
        DenseMatrix::new(2, 3, MajorAxis::Columns, Values::from(vec![1i32, 0, 0, 5, 3, 0])).unwrap()
    }

    #[test]
    fn test_transpose_keeps_memory() {
        let dense = sample();
        let transposed = dense.clone().transposed();
        assert_eq!(transposed.nrows(), 3);
        assert_eq!(transposed.major(), MajorAxis::Rows);
        assert_eq!(transposed.values(), dense.values());
        assert_eq!(transposed.get(2, 0), Scalar::I32(3));
    }

    #[test]
    fn test_dense_relayout() {
        let rows = sample().relayout();
        assert_eq!(rows.major(), MajorAxis::Rows);
        assert_eq!(rows.values(), &Values::from(vec![1i32, 0, 3, 0, 5, 0]));
        assert_eq!(rows.get(1, 1), Scalar::I32(5));
    }

    #[test]
    fn test_sparse_relayout_matches_dense() {
        let sparse = SparseMatrix::from_dense(&sample()).unwrap();
        assert_eq!(sparse.nnz(), 3);
        let csr = sparse.relayout();
        assert_eq!(csr.major(), MajorAxis::Rows);
        assert_eq!(csr.to_dense(), sample().relayout());
        for row in 0..2 {
            for column in 0..3 {
                assert_eq!(csr.get(row, column), sample().get(row, column));
            }
        }
    }

    #[test]
    fn test_storage_or_fail() {
        let rows = Matrix::Dense(sample().relayout());
        assert_eq!(rows.clone().into_storage_or_fail(MajorAxis::Columns), Err(MajorAxis::Rows));
        let labeled = Matrix::labeled(vec!["a".into(), "b".into()], vec!["x".into(), "y".into(), "z".into()], sample());
        assert!(labeled.into_storage_or_fail(MajorAxis::Columns).is_ok());
    }
}
