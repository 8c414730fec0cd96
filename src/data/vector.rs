//! Vectors: dense, sparse, or labeled with entry names.

use super::dtype::{DType, Scalar};
use super::values::{map_values, Values};

/// A sparse vector: the positions and values of the non-zero entries.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    len: usize,
    indices: Vec<usize>,
    values: Values,
}

impl SparseVector {
    /// Build a sparse vector. Indices must be strictly increasing and in
    /// range, and the values must be numeric.
    pub fn new(len: usize, indices: Vec<usize>, values: Values) -> Result<Self, String> {
        if values.dtype() == DType::String {
            return Err("sparse vectors can't hold strings".to_string());
        }
        if indices.len() != values.len() {
            return Err(format!(
                "{} indices for {} values",
                indices.len(),
                values.len()
            ));
        }
        if indices.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err("sparse indices are not strictly increasing".to_string());
        }
        if indices.last().is_some_and(|last| *last >= len) {
            return Err(format!("sparse index out of bounds for length {len}"));
        }
        Ok(Self {
            len,
            indices,
            values,
        })
    }

    /// Keep only the non-zero entries of a dense column.
    pub fn from_dense(values: &Values) -> Option<Self> {
        if values.dtype() == DType::String {
            return None;
        }
        let indices = values.nonzero_indices();
        let nonzero = values.gather(&indices);
        Some(Self {
            len: values.len(),
            indices,
            values: nonzero,
        })
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn values(&self) -> &Values {
        &self.values
    }

    pub fn dtype(&self) -> DType {
        self.values.dtype()
    }

    pub fn get(&self, index: usize) -> Scalar {
        match self.indices.binary_search(&index) {
            Ok(position) => self.values.get(position),
            Err(_) => Scalar::zero(self.dtype()),
        }
    }

    pub fn to_dense(&self) -> Values {
        map_values!(&self.values, column => scatter(self.len, &self.indices, column))
    }

    /// Convert the stored values to another numeric type.
    pub fn convert(&self, dtype: DType) -> Option<SparseVector> {
        if !dtype.is_numeric() {
            return None;
        }
        Some(SparseVector {
            len: self.len,
            indices: self.indices.clone(),
            values: self.values.convert(dtype)?,
        })
    }

    /// Concatenate sparse vectors end to end.
    pub fn concat(parts: &[SparseVector]) -> Option<SparseVector> {
        let first = parts.first()?;
        let mut len = 0;
        let mut indices = Vec::new();
        let mut values = Values::empty(first.dtype());
        for part in parts {
            if part.dtype() != first.dtype() {
                return None;
            }
            indices.extend(part.indices.iter().map(|index| index + len));
            values.extend(&part.values);
            len += part.len;
        }
        Some(SparseVector {
            len,
            indices,
            values,
        })
    }
}

fn scatter<T: Clone + Default>(len: usize, indices: &[usize], column: &[T]) -> Vec<T> {
    let mut dense = vec![T::default(); len];
    for (index, value) in indices.iter().zip(column) {
        dense[*index] = value.clone();
    }
    dense
}

/// A vector in one of the supported representations.
///
/// Only `Dense` and `Sparse` are stored; `Labeled` carries entry names that
/// are checked against the axis when the vector is set, then stripped.
#[derive(Debug, Clone, PartialEq)]
pub enum Vector {
    Dense(Values),
    Sparse(SparseVector),
    Labeled { names: Vec<String>, inner: Box<Vector> },
}

impl Vector {
    pub fn labeled(names: Vec<String>, inner: impl Into<Vector>) -> Vector {
        Vector::Labeled {
            names,
            inner: Box::new(inner.into()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Vector::Dense(values) => values.len(),
            Vector::Sparse(sparse) => sparse.len(),
            Vector::Labeled { inner, .. } => inner.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Vector::Dense(values) => values.dtype(),
            Vector::Sparse(sparse) => sparse.dtype(),
            Vector::Labeled { inner, .. } => inner.dtype(),
        }
    }

    pub fn is_sparse(&self) -> bool {
        match self {
            Vector::Dense(_) => false,
            Vector::Sparse(_) => true,
            Vector::Labeled { inner, .. } => inner.is_sparse(),
        }
    }

    /// The outermost entry names, if any.
    pub fn labels(&self) -> Option<&[String]> {
        match self {
            Vector::Labeled { names, .. } => Some(names),
            _ => None,
        }
    }

    /// Every label set carried (outermost first), for validation.
    pub fn all_labels(&self) -> Vec<&[String]> {
        let mut labels = Vec::new();
        let mut vector = self;
        while let Vector::Labeled { names, inner } = vector {
            labels.push(names.as_slice());
            vector = inner;
        }
        labels
    }

    /// Strip any labels, leaving the storage representation.
    pub fn into_storage(self) -> Vector {
        match self {
            Vector::Labeled { inner, .. } => inner.into_storage(),
            other => other,
        }
    }

    pub fn get(&self, index: usize) -> Scalar {
        match self {
            Vector::Dense(values) => values.get(index),
            Vector::Sparse(sparse) => sparse.get(index),
            Vector::Labeled { inner, .. } => inner.get(index),
        }
    }

    /// The values as a dense column.
    pub fn to_dense(&self) -> Values {
        match self {
            Vector::Dense(values) => values.clone(),
            Vector::Sparse(sparse) => sparse.to_dense(),
            Vector::Labeled { inner, .. } => inner.to_dense(),
        }
    }

    /// The strings of a string vector.
    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Vector::Dense(values) => values.as_strings(),
            Vector::Sparse(_) => None,
            Vector::Labeled { inner, .. } => inner.as_strings(),
        }
    }

    /// Convert to another element type, keeping sparsity when possible.
    pub fn convert(&self, dtype: DType) -> Option<Vector> {
        match self {
            Vector::Sparse(sparse) if dtype.is_numeric() => {
                sparse.convert(dtype).map(Vector::Sparse)
            }
            Vector::Labeled { names, inner } => Some(Vector::Labeled {
                names: names.clone(),
                inner: Box::new(inner.convert(dtype)?),
            }),
            other => other.to_dense().convert(dtype).map(Vector::Dense),
        }
    }
}

impl From<Values> for Vector {
    fn from(values: Values) -> Self {
        Vector::Dense(values)
    }
}

impl From<SparseVector> for Vector {
    fn from(sparse: SparseVector) -> Self {
        Vector::Sparse(sparse)
    }
}

impl<T> From<Vec<T>> for Vector
where
    Values: From<Vec<T>>,
{
    fn from(column: Vec<T>) -> Self {
        Vector::Dense(Values::from(column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sparse_roundtrip_through_dense() {
        let dense = Values::from(vec![0u32, 3, 0, 5]);
        let sparse = SparseVector::from_dense(&dense).unwrap();
        assert_eq!(sparse.indices(), &[1, 3]);
        assert_eq!(sparse.get(2), Scalar::U32(0));
        assert_eq!(sparse.to_dense(), dense);
    }

    #[test]
    fn test_sparse_rejects_bad_indices() {
        assert!(SparseVector::new(3, vec![2, 1], Values::from(vec![1i8, 2])).is_err());
        assert!(SparseVector::new(3, vec![3], Values::from(vec![1i8])).is_err());
        assert!(SparseVector::new(3, vec![0], Values::from(vec!["x"])).is_err());
    }

    #[test]
    fn test_labels_are_stripped() {
        let vector = Vector::labeled(vec!["A".into(), "B".into()], vec![1i64, 2]);
        assert_eq!(vector.labels().map(|names| names.len()), Some(2));
        assert_eq!(vector.into_storage(), Vector::from(vec![1i64, 2]));
    }
}
