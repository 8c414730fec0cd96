//! Typed columns of values.
//!
//! [`Values`] is the storage of every dense array (and the non-zero part of
//! every sparse array). Numeric computations go through `f64` and are
//! converted back to the requested element type at the end.

use super::dtype::{format_number, DType, Scalar};

/// A typed, contiguous column of values.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    String(Vec<String>),
}

/// Apply the same generic expression to whichever column is held.
macro_rules! dispatch_values {
    ($values:expr, $column:ident => $body:expr) => {
        match $values {
            Values::Bool($column) => $body,
            Values::I8($column) => $body,
            Values::I16($column) => $body,
            Values::I32($column) => $body,
            Values::I64($column) => $body,
            Values::U8($column) => $body,
            Values::U16($column) => $body,
            Values::U32($column) => $body,
            Values::U64($column) => $body,
            Values::F32($column) => $body,
            Values::F64($column) => $body,
            Values::String($column) => $body,
        }
    };
}

/// Like `dispatch_values!`, but wraps the result back in the same variant.
macro_rules! map_values {
    ($values:expr, $column:ident => $body:expr) => {
        match $values {
            Values::Bool($column) => Values::Bool($body),
            Values::I8($column) => Values::I8($body),
            Values::I16($column) => Values::I16($body),
            Values::I32($column) => Values::I32($body),
            Values::I64($column) => Values::I64($body),
            Values::U8($column) => Values::U8($body),
            Values::U16($column) => Values::U16($body),
            Values::U32($column) => Values::U32($body),
            Values::U64($column) => Values::U64($body),
            Values::F32($column) => Values::F32($body),
            Values::F64($column) => Values::F64($body),
            Values::String($column) => Values::String($body),
        }
    };
}

pub(crate) use map_values;

/// A Rust type that can be an element of [`Values`].
pub trait Element: Clone + PartialEq + 'static {
    const DTYPE: DType;

    fn slice(values: &Values) -> Option<&[Self]>;
    fn into_values(column: Vec<Self>) -> Values;
    fn from_scalar(scalar: &Scalar) -> Option<Self>;
    fn into_scalar(self) -> Scalar;
}

macro_rules! impl_element {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl Element for $ty {
                const DTYPE: DType = DType::$variant;

                fn slice(values: &Values) -> Option<&[Self]> {
                    match values {
                        Values::$variant(column) => Some(column),
                        _ => None,
                    }
                }

                fn into_values(column: Vec<Self>) -> Values {
                    Values::$variant(column)
                }

                fn from_scalar(scalar: &Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(value) => Some(value.clone()),
                        _ => None,
                    }
                }

                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }
            }

            impl From<Vec<$ty>> for Values {
                fn from(column: Vec<$ty>) -> Self {
                    Values::$variant(column)
                }
            }
        )*
    };
}

impl_element!(
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
);

impl From<Vec<&str>> for Values {
    fn from(column: Vec<&str>) -> Self {
        Values::String(column.into_iter().map(str::to_string).collect())
    }
}

fn cast_column<T>(values: &[f64], cast: impl Fn(f64) -> T) -> Vec<T> {
    values.iter().map(|value| cast(*value)).collect()
}

impl Values {
    pub fn dtype(&self) -> DType {
        match self {
            Values::Bool(_) => DType::Bool,
            Values::I8(_) => DType::I8,
            Values::I16(_) => DType::I16,
            Values::I32(_) => DType::I32,
            Values::I64(_) => DType::I64,
            Values::U8(_) => DType::U8,
            Values::U16(_) => DType::U16,
            Values::U32(_) => DType::U32,
            Values::U64(_) => DType::U64,
            Values::F32(_) => DType::F32,
            Values::F64(_) => DType::F64,
            Values::String(_) => DType::String,
        }
    }

    pub fn len(&self) -> usize {
        dispatch_values!(self, column => column.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// An empty column of the given type.
    pub fn empty(dtype: DType) -> Values {
        Values::filled(&Scalar::zero(dtype), 0)
    }

    /// A column holding `len` copies of a value.
    pub fn filled(value: &Scalar, len: usize) -> Values {
        match value {
            Scalar::Bool(value) => Values::Bool(vec![*value; len]),
            Scalar::I8(value) => Values::I8(vec![*value; len]),
            Scalar::I16(value) => Values::I16(vec![*value; len]),
            Scalar::I32(value) => Values::I32(vec![*value; len]),
            Scalar::I64(value) => Values::I64(vec![*value; len]),
            Scalar::U8(value) => Values::U8(vec![*value; len]),
            Scalar::U16(value) => Values::U16(vec![*value; len]),
            Scalar::U32(value) => Values::U32(vec![*value; len]),
            Scalar::U64(value) => Values::U64(vec![*value; len]),
            Scalar::F32(value) => Values::F32(vec![*value; len]),
            Scalar::F64(value) => Values::F64(vec![*value; len]),
            Scalar::String(value) => Values::String(vec![value.clone(); len]),
        }
    }

    /// The typed slice, if the column holds elements of type `T`.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::slice(self)
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Values::String(column) => Some(column),
            _ => None,
        }
    }

    pub fn get(&self, index: usize) -> Scalar {
        dispatch_values!(self, column => column[index].clone().into_scalar())
    }

    /// Whether the value at `index` is the empty value of the type.
    pub fn is_empty_at(&self, index: usize) -> bool {
        match self {
            Values::String(column) => column[index].is_empty(),
            Values::Bool(column) => !column[index],
            Values::F32(column) => column[index] == 0.0,
            Values::F64(column) => column[index] == 0.0,
            other => other.get(index).is_empty_value(),
        }
    }

    /// The values at the given positions, in order.
    pub fn gather(&self, indices: &[usize]) -> Values {
        map_values!(self, column => indices.iter().map(|index| column[*index].clone()).collect())
    }

    /// Concatenate columns of the same type.
    pub fn concat(parts: &[Values]) -> Option<Values> {
        let first = parts.first()?;
        let dtype = first.dtype();
        if parts.iter().any(|part| part.dtype() != dtype) {
            return None;
        }
        let mut result = first.clone();
        for part in &parts[1..] {
            result.extend(part);
        }
        Some(result)
    }

    /// Append another column of the same type.
    ///
    /// Panics if the types differ; callers convert first.
    pub fn extend(&mut self, other: &Values) {
        match (self, other) {
            (Values::Bool(left), Values::Bool(right)) => left.extend_from_slice(right),
            (Values::I8(left), Values::I8(right)) => left.extend_from_slice(right),
            (Values::I16(left), Values::I16(right)) => left.extend_from_slice(right),
            (Values::I32(left), Values::I32(right)) => left.extend_from_slice(right),
            (Values::I64(left), Values::I64(right)) => left.extend_from_slice(right),
            (Values::U8(left), Values::U8(right)) => left.extend_from_slice(right),
            (Values::U16(left), Values::U16(right)) => left.extend_from_slice(right),
            (Values::U32(left), Values::U32(right)) => left.extend_from_slice(right),
            (Values::U64(left), Values::U64(right)) => left.extend_from_slice(right),
            (Values::F32(left), Values::F32(right)) => left.extend_from_slice(right),
            (Values::F64(left), Values::F64(right)) => left.extend_from_slice(right),
            (Values::String(left), Values::String(right)) => left.extend_from_slice(right),
            (left, right) => panic!(
                "extending a column of type {} with a column of type {}",
                left.dtype(),
                right.dtype()
            ),
        }
    }

    /// The numeric values, or `None` for strings.
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        let numbers = match self {
            Values::Bool(column) => column.iter().map(|v| f64::from(u8::from(*v))).collect(),
            Values::I8(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::I16(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::I32(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::I64(column) => column.iter().map(|v| *v as f64).collect(),
            Values::U8(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::U16(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::U32(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::U64(column) => column.iter().map(|v| *v as f64).collect(),
            Values::F32(column) => column.iter().map(|v| f64::from(*v)).collect(),
            Values::F64(column) => column.clone(),
            Values::String(_) => return None,
        };
        Some(numbers)
    }

    /// Build a column of the given type from numbers (saturating casts).
    pub fn from_f64(dtype: DType, numbers: &[f64]) -> Values {
        match dtype {
            DType::Bool => Values::Bool(cast_column(numbers, |v| v != 0.0)),
            DType::I8 => Values::I8(cast_column(numbers, |v| v as i8)),
            DType::I16 => Values::I16(cast_column(numbers, |v| v as i16)),
            DType::I32 => Values::I32(cast_column(numbers, |v| v as i32)),
            DType::I64 => Values::I64(cast_column(numbers, |v| v as i64)),
            DType::U8 => Values::U8(cast_column(numbers, |v| v as u8)),
            DType::U16 => Values::U16(cast_column(numbers, |v| v as u16)),
            DType::U32 => Values::U32(cast_column(numbers, |v| v as u32)),
            DType::U64 => Values::U64(cast_column(numbers, |v| v as u64)),
            DType::F32 => Values::F32(cast_column(numbers, |v| v as f32)),
            DType::F64 => Values::F64(numbers.to_vec()),
            DType::String => Values::String(cast_column(numbers, format_number)),
        }
    }

    /// The values rendered as strings.
    pub fn to_strings(&self) -> Vec<String> {
        match self {
            Values::String(column) => column.clone(),
            other => (0..other.len()).map(|index| other.get(index).to_string()).collect(),
        }
    }

    /// Convert to another element type. Fails only when a string can't be
    /// parsed as the requested numeric type.
    pub fn convert(&self, dtype: DType) -> Option<Values> {
        if self.dtype() == dtype {
            return Some(self.clone());
        }
        match (self, dtype) {
            (_, DType::String) => Some(Values::String(self.to_strings())),
            (Values::String(column), dtype) => {
                let mut numbers = Vec::with_capacity(column.len());
                for text in column {
                    numbers.push(Scalar::parse_as(dtype, text)?.to_f64()?);
                }
                Some(Values::from_f64(dtype, &numbers))
            }
            (other, dtype) => other.to_f64().map(|numbers| Values::from_f64(dtype, &numbers)),
        }
    }

    /// Positions of the non-empty values.
    pub fn nonzero_indices(&self) -> Vec<usize> {
        (0..self.len()).filter(|index| !self.is_empty_at(*index)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_and_concat() {
        let values = Values::from(vec![1i32, 2, 3]);
        assert_eq!(values.gather(&[2, 0]), Values::from(vec![3i32, 1]));
        let joined = Values::concat(&[values.clone(), Values::from(vec![4i32])]).unwrap();
        assert_eq!(joined.as_slice::<i32>(), Some(&[1, 2, 3, 4][..]));
        assert!(Values::concat(&[values, Values::from(vec![1u8])]).is_none());
    }

    #[test]
    fn test_convert_strings() {
        let values = Values::from(vec!["1", "2"]);
        assert_eq!(values.convert(DType::U16), Some(Values::from(vec![1u16, 2])));
        assert_eq!(Values::from(vec!["a"]).convert(DType::U16), None);
        assert_eq!(
            Values::from(vec![1.5f64]).convert(DType::String),
            Some(Values::from(vec!["1.5"]))
        );
    }
}
