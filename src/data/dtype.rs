//! Element types and scalar values.

use std::fmt;

/// The element type of a scalar, vector or matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
}

impl DType {
    /// All the types that can hold numbers (including `Bool`).
    pub const NUMERIC: [DType; 11] = [
        DType::Bool,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::F32,
        DType::F64,
    ];

    /// The canonical name used in query texts and error messages.
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "Bool",
            DType::I8 => "Int8",
            DType::I16 => "Int16",
            DType::I32 => "Int32",
            DType::I64 => "Int64",
            DType::U8 => "UInt8",
            DType::U16 => "UInt16",
            DType::U32 => "UInt32",
            DType::U64 => "UInt64",
            DType::F32 => "Float32",
            DType::F64 => "Float64",
            DType::String => "String",
        }
    }

    /// Parse a type name; both the canonical names and the Rust primitive
    /// names (`i32`, `f64`, ...) are accepted.
    pub fn parse(name: &str) -> Option<DType> {
        let dtype = match name {
            "Bool" | "bool" => DType::Bool,
            "Int8" | "i8" => DType::I8,
            "Int16" | "i16" => DType::I16,
            "Int32" | "i32" => DType::I32,
            "Int64" | "i64" => DType::I64,
            "UInt8" | "u8" => DType::U8,
            "UInt16" | "u16" => DType::U16,
            "UInt32" | "u32" => DType::U32,
            "UInt64" | "u64" => DType::U64,
            "Float32" | "f32" => DType::F32,
            "Float64" | "f64" => DType::F64,
            "String" | "str" => DType::String,
            _ => return None,
        };
        Some(dtype)
    }

    pub fn is_numeric(self) -> bool {
        self != DType::String
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F32 | DType::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(self, DType::I8 | DType::I16 | DType::I32 | DType::I64)
    }

    pub fn is_unsigned(self) -> bool {
        matches!(self, DType::U8 | DType::U16 | DType::U32 | DType::U64)
    }

    pub fn is_integer(self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    /// Size of one element in bytes (strings count as a pointer).
    pub fn size(self) -> usize {
        match self {
            DType::Bool | DType::I8 | DType::U8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::U32 | DType::F32 => 4,
            DType::I64 | DType::U64 | DType::F64 | DType::String => 8,
        }
    }

    /// The floating point type used for results of "fractional" computations.
    pub fn float_for(self) -> DType {
        if self == DType::F32 {
            DType::F32
        } else {
            DType::F64
        }
    }

    /// The unsigned type of the same width (for `Abs`).
    pub fn unsigned_for(self) -> DType {
        match self {
            DType::I8 => DType::U8,
            DType::I16 => DType::U16,
            DType::I32 => DType::U32,
            DType::I64 => DType::U64,
            other => other,
        }
    }

    fn signed_of_size(size: usize) -> DType {
        match size {
            1 => DType::I8,
            2 => DType::I16,
            4 => DType::I32,
            _ => DType::I64,
        }
    }

    /// The smallest type that can hold the values of both types.
    pub fn promote(self, other: DType) -> DType {
        use DType::*;
        match (self, other) {
            _ if self == other => self,
            (String, _) | (_, String) => String,
            (Bool, other) | (other, Bool) => other,
            (F32, F64) | (F64, F32) => F64,
            (F32, int) | (int, F32) => {
                if int.size() <= 2 {
                    F32
                } else {
                    F64
                }
            }
            (F64, _) | (_, F64) => F64,
            (left, right) if left.is_signed() == right.is_signed() => {
                if left.size() >= right.size() {
                    left
                } else {
                    right
                }
            }
            (left, right) => {
                let (signed, unsigned) = if left.is_signed() {
                    (left, right)
                } else {
                    (right, left)
                };
                if signed.size() > unsigned.size() {
                    signed
                } else {
                    DType::signed_of_size(unsigned.size() * 2)
                }
            }
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// SCALARS
// ============================================================================

/// A single typed value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Scalar {
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
}

impl Scalar {
    pub fn dtype(&self) -> DType {
        match self {
            Scalar::Bool(_) => DType::Bool,
            Scalar::I8(_) => DType::I8,
            Scalar::I16(_) => DType::I16,
            Scalar::I32(_) => DType::I32,
            Scalar::I64(_) => DType::I64,
            Scalar::U8(_) => DType::U8,
            Scalar::U16(_) => DType::U16,
            Scalar::U32(_) => DType::U32,
            Scalar::U64(_) => DType::U64,
            Scalar::F32(_) => DType::F32,
            Scalar::F64(_) => DType::F64,
            Scalar::String(_) => DType::String,
        }
    }

    /// The numeric value, if this is not a string.
    pub fn to_f64(&self) -> Option<f64> {
        let value = match self {
            Scalar::Bool(value) => f64::from(u8::from(*value)),
            Scalar::I8(value) => f64::from(*value),
            Scalar::I16(value) => f64::from(*value),
            Scalar::I32(value) => f64::from(*value),
            Scalar::I64(value) => *value as f64,
            Scalar::U8(value) => f64::from(*value),
            Scalar::U16(value) => f64::from(*value),
            Scalar::U32(value) => f64::from(*value),
            Scalar::U64(value) => *value as f64,
            Scalar::F32(value) => f64::from(*value),
            Scalar::F64(value) => *value,
            Scalar::String(_) => return None,
        };
        Some(value)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(value) => Some(value),
            _ => None,
        }
    }

    /// Whether this is the "empty" value of its type (zero, false or "").
    pub fn is_empty_value(&self) -> bool {
        match self {
            Scalar::String(value) => value.is_empty(),
            other => other.to_f64() == Some(0.0),
        }
    }

    /// The zero (or empty string) value of a type.
    pub fn zero(dtype: DType) -> Scalar {
        if dtype == DType::String {
            Scalar::String(String::new())
        } else {
            Scalar::from_f64(dtype, 0.0)
        }
    }

    /// Convert a number to the given numeric type (saturating casts).
    pub fn from_f64(dtype: DType, value: f64) -> Scalar {
        match dtype {
            DType::Bool => Scalar::Bool(value != 0.0),
            DType::I8 => Scalar::I8(value as i8),
            DType::I16 => Scalar::I16(value as i16),
            DType::I32 => Scalar::I32(value as i32),
            DType::I64 => Scalar::I64(value as i64),
            DType::U8 => Scalar::U8(value as u8),
            DType::U16 => Scalar::U16(value as u16),
            DType::U32 => Scalar::U32(value as u32),
            DType::U64 => Scalar::U64(value as u64),
            DType::F32 => Scalar::F32(value as f32),
            DType::F64 => Scalar::F64(value),
            DType::String => Scalar::String(format_number(value)),
        }
    }

    /// Parse a text into a value of the given type.
    pub fn parse_as(dtype: DType, text: &str) -> Option<Scalar> {
        let scalar = match dtype {
            DType::Bool => Scalar::Bool(match text {
                "true" | "True" | "1" => true,
                "false" | "False" | "0" => false,
                _ => return None,
            }),
            DType::I8 => Scalar::I8(text.parse().ok()?),
            DType::I16 => Scalar::I16(text.parse().ok()?),
            DType::I32 => Scalar::I32(text.parse().ok()?),
            DType::I64 => Scalar::I64(text.parse().ok()?),
            DType::U8 => Scalar::U8(text.parse().ok()?),
            DType::U16 => Scalar::U16(text.parse().ok()?),
            DType::U32 => Scalar::U32(text.parse().ok()?),
            DType::U64 => Scalar::U64(text.parse().ok()?),
            DType::F32 => Scalar::F32(text.parse().ok()?),
            DType::F64 => Scalar::F64(text.parse().ok()?),
            DType::String => Scalar::String(text.to_string()),
        };
        Some(scalar)
    }

    /// Convert to another type; strings are parsed, numbers are cast.
    pub fn convert(&self, dtype: DType) -> Option<Scalar> {
        if self.dtype() == dtype {
            return Some(self.clone());
        }
        match self {
            Scalar::String(text) => Scalar::parse_as(dtype, text),
            _ if dtype == DType::String => Some(Scalar::String(self.to_string())),
            other => other.to_f64().map(|value| Scalar::from_f64(dtype, value)),
        }
    }
}

/// Render a number the way query texts and string conversions expect it
/// (integral values without a fraction).
pub(crate) fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::I8(value) => write!(f, "{value}"),
            Scalar::I16(value) => write!(f, "{value}"),
            Scalar::I32(value) => write!(f, "{value}"),
            Scalar::I64(value) => write!(f, "{value}"),
            Scalar::U8(value) => write!(f, "{value}"),
            Scalar::U16(value) => write!(f, "{value}"),
            Scalar::U32(value) => write!(f, "{value}"),
            Scalar::U64(value) => write!(f, "{value}"),
            Scalar::F32(value) => write!(f, "{value}"),
            Scalar::F64(value) => write!(f, "{value}"),
            Scalar::String(value) => f.write_str(value),
        }
    }
}

macro_rules! scalar_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }
        )*
    };
}

scalar_from!(
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

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_promote() {
        assert_eq!(DType::I8.promote(DType::I32), DType::I32);
        assert_eq!(DType::U8.promote(DType::I8), DType::I16);
        assert_eq!(DType::U32.promote(DType::I64), DType::I64);
        assert_eq!(DType::Bool.promote(DType::U16), DType::U16);
        assert_eq!(DType::F32.promote(DType::I16), DType::F32);
        assert_eq!(DType::F32.promote(DType::I32), DType::F64);
        assert_eq!(DType::String.promote(DType::F64), DType::String);
    }

    #[test]
    fn test_convert() {
        assert_eq!(Scalar::from("12").convert(DType::U8), Some(Scalar::U8(12)));
        assert_eq!(Scalar::I32(3).convert(DType::String), Some(Scalar::from("3")));
        assert_eq!(Scalar::F64(2.0).convert(DType::String), Some(Scalar::from("2")));
        assert_eq!(Scalar::from("x").convert(DType::F32), None);
    }
}
