// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

/// The closed tagged union of storable values
///
/// This is the interchange type of the built-in serializer: typed keys and
/// values are converted into a `Value`, which owns its on-disk encoding.
/// User-defined types travel as [`Value::Custom`] with a registered name.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Absent value
    Null,

    /// Boolean
    Bool(bool),

    /// 8-bit signed integer
    Byte(i8),

    /// 16-bit signed integer
    Short(i16),

    /// Unicode scalar
    Char(char),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    Long(i64),

    /// 32-bit float
    Float(f32),

    /// 64-bit float
    Double(f64),

    /// UTF-8 string
    Str(String),

    /// Arbitrary-precision integer
    BigInt(BigInt),

    /// Arbitrary-precision decimal
    BigDecimal(BigDecimal),

    /// Boolean array
    BoolArray(Vec<bool>),

    /// Raw byte array
    ByteArray(Vec<u8>),

    /// Char array
    CharArray(Vec<char>),

    /// 16-bit int array
    ShortArray(Vec<i16>),

    /// 32-bit int array; stored narrowed when the value range allows
    IntArray(Vec<i32>),

    /// 64-bit int array; stored narrowed when the value range allows
    LongArray(Vec<i64>),

    /// 32-bit float array
    FloatArray(Vec<f32>),

    /// 64-bit float array
    DoubleArray(Vec<f64>),

    /// String array
    StringArray(Vec<String>),

    /// Heterogeneous array of nested values
    Array(Vec<Value>),

    /// Two-dimensional 32-bit int array
    IntArray2(Vec<Vec<i32>>),

    /// Two-dimensional 64-bit int array
    LongArray2(Vec<Vec<i64>>),

    /// User type: registered codec name plus its opaque payload
    Custom {
        /// Registered codec name
        type_name: String,

        /// Codec output
        payload: Vec<u8>,
    },
}

impl Value {
    /// Element count for array kinds, `None` for scalars.
    #[must_use]
    pub fn array_len(&self) -> Option<usize> {
        Some(match self {
            Self::BoolArray(v) => v.len(),
            Self::ByteArray(v) => v.len(),
            Self::CharArray(v) => v.len(),
            Self::ShortArray(v) => v.len(),
            Self::IntArray(v) => v.len(),
            Self::LongArray(v) => v.len(),
            Self::FloatArray(v) => v.len(),
            Self::DoubleArray(v) => v.len(),
            Self::StringArray(v) => v.len(),
            Self::Array(v) => v.len(),
            Self::IntArray2(v) => v.len(),
            Self::LongArray2(v) => v.len(),
            _ => return None,
        })
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i8> for Value {
    fn from(value: i8) -> Self {
        Self::Byte(value)
    }
}

impl From<i16> for Value {
    fn from(value: i16) -> Self {
        Self::Short(value)
    }
}

impl From<char> for Value {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Long(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<BigInt> for Value {
    fn from(value: BigInt) -> Self {
        Self::BigInt(value)
    }
}

impl From<BigDecimal> for Value {
    fn from(value: BigDecimal) -> Self {
        Self::BigDecimal(value)
    }
}

impl From<Vec<bool>> for Value {
    fn from(value: Vec<bool>) -> Self {
        Self::BoolArray(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::ByteArray(value)
    }
}

impl From<&[u8]> for Value {
    fn from(value: &[u8]) -> Self {
        Self::ByteArray(value.to_vec())
    }
}

impl From<Vec<char>> for Value {
    fn from(value: Vec<char>) -> Self {
        Self::CharArray(value)
    }
}

impl From<Vec<i16>> for Value {
    fn from(value: Vec<i16>) -> Self {
        Self::ShortArray(value)
    }
}

impl From<Vec<i32>> for Value {
    fn from(value: Vec<i32>) -> Self {
        Self::IntArray(value)
    }
}

impl From<Vec<i64>> for Value {
    fn from(value: Vec<i64>) -> Self {
        Self::LongArray(value)
    }
}

impl From<Vec<f32>> for Value {
    fn from(value: Vec<f32>) -> Self {
        Self::FloatArray(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Self::DoubleArray(value)
    }
}

impl From<Vec<String>> for Value {
    fn from(value: Vec<String>) -> Self {
        Self::StringArray(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Self::Array(value)
    }
}

impl From<Vec<Vec<i32>>> for Value {
    fn from(value: Vec<Vec<i32>>) -> Self {
        Self::IntArray2(value)
    }
}

impl From<Vec<Vec<i64>>> for Value {
    fn from(value: Vec<Vec<i64>>) -> Self {
        Self::LongArray2(value)
    }
}

impl TryFrom<Value> for i32 {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Long(v) => Ok(v),
            other => Err(other),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = Value;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(v) => Ok(v),
            other => Err(other),
        }
    }
}
