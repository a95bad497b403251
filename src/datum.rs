//! Column types and values.
//!
//! This module defines the fixed-width type system used by heap pages. Every
//! [`Type`] has a constant serialized width, which is what makes slot capacity
//! and slot offsets computable from the schema alone. [`Value`] is a single
//! typed column value with its fixed-width encoding.

use std::fmt;

use bytes::{Buf, BufMut};
use thiserror::Error;

/// Errors from value encoding and decoding.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Buffer too small for the operation.
    #[error("buffer too small: need {required} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Value does not belong to the column type it is encoded as.
    #[error("type mismatch: expected {expected}, got {actual:?}")]
    TypeMismatch {
        /// Declared column type.
        expected: Type,
        /// Offending value.
        actual: Value,
    },
    /// Text value wider than its `CHAR(n)` column.
    #[error("value of {len} bytes does not fit in CHAR({max})")]
    ValueTooLong {
        /// Encoded length of the value.
        len: usize,
        /// Column width.
        max: usize,
    },
    /// Text contains a NUL byte, which the `CHAR(n)` padding cannot represent.
    #[error("text contains a NUL byte at offset {offset}")]
    EmbeddedNul {
        /// Byte offset of the first NUL.
        offset: usize,
    },
    /// Tuple does not carry a value for every field of its descriptor.
    #[error("incomplete tuple: {present} of {expected} fields set")]
    IncompleteTuple {
        /// Number of fields in the descriptor.
        expected: usize,
        /// Number of values present.
        present: usize,
    },
    /// Invalid data format.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Returns `SerializationError::BufferTooSmall` if the buffer has fewer than
/// `$required` bytes remaining.
#[macro_export]
macro_rules! ensure_remaining {
    ($buf:expr, $required:expr) => {
        if $buf.remaining() < $required {
            return Err($crate::datum::SerializationError::BufferTooSmall {
                required: $required,
                available: $buf.remaining(),
            });
        }
    };
}

/// Column data type.
///
/// All types are fixed width; `Char(n)` is a NUL-padded UTF-8 string of
/// exactly `n` bytes on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean type.
    Bool,
    /// 2-byte integer.
    Int2,
    /// 4-byte integer.
    Int4,
    /// 8-byte integer.
    Int8,
    /// Single-precision floating-point.
    Float4,
    /// Double-precision floating-point.
    Float8,
    /// Fixed-length string of `n` bytes.
    Char(u16),
}

impl Type {
    /// Returns the serialized width in bytes.
    pub const fn len(self) -> usize {
        match self {
            Type::Bool => 1,
            Type::Int2 => 2,
            Type::Int4 => 4,
            Type::Int8 => 8,
            Type::Float4 => 4,
            Type::Float8 => 8,
            Type::Char(n) => n as usize,
        }
    }

    /// Returns true for a zero-width type (`CHAR(0)`).
    pub const fn is_empty(self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Bool => write!(f, "BOOLEAN"),
            Type::Int2 => write!(f, "SMALLINT"),
            Type::Int4 => write!(f, "INTEGER"),
            Type::Int8 => write!(f, "BIGINT"),
            Type::Float4 => write!(f, "REAL"),
            Type::Float8 => write!(f, "DOUBLE PRECISION"),
            Type::Char(n) => write!(f, "CHAR({})", n),
        }
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    /// Boolean (true/false).
    Boolean(bool),
    /// 16-bit signed integer (SMALLINT).
    Int16(i16),
    /// 32-bit signed integer (INTEGER).
    Int32(i32),
    /// 64-bit signed integer (BIGINT).
    Int64(i64),
    /// 32-bit floating point (REAL).
    Float32(f32),
    /// 64-bit floating point (DOUBLE PRECISION).
    Float64(f64),
    /// Text stored in a `CHAR(n)` column.
    Text(String),
}

impl Value {
    /// Returns true if this value can be stored in a column of type `ty`.
    ///
    /// Text is accepted for any `CHAR(n)`; the width is checked at encode time.
    pub fn matches(&self, ty: Type) -> bool {
        matches!(
            (self, ty),
            (Value::Boolean(_), Type::Bool)
                | (Value::Int16(_), Type::Int2)
                | (Value::Int32(_), Type::Int4)
                | (Value::Int64(_), Type::Int8)
                | (Value::Float32(_), Type::Float4)
                | (Value::Float64(_), Type::Float8)
                | (Value::Text(_), Type::Char(_))
        )
    }

    /// Encodes this value as column type `ty`, writing exactly `ty.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::TypeMismatch` if the value does not match
    /// `ty`, `SerializationError::ValueTooLong` if text exceeds the column
    /// width, `SerializationError::EmbeddedNul` if text contains a NUL byte,
    /// and `SerializationError::BufferTooSmall` if `dst` cannot hold
    /// the encoding.
    pub fn serialize(&self, ty: Type, dst: &mut impl BufMut) -> Result<(), SerializationError> {
        if !self.matches(ty) {
            return Err(SerializationError::TypeMismatch {
                expected: ty,
                actual: self.clone(),
            });
        }
        if dst.remaining_mut() < ty.len() {
            return Err(SerializationError::BufferTooSmall {
                required: ty.len(),
                available: dst.remaining_mut(),
            });
        }

        match self {
            Value::Boolean(b) => dst.put_u8(u8::from(*b)),
            Value::Int16(n) => dst.put_i16_le(*n),
            Value::Int32(n) => dst.put_i32_le(*n),
            Value::Int64(n) => dst.put_i64_le(*n),
            Value::Float32(n) => dst.put_f32_le(*n),
            Value::Float64(n) => dst.put_f64_le(*n),
            Value::Text(s) => {
                let width = ty.len();
                let data = s.as_bytes();
                if data.len() > width {
                    return Err(SerializationError::ValueTooLong {
                        len: data.len(),
                        max: width,
                    });
                }
                if let Some(offset) = data.iter().position(|&b| b == 0) {
                    return Err(SerializationError::EmbeddedNul { offset });
                }
                dst.put_slice(data);
                dst.put_bytes(0, width - data.len());
            }
        }
        Ok(())
    }

    /// Decodes a value of column type `ty`, consuming exactly `ty.len()` bytes.
    ///
    /// # Errors
    ///
    /// Returns `SerializationError::BufferTooSmall` if `src` is too short and
    /// `SerializationError::InvalidFormat` for malformed data.
    pub fn deserialize(ty: Type, src: &mut impl Buf) -> Result<Self, SerializationError> {
        ensure_remaining!(src, ty.len());

        let value = match ty {
            Type::Bool => match src.get_u8() {
                0 => Value::Boolean(false),
                1 => Value::Boolean(true),
                b => {
                    return Err(SerializationError::InvalidFormat(format!(
                        "invalid boolean byte {:#04x}",
                        b
                    )));
                }
            },
            Type::Int2 => Value::Int16(src.get_i16_le()),
            Type::Int4 => Value::Int32(src.get_i32_le()),
            Type::Int8 => Value::Int64(src.get_i64_le()),
            Type::Float4 => Value::Float32(src.get_f32_le()),
            Type::Float8 => Value::Float64(src.get_f64_le()),
            Type::Char(n) => {
                let mut data = vec![0u8; n as usize];
                src.copy_to_slice(&mut data);
                let end = data.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
                data.truncate(end);
                let s = String::from_utf8(data)
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Value::Text(s)
            }
        };
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int16(n) => write!(f, "{}", n),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float32(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
