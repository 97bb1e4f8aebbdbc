//! Column data types and values.
//!
//! [`Type`] enumerates the storable column types. Every type serializes to
//! a fixed width, so a tuple's size is a pure function of its schema and
//! pages can be divided into uniform slots. [`Value`] is a single typed
//! column value with little-endian serialization into exactly
//! [`Type::byte_len`] bytes.

use std::fmt;

/// Maximum payload of a [`Type::Text`] column, in bytes.
///
/// Text values are stored as a 2-byte length prefix followed by the payload,
/// zero-padded to this capacity so the column width stays fixed.
pub const TEXT_CAPACITY: usize = 128;

/// Errors from value serialization/deserialization.
#[derive(Debug)]
pub enum SerializationError {
    /// Buffer too small for the operation.
    BufferTooSmall {
        /// Bytes required.
        required: usize,
        /// Bytes available.
        available: usize,
    },
    /// Text payload exceeds the fixed column capacity.
    TextTooLong {
        /// Payload length in bytes.
        len: usize,
        /// Maximum payload length.
        capacity: usize,
    },
    /// Invalid stored data.
    InvalidFormat(String),
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::BufferTooSmall {
                required,
                available,
            } => {
                write!(
                    f,
                    "buffer too small: need {} bytes, have {}",
                    required, available
                )
            }
            SerializationError::TextTooLong { len, capacity } => {
                write!(f, "text of {} bytes exceeds capacity {}", len, capacity)
            }
            SerializationError::InvalidFormat(msg) => {
                write!(f, "invalid format: {}", msg)
            }
        }
    }
}

impl std::error::Error for SerializationError {}

fn ensure_len(buf: &[u8], required: usize) -> Result<(), SerializationError> {
    if buf.len() < required {
        return Err(SerializationError::BufferTooSmall {
            required,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Column data type identifier.
///
/// All types are fixed-width; see [`Type::byte_len`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Type {
    /// Boolean type.
    Bool,
    /// 4-byte integer.
    Int4,
    /// 8-byte integer.
    Int8,
    /// Double-precision floating-point.
    Float8,
    /// Length-prefixed string, padded to [`TEXT_CAPACITY`].
    Text,
}

impl Type {
    /// Returns the serialized width of this type in bytes.
    pub const fn byte_len(self) -> usize {
        match self {
            Type::Bool => 1,
            Type::Int4 => 4,
            Type::Int8 => 8,
            Type::Float8 => 8,
            Type::Text => 2 + TEXT_CAPACITY,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Type::Bool => "boolean",
            Type::Int4 => "integer",
            Type::Int8 => "bigint",
            Type::Float8 => "double precision",
            Type::Text => "text",
        };
        write!(f, "{}", name)
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, PartialOrd)]
pub enum Value {
    /// SQL NULL (type is unknown/any).
    Null,
    /// Boolean (true/false).
    Boolean(bool),
    /// 32-bit signed integer.
    Int32(i32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point.
    Float64(f64),
    /// Text, at most [`TEXT_CAPACITY`] bytes of UTF-8.
    Text(String),
}

impl Value {
    /// Returns the data type for this value, or `None` for Null.
    pub fn data_type(&self) -> Option<Type> {
        match self {
            Value::Null => None,
            Value::Boolean(_) => Some(Type::Bool),
            Value::Int32(_) => Some(Type::Int4),
            Value::Int64(_) => Some(Type::Int8),
            Value::Float64(_) => Some(Type::Float8),
            Value::Text(_) => Some(Type::Text),
        }
    }

    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Serializes this value into the first [`Type::byte_len`] bytes of `buf`.
    ///
    /// Unused text capacity is zero-filled, so writing the same value always
    /// produces the same bytes. NULL has no serialized form; whether a column
    /// is NULL is recorded by the enclosing tuple, not here.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if `buf` is shorter than the value's width,
    /// `TextTooLong` if a text payload exceeds [`TEXT_CAPACITY`], and
    /// `InvalidFormat` when called on `Null`.
    pub fn write(&self, buf: &mut [u8]) -> Result<(), SerializationError> {
        match self {
            Value::Null => Err(SerializationError::InvalidFormat(
                "NULL has no serialized form".to_string(),
            )),
            Value::Boolean(b) => {
                ensure_len(buf, 1)?;
                buf[0] = if *b { 1 } else { 0 };
                Ok(())
            }
            Value::Int32(n) => {
                ensure_len(buf, 4)?;
                buf[0..4].copy_from_slice(&n.to_le_bytes());
                Ok(())
            }
            Value::Int64(n) => {
                ensure_len(buf, 8)?;
                buf[0..8].copy_from_slice(&n.to_le_bytes());
                Ok(())
            }
            Value::Float64(n) => {
                ensure_len(buf, 8)?;
                buf[0..8].copy_from_slice(&n.to_le_bytes());
                Ok(())
            }
            Value::Text(s) => {
                let data = s.as_bytes();
                if data.len() > TEXT_CAPACITY {
                    return Err(SerializationError::TextTooLong {
                        len: data.len(),
                        capacity: TEXT_CAPACITY,
                    });
                }
                ensure_len(buf, 2 + TEXT_CAPACITY)?;
                buf[0..2].copy_from_slice(&(data.len() as u16).to_le_bytes());
                buf[2..2 + data.len()].copy_from_slice(data);
                buf[2 + data.len()..2 + TEXT_CAPACITY].fill(0);
                Ok(())
            }
        }
    }

    /// Deserializes a value of type `ty` from the start of `buf`.
    ///
    /// # Errors
    ///
    /// `BufferTooSmall` if `buf` is shorter than the type's width, and
    /// `InvalidFormat` for malformed stored data.
    pub fn read(buf: &[u8], ty: Type) -> Result<Self, SerializationError> {
        ensure_len(buf, ty.byte_len())?;
        match ty {
            Type::Bool => Ok(Value::Boolean(buf[0] != 0)),
            Type::Int4 => {
                let n = i32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
                Ok(Value::Int32(n))
            }
            Type::Int8 => {
                let n = i64::from_le_bytes([
                    buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
                ]);
                Ok(Value::Int64(n))
            }
            Type::Float8 => {
                let n = f64::from_le_bytes([
                    buf[0], buf[1], buf[2], buf[3], buf[4], buf[5], buf[6], buf[7],
                ]);
                Ok(Value::Float64(n))
            }
            Type::Text => {
                let len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
                if len > TEXT_CAPACITY {
                    return Err(SerializationError::InvalidFormat(format!(
                        "text length {} exceeds capacity {}",
                        len, TEXT_CAPACITY
                    )));
                }
                let s = String::from_utf8(buf[2..2 + len].to_vec())
                    .map_err(|e| SerializationError::InvalidFormat(e.to_string()))?;
                Ok(Value::Text(s))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Int64(n) => write!(f, "{}", n),
            Value::Float64(n) => write!(f, "{}", n),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}
