//! Tuples, schemas, and record identity.
//!
//! A [`Tuple`] is a row of [`Value`]s laid out according to a [`Schema`].
//! Tuples serialize to a fixed-width binary format so that every tuple of a
//! given schema occupies exactly [`Schema::tuple_size`] bytes on disk:
//!
//! ```text
//! +---------------------------+
//! | Null Bitmap (ceil(n/8) B) |  bit=1: NOT NULL, bit=0: NULL
//! +---------------------------+
//! | Column[0] (fixed width)   |
//! | Column[1] (fixed width)   |
//! | ...                       |
//! +---------------------------+
//! ```
//!
//! Column regions sit at fixed offsets regardless of null-ness; the region of
//! a NULL column is zero-filled. Serializing the same tuple therefore always
//! produces identical bytes.

use std::fmt;

use crate::datum::{SerializationError, Type, Value};
use crate::storage::PageId;

/// A named, typed column in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub ty: Type,
}

impl Column {
    /// Creates a new column.
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// An ordered list of columns describing the layout of a tuple.
///
/// All layout math derives from the schema: every file stores tuples of one
/// schema, and every page of that file holds [`Schema::tuple_size`]-wide
/// slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema from columns.
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// Returns the columns in order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Returns the column at `index`.
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Returns the number of columns.
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if the schema has no columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Size in bytes of the per-tuple null bitmap.
    pub fn null_bitmap_size(&self) -> usize {
        self.columns.len().div_ceil(8)
    }

    /// Serialized size in bytes of one tuple of this schema.
    ///
    /// Fixed for the whole schema: null bitmap plus the sum of all column
    /// widths, whether or not individual values are NULL.
    pub fn tuple_size(&self) -> usize {
        self.null_bitmap_size()
            + self
                .columns
                .iter()
                .map(|c| c.ty.byte_len())
                .sum::<usize>()
    }
}

/// Slot index within a page.
pub type SlotId = u16;

/// Physical address of a stored tuple: owning page plus slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    /// The page holding the tuple.
    pub page: PageId,
    /// The slot within that page.
    pub slot: SlotId,
}

impl RecordId {
    /// Creates a new record id.
    pub const fn new(page: PageId, slot: SlotId) -> Self {
        Self { page, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page, self.slot)
    }
}

/// A tuple (row) of values, optionally annotated with its stored location.
///
/// Freshly constructed tuples have no [`RecordId`]; insertion produces a new
/// tuple value carrying the id of the slot it landed in (see
/// [`Tuple::with_rid`]). Tuples read back from disk always carry one.
#[derive(Debug, Clone, PartialEq)]
pub struct Tuple {
    values: Vec<Value>,
    rid: Option<RecordId>,
}

impl Tuple {
    /// Creates a tuple with no record id.
    pub fn new(values: Vec<Value>) -> Self {
        Self { values, rid: None }
    }

    /// Returns the values in column order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Returns the value at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Returns the number of values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the tuple has no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns where this tuple is stored, if known.
    pub fn rid(&self) -> Option<RecordId> {
        self.rid
    }

    /// Returns this tuple annotated with a storage location.
    pub fn with_rid(self, rid: RecordId) -> Self {
        Self {
            values: self.values,
            rid: Some(rid),
        }
    }

    /// Serializes this tuple into `buf` using the fixed-width layout.
    ///
    /// Exactly [`Schema::tuple_size`] bytes are written; the remainder of
    /// `buf` is untouched. The written region is zeroed first, so NULL
    /// columns and text padding come out as zero bytes and the output is
    /// byte-for-byte deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is too small, the tuple's arity differs
    /// from the schema's, or a value's type does not match its column.
    pub fn serialize(&self, schema: &Schema, buf: &mut [u8]) -> Result<(), SerializationError> {
        let required = schema.tuple_size();
        if buf.len() < required {
            return Err(SerializationError::BufferTooSmall {
                required,
                available: buf.len(),
            });
        }
        if self.values.len() != schema.len() {
            return Err(SerializationError::InvalidFormat(format!(
                "tuple has {} values but schema has {} columns",
                self.values.len(),
                schema.len()
            )));
        }

        buf[..required].fill(0);

        let bitmap_size = schema.null_bitmap_size();
        let mut offset = bitmap_size;
        for (i, (column, value)) in schema.columns().iter().zip(&self.values).enumerate() {
            let width = column.ty.byte_len();
            if let Some(found) = value.data_type() {
                if found != column.ty {
                    return Err(SerializationError::InvalidFormat(format!(
                        "column {} expects {} but value is {}",
                        column.name, column.ty, found
                    )));
                }
                buf[i / 8] |= 1 << (i % 8);
                value.write(&mut buf[offset..offset + width])?;
            }
            offset += width;
        }

        Ok(())
    }

    /// Deserializes a tuple from `buf` according to `schema`.
    ///
    /// The returned tuple has no record id; callers that know where the
    /// bytes came from attach one with [`Tuple::with_rid`].
    ///
    /// # Errors
    ///
    /// Returns an error if `buf` is too small or a stored value is
    /// malformed.
    pub fn deserialize(buf: &[u8], schema: &Schema) -> Result<Self, SerializationError> {
        let required = schema.tuple_size();
        if buf.len() < required {
            return Err(SerializationError::BufferTooSmall {
                required,
                available: buf.len(),
            });
        }

        let bitmap_size = schema.null_bitmap_size();
        let mut offset = bitmap_size;
        let mut values = Vec::with_capacity(schema.len());
        for (i, column) in schema.columns().iter().enumerate() {
            let width = column.ty.byte_len();
            let not_null = buf[i / 8] & (1 << (i % 8)) != 0;
            if not_null {
                values.push(Value::read(&buf[offset..offset + width], column.ty)?);
            } else {
                values.push(Value::Null);
            }
            offset += width;
        }

        Ok(Self::new(values))
    }
}
