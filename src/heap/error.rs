//! Error types for the heap module.

use std::fmt;

use crate::buffer::BufferError;
use crate::datum::{SerializationError, Type};
use crate::storage::{FileId, StorageError};
use crate::tuple::SlotId;

/// Errors from heap file and heap page operations.
#[derive(Debug)]
pub enum HeapError {
    /// The schema has no columns, so no tuple layout exists.
    EmptySchema,
    /// A tuple of this schema cannot fit in a page even alone.
    TupleTooLarge {
        /// Serialized tuple size for the schema.
        size: usize,
        /// Largest tuple size a page can hold.
        max: usize,
    },
    /// Raw tuple bytes do not match the page's fixed slot width.
    TupleSizeMismatch {
        /// Slot width for the page's schema.
        expected: usize,
        /// Size of the bytes supplied.
        actual: usize,
    },
    /// Tuple arity differs from the file's schema.
    SchemaMismatch {
        /// Columns in the file's schema.
        expected: usize,
        /// Values in the tuple.
        actual: usize,
    },
    /// A tuple value's type differs from its column's type.
    TypeMismatch {
        /// Name of the offending column.
        column: String,
        /// Type declared by the schema.
        expected: Type,
        /// Type of the supplied value.
        found: Type,
    },
    /// Every slot in the page is occupied.
    PageFull {
        /// Slots per page for this schema.
        slots: u16,
    },
    /// Slot index is past the end of the page's slot array.
    SlotOutOfRange {
        /// The requested slot.
        slot: SlotId,
        /// Slots per page for this schema.
        slot_count: u16,
    },
    /// The slot holds no tuple.
    SlotVacant(SlotId),
    /// The tuple carries no record id, so its location is unknown.
    MissingRecordId,
    /// The record id points into a different file.
    WrongFile {
        /// The file that was asked to operate.
        expected: FileId,
        /// The file named by the record id.
        actual: FileId,
    },
    /// The iterator has no further tuple.
    NoSuchElement,
    /// The iterator is not open.
    ScanNotOpen,
    /// Tuple (de)serialization failed.
    Serialization(SerializationError),
    /// The buffer pool could not supply a page.
    Buffer(BufferError),
    /// Raw page I/O failed.
    Storage(StorageError),
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HeapError::EmptySchema => {
                write!(f, "schema has no columns")
            }
            HeapError::TupleTooLarge { size, max } => {
                write!(f, "tuple size {} exceeds page capacity of {} bytes", size, max)
            }
            HeapError::TupleSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "tuple size mismatch: slot width is {} bytes, got {}",
                    expected, actual
                )
            }
            HeapError::SchemaMismatch { expected, actual } => {
                write!(
                    f,
                    "schema mismatch: expected {} columns, tuple has {}",
                    expected, actual
                )
            }
            HeapError::TypeMismatch {
                column,
                expected,
                found,
            } => {
                write!(
                    f,
                    "type mismatch in column {}: expected {}, found {}",
                    column, expected, found
                )
            }
            HeapError::PageFull { slots } => {
                write!(f, "page full: all {} slots occupied", slots)
            }
            HeapError::SlotOutOfRange { slot, slot_count } => {
                write!(f, "slot {} out of range: page has {} slots", slot, slot_count)
            }
            HeapError::SlotVacant(slot) => {
                write!(f, "slot {} is vacant", slot)
            }
            HeapError::MissingRecordId => {
                write!(f, "tuple has no record id")
            }
            HeapError::WrongFile { expected, actual } => {
                write!(f, "record belongs to file {}, not {}", actual, expected)
            }
            HeapError::NoSuchElement => {
                write!(f, "no further tuple")
            }
            HeapError::ScanNotOpen => {
                write!(f, "iterator is not open")
            }
            HeapError::Serialization(err) => {
                write!(f, "serialization error: {}", err)
            }
            HeapError::Buffer(err) => {
                write!(f, "buffer pool error: {}", err)
            }
            HeapError::Storage(err) => {
                write!(f, "storage error: {}", err)
            }
        }
    }
}

impl std::error::Error for HeapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HeapError::Serialization(err) => Some(err),
            HeapError::Buffer(err) => Some(err),
            HeapError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<SerializationError> for HeapError {
    fn from(err: SerializationError) -> Self {
        HeapError::Serialization(err)
    }
}

impl From<BufferError> for HeapError {
    fn from(err: BufferError) -> Self {
        HeapError::Buffer(err)
    }
}

impl From<StorageError> for HeapError {
    fn from(err: StorageError) -> Self {
        HeapError::Storage(err)
    }
}
