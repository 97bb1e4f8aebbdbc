//! Error types for the buffer pool.

use std::fmt;

use crate::storage::{FileId, StorageError};
use crate::tx::TransactionId;

/// Errors from buffer pool operations.
#[derive(Debug)]
pub enum BufferError {
    /// The transaction was aborted while waiting for a page lock.
    TransactionAborted(TransactionId),
    /// Every frame is pinned or holds uncommitted data; nothing can be
    /// evicted to make room.
    NoEvictableFrames,
    /// No file with this id is registered in the catalog.
    UnknownFile(FileId),
    /// Reading or writing the backing file failed.
    Storage(StorageError),
}

impl fmt::Display for BufferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferError::TransactionAborted(tid) => {
                write!(f, "transaction {} aborted waiting for a page lock", tid)
            }
            BufferError::NoEvictableFrames => {
                write!(f, "buffer pool exhausted: no evictable frames")
            }
            BufferError::UnknownFile(file) => {
                write!(f, "no file registered with id {}", file)
            }
            BufferError::Storage(err) => {
                write!(f, "storage error: {}", err)
            }
        }
    }
}

impl std::error::Error for BufferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BufferError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for BufferError {
    fn from(err: StorageError) -> Self {
        BufferError::Storage(err)
    }
}
