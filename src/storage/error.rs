//! Storage layer errors.

use crate::storage::FileId;

/// Storage layer errors.
#[derive(Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system.
    Io(std::io::Error),

    /// The page id belongs to a different file.
    WrongFile {
        /// Id of the file the operation was invoked on.
        expected: FileId,
        /// Id carried by the offending page id.
        actual: FileId,
    },

    /// Page number outside the file's current extent.
    ///
    /// Raw page I/O never grows a file; new pages come from `allocate_page`.
    PageOutOfBounds {
        /// Requested page number.
        page_no: u64,
        /// Number of pages in the file.
        page_count: u64,
    },

    /// Invalid buffer size provided to read_page or write_page.
    ///
    /// Buffers must be exactly PAGE_SIZE bytes.
    InvalidBufferSize {
        /// Expected buffer size (PAGE_SIZE)
        expected: usize,
        /// Actual buffer size provided
        actual: usize,
    },

    /// Data corruption detected.
    ///
    /// This indicates that the storage file has an invalid format or size.
    Corrupted(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(e) => write!(f, "I/O error: {}", e),
            StorageError::WrongFile { expected, actual } => {
                write!(f, "page belongs to file {}, not {}", actual, expected)
            }
            StorageError::PageOutOfBounds {
                page_no,
                page_count,
            } => {
                write!(
                    f,
                    "page {} out of bounds for file with {} pages",
                    page_no, page_count
                )
            }
            StorageError::InvalidBufferSize { expected, actual } => {
                write!(
                    f,
                    "invalid buffer size: expected {}, got {}",
                    expected, actual
                )
            }
            StorageError::Corrupted(msg) => write!(f, "data corruption: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        StorageError::Io(e)
    }
}
