//! Storage primitives: page identity and page-sized buffers.
//!
//! All persistent data lives in fixed-size pages. A page is addressed by a
//! [`PageId`], the owning file's [`FileId`] plus a zero-based page number,
//! and page `i` of a file is stored at byte offset `i * PAGE_SIZE`.
//!
//! [`PageData`] is the page-aligned buffer type used for buffer-pool frames
//! and raw I/O staging.

pub mod error;
pub mod page;

pub use error::StorageError;
pub use page::{FileId, PAGE_SIZE, PageData, PageId};
