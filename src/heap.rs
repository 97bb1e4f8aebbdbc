//! Heap files: unordered tuple storage over slotted pages.
//!
//! A heap file is a dense sequence of fixed-size pages holding tuples of one
//! schema, in no particular order. This module provides:
//!
//! - [`DbFile`]: the interface every table file implements
//! - [`HeapFile`]: the on-disk heap file implementation
//! - [`HeapPage`]: page-level slot management over raw page bytes
//! - [`HeapScanner`]: a [`TupleIterator`] over a whole file
//!
//! All page access from tuple operations goes through the
//! [`BufferPool`](crate::buffer::BufferPool), which caches pages and holds
//! page locks on behalf of transactions.

mod error;
mod file;
mod page;
mod scan;

pub use error::HeapError;
pub use file::HeapFile;
pub use page::{HeapPage, MAX_TUPLE_SIZE, page_capacity};
pub use scan::HeapScanner;

use std::sync::Arc;

use async_trait::async_trait;

use crate::buffer::BufferPool;
use crate::storage::{FileId, PageId, StorageError};
use crate::tuple::{Schema, Tuple};
use crate::tx::TransactionId;

/// The result of a successful tuple insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct Inserted {
    /// The inserted tuple, annotated with the [`RecordId`](crate::tuple::RecordId)
    /// of the slot it landed in.
    pub tuple: Tuple,
    /// Pages modified by the insertion, in modification order.
    pub dirtied: Vec<PageId>,
}

/// Interface of a table file on disk.
///
/// Tuple-level operations (`insert_tuple`, `delete_tuple`, `scan`) never
/// touch the disk directly; they fetch pages through the buffer pool passed
/// in, which also acquires the page locks for the calling transaction.
/// Page-level I/O (`read_page`, `write_page`, `allocate_page`) bypasses the
/// cache and is intended for the buffer pool itself.
#[async_trait]
pub trait DbFile: Send + Sync {
    /// Stable identifier of this file.
    fn file_id(&self) -> FileId;

    /// Schema of the tuples stored in this file.
    fn schema(&self) -> &Schema;

    /// Number of pages currently in this file.
    fn page_count(&self) -> u64;

    /// Reads one page from disk into `buf`.
    ///
    /// # Errors
    ///
    /// Returns an error if the page belongs to another file, lies beyond the
    /// end of this file, `buf` is not exactly one page, or the read fails.
    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError>;

    /// Writes one page to disk.
    ///
    /// The page must already exist; writing never grows the file. Growth
    /// goes through [`DbFile::allocate_page`].
    ///
    /// # Errors
    ///
    /// Same conditions as [`DbFile::read_page`].
    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError>;

    /// Appends a zeroed page to the file and returns its id.
    async fn allocate_page(&self) -> Result<PageId, StorageError>;

    /// Flushes file contents to stable storage.
    async fn sync_all(&self) -> Result<(), StorageError>;

    /// Inserts a tuple on behalf of transaction `tid`.
    ///
    /// The tuple lands in the lowest-numbered page with a free slot, in that
    /// page's lowest free slot; a new page is appended only when every
    /// existing page is full. Returns the stored tuple together with the
    /// pages dirtied in the buffer pool.
    async fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Inserted, HeapError>;

    /// Deletes the tuple at `tuple`'s record id on behalf of `tid`.
    ///
    /// Returns the id of the dirtied page. The slot becomes free for reuse;
    /// the file never shrinks.
    async fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageId, HeapError>;

    /// Returns an iterator over every tuple in this file.
    ///
    /// The iterator starts unopened; call [`TupleIterator::open`] before
    /// use. Pages are fetched through `pool` with read permission as the
    /// scan advances.
    fn scan(self: Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> Box<dyn TupleIterator>;
}

/// Cursor over the tuples of a file.
///
/// Iterators move through three states: unopened, open, and closed. Only an
/// open iterator yields tuples; `has_next` on an unopened or closed iterator
/// reports false rather than erroring, while `next` and `rewind` do error.
/// Closing releases the iterator's buffered state but no page locks; locks
/// belong to the transaction and are released at transaction completion.
#[async_trait]
pub trait TupleIterator: Send {
    /// Opens (or reopens) the iterator, positioning it before the first
    /// tuple.
    async fn open(&mut self) -> Result<(), HeapError>;

    /// Returns true if another tuple is available.
    async fn has_next(&mut self) -> Result<bool, HeapError>;

    /// Returns the next tuple, annotated with its record id.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::NoSuchElement`] when exhausted or not open.
    async fn next(&mut self) -> Result<Tuple, HeapError>;

    /// Repositions an open iterator before the first tuple.
    ///
    /// # Errors
    ///
    /// Returns [`HeapError::ScanNotOpen`] if the iterator is not open.
    async fn rewind(&mut self) -> Result<(), HeapError>;

    /// Closes the iterator. Idempotent.
    fn close(&mut self);
}
