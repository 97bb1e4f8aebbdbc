//! On-disk heap file implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::debug;

use super::error::HeapError;
use super::page::{HeapPage, MAX_TUPLE_SIZE, page_capacity};
use super::scan::HeapScanner;
use super::{DbFile, Inserted, TupleIterator};
use crate::buffer::BufferPool;
use crate::storage::{FileId, PAGE_SIZE, PageId, StorageError};
use crate::tuple::{RecordId, Schema, Tuple};
use crate::tx::TransactionId;

/// A heap file: one table's tuples in a dense sequence of slotted pages.
///
/// # File Layout
///
/// ```text
/// +------------------+------------------+------------------+
/// | Page 0 (4KB)     | Page 1 (4KB)     | Page 2 (4KB)     | ...
/// +------------------+------------------+------------------+
/// ^ offset 0         ^ offset 4096      ^ offset 8192
/// ```
///
/// The page count is derived from the file length; there is no file header.
/// A zeroed page is a valid empty page, so a freshly grown file needs no
/// initialization pass. Deleting tuples frees slots but never shrinks the
/// file.
///
/// # Concurrency
///
/// A `tokio::Mutex` around the file handle serializes each seek with its
/// read or write. Tuple operations take their page locks through the buffer
/// pool; the raw page I/O here performs no locking of its own.
pub struct HeapFile {
    /// Canonical path of the backing file.
    path: PathBuf,
    /// Identifier derived from the canonical path.
    file_id: FileId,
    schema: Schema,
    file: Mutex<File>,
    /// Number of pages currently in the file.
    page_count: AtomicU64,
}

impl HeapFile {
    /// Opens the heap file at `path`, creating it empty if absent.
    ///
    /// # Errors
    ///
    /// - `HeapError::EmptySchema` if the schema has no columns
    /// - `HeapError::TupleTooLarge` if one tuple of the schema cannot fit
    ///   in a page
    /// - `HeapError::Storage` wrapping `StorageError::Corrupted` if the
    ///   file length is not a multiple of the page size, or an I/O error
    ///   if the open fails
    pub async fn open(path: impl Into<PathBuf>, schema: Schema) -> Result<Self, HeapError> {
        if schema.is_empty() {
            return Err(HeapError::EmptySchema);
        }
        if page_capacity(&schema) == 0 {
            return Err(HeapError::TupleTooLarge {
                size: schema.tuple_size(),
                max: MAX_TUPLE_SIZE,
            });
        }

        let path = path.into();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await
            .map_err(StorageError::from)?;

        // Canonicalize after create so the path resolves, then derive the
        // file id from the canonical spelling.
        let path = tokio::fs::canonicalize(&path)
            .await
            .map_err(StorageError::from)?;
        let file_id = FileId::from_path(&path);

        let file_size = file.metadata().await.map_err(StorageError::from)?.len();
        if file_size % PAGE_SIZE as u64 != 0 {
            return Err(HeapError::Storage(StorageError::Corrupted(format!(
                "file size {} is not a multiple of page size {}",
                file_size, PAGE_SIZE
            ))));
        }
        let page_count = file_size / PAGE_SIZE as u64;

        debug!(%file_id, path = %path.display(), pages = page_count, "opened heap file");
        Ok(Self {
            path,
            file_id,
            schema,
            file: Mutex::new(file),
            page_count: AtomicU64::new(page_count),
        })
    }

    /// Returns the canonical path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn check_page_id(&self, page_id: PageId) -> Result<(), StorageError> {
        if page_id.file != self.file_id {
            return Err(StorageError::WrongFile {
                expected: self.file_id,
                actual: page_id.file,
            });
        }
        let page_count = self.page_count.load(Ordering::Acquire);
        if page_id.page_no >= page_count {
            return Err(StorageError::PageOutOfBounds {
                page_no: page_id.page_no,
                page_count,
            });
        }
        Ok(())
    }

    fn check_tuple(&self, tuple: &Tuple) -> Result<(), HeapError> {
        if tuple.len() != self.schema.len() {
            return Err(HeapError::SchemaMismatch {
                expected: self.schema.len(),
                actual: tuple.len(),
            });
        }
        for (value, column) in tuple.values().iter().zip(self.schema.columns()) {
            if let Some(found) = value.data_type() {
                if found != column.ty {
                    return Err(HeapError::TypeMismatch {
                        column: column.name.clone(),
                        expected: column.ty,
                        found,
                    });
                }
            }
        }
        Ok(())
    }

    /// Inserts serialized tuple bytes into `page_id` under a write latch.
    async fn insert_into_page(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        bytes: &[u8],
    ) -> Result<Option<RecordId>, HeapError> {
        let mut guard = pool.fetch_page_mut(tid, page_id).await?;
        let inserted = {
            let mut page = HeapPage::new(guard.data_mut(), &self.schema);
            page.insert(bytes)
        };
        match inserted {
            Ok(slot) => {
                guard.mark_dirty();
                Ok(Some(RecordId::new(page_id, slot)))
            }
            Err(HeapError::PageFull { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl DbFile for HeapFile {
    fn file_id(&self) -> FileId {
        self.file_id
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn page_count(&self) -> u64 {
        self.page_count.load(Ordering::Acquire)
    }

    async fn read_page(&self, page_id: PageId, buf: &mut [u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        self.check_page_id(page_id)?;

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.read_exact(buf).await?;
        Ok(())
    }

    async fn write_page(&self, page_id: PageId, buf: &[u8]) -> Result<(), StorageError> {
        if buf.len() != PAGE_SIZE {
            return Err(StorageError::InvalidBufferSize {
                expected: PAGE_SIZE,
                actual: buf.len(),
            });
        }
        self.check_page_id(page_id)?;

        let mut file = self.file.lock().await;
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.write_all(buf).await?;
        Ok(())
    }

    async fn allocate_page(&self) -> Result<PageId, StorageError> {
        let mut file = self.file.lock().await;

        let page_no = self.page_count.load(Ordering::Acquire);
        let page_id = PageId::new(self.file_id, page_no);

        // Extend the file with a zeroed page. Zeroed bytes are a valid
        // empty page, so the file stays consistent even if nothing is ever
        // written to it.
        file.seek(std::io::SeekFrom::Start(page_id.byte_offset()))
            .await?;
        file.write_all(&[0u8; PAGE_SIZE]).await?;

        self.page_count.store(page_no + 1, Ordering::Release);
        Ok(page_id)
    }

    async fn sync_all(&self) -> Result<(), StorageError> {
        let file = self.file.lock().await;
        file.sync_all().await?;
        Ok(())
    }

    async fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: Tuple,
    ) -> Result<Inserted, HeapError> {
        self.check_tuple(&tuple)?;
        let mut bytes = vec![0u8; self.schema.tuple_size()];
        tuple.serialize(&self.schema, &mut bytes)?;

        // Probe existing pages lowest-first; the tuple goes to the first
        // page with a free slot.
        for page_no in 0..self.page_count.load(Ordering::Acquire) {
            let page_id = PageId::new(self.file_id, page_no);
            let held_before = pool.holds_lock(tid, page_id);

            let has_space = {
                let guard = pool.fetch_page(tid, page_id).await?;
                HeapPage::new(guard.data(), &self.schema).free_slots() > 0
            };
            if has_space {
                if let Some(rid) = self.insert_into_page(pool, tid, page_id, &bytes).await? {
                    return Ok(Inserted {
                        tuple: tuple.with_rid(rid),
                        dirtied: vec![page_id],
                    });
                }
                // Filled up between the space check and the insert; keep
                // probing.
                continue;
            }
            // A full page contributed nothing to this transaction; give
            // the probe lock back unless the transaction already held one.
            if !held_before {
                pool.release_page(tid, page_id);
            }
        }

        // Every existing page is full; grow the file. The new page reaches
        // disk zeroed before its cached copy is modified, so an abort that
        // discards the cache still leaves a valid empty page behind.
        let page_id = self.allocate_page().await?;
        debug!(%page_id, %tid, "extended heap file for insert");
        match self.insert_into_page(pool, tid, page_id, &bytes).await? {
            Some(rid) => Ok(Inserted {
                tuple: tuple.with_rid(rid),
                dirtied: vec![page_id],
            }),
            // A concurrent transaction filled the page we just allocated.
            None => Err(HeapError::PageFull {
                slots: page_capacity(&self.schema),
            }),
        }
    }

    async fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<PageId, HeapError> {
        let rid = tuple.rid().ok_or(HeapError::MissingRecordId)?;
        if rid.page.file != self.file_id {
            return Err(HeapError::WrongFile {
                expected: self.file_id,
                actual: rid.page.file,
            });
        }
        let page_count = self.page_count.load(Ordering::Acquire);
        if rid.page.page_no >= page_count {
            return Err(HeapError::Storage(StorageError::PageOutOfBounds {
                page_no: rid.page.page_no,
                page_count,
            }));
        }

        let mut guard = pool.fetch_page_mut(tid, rid.page).await?;
        let deleted = {
            let mut page = HeapPage::new(guard.data_mut(), &self.schema);
            page.delete(rid.slot)
        };
        deleted?;
        guard.mark_dirty();
        Ok(rid.page)
    }

    fn scan(self: Arc<Self>, pool: Arc<BufferPool>, tid: TransactionId) -> Box<dyn TupleIterator> {
        Box::new(HeapScanner::new(pool, self, tid))
    }
}
