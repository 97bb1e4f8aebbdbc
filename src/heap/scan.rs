//! Whole-file tuple scanner.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;

use super::error::HeapError;
use super::page::HeapPage;
use super::{DbFile, TupleIterator};
use crate::buffer::BufferPool;
use crate::storage::PageId;
use crate::tuple::{RecordId, Tuple};
use crate::tx::TransactionId;

enum ScanState {
    Unopened,
    Open {
        /// Next page to load once the tuple buffer drains.
        next_page: u64,
        /// Tuples of the last loaded page, in slot order.
        buffered: VecDeque<Tuple>,
    },
    Closed,
}

/// [`TupleIterator`] over every tuple of one file, in page then slot order.
///
/// Pages are fetched through the buffer pool with read permission as the
/// scan advances, so the owning transaction accumulates a shared lock on
/// each page visited. All tuples of a page are collected before its read
/// guard is dropped, keeping latch hold times short; occupied slots are
/// yielded with their record ids, vacant ones are skipped.
pub struct HeapScanner {
    pool: Arc<BufferPool>,
    file: Arc<dyn DbFile>,
    tid: TransactionId,
    state: ScanState,
}

impl HeapScanner {
    pub fn new(pool: Arc<BufferPool>, file: Arc<dyn DbFile>, tid: TransactionId) -> Self {
        Self {
            pool,
            file,
            tid,
            state: ScanState::Unopened,
        }
    }

    /// Loads pages until a tuple is buffered or the file is exhausted.
    ///
    /// Returns true if a tuple is available. Not open means not available,
    /// never an error.
    async fn fill_buffer(&mut self) -> Result<bool, HeapError> {
        let ScanState::Open { next_page, buffered } = &mut self.state else {
            return Ok(false);
        };
        while buffered.is_empty() {
            // The page count is re-read every round, so pages appended
            // after the scan opened are still visited.
            if *next_page >= self.file.page_count() {
                return Ok(false);
            }
            let page_id = PageId::new(self.file.file_id(), *next_page);
            *next_page += 1;

            let guard = self.pool.fetch_page(self.tid, page_id).await?;
            let page = HeapPage::new(guard.data(), self.file.schema());
            for slot in 0..page.slot_count() {
                if !page.is_slot_used(slot) {
                    continue;
                }
                let tuple = page.read_tuple(slot, self.file.schema())?;
                buffered.push_back(tuple.with_rid(RecordId::new(page_id, slot)));
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl TupleIterator for HeapScanner {
    async fn open(&mut self) -> Result<(), HeapError> {
        self.state = ScanState::Open {
            next_page: 0,
            buffered: VecDeque::new(),
        };
        Ok(())
    }

    async fn has_next(&mut self) -> Result<bool, HeapError> {
        self.fill_buffer().await
    }

    async fn next(&mut self) -> Result<Tuple, HeapError> {
        if !self.fill_buffer().await? {
            return Err(HeapError::NoSuchElement);
        }
        let ScanState::Open { buffered, .. } = &mut self.state else {
            return Err(HeapError::NoSuchElement);
        };
        buffered.pop_front().ok_or(HeapError::NoSuchElement)
    }

    async fn rewind(&mut self) -> Result<(), HeapError> {
        match &mut self.state {
            ScanState::Open { next_page, buffered } => {
                *next_page = 0;
                buffered.clear();
                Ok(())
            }
            ScanState::Unopened | ScanState::Closed => Err(HeapError::ScanNotOpen),
        }
    }

    fn close(&mut self) {
        self.state = ScanState::Closed;
    }
}
