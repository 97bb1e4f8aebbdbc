//! RAII guards over buffer frames.
//!
//! A guard pins its frame and holds the frame's data latch for its whole
//! lifetime, so the bytes it exposes can neither be evicted nor change
//! underneath it. Dropping the guard unpins the frame.
//!
//! Guards do not release the transaction's page lock; that lock outlives the
//! guard and is dropped when the transaction completes.

use std::ops::{Deref, DerefMut};

use tokio::sync::{RwLockReadGuard, RwLockWriteGuard};

use super::frame::FrameId;
use super::pool::BufferPool;
use crate::storage::{PageData, PageId};
use crate::tx::TransactionId;

/// Shared access to one cached page.
pub struct PageReadGuard<'a> {
    pub(super) pool: &'a BufferPool,
    pub(super) frame_id: FrameId,
    pub(super) page_id: PageId,
    pub(super) data: RwLockReadGuard<'a, PageData>,
}

impl PageReadGuard<'_> {
    /// Returns the id of the guarded page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for PageReadGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.frame_id, None);
    }
}

/// Exclusive access to one cached page.
///
/// Modifications are not tracked automatically; call
/// [`mark_dirty`](Self::mark_dirty) after changing the bytes, or the pool
/// will treat the frame as clean and may evict the changes.
pub struct PageWriteGuard<'a> {
    pub(super) pool: &'a BufferPool,
    pub(super) frame_id: FrameId,
    pub(super) page_id: PageId,
    pub(super) tid: TransactionId,
    pub(super) dirtied: bool,
    pub(super) data: RwLockWriteGuard<'a, PageData>,
}

impl PageWriteGuard<'_> {
    /// Returns the id of the guarded page.
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    /// Returns the page bytes.
    pub fn data(&self) -> &[u8] {
        self.data.as_slice()
    }

    /// Returns the page bytes mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.data.as_mut_slice()
    }

    /// Records that this transaction modified the page.
    ///
    /// The frame stays resident until the transaction commits (flushing it)
    /// or aborts (discarding it).
    pub fn mark_dirty(&mut self) {
        self.dirtied = true;
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for PageWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for PageWriteGuard<'_> {
    fn drop(&mut self) {
        let dirtied = self.dirtied.then_some(self.tid);
        self.pool.unpin(self.frame_id, dirtied);
    }
}
