//! Buffer pool: a transactional page cache.
//!
//! The buffer pool sits between heap files and the disk, caching pages in a
//! fixed number of frames and acquiring page locks on behalf of the
//! transactions that access them.
//!
//! # Architecture
//!
//! ```text
//! +----------------------+
//! |  Heap file ops/scans |
//! +----------------------+
//!           |
//!           v
//! +----------------------+     +--------------------+
//! |      BufferPool      |---->|    LockManager     |
//! |  (frames + LRU)      |     | (page locks, 2PL)  |
//! +----------------------+     +--------------------+
//!           |
//!           v
//! +----------------------+
//! |  Catalog -> DbFile   |
//! +----------------------+
//! ```
//!
//! # Transaction policy
//!
//! The pool is no-steal and force:
//! - frames dirtied by a transaction are never evicted or written back while
//!   that transaction runs, so the disk never sees uncommitted data
//! - committing flushes the transaction's dirty frames and syncs their
//!   files; aborting drops the frames, so the next fetch re-reads the
//!   pre-transaction image from disk
//!
//! [`fetch_page`](BufferPool::fetch_page) takes a shared page lock and
//! [`fetch_page_mut`](BufferPool::fetch_page_mut) an exclusive one; both are
//! held until [`complete_transaction`](BufferPool::complete_transaction).
//!
//! # Lock ordering
//!
//! The state mutex protects the page table, frame metadata, free list, and
//! LRU queue. It is only ever held for short synchronous sections. Guards
//! unpin (taking the state mutex) while still holding their data latch; the
//! reverse order, acquiring a data latch under the state mutex, never
//! happens.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::error::BufferError;
use super::frame::{Frame, FrameId, FrameMeta};
use super::guard::{PageReadGuard, PageWriteGuard};
use super::lock::{LockManager, Permission};
use crate::catalog::Catalog;
use crate::heap::DbFile;
use crate::storage::PageId;
use crate::tx::TransactionId;

/// Buffer pool configuration.
#[derive(Debug, Clone)]
pub struct BufferPoolConfig {
    /// Number of frames in the buffer pool.
    ///
    /// This bounds how many pages can be cached at once. Common values:
    /// - 64 frames = 256KB (for testing)
    /// - 1024 frames = 4MB (small database)
    pub pool_size: usize,
    /// How long a transaction may wait for a page lock before it is
    /// aborted. Bounded waits double as deadlock resolution.
    pub lock_timeout: Duration,
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 1024, // 1024 * 4KB = 4MB
            lock_timeout: Duration::from_secs(1),
        }
    }
}

/// A fixed-size cache of pages with transaction-scoped page locks.
pub struct BufferPool {
    catalog: Arc<Catalog>,
    locks: LockManager,
    /// Frame array; each frame's bytes sit behind their own RwLock.
    frames: Vec<Frame>,
    /// Mutable bookkeeping. `std::sync::Mutex` so guards can unpin from
    /// `Drop`, which is synchronous.
    state: Mutex<PoolState>,
    pool_size: usize,
}

struct PoolState {
    /// Maps PageId -> FrameId for cached pages.
    page_table: HashMap<PageId, FrameId>,
    /// Per-frame metadata, indexed by [FrameId].
    meta: Vec<FrameMeta>,
    /// Frames not currently holding any page.
    free_list: Vec<FrameId>,
    /// Unpinned frames, least recently used first. Pinned frames are
    /// removed from the queue and re-enter it on their final unpin.
    lru: VecDeque<FrameId>,
}

impl PoolState {
    fn unqueue(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.lru.iter().position(|&f| f == frame_id) {
            self.lru.remove(pos);
        }
    }

    fn pin_existing(&mut self, frame_id: FrameId) {
        self.meta[frame_id].pin_count += 1;
        self.unqueue(frame_id);
    }
}

impl BufferPool {
    /// Creates a buffer pool over the files registered in `catalog`.
    ///
    /// Files registered after construction are picked up automatically;
    /// the catalog is consulted on every miss.
    ///
    /// # Panics
    ///
    /// Panics if `config.pool_size` is 0.
    pub fn new(catalog: Arc<Catalog>, config: BufferPoolConfig) -> Self {
        assert!(config.pool_size > 0, "pool_size must be > 0");

        let frames: Vec<_> = (0..config.pool_size).map(|_| Frame::new()).collect();
        let meta: Vec<_> = (0..config.pool_size).map(|_| FrameMeta::empty()).collect();
        let free_list: Vec<_> = (0..config.pool_size).collect();

        Self {
            catalog,
            locks: LockManager::new(config.lock_timeout),
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::with_capacity(config.pool_size),
                meta,
                free_list,
                lru: VecDeque::new(),
            }),
            pool_size: config.pool_size,
        }
    }

    /// Fetches a page for reading on behalf of `tid`.
    ///
    /// Acquires a shared lock on the page, then pins it in a frame, reading
    /// it from its file on a miss. The lock outlives the returned guard; the
    /// pin does not.
    ///
    /// # Errors
    ///
    /// - `BufferError::TransactionAborted` if the lock wait times out
    /// - `BufferError::NoEvictableFrames` if no frame can be freed
    /// - `BufferError::UnknownFile` / `BufferError::Storage` if the page
    ///   cannot be read
    pub async fn fetch_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
    ) -> Result<PageReadGuard<'_>, BufferError> {
        self.locks.acquire(tid, page_id, Permission::ReadOnly).await?;
        let frame_id = self.pin_frame(page_id).await?;
        let data = self.frames[frame_id].data.read().await;
        Ok(PageReadGuard {
            pool: self,
            frame_id,
            page_id,
            data,
        })
    }

    /// Fetches a page for writing on behalf of `tid`.
    ///
    /// Acquires an exclusive lock on the page. The page is not marked dirty
    /// by fetching it; call [`mark_dirty`](PageWriteGuard::mark_dirty) after
    /// modifying the bytes.
    ///
    /// # Errors
    ///
    /// Same conditions as [`fetch_page`](Self::fetch_page).
    pub async fn fetch_page_mut(
        &self,
        tid: TransactionId,
        page_id: PageId,
    ) -> Result<PageWriteGuard<'_>, BufferError> {
        self.locks.acquire(tid, page_id, Permission::ReadWrite).await?;
        let frame_id = self.pin_frame(page_id).await?;
        let data = self.frames[frame_id].data.write().await;
        Ok(PageWriteGuard {
            pool: self,
            frame_id,
            page_id,
            tid,
            dirtied: false,
            data,
        })
    }

    /// Pins the frame holding `page_id`, loading the page on a miss.
    ///
    /// If several tasks miss on the same page concurrently, each loads into
    /// its own frame; publication under the state mutex picks one winner and
    /// the losers return their frames to the free list.
    async fn pin_frame(&self, page_id: PageId) -> Result<FrameId, BufferError> {
        {
            let mut guard = self.state.lock().expect("state lock poisoned");
            if let Some(&frame_id) = guard.page_table.get(&page_id) {
                guard.pin_existing(frame_id);
                return Ok(frame_id);
            }
        }

        let file = self
            .catalog
            .db_file(page_id.file)
            .ok_or(BufferError::UnknownFile(page_id.file))?;
        let frame_id = self.allocate_frame()?;

        let read_result = {
            let mut data = self.frames[frame_id].data.write().await;
            file.read_page(page_id, data.as_mut_slice()).await
        };
        if let Err(err) = read_result {
            let mut guard = self.state.lock().expect("state lock poisoned");
            guard.free_list.push(frame_id);
            return Err(err.into());
        }

        let mut guard = self.state.lock().expect("state lock poisoned");
        if let Some(&existing) = guard.page_table.get(&page_id) {
            // Another task loaded this page while we did I/O.
            guard.free_list.push(frame_id);
            guard.pin_existing(existing);
            return Ok(existing);
        }
        guard.page_table.insert(page_id, frame_id);
        let meta = &mut guard.meta[frame_id];
        meta.page_id = Some(page_id);
        meta.pin_count = 1;
        meta.dirty = None;
        Ok(frame_id)
    }

    /// Claims a frame from the free list, evicting if necessary.
    ///
    /// Eviction takes the least recently used clean frame. Dirty frames
    /// hold uncommitted writes and are skipped (no-steal), so eviction does
    /// no I/O and completes under one state lock.
    fn allocate_frame(&self) -> Result<FrameId, BufferError> {
        let mut guard = self.state.lock().expect("state lock poisoned");
        let state = &mut *guard;
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let mut remaining = state.lru.len();
        while remaining > 0 {
            remaining -= 1;
            let Some(frame_id) = state.lru.pop_front() else {
                break;
            };
            let meta = &state.meta[frame_id];
            if meta.pin_count > 0 {
                continue;
            }
            if meta.dirty.is_some() {
                state.lru.push_back(frame_id);
                continue;
            }
            if let Some(page_id) = meta.page_id {
                state.page_table.remove(&page_id);
                debug!(%page_id, "evicted page");
            }
            state.meta[frame_id].reset();
            return Ok(frame_id);
        }
        Err(BufferError::NoEvictableFrames)
    }

    /// Unpins a frame (called from guard Drop).
    pub(super) fn unpin(&self, frame_id: FrameId, dirtied: Option<TransactionId>) {
        let mut guard = self.state.lock().expect("state lock poisoned");
        let state = &mut *guard;
        let meta = &mut state.meta[frame_id];
        if meta.pin_count == 0 {
            debug_assert!(false, "unpin on frame with pin count 0");
            return;
        }
        meta.pin_count -= 1;
        if let Some(tid) = dirtied {
            meta.dirty = Some(tid);
        }
        if meta.pin_count == 0 {
            state.lru.push_back(frame_id);
        }
    }

    /// Writes one frame's bytes back to its file and clears the dirty mark.
    ///
    /// Skips the write if the frame no longer holds `page_id`.
    async fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<(), BufferError> {
        let file = self
            .catalog
            .db_file(page_id.file)
            .ok_or(BufferError::UnknownFile(page_id.file))?;

        let data = self.frames[frame_id].data.read().await;
        {
            let state = self.state.lock().expect("state lock poisoned");
            if state.meta[frame_id].page_id != Some(page_id) {
                return Ok(());
            }
        }
        file.write_page(page_id, data.as_slice()).await?;

        let mut state = self.state.lock().expect("state lock poisoned");
        if state.meta[frame_id].page_id == Some(page_id) {
            state.meta[frame_id].dirty = None;
        }
        Ok(())
    }

    /// Flushes `page_id` to its file if it is cached and dirty.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::Storage` if the write fails.
    pub async fn flush_page(&self, page_id: PageId) -> Result<(), BufferError> {
        let frame_id = {
            let state = self.state.lock().expect("state lock poisoned");
            match state.page_table.get(&page_id) {
                Some(&fid) if state.meta[fid].dirty.is_some() => Some(fid),
                _ => None,
            }
        };
        match frame_id {
            Some(frame_id) => self.write_back(frame_id, page_id).await,
            None => Ok(()),
        }
    }

    /// Flushes every dirty frame and syncs the touched files.
    ///
    /// This writes uncommitted data to disk regardless of owning
    /// transaction; normal transaction completion goes through
    /// [`complete_transaction`](Self::complete_transaction) instead.
    pub async fn flush_all(&self) -> Result<(), BufferError> {
        let dirty = self.collect_dirty(None);
        self.flush_frames(dirty).await
    }

    /// Ends `tid`: commit makes its writes durable, abort discards them.
    /// All page locks held by `tid` are released either way.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::Storage` if a commit-time write or sync fails.
    pub async fn complete_transaction(
        &self,
        tid: TransactionId,
        commit: bool,
    ) -> Result<(), BufferError> {
        let result = if commit {
            let dirty = self.collect_dirty(Some(tid));
            debug!(%tid, pages = dirty.len(), "committing transaction");
            self.flush_frames(dirty).await
        } else {
            self.discard_transaction(tid);
            Ok(())
        };
        self.locks.release_all(tid);
        result
    }

    /// Releases `tid`'s lock on one page before the transaction completes.
    ///
    /// This breaks strict two-phase locking, so it is only safe for pages
    /// whose content the transaction will not rely on, such as pages an
    /// insert probed and found full.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.locks.release(tid, page_id);
    }

    /// Returns true if `tid` holds a lock on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.locks.holds_lock(tid, page_id)
    }

    /// Returns the number of frames in the pool.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        let state = self.state.lock().expect("state lock poisoned");
        state.page_table.len()
    }

    /// Collects dirty frames, optionally restricted to one transaction.
    fn collect_dirty(&self, tid: Option<TransactionId>) -> Vec<(FrameId, PageId)> {
        let state = self.state.lock().expect("state lock poisoned");
        state
            .meta
            .iter()
            .enumerate()
            .filter_map(|(frame_id, meta)| {
                let owned = match tid {
                    Some(tid) => meta.dirty == Some(tid),
                    None => meta.dirty.is_some(),
                };
                if owned {
                    meta.page_id.map(|page_id| (frame_id, page_id))
                } else {
                    None
                }
            })
            .collect()
    }

    async fn flush_frames(&self, dirty: Vec<(FrameId, PageId)>) -> Result<(), BufferError> {
        let mut files = HashSet::new();
        for (frame_id, page_id) in dirty {
            self.write_back(frame_id, page_id).await?;
            files.insert(page_id.file);
        }
        for file_id in files {
            if let Some(file) = self.catalog.db_file(file_id) {
                file.sync_all().await?;
            }
        }
        Ok(())
    }

    /// Drops `tid`'s dirty frames without writing them.
    ///
    /// The next fetch of a discarded page re-reads the pre-transaction
    /// image from disk.
    fn discard_transaction(&self, tid: TransactionId) {
        let mut guard = self.state.lock().expect("state lock poisoned");
        let state = &mut *guard;
        for frame_id in 0..state.meta.len() {
            if state.meta[frame_id].dirty != Some(tid) {
                continue;
            }
            let Some(page_id) = state.meta[frame_id].page_id else {
                continue;
            };
            if state.meta[frame_id].pin_count > 0 {
                warn!(%tid, %page_id, "dirty page still pinned at abort, keeping frame");
                continue;
            }
            state.page_table.remove(&page_id);
            state.meta[frame_id].reset();
            state.unqueue(frame_id);
            state.free_list.push(frame_id);
            debug!(%tid, %page_id, "discarded uncommitted page");
        }
    }
}
