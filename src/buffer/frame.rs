//! Buffer pool frames and their bookkeeping.

use tokio::sync::RwLock;

use crate::storage::{PageData, PageId};
use crate::tx::TransactionId;

/// Index into the pool's frame array.
pub(super) type FrameId = usize;

/// A frame holding one cached page.
///
/// Page bytes live behind a per-frame RwLock so access to one page never
/// blocks access to another. All other bookkeeping lives in [`FrameMeta`]
/// under the pool's state mutex.
pub(super) struct Frame {
    pub(super) data: RwLock<PageData>,
}

impl Frame {
    pub(super) fn new() -> Self {
        Self {
            data: RwLock::new(PageData::new()),
        }
    }
}

/// Per-frame bookkeeping, guarded by the pool's state mutex.
pub(super) struct FrameMeta {
    /// The page currently cached in this frame, if any.
    pub(super) page_id: Option<PageId>,
    /// Number of outstanding guards. Only unpinned frames are evictable.
    pub(super) pin_count: u32,
    /// The transaction whose uncommitted writes this frame holds, if any.
    /// Dirty frames stay resident until that transaction completes.
    pub(super) dirty: Option<TransactionId>,
}

impl FrameMeta {
    pub(super) fn empty() -> Self {
        Self {
            page_id: None,
            pin_count: 0,
            dirty: None,
        }
    }

    pub(super) fn reset(&mut self) {
        *self = Self::empty();
    }
}
