//! Transaction page locks.
//!
//! Strict two-phase locking at page granularity. A transaction acquires a
//! lock on every page it touches through the buffer pool and keeps it until
//! the transaction completes; the pool releases all of a transaction's locks
//! in [`complete_transaction`](super::BufferPool::complete_transaction).
//!
//! Lock waits are bounded: a transaction that cannot acquire a lock within
//! the configured timeout is aborted. Deadlocks therefore resolve themselves
//! without a waits-for graph, at the cost of occasionally aborting a
//! transaction that was merely slow.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::warn;

use super::error::BufferError;
use crate::storage::PageId;
use crate::tx::TransactionId;

/// How a transaction intends to use a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Permission {
    /// Shared access; any number of transactions may read concurrently.
    ReadOnly,
    /// Exclusive access; no other transaction may hold the page at all.
    ReadWrite,
}

/// Interval between acquisition attempts while waiting for a lock.
const RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// Page lock table shared by all transactions.
///
/// Grant rules:
/// - any number of transactions may hold a page `ReadOnly`
/// - `ReadWrite` is granted only when no other transaction holds the page
/// - the sole holder of a `ReadOnly` lock may upgrade to `ReadWrite`
/// - a holder's re-request is satisfied by its existing lock; holding
///   `ReadWrite` also satisfies `ReadOnly` requests without downgrading
pub(super) struct LockManager {
    state: Mutex<LockTable>,
    timeout: Duration,
}

#[derive(Default)]
struct LockTable {
    /// Holders of each locked page.
    pages: HashMap<PageId, HashMap<TransactionId, Permission>>,
    /// Pages held by each transaction, for bulk release.
    held: HashMap<TransactionId, HashSet<PageId>>,
}

impl LockManager {
    pub(super) fn new(timeout: Duration) -> Self {
        Self {
            state: Mutex::new(LockTable::default()),
            timeout,
        }
    }

    /// Acquires `perm` on `page` for `tid`, waiting up to the timeout.
    ///
    /// # Errors
    ///
    /// Returns `BufferError::TransactionAborted` if the lock cannot be
    /// granted in time. The caller is expected to abort `tid`.
    pub(super) async fn acquire(
        &self,
        tid: TransactionId,
        page: PageId,
        perm: Permission,
    ) -> Result<(), BufferError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            if self.try_acquire(tid, page, perm) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(%tid, %page, "page lock wait timed out, aborting transaction");
                return Err(BufferError::TransactionAborted(tid));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    /// Attempts one acquisition without waiting.
    fn try_acquire(&self, tid: TransactionId, page: PageId, perm: Permission) -> bool {
        let mut guard = self.state.lock();
        let table = &mut *guard;
        let holders = table.pages.entry(page).or_default();
        match perm {
            Permission::ReadOnly => {
                if holders.contains_key(&tid) {
                    // The existing lock already covers reads.
                    return true;
                }
                if holders.values().any(|&p| p == Permission::ReadWrite) {
                    return false;
                }
                holders.insert(tid, Permission::ReadOnly);
            }
            Permission::ReadWrite => {
                match holders.get(&tid) {
                    Some(Permission::ReadWrite) => return true,
                    // Upgrade is allowed only for the sole holder.
                    Some(Permission::ReadOnly) if holders.len() > 1 => return false,
                    Some(Permission::ReadOnly) => {}
                    None if !holders.is_empty() => return false,
                    None => {}
                }
                holders.insert(tid, Permission::ReadWrite);
            }
        }
        table.held.entry(tid).or_default().insert(page);
        true
    }

    /// Releases `tid`'s lock on `page`, if held.
    pub(super) fn release(&self, tid: TransactionId, page: PageId) {
        let mut guard = self.state.lock();
        let table = &mut *guard;
        if let Some(holders) = table.pages.get_mut(&page) {
            holders.remove(&tid);
            if holders.is_empty() {
                table.pages.remove(&page);
            }
        }
        if let Some(pages) = table.held.get_mut(&tid) {
            pages.remove(&page);
            if pages.is_empty() {
                table.held.remove(&tid);
            }
        }
    }

    /// Releases every lock held by `tid`.
    pub(super) fn release_all(&self, tid: TransactionId) {
        let mut guard = self.state.lock();
        let table = &mut *guard;
        let Some(pages) = table.held.remove(&tid) else {
            return;
        };
        for page in pages {
            if let Some(holders) = table.pages.get_mut(&page) {
                holders.remove(&tid);
                if holders.is_empty() {
                    table.pages.remove(&page);
                }
            }
        }
    }

    /// Returns true if `tid` holds any lock on `page`.
    pub(super) fn holds_lock(&self, tid: TransactionId, page: PageId) -> bool {
        let table = self.state.lock();
        table.pages.get(&page).is_some_and(|h| h.contains_key(&tid))
    }
}
