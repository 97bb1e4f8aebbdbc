//! Transaction identity.
//!
//! Page-level locking and buffer-pool bookkeeping are keyed by
//! [`TransactionId`]. Lock acquisition and release live in
//! [`crate::buffer`]; this module only provides the ids themselves.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Transaction ID (64-bit).
///
/// Ids are allocated sequentially starting from 1. Id 0 is reserved as
/// INVALID and is never handed out by [`TransactionId::fresh`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(u64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

impl TransactionId {
    /// Invalid transaction ID (0).
    pub const INVALID: Self = Self(0);

    /// Creates a transaction ID from a raw value.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Allocates a fresh, process-unique transaction ID.
    pub fn fresh() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw u64 value.
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns true if this is the invalid transaction ID.
    pub const fn is_invalid(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
