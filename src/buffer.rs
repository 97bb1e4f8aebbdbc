//! Buffer management.
//!
//! All page access by transactions goes through [`BufferPool`], which caches
//! pages in fixed-size frames, hands out RAII guards over their bytes, and
//! holds page locks on behalf of transactions until they complete. The lock
//! table and frame bookkeeping are internal; the public surface is the pool,
//! its guards, and [`BufferError`].

mod error;
mod frame;
mod guard;
mod lock;
mod pool;

pub use error::BufferError;
pub use guard::{PageReadGuard, PageWriteGuard};
pub use pool::{BufferPool, BufferPoolConfig};
