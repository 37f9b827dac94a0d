//! Buffer pool management.
//!
//! The buffer pool is the cache layer between transactions and the page
//! stores. Every page access goes through it, and through it the lock
//! manager, so it is also where transactions commit and abort.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`Permissions`] - Read-only or read-write page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction order

mod buffer_pool;
pub mod replacer;
mod stats;

pub use buffer_pool::{BufferPool, Permissions};
pub use stats::{BufferPoolStats, StatsSnapshot};
