//! Concurrency control.
//!
//! Transactions are isolated by strict two-phase locking at page
//! granularity:
//! - [`LockManager`] - The lock table, grants, upgrades and bounded waits
//! - [`LockMode`] - Shared or exclusive
//! - [`LockRequest`] - One granted or pending request in a page's queue

mod lock_manager;

pub use lock_manager::{LockManager, LockMode, LockRequest};
