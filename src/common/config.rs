//! Configuration for the page cache and lock manager.

use std::time::Duration;

use crate::common::{Error, Result};

/// Default size of a page in bytes (4KB).
///
/// This value is chosen to match:
/// - OS page size on most systems (4096 bytes)
/// - Common database page sizes
///
/// Tests may configure a smaller page through [`Config::page_size`] to keep
/// heap files tiny; there is no process-wide override.
pub const DEFAULT_PAGE_SIZE: usize = 4096;

/// Default number of pages the buffer pool may cache.
pub const DEFAULT_POOL_CAPACITY: usize = 50;

/// Default bound on how long a transaction waits for a page lock before it
/// is aborted.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(1000);

/// What eviction does when every cached page carries an uncommitted write.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DirtyPagePolicy {
    /// Log, flush and evict the oldest dirty page.
    ///
    /// Uncommitted bytes may reach disk; the update record written before
    /// the flush carries the before-image needed to undo them.
    #[default]
    FlushOnEvict,
    /// Never write uncommitted bytes; report [`Error::BufferPoolFull`]
    /// instead so the caller can back off and retry.
    NoSteal,
}

/// Configuration for a [`BufferPool`](crate::buffer::BufferPool) and the
/// [`LockManager`](crate::concurrency::LockManager) it owns.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bytes per page. Every page store attached to the pool must agree.
    pub page_size: usize,
    /// Maximum number of pages held in the cache.
    pub pool_capacity: usize,
    /// How long `get_page` waits for a lock before aborting the transaction.
    pub lock_timeout: Duration,
    /// Eviction behaviour when no clean page is available.
    pub dirty_page_policy: DirtyPagePolicy,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            page_size: DEFAULT_PAGE_SIZE,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            dirty_page_policy: DirtyPagePolicy::default(),
        }
    }
}

impl Config {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidConfig("page_size must be non-zero"));
        }

        if self.pool_capacity == 0 {
            return Err(Error::InvalidConfig("pool_capacity must be non-zero"));
        }

        if self.lock_timeout.is_zero() {
            return Err(Error::InvalidConfig("lock_timeout must be non-zero"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.page_size, 4096);
        assert_eq!(config.pool_capacity, 50);
        assert_eq!(config.lock_timeout, Duration::from_secs(1));
        assert_eq!(config.dirty_page_policy, DirtyPagePolicy::FlushOnEvict);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = Config {
            pool_capacity: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = Config {
            lock_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
