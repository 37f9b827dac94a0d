//! Error types for txcache.

use std::time::Duration;

use thiserror::Error;

use crate::common::{PageId, TableId, TransactionId};
use crate::storage::RecordId;

/// Convenient Result type alias.
///
/// Instead of writing `Result<T, Error>` everywhere, we can write `Result<T>`.
/// This is a common Rust pattern (see `std::io::Result`).
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors raised by the page cache, the lock manager and the
/// collaborators they drive.
#[derive(Debug, Error)]
pub enum Error {
    /// A page lock was not granted within the configured bound.
    ///
    /// The owning transaction must be aborted; the buffer pool does this
    /// itself before returning the error from `get_page`.
    #[error("transaction {tid} aborted: lock on {page_id} not granted within {waited:?}")]
    LockTimeout {
        tid: TransactionId,
        page_id: PageId,
        waited: Duration,
    },

    /// I/O error from a page store or the log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page does not exist in its table's backing file.
    #[error("invalid page: {0}")]
    InvalidPage(PageId),

    /// No table with this id is registered in the catalog.
    #[error("table {0} not found in catalog")]
    TableNotFound(TableId),

    /// No table with this name is registered in the catalog.
    #[error("table named {0:?} not found in catalog")]
    TableNameNotFound(String),

    /// Flushing the eviction victim failed, so nothing was evicted.
    #[error("failed to evict {page_id}: {source}")]
    EvictionFailed {
        page_id: PageId,
        #[source]
        source: Box<Error>,
    },

    /// Every cached page carries an uncommitted write and the pool runs
    /// with [`DirtyPagePolicy::NoSteal`](crate::common::config::DirtyPagePolicy).
    #[error("buffer pool is full: all {0} cached pages are dirty")]
    BufferPoolFull(usize),

    /// Tuple bytes do not match the table's fixed tuple width.
    #[error("tuple is {actual} bytes but table {table_id} stores {expected}-byte tuples")]
    TupleWidthMismatch {
        table_id: TableId,
        expected: usize,
        actual: usize,
    },

    /// The tuple has no record id, or its slot is empty.
    #[error("tuple not found: {0}")]
    TupleNotFound(RecordId),

    /// The tuple was never stored, so it has no record id to locate it by.
    #[error("tuple has no record id")]
    MissingRecordId,

    /// A log record failed its checksum or was truncated.
    #[error("corrupt log record at offset {0}")]
    CorruptLog(u64),

    /// A [`Config`](crate::common::config::Config) value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl Error {
    /// Whether the caller must abort the transaction that hit this error.
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::LockTimeout { .. })
    }

    /// Whether the failed operation may succeed if simply retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::EvictionFailed { .. } | Error::BufferPoolFull(_)
        )
    }
}
