//! Write-ahead logging.
//!
//! The buffer pool talks to the log only through [`WriteAheadLog`]:
//! - update records carry a page's before- and after-image
//! - commit records mark a transaction durable once forced
//!
//! [`LogFile`] is the file-backed implementation.

mod log_file;
mod log_record;

pub use log_file::LogFile;
pub use log_record::LogRecord;

use crate::common::{PageId, Result, TransactionId};

/// The log operations the buffer pool depends on.
///
/// # Ordering
/// The pool calls `log_write` (and `force`) before any dirty page's bytes
/// reach its page store, and `log_commit` followed by `force` before a
/// commit is reported durable.
pub trait WriteAheadLog: Send + Sync {
    /// Append an update record for `page_id`.
    fn log_write(
        &self,
        tid: TransactionId,
        page_id: PageId,
        before: &[u8],
        after: &[u8],
    ) -> Result<()>;

    /// Append a commit record for `tid`.
    fn log_commit(&self, tid: TransactionId) -> Result<()>;

    /// Make every appended record durable.
    fn force(&self) -> Result<()>;
}
