//! Transaction identifier type.

use std::fmt;

/// Identifies a transaction.
///
/// Transaction ids are minted by the caller; this crate only compares and
/// hashes them. An id is used as the lock-table key and as the owner tag of
/// a dirty page until `transaction_complete` is called for it.
///
/// # Example
/// ```
/// use txcache::TransactionId;
///
/// let tid = TransactionId(7);
/// assert_eq!(format!("{}", tid), "Txn(7)");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}
