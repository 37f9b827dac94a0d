//! Lock Manager - page-granularity strict two-phase locking.
//!
//! The [`LockManager`] provides:
//! - Shared / exclusive page locks keyed by [`PageId`]
//! - In-place upgrade from shared to exclusive
//! - Bounded waiting: a request that is not granted within the configured
//!   timeout fails with [`Error::LockTimeout`], which aborts the transaction.
//!   There is no wait-for graph; the timeout is the deadlock resolution.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::common::config::DEFAULT_LOCK_TIMEOUT;
use crate::common::{Error, PageId, Result, TransactionId};

/// Lock modes supported by the lock manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Read lock; compatible with other shared locks.
    Shared,
    /// Write lock; compatible with nothing held by another transaction.
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }
}

/// One transaction's request for a lock on a page, granted or waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub tid: TransactionId,
    pub mode: LockMode,
    pub granted: bool,
}

/// Outcome of one compatibility check.
enum Decision {
    Granted,
    Wait(Arc<Condvar>),
}

/// Requests for a single page, in insertion order.
///
/// # Invariant
/// The granted requests are either none, any number of `Shared` requests
/// from distinct transactions, or exactly one `Exclusive` request.
#[derive(Debug)]
struct LockEntry {
    requests: Vec<LockRequest>,
    /// Waiters on this page park here; notified whenever a request leaves.
    waiters: Arc<Condvar>,
}

impl LockEntry {
    fn new() -> Self {
        Self {
            requests: Vec::new(),
            waiters: Arc::new(Condvar::new()),
        }
    }

    fn evaluate(&mut self, tid: TransactionId, mode: LockMode) -> Decision {
        // Already covered by one of our own grants?
        let own = self
            .requests
            .iter()
            .position(|request| request.tid == tid && request.granted);
        let own_shared = match own {
            Some(i) if self.requests[i].mode == LockMode::Exclusive || mode == LockMode::Shared => {
                self.withdraw(tid);
                return Decision::Granted;
            }
            other => other,
        };

        // Grants held by everyone else
        let other_exclusive = self.requests.iter().any(|request| {
            request.tid != tid && request.granted && request.mode == LockMode::Exclusive
        });
        if other_exclusive {
            return self.wait(tid, mode, None);
        }
        let last_other_shared = self
            .requests
            .iter()
            .rposition(|request| request.tid != tid && request.granted);

        if let Some(own) = own_shared {
            return match last_other_shared {
                None => {
                    self.requests[own].mode = LockMode::Exclusive;
                    self.withdraw(tid);
                    Decision::Granted
                }
                // Queue the upgrade right behind the remaining readers so it
                // is served before any reader that arrives later.
                Some(last) => self.wait(tid, LockMode::Exclusive, Some(last + 1)),
            };
        }

        let blocked = match mode {
            LockMode::Exclusive => last_other_shared.is_some(),
            LockMode::Shared => self.requests.iter().any(|request| {
                !request.granted && request.tid != tid && request.mode == LockMode::Exclusive
            }),
        };

        if blocked {
            self.wait(tid, mode, None)
        } else {
            self.grant(tid, mode);
            Decision::Granted
        }
    }

    /// Record a pending request (once) and hand back the condvar to park on.
    fn wait(&mut self, tid: TransactionId, mode: LockMode, position: Option<usize>) -> Decision {
        let already_queued = self
            .requests
            .iter()
            .any(|request| !request.granted && request.tid == tid && request.mode == mode);

        if !already_queued {
            let request = LockRequest {
                tid,
                mode,
                granted: false,
            };
            match position {
                Some(at) if at < self.requests.len() => self.requests.insert(at, request),
                _ => self.requests.push(request),
            }
        }

        Decision::Wait(Arc::clone(&self.waiters))
    }

    /// Flip our pending request to granted, or append a granted one.
    fn grant(&mut self, tid: TransactionId, mode: LockMode) {
        let pending = self
            .requests
            .iter()
            .position(|request| !request.granted && request.tid == tid && request.mode == mode);

        match pending {
            Some(i) => self.requests[i].granted = true,
            None => self.requests.push(LockRequest {
                tid,
                mode,
                granted: true,
            }),
        }
        self.withdraw(tid);
    }

    /// Drop every pending request of `tid`, keeping its grants.
    fn withdraw(&mut self, tid: TransactionId) {
        self.requests
            .retain(|request| request.granted || request.tid != tid);
    }

    fn holds(&self, tid: TransactionId) -> bool {
        self.requests
            .iter()
            .any(|request| request.granted && request.tid == tid)
    }
}

/// The lock table, guarded as a whole by the manager's mutex.
#[derive(Debug, Default)]
struct LockTable {
    entries: HashMap<PageId, LockEntry>,
}

impl LockTable {
    fn evaluate(&mut self, page_id: PageId, tid: TransactionId, mode: LockMode) -> Decision {
        match self.entries.entry(page_id) {
            Entry::Vacant(vacant) => {
                vacant.insert(LockEntry::new()).grant(tid, mode);
                Decision::Granted
            }
            Entry::Occupied(occupied) => occupied.into_mut().evaluate(tid, mode),
        }
    }

    /// Remove `tid`'s requests on `page_id` matching `filter` and wake waiters.
    fn remove_where(
        &mut self,
        page_id: PageId,
        filter: impl Fn(&LockRequest) -> bool,
    ) {
        if let Entry::Occupied(mut occupied) = self.entries.entry(page_id) {
            let entry = occupied.get_mut();
            let before = entry.requests.len();
            entry.requests.retain(|request| !filter(request));

            if entry.requests.is_empty() {
                occupied.remove();
            } else if entry.requests.len() != before {
                entry.waiters.notify_all();
            }
        }
    }
}

/// Page lock manager.
///
/// # Thread Safety
/// Compatibility checks and lock-table mutation happen inside one critical
/// section over the whole table (`Mutex<LockTable>`), so no thread ever
/// observes a half-applied grant. Waiting threads park on a per-page
/// `Condvar` tied to that same mutex and re-check when a request leaves the
/// page.
///
/// # Usage
/// ```
/// use txcache::concurrency::{LockManager, LockMode};
/// use txcache::{PageId, TableId, TransactionId};
///
/// let lm = LockManager::default();
/// let page = PageId::new(TableId(1), 0);
///
/// lm.acquire_lock(page, TransactionId(1), LockMode::Shared).unwrap();
/// assert!(lm.holds_lock(TransactionId(1), page));
/// lm.release_all_locks(TransactionId(1));
/// assert!(!lm.holds_lock(TransactionId(1), page));
/// ```
#[derive(Debug)]
pub struct LockManager {
    table: Mutex<LockTable>,
    timeout: Duration,
}

impl LockManager {
    /// Create a lock manager whose waits give up after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            timeout,
        }
    }

    /// How long `acquire_lock` waits before failing.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    // ========================================================================
    // Public API: Acquire
    // ========================================================================

    /// Acquire a lock on `page_id` for `tid`, blocking until it is granted.
    ///
    /// Re-acquiring a lock already covered by one of `tid`'s grants returns
    /// immediately. Requesting `Exclusive` while holding `Shared` upgrades in
    /// place once no other transaction holds the page shared.
    ///
    /// # Errors
    /// - `Error::LockTimeout` if the lock is not granted within the timeout.
    ///   Any pending request is withdrawn; locks already held are kept.
    pub fn acquire_lock(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> Result<()> {
        let start = Instant::now();
        let deadline = start + self.timeout;
        let mut table = self.table.lock();

        loop {
            let waiters = match table.evaluate(page_id, tid, mode) {
                Decision::Granted => return Ok(()),
                Decision::Wait(waiters) => waiters,
            };

            log::trace!("{} waiting for {:?} lock on {}", tid, mode, page_id);

            if waiters.wait_until(&mut table, deadline).timed_out() {
                // A release may have landed right at the deadline
                if let Decision::Granted = table.evaluate(page_id, tid, mode) {
                    return Ok(());
                }

                table.remove_where(page_id, |request| !request.granted && request.tid == tid);
                let waited = start.elapsed();
                log::debug!(
                    "{} gave up on {:?} lock on {} after {:?}",
                    tid,
                    mode,
                    page_id,
                    waited
                );
                return Err(Error::LockTimeout {
                    tid,
                    page_id,
                    waited,
                });
            }
        }
    }

    /// Grant the lock only if that is possible right now. Never waits and
    /// never leaves a pending request behind.
    pub fn try_acquire_lock(&self, page_id: PageId, tid: TransactionId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        match table.evaluate(page_id, tid, mode) {
            Decision::Granted => true,
            Decision::Wait(_) => {
                table.remove_where(page_id, |request| !request.granted && request.tid == tid);
                false
            }
        }
    }

    // ========================================================================
    // Public API: Release
    // ========================================================================

    /// Remove every request of `tid` on `page_id`. No-op if it holds none.
    pub fn release_lock(&self, page_id: PageId, tid: TransactionId) {
        self.table
            .lock()
            .remove_where(page_id, |request| request.tid == tid);
    }

    /// Remove every request of `tid` on every page.
    pub fn release_all_locks(&self, tid: TransactionId) {
        let mut table = self.table.lock();
        let pages: Vec<PageId> = table
            .entries
            .iter()
            .filter(|(_, entry)| entry.requests.iter().any(|request| request.tid == tid))
            .map(|(&page_id, _)| page_id)
            .collect();

        for page_id in pages {
            table.remove_where(page_id, |request| request.tid == tid);
        }
    }

    // ========================================================================
    // Public API: Queries
    // ========================================================================

    /// True iff `tid` holds a granted lock of either mode on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.table
            .lock()
            .entries
            .get(&page_id)
            .is_some_and(|entry| entry.holds(tid))
    }

    /// The strongest mode `tid` currently holds on `page_id`.
    pub fn held_mode(&self, tid: TransactionId, page_id: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        let entry = table.entries.get(&page_id)?;
        entry
            .requests
            .iter()
            .filter(|request| request.granted && request.tid == tid)
            .map(|request| request.mode)
            .max_by_key(|mode| *mode == LockMode::Exclusive)
    }

    /// Pages on which `tid` holds a granted lock.
    pub fn pages_locked_by(&self, tid: TransactionId) -> Vec<PageId> {
        self.table
            .lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.holds(tid))
            .map(|(&page_id, _)| page_id)
            .collect()
    }

    /// Snapshot of every request on `page_id`, granted and pending, in
    /// queue order.
    pub fn requests(&self, page_id: PageId) -> Vec<LockRequest> {
        self.table
            .lock()
            .entries
            .get(&page_id)
            .map(|entry| entry.requests.clone())
            .unwrap_or_default()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(DEFAULT_LOCK_TIMEOUT)
    }
}
