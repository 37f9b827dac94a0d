//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between page stores and memory, bounded by capacity
//! - Page locking through the [`LockManager`] on every fetch
//! - Dirty tracking per transaction, with commit and abort
//! - Write-ahead ordering: log records are forced before page bytes reach disk

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::buffer::replacer::FifoReplacer;
use crate::buffer::BufferPoolStats;
use crate::catalog::Catalog;
use crate::common::config::{Config, DirtyPagePolicy};
use crate::common::{Error, PageId, Result, TableId, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::recovery::WriteAheadLog;
use crate::storage::page::{Page, SharedPage};
use crate::storage::Tuple;

/// Access a transaction asks for when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    /// Read the page; takes a shared lock.
    ReadOnly,
    /// Read and modify the page; takes an exclusive lock.
    ReadWrite,
}

impl Permissions {
    /// The page lock this access level needs.
    pub fn lock_mode(self) -> LockMode {
        match self {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Before-images of pages whose uncommitted bytes were written to their
/// store, per owning transaction, oldest first.
type StolenPages = HashMap<TransactionId, Vec<(PageId, Box<[u8]>)>>;

/// Cached pages plus their eviction order, guarded together.
struct PoolState {
    pages: HashMap<PageId, SharedPage>,
    replacer: FifoReplacer,
    stolen: StolenPages,
}

/// Fixed-capacity page cache with strict two-phase page locking.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                         BufferPool                           │
/// │  ┌──────────────────┐       ┌────────────────────────────┐   │
/// │  │  lock_manager    │       │   state: Mutex<PoolState>  │   │
/// │  │ PageId → requests│       │  pages: PageId → SharedPage│   │
/// │  └──────────────────┘       │  replacer: FIFO order      │   │
/// │                             └────────────────────────────┘   │
/// │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────┐    │
/// │  │     catalog      │  │       log        │  │  stats   │    │
/// │  │ TableId → store  │  │ WriteAheadLog    │  │ atomics  │    │
/// │  └──────────────────┘  └──────────────────┘  └──────────┘    │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `lock_manager`: its own mutex; always taken before `state`, never while
///   waiting on a page lock
/// - `state`: one `Mutex` over the page map and eviction order; also
///   serialises commit and abort against eviction
/// - page bytes: each page's own `RwLock`
/// - `stats`: no lock, all atomic counters
///
/// Callers must drop every page guard before calling back into the pool.
///
/// # Usage
/// ```no_run
/// use std::sync::Arc;
/// use txcache::{BufferPool, Catalog, Config, HeapFile, LogFile, Permissions};
/// use txcache::{TableId, TransactionId};
///
/// let config = Config::default();
/// let catalog = Arc::new(Catalog::new());
/// let file = HeapFile::open_or_create("accounts.dat", TableId(1), 16, config.page_size)?;
/// catalog.add_table(Arc::new(file), "accounts");
/// let log = Arc::new(LogFile::create("wal.log")?);
///
/// let pool = BufferPool::new(&config, catalog, log)?;
/// let tid = TransactionId(1);
/// let page = pool.get_page(tid, txcache::PageId::new(TableId(1), 0), Permissions::ReadWrite)?;
/// {
///     let mut page = page.write();
///     page.as_mut_slice()[0] = 0xAB;
///     page.mark_dirty(tid);
/// }
/// pool.transaction_complete(tid, true)?;
/// # Ok::<(), txcache::Error>(())
/// ```
pub struct BufferPool {
    state: Mutex<PoolState>,

    lock_manager: LockManager,

    catalog: Arc<Catalog>,

    log: Arc<dyn WriteAheadLog>,

    stats: BufferPoolStats,

    /// Maximum number of cached pages (immutable after construction).
    capacity: usize,

    page_size: usize,

    dirty_page_policy: DirtyPagePolicy,
}

impl BufferPool {
    /// Create an empty buffer pool.
    ///
    /// # Errors
    /// - `Error::InvalidConfig` if a `config` value is out of range
    pub fn new(
        config: &Config,
        catalog: Arc<Catalog>,
        log: Arc<dyn WriteAheadLog>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            state: Mutex::new(PoolState {
                pages: HashMap::with_capacity(config.pool_capacity),
                replacer: FifoReplacer::new(),
                stolen: HashMap::new(),
            }),
            lock_manager: LockManager::new(config.lock_timeout),
            catalog,
            log,
            stats: BufferPoolStats::new(),
            capacity: config.pool_capacity,
            page_size: config.page_size,
            dirty_page_policy: config.dirty_page_policy,
        })
    }

    // ========================================================================
    // Public API: Fetch and release pages
    // ========================================================================

    /// Fetch a page on behalf of `tid`, locking it first.
    ///
    /// `ReadOnly` takes a shared lock, `ReadWrite` an exclusive one. The
    /// call blocks until the lock is granted. A cache hit returns the cached
    /// page itself; a miss loads it from its table's page store, evicting
    /// one page first if the cache is full.
    ///
    /// # Errors
    /// - `Error::LockTimeout` if the lock was not granted in time. The
    ///   transaction has already been aborted when this is returned.
    /// - `Error::TableNotFound` / `Error::InvalidPage` if the page does not exist
    /// - `Error::EvictionFailed` / `Error::BufferPoolFull` if no room could be made
    pub fn get_page(
        &self,
        tid: TransactionId,
        page_id: PageId,
        perm: Permissions,
    ) -> Result<SharedPage> {
        if let Err(err) = self
            .lock_manager
            .acquire_lock(page_id, tid, perm.lock_mode())
        {
            if err.is_abort() {
                log::debug!("aborting {} after lock timeout on {}", tid, page_id);
                self.transaction_complete(tid, false)?;
            }
            return Err(err);
        }

        let mut state = self.state.lock();

        if let Some(page) = state.pages.get(&page_id) {
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Arc::clone(page));
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);

        let store = self.catalog.database_file(page_id.table_id)?;
        let page = store.read_page(page_id)?;
        if page.size() != self.page_size {
            log::warn!(
                "{} is {} bytes but the pool caches {}-byte pages",
                page_id,
                page.size(),
                self.page_size
            );
            return Err(Error::InvalidPage(page_id));
        }
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        if state.pages.len() >= self.capacity {
            self.evict_page(&mut state)?;
        }

        let page = page.into_shared();
        state.pages.insert(page_id, Arc::clone(&page));
        state.replacer.record_insert(page_id);

        Ok(page)
    }

    /// Release `tid`'s lock on one page before the transaction ends.
    ///
    /// This breaks two-phase locking; it is meant for pages a transaction
    /// only probed and never relied on.
    pub fn release_page(&self, tid: TransactionId, page_id: PageId) {
        self.lock_manager.release_lock(page_id, tid);
    }

    /// True iff `tid` holds a lock of either mode on `page_id`.
    pub fn holds_lock(&self, tid: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(tid, page_id)
    }

    // ========================================================================
    // Public API: Tuples
    // ========================================================================

    /// Insert `tuple` into table `table_id` on behalf of `tid`.
    ///
    /// The table's page store picks the page and sets the tuple's record
    /// id; every page it modified is marked dirty by `tid`.
    ///
    /// # Errors
    /// - `Error::TableNotFound` if the table is not in the catalog
    /// - any error from fetching the pages involved
    pub fn insert_tuple(
        &self,
        tid: TransactionId,
        table_id: TableId,
        tuple: &mut Tuple,
    ) -> Result<()> {
        let store = self.catalog.database_file(table_id)?;
        let pages = store.insert_tuple(self, tid, tuple)?;
        self.track_dirty(tid, pages)
    }

    /// Delete `tuple` from the table its record id points into.
    ///
    /// # Errors
    /// - `Error::MissingRecordId` if the tuple was never stored
    /// - `Error::TupleNotFound` if its slot is already empty
    pub fn delete_tuple(&self, tid: TransactionId, tuple: &Tuple) -> Result<()> {
        let record_id = tuple.record_id().ok_or(Error::MissingRecordId)?;
        let store = self.catalog.database_file(record_id.page_id.table_id)?;
        let pages = store.delete_tuple(self, tid, tuple)?;
        self.track_dirty(tid, pages)
    }

    // ========================================================================
    // Public API: Commit and abort
    // ========================================================================

    /// End transaction `tid`, then release every lock it holds.
    ///
    /// On commit, an update record (before- and after-image) is appended for
    /// every cached page `tid` dirtied, followed by one commit record, and the
    /// log is forced. The pages become clean but stay cached; their bytes
    /// reach the page store on a later flush or eviction.
    ///
    /// On abort, every page `tid` dirtied is discarded from the cache, or
    /// rolled back to its before-image if it also carries committed bytes
    /// not yet written back. Pages whose uncommitted bytes were already
    /// written to their store by eviction or a flush get their before-image
    /// written back.
    ///
    /// # Errors
    /// Log failures on commit and store failures while undoing an abort are
    /// returned; `tid` then keeps its locks so the call can be repeated.
    pub fn transaction_complete(&self, tid: TransactionId, commit: bool) -> Result<()> {
        {
            let mut state = self.state.lock();
            if commit {
                self.commit_pages(&mut state, tid)?;
            } else {
                Self::abort_pages(&mut state, tid);
                self.undo_stolen(&mut state, tid)?;
            }
        }

        self.lock_manager.release_all_locks(tid);

        if commit {
            self.stats.commits.fetch_add(1, Ordering::Relaxed);
            log::debug!("committed {}", tid);
        } else {
            self.stats.aborts.fetch_add(1, Ordering::Relaxed);
            log::debug!("aborted {}", tid);
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Flush and discard
    // ========================================================================

    /// Write every cached page whose bytes differ from its page store.
    ///
    /// # Errors
    /// - I/O errors from the log or a page store; pages flushed before the
    ///   failure stay flushed
    pub fn flush_all_pages(&self) -> Result<()> {
        let mut state = self.state.lock();
        let PoolState {
            pages,
            replacer,
            stolen,
        } = &mut *state;

        for page_id in replacer.iter() {
            if let Some(page) = pages.get(&page_id) {
                self.flush_page(page, stolen)?;
            }
        }
        Ok(())
    }

    /// Flush every cached page `tid` holds a lock on, then release those
    /// locks.
    ///
    /// Once released, other transactions may overwrite those pages, so a
    /// later abort of `tid` no longer restores them; undoing them is left to
    /// the log's update records.
    pub fn flush_pages(&self, tid: TransactionId) -> Result<()> {
        let locked = self.lock_manager.pages_locked_by(tid);

        {
            let mut state = self.state.lock();
            let PoolState { pages, stolen, .. } = &mut *state;
            for page_id in &locked {
                if let Some(page) = pages.get(page_id) {
                    self.flush_page(page, stolen)?;
                }
            }
            // The entry stays, even empty, so commit still logs a commit record
            if let Some(images) = stolen.get_mut(&tid) {
                images.retain(|(page_id, _)| !locked.contains(page_id));
            }
        }

        for page_id in locked {
            self.lock_manager.release_lock(page_id, tid);
        }
        Ok(())
    }

    /// Drop a page from the cache without writing it. No-op if not cached.
    pub fn discard_page(&self, page_id: PageId) {
        let mut state = self.state.lock();
        if state.pages.remove(&page_id).is_some() {
            state.replacer.remove(page_id);
            log::trace!("discarded {}", page_id);
        }
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    /// Get buffer pool statistics.
    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// The lock manager guarding this pool's pages.
    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Get the number of pages in the buffer pool.
    pub fn page_count(&self) -> usize {
        self.state.lock().pages.len()
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.state.lock().pages.contains_key(&page_id)
    }

    // ========================================================================
    // Internal: Dirty tracking
    // ========================================================================

    /// Mark pages a page store modified as dirty by `tid` and make sure
    /// they are cached.
    fn track_dirty(&self, tid: TransactionId, pages: Vec<SharedPage>) -> Result<()> {
        let mut state = self.state.lock();

        for page in pages {
            let page_id = {
                let mut guard = page.write();
                guard.mark_dirty(tid);
                guard.id()
            };

            // Evicted since the store fetched it
            if !state.pages.contains_key(&page_id) {
                if state.pages.len() >= self.capacity {
                    self.evict_page(&mut state)?;
                }
                state.replacer.record_insert(page_id);
            }
            state.pages.insert(page_id, page);
        }
        Ok(())
    }

    fn commit_pages(&self, state: &mut PoolState, tid: TransactionId) -> Result<()> {
        let dirtied: Vec<&SharedPage> = state
            .replacer
            .iter()
            .filter_map(|page_id| state.pages.get(&page_id))
            .filter(|page| page.read().dirty_owner() == Some(tid))
            .collect();

        // Stolen pages were logged when they were written out
        let wrote_out = state.stolen.contains_key(&tid);
        if dirtied.is_empty() && !wrote_out {
            return Ok(());
        }

        for page in &dirtied {
            let page = page.read();
            if !page.is_update_logged() {
                self.log
                    .log_write(tid, page.id(), page.before_image(), page.as_slice())?;
            }
        }
        self.log.log_commit(tid)?;
        self.log.force()?;

        for page in dirtied {
            let mut page = page.write();
            page.mark_committed();
            if self.lock_manager.holds_lock(tid, page.id()) {
                page.set_before_image();
            }
        }

        state.stolen.remove(&tid);
        log::trace!("{} logged and forced its commit", tid);
        Ok(())
    }

    fn abort_pages(state: &mut PoolState, tid: TransactionId) {
        let dirtied: Vec<PageId> = state
            .pages
            .iter()
            .filter(|(_, page)| page.read().dirty_owner() == Some(tid))
            .map(|(&page_id, _)| page_id)
            .collect();

        for page_id in dirtied {
            let keep = match state.pages.get(&page_id) {
                Some(page) => {
                    let mut page = page.write();
                    if page.has_committed_writeback() {
                        page.roll_back();
                        true
                    } else {
                        false
                    }
                }
                None => continue,
            };

            if !keep {
                state.pages.remove(&page_id);
                state.replacer.remove(page_id);
                log::trace!("discarded {} dirtied by aborted {}", page_id, tid);
            }
        }
    }

    /// Write back the before-images of every page `tid` had stolen, then
    /// drop any clean cached copy so the next reader loads the restored bytes.
    fn undo_stolen(&self, state: &mut PoolState, tid: TransactionId) -> Result<()> {
        let Some(mut images) = state.stolen.remove(&tid) else {
            return Ok(());
        };

        // Newest first, so the oldest before-image is written last
        while let Some((page_id, before)) = images.pop() {
            let restored = self
                .catalog
                .database_file(page_id.table_id)
                .and_then(|store| store.write_page(&Page::new(page_id, before.to_vec())));

            if let Err(err) = restored {
                images.push((page_id, before));
                state.stolen.insert(tid, images);
                return Err(err);
            }
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);

            let cached_clean = state
                .pages
                .get(&page_id)
                .map(|page| !page.read().is_dirty());
            match cached_clean {
                Some(true) => {
                    state.pages.remove(&page_id);
                    state.replacer.remove(page_id);
                }
                Some(false) => log::warn!(
                    "{} restored on disk but dirty in cache after abort of {}",
                    page_id,
                    tid
                ),
                None => {}
            }
            log::trace!("restored stolen {} for aborted {}", page_id, tid);
        }
        Ok(())
    }

    // ========================================================================
    // Internal: Flush and eviction
    // ========================================================================

    /// Write one page through its page store if its bytes differ from disk.
    ///
    /// An uncommitted write is logged and the log forced before the page
    /// bytes go out, and its before-image is kept in `stolen` so an abort
    /// can restore it.
    fn flush_page(&self, page: &SharedPage, stolen: &mut StolenPages) -> Result<()> {
        let mut page = page.write();
        if !page.needs_writeback() {
            return Ok(());
        }

        let owner = page.dirty_owner();
        if let Some(owner) = owner {
            if !page.is_update_logged() {
                self.log
                    .log_write(owner, page.id(), page.before_image(), page.as_slice())?;
                self.log.force()?;
                page.mark_update_logged();
            }
        }

        let store = self.catalog.database_file(page.id().table_id)?;
        store.write_page(&page)?;

        if let Some(owner) = owner {
            let images = stolen.entry(owner).or_default();
            // The first image written out is the one to restore
            if !images.iter().any(|(page_id, _)| *page_id == page.id()) {
                images.push((page.id(), page.before_image().into()));
            }
        }
        page.mark_flushed();

        self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        log::trace!("flushed {}", page.id());
        Ok(())
    }

    /// Make room for one page.
    ///
    /// The victim is the oldest page with no uncommitted write. If every page
    /// is dirty, the dirty page policy decides between flushing the oldest
    /// page anyway and refusing.
    fn evict_page(&self, state: &mut PoolState) -> Result<()> {
        let PoolState {
            pages,
            replacer,
            stolen,
        } = state;

        let clean = replacer.victim(|page_id| {
            pages
                .get(&page_id)
                .is_some_and(|page| !page.read().is_dirty())
        });

        let victim = match (clean, self.dirty_page_policy) {
            (Some(page_id), _) => page_id,
            (None, DirtyPagePolicy::FlushOnEvict) => {
                let oldest = replacer.oldest().ok_or(Error::BufferPoolFull(pages.len()))?;
                log::warn!("no clean page to evict; flushing dirty {}", oldest);
                oldest
            }
            (None, DirtyPagePolicy::NoSteal) => {
                log::debug!("eviction refused: all {} cached pages are dirty", pages.len());
                return Err(Error::BufferPoolFull(pages.len()));
            }
        };

        if let Some(page) = pages.get(&victim) {
            self.flush_page(page, stolen).map_err(|source| Error::EvictionFailed {
                page_id: victim,
                source: Box::new(source),
            })?;
        }

        pages.remove(&victim);
        replacer.remove(victim);

        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        log::trace!("evicted {}", victim);
        Ok(())
    }
}
