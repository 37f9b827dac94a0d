//! Page - the fixed-size unit of storage and caching.
//!
//! A [`Page`] couples the raw bytes of one on-disk page with the metadata
//! the buffer pool needs to run commit and abort:
//! - which transaction, if any, holds an uncommitted write on it
//! - a before-image of the bytes as of the last commit, flush or load
//! - whether committed bytes are still waiting to be written back

use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{PageId, TransactionId};

/// A cached page shared between the buffer pool and its callers.
///
/// The buffer pool hands out clones of the `Arc`; callers mutate the page
/// in place under its `RwLock` once they hold the matching page lock from
/// the lock manager.
pub type SharedPage = Arc<RwLock<Page>>;

/// One page of a table plus its buffer-management metadata.
///
/// # State
/// ```text
/// clean                 dirty_owner = None,      pending_writeback = false
/// dirty(tid)            dirty_owner = Some(tid)
/// committed, unflushed  dirty_owner = None,      pending_writeback = true
/// ```
///
/// # Clone Implementation
/// `Page` does NOT implement `Clone` in production code; copying page bytes
/// should be explicit. A `#[cfg(test)]` Clone is provided for tests.
#[derive(Debug)]
pub struct Page {
    id: PageId,
    data: Box<[u8]>,
    before_image: Box<[u8]>,
    dirty_owner: Option<TransactionId>,
    pending_writeback: bool,
    /// The current uncommitted bytes already have an update record.
    update_logged: bool,
}

impl Page {
    /// Wrap bytes read from disk. The before-image starts equal to them.
    pub fn new(id: PageId, data: Vec<u8>) -> Self {
        let data = data.into_boxed_slice();
        let before_image = data.clone();
        Self {
            id,
            data,
            before_image,
            dirty_owner: None,
            pending_writeback: false,
            update_logged: false,
        }
    }

    /// Create a zeroed page of `page_size` bytes.
    pub fn zeroed(id: PageId, page_size: usize) -> Self {
        Self::new(id, vec![0u8; page_size])
    }

    /// Wrap a shared page for the cache.
    pub fn into_shared(self) -> SharedPage {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Get immutable slice of page data.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Get mutable slice of page data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Bytes as of the last commit, flush or load.
    #[inline]
    pub fn before_image(&self) -> &[u8] {
        &self.before_image
    }

    /// Snapshot the current bytes as the new before-image.
    pub fn set_before_image(&mut self) {
        self.before_image.copy_from_slice(&self.data);
    }

    /// Roll the page bytes back to the before-image.
    pub fn restore_before_image(&mut self) {
        self.data.copy_from_slice(&self.before_image);
    }

    // ========================================================================
    // Dirty tracking
    // ========================================================================

    /// The transaction holding an uncommitted write on this page.
    #[inline]
    pub fn dirty_owner(&self) -> Option<TransactionId> {
        self.dirty_owner
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty_owner.is_some()
    }

    /// Record that `tid` has written to this page.
    pub fn mark_dirty(&mut self, tid: TransactionId) {
        self.dirty_owner = Some(tid);
        self.update_logged = false;
    }

    /// Whether the bytes differ from what the page store holds.
    #[inline]
    pub fn needs_writeback(&self) -> bool {
        self.dirty_owner.is_some() || self.pending_writeback
    }

    /// Whether committed bytes are cached that the page store lacks.
    #[inline]
    pub fn has_committed_writeback(&self) -> bool {
        self.pending_writeback
    }

    /// Turn an uncommitted write into a committed one that still has to be
    /// written back.
    pub(crate) fn mark_committed(&mut self) {
        self.dirty_owner = None;
        self.pending_writeback = true;
        self.update_logged = false;
    }

    /// Whether an update record for the current bytes was already appended.
    #[inline]
    pub(crate) fn is_update_logged(&self) -> bool {
        self.update_logged
    }

    pub(crate) fn mark_update_logged(&mut self) {
        self.update_logged = true;
    }

    /// Drop the uncommitted write of the dirty owner, keeping any earlier
    /// committed bytes.
    pub(crate) fn roll_back(&mut self) {
        self.restore_before_image();
        self.dirty_owner = None;
        self.update_logged = false;
    }

    /// The page store now holds exactly these bytes.
    pub(crate) fn mark_flushed(&mut self) {
        self.set_before_image();
        self.dirty_owner = None;
        self.pending_writeback = false;
        self.update_logged = false;
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            data: self.data.clone(),
            before_image: self.before_image.clone(),
            dirty_owner: self.dirty_owner,
            pending_writeback: self.pending_writeback,
            update_logged: self.update_logged,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
