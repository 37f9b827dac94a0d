//! FIFO (First-In-First-Out) replacement order.
//!
//! The buffer pool evicts in the order pages entered the cache, skipping
//! pages the caller marks as not evictable (dirty ones).

use std::collections::{HashSet, VecDeque};

use crate::common::PageId;

/// Insertion-ordered set of cached pages.
///
/// Re-inserting a page that is already tracked does not move it.
#[derive(Debug)]
pub struct FifoReplacer {
    /// Page IDs in insertion order (front = oldest).
    queue: VecDeque<PageId>,

    /// Set for O(1) membership check.
    in_queue: HashSet<PageId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            in_queue: HashSet::new(),
        }
    }

    /// Record that a page entered the cache.
    pub fn record_insert(&mut self, page_id: PageId) {
        if self.in_queue.insert(page_id) {
            self.queue.push_back(page_id);
        }
    }

    /// The oldest page for which `evictable` holds. Nothing is removed;
    /// call [`remove`](Self::remove) once the page has actually left.
    pub fn victim(&self, mut evictable: impl FnMut(PageId) -> bool) -> Option<PageId> {
        self.queue.iter().copied().find(|&page_id| evictable(page_id))
    }

    /// The oldest tracked page, evictable or not.
    pub fn oldest(&self) -> Option<PageId> {
        self.queue.front().copied()
    }

    /// Stop tracking a page.
    pub fn remove(&mut self, page_id: PageId) {
        if self.in_queue.remove(&page_id) {
            self.queue.retain(|&queued| queued != page_id);
        }
    }

    /// Tracked pages, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = PageId> + '_ {
        self.queue.iter().copied()
    }

    /// Number of tracked pages.
    pub fn size(&self) -> usize {
        self.queue.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}
