//! Slot layout of heap pages.
//!
//! A heap page stores fixed-width tuples. It starts with an occupancy
//! bitmap (one bit per slot) followed by the slots themselves:
//!
//! ```text
//! ┌──────────────┬────────┬────────┬─────┬────────┬─────────┐
//! │ bitmap       │ slot 0 │ slot 1 │ ... │ slot N │ padding │
//! │ ⌈N/8⌉ bytes  │ width  │ width  │     │ width  │         │
//! └──────────────┴────────┴────────┴─────┴────────┴─────────┘
//! ```
//!
//! Bit `i` lives in byte `i / 8` at position `i % 8` (LSB first). A zeroed
//! page is therefore a valid, empty heap page.

use crate::common::{Error, Result};

/// Slot numbers are stored as `u16`.
const MAX_SLOTS: usize = u16::MAX as usize + 1;

/// Geometry of a heap page for one tuple width and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapPageLayout {
    tuple_width: usize,
    slot_count: usize,
    header_len: usize,
}

impl HeapPageLayout {
    /// Compute the layout.
    ///
    /// Each slot costs `tuple_width` bytes plus one bitmap bit, so a page
    /// holds `⌊page_size × 8 / (tuple_width × 8 + 1)⌋` tuples.
    ///
    /// # Errors
    /// `Error::InvalidConfig` if `tuple_width` is 0, if not even one tuple
    /// fits on a page, or if a page would hold more slots than a `u16` slot
    /// number can address.
    pub fn new(page_size: usize, tuple_width: usize) -> Result<Self> {
        if tuple_width == 0 {
            return Err(Error::InvalidConfig("tuple_width must be non-zero"));
        }

        let slot_bits = tuple_width.saturating_mul(8).saturating_add(1);
        let slot_count = page_size.saturating_mul(8) / slot_bits;
        if slot_count == 0 {
            return Err(Error::InvalidConfig("tuple does not fit on a page"));
        }
        if slot_count > MAX_SLOTS {
            return Err(Error::InvalidConfig(
                "too many slots per page for 16-bit slot numbers",
            ));
        }

        Ok(Self {
            tuple_width,
            slot_count,
            header_len: slot_count.div_ceil(8),
        })
    }

    #[inline]
    pub fn tuple_width(&self) -> usize {
        self.tuple_width
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    #[inline]
    pub fn header_len(&self) -> usize {
        self.header_len
    }

    /// Check whether `slot` holds a tuple.
    pub fn is_used(&self, data: &[u8], slot: usize) -> bool {
        slot < self.slot_count && data[slot / 8] & (1 << (slot % 8)) != 0
    }

    fn set_used(&self, data: &mut [u8], slot: usize, used: bool) {
        if used {
            data[slot / 8] |= 1 << (slot % 8);
        } else {
            data[slot / 8] &= !(1 << (slot % 8));
        }
    }

    /// Number of empty slots.
    pub fn free_slots(&self, data: &[u8]) -> usize {
        (0..self.slot_count)
            .filter(|&slot| !self.is_used(data, slot))
            .count()
    }

    /// Store `tuple` in the first empty slot and return the slot number, or
    /// `None` if the page is full.
    ///
    /// # Panics
    /// Panics if `tuple` is not exactly `tuple_width` bytes.
    pub fn insert(&self, data: &mut [u8], tuple: &[u8]) -> Option<u16> {
        assert_eq!(tuple.len(), self.tuple_width, "tuple width mismatch");

        let slot = (0..self.slot_count).find(|&slot| !self.is_used(data, slot))?;
        let range = self.slot_range(slot);
        data[range].copy_from_slice(tuple);
        self.set_used(data, slot, true);
        Some(slot as u16)
    }

    /// Clear `slot`. Returns `false` if it was already empty.
    pub fn delete(&self, data: &mut [u8], slot: usize) -> bool {
        if !self.is_used(data, slot) {
            return false;
        }

        let range = self.slot_range(slot);
        data[range].fill(0);
        self.set_used(data, slot, false);
        true
    }

    /// Read the tuple in `slot`, if any.
    pub fn tuple<'a>(&self, data: &'a [u8], slot: usize) -> Option<&'a [u8]> {
        if self.is_used(data, slot) {
            Some(&data[self.slot_range(slot)])
        } else {
            None
        }
    }

    /// Iterate over `(slot, tuple bytes)` for every used slot.
    pub fn tuples<'a>(&'a self, data: &'a [u8]) -> impl Iterator<Item = (u16, &'a [u8])> + 'a {
        (0..self.slot_count)
            .filter_map(move |slot| self.tuple(data, slot).map(|bytes| (slot as u16, bytes)))
    }

    fn slot_range(&self, slot: usize) -> std::ops::Range<usize> {
        let start = self.header_len + slot * self.tuple_width;
        start..start + self.tuple_width
    }
}
