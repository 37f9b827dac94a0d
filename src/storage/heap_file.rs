//! Heap File - a table stored as an unordered sequence of heap pages.
//!
//! The [`HeapFile`] handles all direct file operations for one table:
//! - Reading and writing pages
//! - Allocating new pages
//! - Placing and removing fixed-width tuples

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::buffer::{BufferPool, Permissions};
use crate::common::{Error, PageId, Result, TableId, TransactionId};
use crate::storage::page::{HeapPageLayout, Page, SharedPage};
use crate::storage::{PageStore, RecordId, Tuple};

/// A table backed by a single file of heap pages.
///
/// # File Layout
/// Pages are laid out sequentially:
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      P        2P     ...      N×P
/// ```
///
/// where `P` is the configured page size. Each page uses the
/// [`HeapPageLayout`] for the table's tuple width.
///
/// # Thread Safety
/// File access is serialized by an internal mutex, so one `HeapFile` can
/// be shared by every thread through the catalog.
pub struct HeapFile {
    table_id: TableId,
    page_size: usize,
    layout: HeapPageLayout,
    disk: Mutex<DiskState>,
}

struct DiskState {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
}

impl HeapFile {
    /// Create a new, empty heap file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created, or
    /// `Error::InvalidConfig` if `tuple_width` and `page_size` give no usable
    /// slot layout. The file is not created in that case.
    pub fn create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        tuple_width: usize,
        page_size: usize,
    ) -> Result<Self> {
        let layout = HeapPageLayout::new(page_size, tuple_width)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self::from_file(file, 0, table_id, layout, page_size))
    }

    /// Open an existing heap file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened, or
    /// `Error::InvalidConfig` for an unusable slot layout.
    pub fn open<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        tuple_width: usize,
        page_size: usize,
    ) -> Result<Self> {
        let layout = HeapPageLayout::new(page_size, tuple_width)?;
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        // Calculate page count from file size
        let file_size = file.metadata()?.len();
        let page_count = (file_size / page_size as u64) as u32;

        Ok(Self::from_file(file, page_count, table_id, layout, page_size))
    }

    /// Open an existing heap file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(
        path: P,
        table_id: TableId,
        tuple_width: usize,
        page_size: usize,
    ) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, table_id, tuple_width, page_size)
        } else {
            Self::create(path, table_id, tuple_width, page_size)
        }
    }

    fn from_file(
        file: File,
        page_count: u32,
        table_id: TableId,
        layout: HeapPageLayout,
        page_size: usize,
    ) -> Self {
        Self {
            table_id,
            page_size,
            layout,
            disk: Mutex::new(DiskState { file, page_count }),
        }
    }

    /// Slot layout used by every page of this file.
    #[inline]
    pub fn layout(&self) -> HeapPageLayout {
        self.layout
    }

    #[inline]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Get the number of pages in the file.
    pub fn page_count(&self) -> u32 {
        self.disk.lock().page_count
    }

    /// Allocate a new page on disk.
    ///
    /// Returns the `PageId` of the newly allocated page. The page is
    /// initialized with zeros, which is an empty heap page.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut disk = self.disk.lock();
        let page_id = PageId::new(self.table_id, disk.page_count);

        // Extend file with a zeroed page
        let offset = self.offset_of(page_id);
        disk.file.seek(SeekFrom::Start(offset))?;
        disk.file.write_all(&vec![0u8; self.page_size])?;
        disk.file.sync_all()?;

        disk.page_count += 1;
        log::trace!("allocated {}", page_id);
        Ok(page_id)
    }

    /// Read every live tuple of the table under `tid`'s shared locks.
    pub fn scan(&self, pool: &BufferPool, tid: TransactionId) -> Result<Vec<Tuple>> {
        let mut tuples = Vec::new();

        for page_number in 0..self.page_count() {
            let page_id = PageId::new(self.table_id, page_number);
            let page = pool.get_page(tid, page_id, Permissions::ReadOnly)?;
            let page = page.read();

            for (slot, bytes) in self.layout.tuples(page.as_slice()) {
                let mut tuple = Tuple::new(bytes.to_vec());
                tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                tuples.push(tuple);
            }
        }

        Ok(tuples)
    }

    fn offset_of(&self, page_id: PageId) -> u64 {
        (page_id.page_number as u64) * (self.page_size as u64)
    }

    /// Try to store `tuple` on `page_id`, taking the write lock only when
    /// the shared probe shows a free slot.
    fn try_insert_on(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        page_id: PageId,
        tuple: &mut Tuple,
    ) -> Result<Option<SharedPage>> {
        let held_before = pool.holds_lock(tid, page_id);

        let page = pool.get_page(tid, page_id, Permissions::ReadOnly)?;
        let has_room = self.layout.free_slots(page.read().as_slice()) > 0;

        if has_room {
            let page = pool.get_page(tid, page_id, Permissions::ReadWrite)?;
            let slot = {
                let mut guard = page.write();
                let slot = self.layout.insert(guard.as_mut_slice(), tuple.data());
                if slot.is_some() {
                    guard.mark_dirty(tid);
                }
                slot
            };

            if let Some(slot) = slot {
                tuple.set_record_id(Some(RecordId::new(page_id, slot)));
                return Ok(Some(page));
            }
        }

        // Only a probe: give back a lock this scan took and never used.
        if !held_before {
            pool.release_page(tid, page_id);
        }
        Ok(None)
    }
}

impl PageStore for HeapFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut disk = self.disk.lock();
        if page_id.table_id != self.table_id || page_id.page_number >= disk.page_count {
            return Err(Error::InvalidPage(page_id));
        }

        let offset = self.offset_of(page_id);
        disk.file.seek(SeekFrom::Start(offset))?;

        let mut data = vec![0u8; self.page_size];
        disk.file.read_exact(&mut data)?;

        Ok(Page::new(page_id, data))
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let page_id = page.id();
        let mut disk = self.disk.lock();
        if page_id.table_id != self.table_id || page_id.page_number >= disk.page_count {
            return Err(Error::InvalidPage(page_id));
        }

        let offset = self.offset_of(page_id);
        disk.file.seek(SeekFrom::Start(offset))?;
        disk.file.write_all(page.as_slice())?;
        disk.file.sync_all()?; // fsync for durability

        Ok(())
    }

    fn num_pages(&self) -> Result<u32> {
        Ok(self.page_count())
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<SharedPage>> {
        if tuple.data().len() != self.layout.tuple_width() {
            return Err(Error::TupleWidthMismatch {
                table_id: self.table_id,
                expected: self.layout.tuple_width(),
                actual: tuple.data().len(),
            });
        }

        // Fill existing pages before growing the file
        for page_number in 0..self.page_count() {
            let page_id = PageId::new(self.table_id, page_number);
            if let Some(page) = self.try_insert_on(pool, tid, page_id, tuple)? {
                return Ok(vec![page]);
            }
        }

        loop {
            let page_id = self.allocate_page()?;
            if let Some(page) = self.try_insert_on(pool, tid, page_id, tuple)? {
                return Ok(vec![page]);
            }
        }
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>> {
        let record_id = tuple.record_id().ok_or(Error::MissingRecordId)?;
        if record_id.page_id.table_id != self.table_id {
            return Err(Error::TupleNotFound(record_id));
        }

        let page = pool.get_page(tid, record_id.page_id, Permissions::ReadWrite)?;
        {
            let mut guard = page.write();
            if !self.layout.delete(guard.as_mut_slice(), record_id.slot as usize) {
                return Err(Error::TupleNotFound(record_id));
            }
            guard.mark_dirty(tid);
        }

        Ok(vec![page])
    }
}
