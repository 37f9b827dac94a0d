//! The per-table page store seam between the buffer pool and disk.

use crate::buffer::BufferPool;
use crate::common::{PageId, Result, TableId, TransactionId};
use crate::storage::page::{Page, SharedPage};
use crate::storage::Tuple;

/// Backing storage for one table.
///
/// The buffer pool reads pages through this trait on a cache miss and
/// writes them back on flush or eviction. Tuple placement also lives here:
/// the store decides which pages a tuple insert or delete touches, fetching
/// them through the pool so the right page locks are taken.
pub trait PageStore: Send + Sync {
    /// The catalog id of the table this store backs.
    fn table_id(&self) -> TableId;

    /// Read one page from disk.
    ///
    /// # Errors
    /// - `Error::InvalidPage` if the page is beyond the end of the file
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Write a page's current bytes to disk.
    ///
    /// # Errors
    /// - `Error::InvalidPage` if the page was never allocated
    /// - `Error::Io` on a failed write
    fn write_page(&self, page: &Page) -> Result<()>;

    /// Number of pages currently in the backing file.
    fn num_pages(&self) -> Result<u32>;

    /// Place `tuple` on some page, setting its record id.
    ///
    /// Returns every page the operation modified. Pages must be fetched
    /// with `Permissions::ReadWrite` before they are changed.
    fn insert_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &mut Tuple,
    ) -> Result<Vec<SharedPage>>;

    /// Remove `tuple` from the page its record id points at.
    ///
    /// Returns every page the operation modified.
    fn delete_tuple(
        &self,
        pool: &BufferPool,
        tid: TransactionId,
        tuple: &Tuple,
    ) -> Result<Vec<SharedPage>>;
}
