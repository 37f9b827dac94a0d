//! Page and table identifier types.

use std::fmt;

/// Identifies one table, and therefore one page store, in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(pub u32);

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Table({})", self.0)
    }
}

/// Identifies a page on disk: a page number within one table's backing file.
///
/// Page `n` of a table lives at byte offset `n × page_size` of that table's
/// file. Value equality and hashing make it usable as a key in both the
/// page cache and the lock table.
///
/// # Example
/// ```
/// use txcache::{PageId, TableId};
///
/// let page_id = PageId::new(TableId(1), 42);
/// assert_eq!(page_id.table_id, TableId(1));
/// assert_eq!(page_id.page_number, 42);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId {
    pub table_id: TableId,
    pub page_number: u32,
}

impl PageId {
    /// Create a new PageId.
    #[inline]
    pub fn new(table_id: TableId, page_number: u32) -> Self {
        PageId {
            table_id,
            page_number,
        }
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page({}:{})", self.table_id.0, self.page_number)
    }
}
