//! Storage layer - page stores, page formats and tuples.
//!
//! This module handles persistent storage:
//! - [`PageStore`] - The per-table seam the buffer pool reads and writes through
//! - [`HeapFile`] - File-backed page store of fixed-width tuples
//! - [`page`] - Page types and layouts
//! - [`Tuple`] / [`RecordId`] - Rows and where they live

mod heap_file;
pub mod page;
mod page_store;
mod tuple;

pub use heap_file::HeapFile;
pub use page_store::PageStore;
pub use tuple::{RecordId, Tuple};
