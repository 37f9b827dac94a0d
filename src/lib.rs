//! txcache - a transactional page cache with page-level two-phase locking.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         transactions                            │
//! └─────────────────────────────────────────────────────────────────┘
//!            │ get_page / insert_tuple / transaction_complete
//!            ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Buffer Pool (buffer/)                                          │
//! │   page cache, FIFO eviction, dirty tracking, commit / abort     │
//! │        │                         │                    │         │
//! │        ↓                         ↓                    ↓         │
//! │  Lock Manager (concurrency/)   Catalog (catalog)    WAL         │
//! │   S/X page locks, timeouts      TableId → store   (recovery/)   │
//! └─────────────────────────────────────────────────────────────────┘
//!                                   │
//!                                   ↓
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Storage (storage/)                                             │
//! │   PageStore trait, HeapFile, Page, Tuple                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TransactionId, Error, config)
//! - [`buffer`] - The buffer pool and its eviction order
//! - [`concurrency`] - The page lock manager
//! - [`storage`] - Page stores, pages and tuples
//! - [`recovery`] - The write-ahead log interface and a file-backed log
//! - [`catalog`] - Table id to page store routing
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use txcache::{BufferPool, Catalog, Config, HeapFile, LogFile, TableId, TransactionId, Tuple};
//!
//! let config = Config::default();
//! let catalog = Arc::new(Catalog::new());
//! let table = HeapFile::open_or_create("users.dat", TableId(1), 32, config.page_size)?;
//! catalog.add_table(Arc::new(table), "users");
//!
//! let pool = BufferPool::new(&config, catalog, Arc::new(LogFile::create("users.wal")?))?;
//!
//! let tid = TransactionId(1);
//! let mut tuple = Tuple::new(vec![0u8; 32]);
//! pool.insert_tuple(tid, TableId(1), &mut tuple)?;
//! pool.transaction_complete(tid, true)?;
//! # Ok::<(), txcache::Error>(())
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod concurrency;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::{DirtyPagePolicy, DEFAULT_PAGE_SIZE};
pub use common::{Config, Error, PageId, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, Permissions, StatsSnapshot};
pub use catalog::Catalog;
pub use concurrency::{LockManager, LockMode};
pub use recovery::{LogFile, LogRecord, WriteAheadLog};
pub use storage::page::{HeapPageLayout, Page, SharedPage};
pub use storage::{HeapFile, PageStore, RecordId, Tuple};
