//! Eviction order for the buffer pool.
//!
//! - [`FifoReplacer`] - oldest clean page first

mod fifo;

pub use fifo::FifoReplacer;
