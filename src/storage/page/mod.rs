//! Page types and layout.
//!
//! This module contains:
//! - [`Page`] - Page bytes plus dirty-owner and before-image metadata
//! - [`SharedPage`] - How the buffer pool shares cached pages
//! - [`HeapPageLayout`] - Slot layout used by heap files

mod heap_page;
#[allow(clippy::module_inception)]
mod page;

pub use heap_page::HeapPageLayout;
pub use page::{Page, SharedPage};
