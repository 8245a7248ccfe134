//! Page-indexed local cache for offline support.
//!
//! This module provides the persistent side of the repository:
//! - Stores manga records tagged with the page they were fetched for
//! - Replaces a page atomically (clear-then-insert in one transaction)
//! - Tracks a digest per page so refreshes can tell whether content changed
//! - Serves page, id, aggregate and substring lookups when offline

mod storage;
mod traits;

pub(crate) use storage::write_page;
pub use storage::SqliteStorage;
pub use traits::{CacheResult, DataSource, PageStore, PageSummary, StoredManga};
