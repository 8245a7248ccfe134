//! Core traits and types for the page cache.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::Serialize;

use crate::manga::types::{Manga, MangaId};

/// Page-indexed persistent store of manga records.
///
/// A page holds exactly the set of items last written for it:
/// `replace_page` is all-or-nothing. The same id may be stored on several
/// pages; writing one page never touches another.
pub trait PageStore: Send + Sync {
  /// Insert or update items on `page` without touching its other rows.
  fn upsert_many(&self, page: i64, items: &[Manga]) -> Result<()>;

  /// Atomically clear `page` and insert `items` in order, remembering the
  /// page size they were requested with.
  fn replace_page(&self, page: i64, page_size: usize, items: &[Manga]) -> Result<PageWrite>;

  /// Items of `page` in stored order.
  fn get_page(&self, page: i64) -> Result<Vec<Manga>>;

  /// Most recently cached copy of `id`, from whichever page holds it.
  fn get_by_id(&self, id: &MangaId) -> Result<Option<StoredManga>>;

  /// Every stored item once, numbered pages first.
  fn get_all(&self) -> Result<Vec<Manga>>;

  /// Remove all rows of `page`, returning how many were removed.
  fn delete_page(&self, page: i64) -> Result<usize>;

  /// Highest page number present, reserved pages included.
  fn max_page(&self) -> Result<Option<i64>>;

  /// Case-insensitive substring search over titles, authors and genres.
  fn search(&self, query: &str) -> Result<Vec<Manga>>;

  /// Summary of the last write of `page`.
  fn page_summary(&self, page: i64) -> Result<Option<PageSummary>>;

  /// Summaries of every page with rows, ordered by page.
  fn summaries(&self) -> Result<Vec<PageSummary>>;
}

/// Outcome of a page replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageWrite {
  pub page: i64,
  pub item_count: usize,
  /// False when the new contents are identical to the previous ones
  pub changed: bool,
}

/// A cached manga with the time its row was written.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredManga {
  pub manga: Manga,
  pub cached_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
  pub page: i64,
  pub item_count: usize,
  /// Page size of the last whole-page write, if known
  pub page_size: Option<usize>,
  /// SHA-256 of the page contents; None for pages never written whole
  pub digest: Option<String>,
  pub cached_at: Option<DateTime<Utc>>,
  pub first_title: Option<String>,
}

/// Result from a repository read, including data and metadata about the source.
#[derive(Debug, Clone, Serialize)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: DataSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Fresh data from the remote source.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: DataSource::Network,
      cached_at: None,
    }
  }

  /// Data served straight from the requested cache entry.
  pub fn from_cache(data: T, cached_at: Option<DateTime<Utc>>) -> Self {
    Self {
      data,
      source: DataSource::Cache,
      cached_at,
    }
  }

  /// Data from a broader cache lookup after the requested one came up empty.
  pub fn fallback(data: T) -> Self {
    Self {
      data,
      source: DataSource::CacheFallback,
      cached_at: None,
    }
  }

  /// Generated placeholder data.
  pub fn synthetic(data: T) -> Self {
    Self {
      data,
      source: DataSource::Synthetic,
      cached_at: None,
    }
  }

  /// Whether the data reflects the remote source or a copy of it.
  pub fn is_authoritative(&self) -> bool {
    matches!(self.source, DataSource::Network | DataSource::Cache)
  }
}

impl<T: Default> CacheResult<T> {
  /// A valid, empty remote answer.
  pub fn empty() -> Self {
    Self {
      data: T::default(),
      source: DataSource::Empty,
      cached_at: None,
    }
  }
}

/// Indicates where returned data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
  /// Fresh data from the remote source
  Network,
  /// The requested cache entry
  Cache,
  /// A broader cache lookup (e.g. all stored items instead of one page)
  CacheFallback,
  /// Deterministic placeholder data
  Synthetic,
  /// Remote answered with nothing and the empty policy is to propagate
  Empty,
}
