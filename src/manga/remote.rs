//! Remote source abstraction the repository reconciles against.

use futures::future::BoxFuture;
use thiserror::Error;

use super::types::{Chapter, Manga, MangaId};

/// Failure of a single remote call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// Transport-level failure: no route, connect refused, timeout, broken body
  #[error("network error: {0}")]
  Network(String),
  #[error("not found")]
  NotFound,
  #[error("unexpected HTTP status {0}")]
  Status(u16),
  #[error("failed to decode response: {0}")]
  Decode(String),
}

impl FetchError {
  /// Whether this failure came from the network layer rather than the
  /// service or payload.
  pub fn is_network(&self) -> bool {
    matches!(self, FetchError::Network(_))
  }
}

pub type FetchResult<T> = Result<T, FetchError>;

/// Paginated manga catalogue reachable over the network.
pub trait RemoteSource: Send + Sync {
  fn fetch_page(&self, page: i64, page_size: usize) -> BoxFuture<'_, FetchResult<Vec<Manga>>>;

  fn fetch_latest(&self) -> BoxFuture<'_, FetchResult<Vec<Manga>>>;

  fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, FetchResult<Vec<Manga>>>;

  fn fetch_manga<'a>(&'a self, id: &'a MangaId) -> BoxFuture<'a, FetchResult<Manga>>;

  fn fetch_chapters<'a>(&'a self, id: &'a MangaId) -> BoxFuture<'a, FetchResult<Vec<Chapter>>>;

  fn fetch_chapter_images<'a>(
    &'a self,
    id: &'a MangaId,
    chapter: &'a str,
  ) -> BoxFuture<'a, FetchResult<Vec<String>>>;
}
