//! Repository reconciling the page cache with the remote catalogue.
//!
//! Reads are cache-first. When the cache has nothing for a request the
//! repository goes to the network if connectivity allows it, persists what it
//! gets, and otherwise degrades through broader cache lookups and finally
//! deterministic placeholder data.

use color_eyre::Result;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::remote::{FetchError, RemoteSource};
use super::synthetic;
use super::types::{Chapter, Manga, MangaId, DETAIL_PAGE, LATEST_PAGE};
use crate::cache::{CacheResult, PageStore, PageSummary};
use crate::config::EmptyPagePolicy;
use crate::connectivity::Connectivity;

/// Terminal outcomes of a repository read.
#[derive(Debug, Error)]
pub enum RepositoryError {
  #[error("manga {id} not found")]
  NotFound { id: MangaId },
  #[error("no internet connection and no cached data available")]
  NoConnectivityNoCache,
  #[error("no manga matching '{query}'")]
  NoMatches { query: String },
  /// Pages below 1 are reserved for the latest list and single items
  #[error("page {page} is not a catalogue page (pages start at 1)")]
  InvalidPage { page: i64 },
  #[error(transparent)]
  Remote(#[from] FetchError),
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Snapshot of what the local store holds.
#[derive(Debug, Clone, Serialize)]
pub struct StoreSummary {
  pub total_items: usize,
  pub max_page: Option<i64>,
  pub pages: Vec<PageSummary>,
}

#[derive(Debug, Default)]
struct RefreshReport {
  attempted: usize,
  updated: usize,
  unchanged: usize,
  failed: usize,
}

impl RefreshReport {
  fn record(&mut self, page: i64, outcome: std::result::Result<Option<bool>, String>) {
    self.attempted += 1;
    match outcome {
      Ok(Some(true)) => self.updated += 1,
      Ok(Some(false)) => self.unchanged += 1,
      Ok(None) => {
        debug!(page, "remote returned nothing, keeping cached page");
        self.unchanged += 1;
      }
      Err(error) => {
        warn!(page, %error, "page refresh failed");
        self.failed += 1;
      }
    }
  }
}

/// Offline-first manga repository.
pub struct MangaRepository<S: PageStore, R: RemoteSource> {
  store: Arc<S>,
  remote: Arc<R>,
  connectivity: Arc<dyn Connectivity>,
  /// Page size used when refreshing cached pages
  page_size: usize,
  empty_policy: EmptyPagePolicy,
}

impl<S: PageStore, R: RemoteSource> Clone for MangaRepository<S, R> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      remote: Arc::clone(&self.remote),
      connectivity: Arc::clone(&self.connectivity),
      page_size: self.page_size,
      empty_policy: self.empty_policy,
    }
  }
}

impl<S: PageStore, R: RemoteSource> MangaRepository<S, R> {
  pub fn new(store: S, remote: R, connectivity: Arc<dyn Connectivity>) -> Self {
    Self {
      store: Arc::new(store),
      remote: Arc::new(remote),
      connectivity,
      page_size: 20,
      empty_policy: EmptyPagePolicy::default(),
    }
  }

  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size;
    self
  }

  pub fn with_empty_policy(mut self, policy: EmptyPagePolicy) -> Self {
    self.empty_policy = policy;
    self
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  #[cfg(test)]
  pub fn store(&self) -> &S {
    &self.store
  }

  #[cfg(test)]
  pub fn remote(&self) -> &R {
    &self.remote
  }

  // ==========================================================================
  // Reads
  // ==========================================================================

  /// Items of `page`, cache first. Pages start at 1.
  ///
  /// 1. A non-empty cached page is returned without touching the network
  /// 2. Online: fetch, replace the cached page, return
  /// 3. Online but the fetch failed: cached page, then every cached item,
  ///    then placeholders (persisted)
  /// 4. Offline: cached page, then every cached item, never placeholders
  pub async fn get_page(
    &self,
    page: i64,
    page_size: usize,
  ) -> RepositoryResult<CacheResult<Vec<Manga>>> {
    if page < 1 {
      return Err(RepositoryError::InvalidPage { page });
    }

    let cached = self.cached_page(page);
    if !cached.is_empty() {
      debug!(page, items = cached.len(), "serving page from cache");
      return Ok(CacheResult::from_cache(cached, self.cached_at(page)));
    }

    if !self.connectivity.is_available().await {
      info!(page, "offline, falling back to cache");
      return self.cache_fallback(page);
    }

    match self.remote.fetch_page(page, page_size).await {
      Ok(items) if !items.is_empty() => {
        debug!(page, items = items.len(), "fetched page");
        self.persist_page(page, page_size, &items);
        Ok(CacheResult::from_network(items))
      }
      Ok(_) => {
        warn!(page, "remote returned an empty page");
        Ok(self.on_empty_page(page, page_size))
      }
      Err(error) => {
        warn!(page, %error, "page fetch failed, falling back");
        if let Ok(result) = self.cache_fallback(page) {
          return Ok(result);
        }
        match synthetic::page(page, page_size) {
          Some(items) => {
            self.persist_page(page, page_size, &items);
            Ok(CacheResult::synthetic(items))
          }
          None => Err(RepositoryError::NoConnectivityNoCache),
        }
      }
    }
  }

  /// The "latest" collection, cached under [`LATEST_PAGE`].
  pub async fn get_latest(&self) -> RepositoryResult<CacheResult<Vec<Manga>>> {
    let cached = self.cached_page(LATEST_PAGE);
    if !cached.is_empty() {
      return Ok(CacheResult::from_cache(cached, self.cached_at(LATEST_PAGE)));
    }

    if !self.connectivity.is_available().await {
      info!("offline and no cached latest list");
      return Err(RepositoryError::NoConnectivityNoCache);
    }

    match self.remote.fetch_latest().await {
      Ok(items) if !items.is_empty() => {
        self.persist_page(LATEST_PAGE, items.len(), &items);
        Ok(CacheResult::from_network(items))
      }
      Ok(_) if self.empty_policy == EmptyPagePolicy::Propagate => Ok(CacheResult::empty()),
      result => {
        if let Err(error) = result {
          warn!(%error, "latest fetch failed, using placeholders");
        }
        let items = synthetic::latest();
        self.persist_page(LATEST_PAGE, items.len(), &items);
        Ok(CacheResult::synthetic(items))
      }
    }
  }

  /// A single manga, cache first. Fetched items are kept under [`DETAIL_PAGE`].
  pub async fn get_item_by_id(&self, id: &MangaId) -> RepositoryResult<CacheResult<Manga>> {
    match self.store.get_by_id(id) {
      Ok(Some(stored)) => return Ok(CacheResult::from_cache(stored.manga, stored.cached_at)),
      Ok(None) => {}
      Err(error) => warn!(%id, %error, "cache lookup failed"),
    }

    if !self.connectivity.is_available().await {
      return Err(RepositoryError::NoConnectivityNoCache);
    }

    let manga = self
      .remote
      .fetch_manga(id)
      .await
      .map_err(|error| remote_error(id, error))?;
    if let Err(error) = self.store.upsert_many(DETAIL_PAGE, std::slice::from_ref(&manga)) {
      warn!(%id, %error, "failed to cache manga");
    }
    Ok(CacheResult::from_network(manga))
  }

  /// Remote search, falling back to the cache when the network is unusable
  /// or has no matches.
  pub async fn search(&self, query: &str) -> RepositoryResult<CacheResult<Vec<Manga>>> {
    let query = query.trim();
    if query.is_empty() {
      return Err(RepositoryError::NoMatches {
        query: query.to_string(),
      });
    }

    if self.connectivity.is_available().await {
      match self.remote.search(query).await {
        Ok(items) if !items.is_empty() => return Ok(CacheResult::from_network(items)),
        Ok(_) => debug!(query, "no remote matches, searching cache"),
        Err(error) if error.is_network() => {
          warn!(query, %error, "remote search failed, searching cache")
        }
        Err(error) => return Err(RepositoryError::Remote(error)),
      }
    }

    let local = self.store.search(query).unwrap_or_else(|error| {
      warn!(query, %error, "cache search failed");
      Vec::new()
    });
    if local.is_empty() {
      return Err(RepositoryError::NoMatches {
        query: query.to_string(),
      });
    }
    Ok(CacheResult::fallback(local))
  }

  pub async fn get_chapters(&self, id: &MangaId) -> RepositoryResult<Vec<Chapter>> {
    if !self.connectivity.is_available().await {
      return Err(RepositoryError::NoConnectivityNoCache);
    }
    self
      .remote
      .fetch_chapters(id)
      .await
      .map_err(|error| remote_error(id, error))
  }

  pub async fn get_chapter_images(&self, id: &MangaId, chapter: &str) -> RepositoryResult<Vec<String>> {
    if !self.connectivity.is_available().await {
      return Err(RepositoryError::NoConnectivityNoCache);
    }
    self
      .remote
      .fetch_chapter_images(id, chapter)
      .await
      .map_err(|error| remote_error(id, error))
  }

  /// Everything the cache holds.
  pub fn local_items(&self) -> Result<Vec<Manga>> {
    self.store.get_all()
  }

  pub fn inspect(&self) -> Result<StoreSummary> {
    let pages = self.store.summaries()?;
    Ok(StoreSummary {
      total_items: self.store.get_all()?.len(),
      max_page: self.store.max_page()?,
      pages,
    })
  }

  // ==========================================================================
  // Refresh
  // ==========================================================================

  /// Re-fetch every cached numbered page and the latest list.
  ///
  /// Each page is requested with the page size it was cached with, so its
  /// contents keep the same id range. Returns false without touching the network when offline. Individual
  /// page failures are logged and skipped.
  pub async fn refresh_all(&self) -> bool {
    if !self.connectivity.is_available().await {
      info!("offline, skipping refresh");
      return false;
    }

    let sizes: BTreeMap<i64, Option<usize>> = match self.store.summaries() {
      Ok(summaries) => summaries
        .into_iter()
        .filter(|summary| summary.page >= 1)
        .map(|summary| (summary.page, summary.page_size))
        .collect(),
      Err(error) => {
        warn!(%error, "could not read cached pages, refreshing page 1 only");
        BTreeMap::new()
      }
    };
    let max_page = sizes.keys().next_back().copied().unwrap_or(1);

    let mut report = RefreshReport::default();
    for page in 1..=max_page {
      let page_size = sizes.get(&page).copied().flatten().unwrap_or(self.page_size);
      let fetched = self.remote.fetch_page(page, page_size).await;
      report.record(page, self.replace_fetched(page, Some(page_size), fetched));
    }
    let fetched = self.remote.fetch_latest().await;
    report.record(LATEST_PAGE, self.replace_fetched(LATEST_PAGE, None, fetched));

    info!(
      attempted = report.attempted,
      updated = report.updated,
      unchanged = report.unchanged,
      failed = report.failed,
      "refresh finished"
    );
    true
  }

  /// Ok(None) for an empty response, otherwise whether the page changed.
  /// Without a page size the page is sized by what came back.
  fn replace_fetched(
    &self,
    page: i64,
    page_size: Option<usize>,
    fetched: std::result::Result<Vec<Manga>, FetchError>,
  ) -> std::result::Result<Option<bool>, String> {
    let items = fetched.map_err(|e| e.to_string())?;
    if items.is_empty() {
      return Ok(None);
    }
    self
      .store
      .replace_page(page, page_size.unwrap_or(items.len()), &items)
      .map(|write| Some(write.changed))
      .map_err(|e| e.to_string())
  }

  // ==========================================================================
  // Cache helpers
  // ==========================================================================

  fn cached_page(&self, page: i64) -> Vec<Manga> {
    self.store.get_page(page).unwrap_or_else(|error| {
      warn!(page, %error, "cache read failed");
      Vec::new()
    })
  }

  fn cached_at(&self, page: i64) -> Option<chrono::DateTime<chrono::Utc>> {
    self
      .store
      .page_summary(page)
      .ok()
      .flatten()
      .and_then(|summary| summary.cached_at)
  }

  /// The cached page, else every cached item.
  fn cache_fallback(&self, page: i64) -> RepositoryResult<CacheResult<Vec<Manga>>> {
    let cached = self.cached_page(page);
    if !cached.is_empty() {
      return Ok(CacheResult::from_cache(cached, self.cached_at(page)));
    }

    let all = self.store.get_all().unwrap_or_else(|error| {
      warn!(%error, "cache read failed");
      Vec::new()
    });
    if all.is_empty() {
      return Err(RepositoryError::NoConnectivityNoCache);
    }
    debug!(page, items = all.len(), "serving all cached items");
    Ok(CacheResult::fallback(all))
  }

  fn on_empty_page(&self, page: i64, page_size: usize) -> CacheResult<Vec<Manga>> {
    match (self.empty_policy, synthetic::page(page, page_size)) {
      (EmptyPagePolicy::Synthesize, Some(items)) => {
        self.persist_page(page, page_size, &items);
        CacheResult::synthetic(items)
      }
      _ => CacheResult::empty(),
    }
  }

  fn persist_page(&self, page: i64, page_size: usize, items: &[Manga]) {
    if let Err(error) = self.store.replace_page(page, page_size, items) {
      warn!(page, %error, "failed to cache page");
    }
  }
}

fn remote_error(id: &MangaId, error: FetchError) -> RepositoryError {
  match error {
    FetchError::NotFound => RepositoryError::NotFound { id: id.clone() },
    error if error.is_network() => RepositoryError::NoConnectivityNoCache,
    error => RepositoryError::Remote(error),
  }
}
