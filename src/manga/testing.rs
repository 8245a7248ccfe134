//! Scripted remote source for tests.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::remote::{FetchError, FetchResult, RemoteSource};
use super::types::{Chapter, Manga, MangaId};

/// Remote source answering from scripted responses and recording calls.
///
/// Anything not scripted fails with a network error.
#[derive(Default)]
pub struct FakeRemote {
  pages: Mutex<HashMap<i64, FetchResult<Vec<Manga>>>>,
  latest: Mutex<Option<FetchResult<Vec<Manga>>>>,
  search: Mutex<Option<FetchResult<Vec<Manga>>>>,
  manga: Mutex<HashMap<MangaId, FetchResult<Manga>>>,
  chapters: Mutex<Option<FetchResult<Vec<Chapter>>>>,
  delay: Option<Duration>,
  page_requests: Mutex<Vec<(i64, usize)>>,
  latest_calls: AtomicUsize,
  search_calls: AtomicUsize,
  manga_calls: AtomicUsize,
}

fn unscripted<T>() -> FetchResult<T> {
  Err(FetchError::Network("unscripted call".to_string()))
}

impl FakeRemote {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_page(self, page: i64, result: FetchResult<Vec<Manga>>) -> Self {
    self.pages.lock().unwrap().insert(page, result);
    self
  }

  pub fn with_latest(self, result: FetchResult<Vec<Manga>>) -> Self {
    *self.latest.lock().unwrap() = Some(result);
    self
  }

  pub fn with_search(self, result: FetchResult<Vec<Manga>>) -> Self {
    *self.search.lock().unwrap() = Some(result);
    self
  }

  pub fn with_manga(self, id: &str, result: FetchResult<Manga>) -> Self {
    self.manga.lock().unwrap().insert(MangaId::new(id), result);
    self
  }

  pub fn with_chapters(self, result: FetchResult<Vec<Chapter>>) -> Self {
    *self.chapters.lock().unwrap() = Some(result);
    self
  }

  /// Every call sleeps this long before answering.
  pub fn with_delay(mut self, delay: Duration) -> Self {
    self.delay = Some(delay);
    self
  }

  pub fn page_calls(&self) -> Vec<i64> {
    self.page_requests().into_iter().map(|(page, _)| page).collect()
  }

  /// Requested (page, page size) pairs, in call order.
  pub fn page_requests(&self) -> Vec<(i64, usize)> {
    self.page_requests.lock().unwrap().clone()
  }

  pub fn latest_calls(&self) -> usize {
    self.latest_calls.load(Ordering::SeqCst)
  }

  pub fn search_calls(&self) -> usize {
    self.search_calls.load(Ordering::SeqCst)
  }

  pub fn manga_calls(&self) -> usize {
    self.manga_calls.load(Ordering::SeqCst)
  }

  pub fn total_calls(&self) -> usize {
    self.page_calls().len() + self.latest_calls() + self.search_calls() + self.manga_calls()
  }

  async fn pause(&self) {
    if let Some(delay) = self.delay {
      tokio::time::sleep(delay).await;
    }
  }
}

impl RemoteSource for FakeRemote {
  fn fetch_page(&self, page: i64, page_size: usize) -> BoxFuture<'_, FetchResult<Vec<Manga>>> {
    async move {
      self.page_requests.lock().unwrap().push((page, page_size));
      self.pause().await;
      let pages = self.pages.lock().unwrap();
      pages.get(&page).cloned().unwrap_or_else(unscripted)
    }
    .boxed()
  }

  fn fetch_latest(&self) -> BoxFuture<'_, FetchResult<Vec<Manga>>> {
    async move {
      self.latest_calls.fetch_add(1, Ordering::SeqCst);
      self.pause().await;
      let latest = self.latest.lock().unwrap();
      latest.clone().unwrap_or_else(unscripted)
    }
    .boxed()
  }

  fn search<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, FetchResult<Vec<Manga>>> {
    async move {
      self.search_calls.fetch_add(1, Ordering::SeqCst);
      self.pause().await;
      let search = self.search.lock().unwrap();
      search.clone().unwrap_or_else(unscripted)
    }
    .boxed()
  }

  fn fetch_manga<'a>(&'a self, id: &'a MangaId) -> BoxFuture<'a, FetchResult<Manga>> {
    async move {
      self.manga_calls.fetch_add(1, Ordering::SeqCst);
      self.pause().await;
      let manga = self.manga.lock().unwrap();
      manga.get(id).cloned().unwrap_or_else(unscripted)
    }
    .boxed()
  }

  fn fetch_chapters<'a>(&'a self, _id: &'a MangaId) -> BoxFuture<'a, FetchResult<Vec<Chapter>>> {
    async move {
      self.pause().await;
      let chapters = self.chapters.lock().unwrap();
      chapters.clone().unwrap_or_else(unscripted)
    }
    .boxed()
  }

  fn fetch_chapter_images<'a>(
    &'a self,
    _id: &'a MangaId,
    _chapter: &'a str,
  ) -> BoxFuture<'a, FetchResult<Vec<String>>> {
    async move {
      self.pause().await;
      unscripted()
    }
    .boxed()
  }
}
