use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiConfig, Config};
use crate::manga::api_types::{
  ApiChapterImagesResponse, ApiChapterListResponse, ApiMangaDetail, ApiMangaListResponse,
};
use crate::manga::remote::{FetchError, FetchResult, RemoteSource};
use crate::manga::types::{Chapter, Manga, MangaId};

/// HTTP client for the manga API
#[derive(Clone)]
pub struct MangaClient {
  http: reqwest::Client,
  base_url: Url,
}

impl MangaClient {
  /// Build a client from configuration. The API key comes from the
  /// environment, never from the config file.
  ///
  /// A missing key is not fatal: cached reads still work, remote calls will
  /// be rejected by the service.
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let key = Config::get_api_key().unwrap_or_else(|e| {
      warn!("{}", e);
      String::new()
    });
    Self::with_key(config, &key)
  }

  pub fn with_key(config: &ApiConfig, key: &str) -> Result<Self> {
    let mut base_url = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid base URL {}: {}", config.base_url, e))?;
    // Url::join drops the last segment unless the path ends with '/'
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    let mut headers = HeaderMap::new();
    let mut key_value =
      HeaderValue::from_str(key).map_err(|e| eyre!("API key is not a valid header: {}", e))?;
    key_value.set_sensitive(true);
    headers.insert("X-RapidAPI-Key", key_value);
    headers.insert(
      "X-RapidAPI-Host",
      HeaderValue::from_str(&config.host)
        .map_err(|e| eyre!("API host is not a valid header: {}", e))?,
    );

    let http = reqwest::Client::builder()
      .default_headers(headers)
      .timeout(config.timeout())
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base_url })
  }

  /// Host and port of the API, for connectivity probing.
  pub fn endpoint(&self) -> Option<(String, u16)> {
    let host = self.base_url.host_str()?.to_string();
    let port = self.base_url.port_or_known_default()?;
    Some((host, port))
  }

  fn url(&self, path: &str, query: &[(&str, &str)]) -> FetchResult<Url> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| FetchError::Network(format!("invalid endpoint {}: {}", path, e)))?;
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> FetchResult<T> {
    let url = self.url(path, query)?;
    debug!(%url, "GET");

    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;

    let status = response.status();
    debug!(%url, status = status.as_u16(), "response");
    if status == StatusCode::NOT_FOUND {
      return Err(FetchError::NotFound);
    }
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    let body = response
      .bytes()
      .await
      .map_err(|e| FetchError::Network(e.to_string()))?;

    serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))
  }

  async fn get_list(&self, path: &str, query: &[(&str, &str)]) -> FetchResult<Vec<Manga>> {
    let response: ApiMangaListResponse = self.get_json(path, query).await?;
    debug!(
      path,
      page = ?response.page,
      total_items = ?response.total_items,
      total_pages = ?response.total_pages,
      code = ?response.code,
      message = %response.message,
      "list envelope"
    );
    Ok(response.into_items())
  }
}

impl RemoteSource for MangaClient {
  fn fetch_page(&self, page: i64, page_size: usize) -> BoxFuture<'_, FetchResult<Vec<Manga>>> {
    async move {
      let page = page.to_string();
      let limit = page_size.to_string();
      self
        .get_list("fetch-manga", &[("page", page.as_str()), ("limit", limit.as_str())])
        .await
    }
    .boxed()
  }

  fn fetch_latest(&self) -> BoxFuture<'_, FetchResult<Vec<Manga>>> {
    self.get_list("fetch-latest", &[]).boxed()
  }

  fn search<'a>(&'a self, query: &'a str) -> BoxFuture<'a, FetchResult<Vec<Manga>>> {
    async move { self.get_list("search-manga", &[("query", query)]).await }.boxed()
  }

  fn fetch_manga<'a>(&'a self, id: &'a MangaId) -> BoxFuture<'a, FetchResult<Manga>> {
    async move {
      let detail: ApiMangaDetail = self.get_json("get-manga", &[("id", id.as_str())]).await?;
      Ok(detail.into_manga())
    }
    .boxed()
  }

  fn fetch_chapters<'a>(&'a self, id: &'a MangaId) -> BoxFuture<'a, FetchResult<Vec<Chapter>>> {
    async move {
      let response: ApiChapterListResponse = self
        .get_json("fetch-chapters", &[("id", id.as_str())])
        .await?;
      Ok(response.chapters.into_iter().map(Chapter::from).collect())
    }
    .boxed()
  }

  fn fetch_chapter_images<'a>(
    &'a self,
    id: &'a MangaId,
    chapter: &'a str,
  ) -> BoxFuture<'a, FetchResult<Vec<String>>> {
    async move {
      let response: ApiChapterImagesResponse = self
        .get_json("fetch-images", &[("id", id.as_str()), ("chapter", chapter)])
        .await?;
      Ok(response.images)
    }
    .boxed()
  }
}
