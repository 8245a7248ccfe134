use clap::Subcommand;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::cache::{CacheResult, PageStore, SqliteStorage};
use crate::config::Config;
use crate::connectivity::{Connectivity, StaticConnectivity, TcpProbe};
use crate::event::{Event, EventHandler};
use crate::manga::client::MangaClient;
use crate::manga::remote::RemoteSource;
use crate::manga::repository::MangaRepository;
use crate::manga::types::{Manga, MangaId};
use crate::query::{Query, QueryState};

/// How often the watch loop polls for a finished refresh
const TICK_RATE: Duration = Duration::from_millis(250);

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Show a page of the catalogue
  Page {
    /// Page number, starting at 1
    #[arg(default_value_t = 1, value_parser = clap::value_parser!(i64).range(1..))]
    page: i64,
    /// Items per page (default: cache.page_size)
    #[arg(short, long)]
    size: Option<usize>,
  },
  /// Show the latest releases
  Latest,
  /// Show a single manga
  Show { id: String },
  /// Search by title, author or genre
  Search { query: String },
  /// List the chapters of a manga
  Chapters { id: String },
  /// List the page images of a chapter
  Images { id: String, chapter: String },
  /// Re-fetch every cached page
  Refresh,
  /// List everything in the local cache
  Local,
  /// Summarize the local cache
  Inspect,
  /// Refresh the cache whenever connectivity comes back
  Watch,
}

/// Remembers the last probe result to spot offline to online transitions.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
  available: bool,
}

impl ConnectivityTracker {
  /// Record a probe result. Returns true when connectivity was just restored.
  ///
  /// The tracker starts offline, so an initial online probe counts.
  pub fn observe(&mut self, available: bool) -> bool {
    if available != self.available {
      info!(available, "connectivity changed");
    }
    let restored = available && !self.available;
    self.available = available;
    restored
  }
}

/// Watch loop state: refreshes on restored connectivity, one run at a time.
pub struct Watcher {
  tracker: ConnectivityTracker,
  refresh: Query<bool>,
}

impl Watcher {
  pub fn new<S, R>(repository: MangaRepository<S, R>) -> Self
  where
    S: PageStore + 'static,
    R: RemoteSource + 'static,
  {
    let refresh = Query::new(move || {
      let repository = repository.clone();
      async move { Ok(repository.refresh_all().await) }
    });
    Self {
      tracker: ConnectivityTracker::default(),
      refresh,
    }
  }

  pub fn handle(&mut self, event: Event) {
    match event {
      Event::Connectivity(available) => {
        if !self.tracker.observe(available) {
          return;
        }
        if self.refresh.fetch() {
          info!(run = self.refresh.started(), "connectivity restored, refreshing cache");
        } else {
          debug!("refresh already in flight");
        }
      }
      Event::Tick => {
        if !self.refresh.poll() {
          return;
        }
        match self.refresh.state() {
          QueryState::Success(true) => info!("background refresh complete"),
          QueryState::Success(false) => info!("went offline before refresh started"),
          QueryState::Error(error) => warn!(%error, "background refresh failed"),
          _ => {}
        }
      }
    }
  }
}

/// Command-line front end over the repository.
pub struct App {
  repository: MangaRepository<SqliteStorage, MangaClient>,
  connectivity: Arc<dyn Connectivity>,
  poll_interval: Duration,
  json: bool,
}

impl App {
  pub fn new(config: &Config, offline: bool, json: bool) -> Result<Self> {
    let store = SqliteStorage::open(config.cache.path.as_deref())?;
    let client = MangaClient::new(&config.api)?;

    let connectivity: Arc<dyn Connectivity> = if offline {
      Arc::new(StaticConnectivity::new(false))
    } else {
      let (host, port) = client
        .endpoint()
        .ok_or_else(|| eyre!("API base URL has no host: {}", config.api.base_url))?;
      Arc::new(TcpProbe::new(host, port, config.connectivity.probe_timeout()))
    };

    let repository = MangaRepository::new(store, client, Arc::clone(&connectivity))
      .with_page_size(config.cache.page_size)
      .with_empty_policy(config.cache.empty_page_policy);

    Ok(Self {
      repository,
      connectivity,
      poll_interval: config.connectivity.poll_interval(),
      json,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Page { page, size } => {
        let size = size.unwrap_or_else(|| self.repository.page_size());
        let result = self.repository.get_page(page, size).await?;
        self.print_items(&result)
      }
      Command::Latest => {
        let result = self.repository.get_latest().await?;
        self.print_items(&result)
      }
      Command::Show { id } => {
        let result = self.repository.get_item_by_id(&MangaId::new(id)).await?;
        if self.json {
          return print_json(&result);
        }
        print_detail(&result.data);
        Ok(())
      }
      Command::Search { query } => {
        let result = self.repository.search(&query).await?;
        self.print_items(&result)
      }
      Command::Chapters { id } => {
        let chapters = self.repository.get_chapters(&MangaId::new(id)).await?;
        if self.json {
          return print_json(&chapters);
        }
        for chapter in &chapters {
          let released = chapter.released.as_deref().unwrap_or("-");
          println!("{:>8}  {:<40}  {}  ({})", chapter.number, chapter.title, released, chapter.id);
        }
        Ok(())
      }
      Command::Images { id, chapter } => {
        let images = self
          .repository
          .get_chapter_images(&MangaId::new(id), &chapter)
          .await?;
        if self.json {
          return print_json(&images);
        }
        for image in &images {
          println!("{}", image);
        }
        Ok(())
      }
      Command::Refresh => {
        let ran = self.repository.refresh_all().await;
        if self.json {
          return print_json(&ran);
        }
        if ran {
          println!("Refresh finished");
        } else {
          println!("Offline, refresh skipped");
        }
        Ok(())
      }
      Command::Local => {
        let items = self.repository.local_items()?;
        if self.json {
          return print_json(&items);
        }
        for item in &items {
          println!("{}", summary_line(item));
        }
        Ok(())
      }
      Command::Inspect => {
        let summary = self.repository.inspect()?;
        if self.json {
          return print_json(&summary);
        }
        println!("{} items, highest page {:?}", summary.total_items, summary.max_page);
        for page in &summary.pages {
          let cached_at = page
            .cached_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
          println!(
            "page {:>4}  {:>4} items  {}  {}",
            page.page,
            page.item_count,
            cached_at,
            page.first_title.as_deref().unwrap_or("")
          );
        }
        Ok(())
      }
      Command::Watch => self.watch().await,
    }
  }

  async fn watch(&self) -> Result<()> {
    let mut events = EventHandler::new(Arc::clone(&self.connectivity), self.poll_interval, TICK_RATE);
    let mut watcher = Watcher::new(self.repository.clone());

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(interval = ?self.poll_interval, "watching connectivity");
    loop {
      tokio::select! {
        result = &mut shutdown => {
          result.map_err(|e| eyre!("Failed to listen for ctrl-c: {}", e))?;
          info!("stopping watch");
          break;
        }
        event = events.next() => match event {
          Some(event) => watcher.handle(event),
          None => break,
        },
      }
    }
    Ok(())
  }

  fn print_items(&self, result: &CacheResult<Vec<Manga>>) -> Result<()> {
    if self.json {
      return print_json(result);
    }
    match result.cached_at {
      Some(at) => eprintln!("source: {:?} (cached {})", result.source, at.to_rfc3339()),
      None => eprintln!("source: {:?}", result.source),
    }
    if !result.is_authoritative() {
      eprintln!("note: the catalogue could not be reached, results may be incomplete");
    }
    for item in &result.data {
      println!("{}", summary_line(item));
    }
    Ok(())
  }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
  let json =
    serde_json::to_string_pretty(value).map_err(|e| eyre!("Failed to serialize output: {}", e))?;
  println!("{}", json);
  Ok(())
}

fn summary_line(manga: &Manga) -> String {
  format!(
    "{:>8}  {:<40}  {:>4} ch  {}",
    manga.id, manga.title, manga.chapter_count, manga.status
  )
}

fn print_detail(manga: &Manga) {
  println!("{} ({})", manga.title, manga.id);
  if !manga.authors.is_empty() {
    println!("by {}", manga.authors.join(", "));
  }
  println!("{} | {} chapters", manga.status, manga.chapter_count);
  if let Some(rating) = manga.rating {
    println!("rating {:.1}", rating);
  }
  if !manga.genres.is_empty() {
    println!("{}", manga.genres.join(", "));
  }
  if !manga.description.is_empty() {
    println!();
    println!("{}", manga.description);
  }
}
