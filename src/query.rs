//! Single-flight background task with pollable state.
//!
//! A `Query<T>` owns a fetcher closure. `fetch()` spawns it on the runtime
//! unless a previous run is still in flight, and `poll()` collects the
//! outcome without blocking, so an event loop can drive it from its tick.
//!
//! # Example
//!
//! ```ignore
//! let repo = repository.clone();
//! let mut refresh = Query::new(move || {
//!     let repo = repo.clone();
//!     async move { Ok(repo.refresh_all().await) }
//! });
//!
//! // On a connectivity transition
//! refresh.fetch();
//!
//! // In event loop tick
//! if refresh.poll() {
//!     // Refresh finished
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently running
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for each run
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async task with at most one run in flight.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  /// Number of runs actually spawned
  started: usize,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` starts a run.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      started: 0,
    }
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// How many runs have been spawned so far.
  pub fn started(&self) -> usize {
    self.started
  }

  /// Start a run if not already loading.
  ///
  /// Returns false (and does nothing) while a run is in flight.
  pub fn fetch(&mut self) -> bool {
    if self.state.is_loading() {
      return false;
    }
    self.start_fetch();
    true
  }

  /// Poll for results from a pending run.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending, e.g. the task panicked
        self.state = QueryState::Error("Query was cancelled".to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;
    self.started += 1;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("started", &self.started)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    assert!(query.fetch());
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.state().data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.state().error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let runs = Arc::new(AtomicU32::new(0));
    let counter = runs.clone();
    let mut query = Query::new(move || {
      let counter = counter.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<_, String>(42)
      }
    });

    assert!(query.fetch());
    assert!(!query.fetch());
    assert!(!query.fetch());
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(query.poll());
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(query.started(), 1);

    // Finished runs can be started again
    assert!(query.fetch());
    assert_eq!(query.started(), 2);
  }
}
