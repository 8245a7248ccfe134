//! Network availability checks.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Answers "can we reach the remote right now?"
pub trait Connectivity: Send + Sync {
  fn is_available(&self) -> BoxFuture<'_, bool>;
}

/// Probes connectivity by opening a TCP connection to the API host.
pub struct TcpProbe {
  host: String,
  port: u16,
  timeout: Duration,
}

impl TcpProbe {
  pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
    Self {
      host: host.into(),
      port,
      timeout,
    }
  }
}

impl Connectivity for TcpProbe {
  fn is_available(&self) -> BoxFuture<'_, bool> {
    async move {
      let connect = TcpStream::connect((self.host.as_str(), self.port));
      let available = matches!(tokio::time::timeout(self.timeout, connect).await, Ok(Ok(_)));
      debug!(host = %self.host, port = self.port, available, "connectivity probe");
      available
    }
    .boxed()
  }
}

/// Fixed answer, switchable at runtime. Backs `--offline`.
#[derive(Debug, Default)]
pub struct StaticConnectivity {
  available: AtomicBool,
}

impl StaticConnectivity {
  pub fn new(available: bool) -> Self {
    Self {
      available: AtomicBool::new(available),
    }
  }

  pub fn set(&self, available: bool) {
    self.available.store(available, Ordering::SeqCst);
  }
}

impl Connectivity for StaticConnectivity {
  fn is_available(&self) -> BoxFuture<'_, bool> {
    futures::future::ready(self.available.load(Ordering::SeqCst)).boxed()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tokio::net::TcpListener;

  #[tokio::test]
  async fn test_static_connectivity_switches() {
    let connectivity = StaticConnectivity::new(false);
    assert!(!connectivity.is_available().await);
    connectivity.set(true);
    assert!(connectivity.is_available().await);
  }

  #[tokio::test]
  async fn test_probe_reaches_listener() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(1));
    assert!(probe.is_available().await);
  }

  #[tokio::test]
  async fn test_probe_fails_on_closed_port() {
    // Bind then drop to get a port nothing listens on
    let port = {
      let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
      listener.local_addr().unwrap().port()
    };

    let probe = TcpProbe::new("127.0.0.1", port, Duration::from_millis(500));
    assert!(!probe.is_available().await);
  }
}
