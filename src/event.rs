use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::connectivity::Connectivity;

/// Watch loop events
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
  /// Result of a connectivity probe
  Connectivity(bool),
  /// Periodic tick for query polling
  Tick,
}

/// Event handler that produces events from connectivity probes and a tick timer
pub struct EventHandler {
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Probe `connectivity` every `poll_interval` and tick every `tick_rate`.
  ///
  /// The first probe runs immediately.
  pub fn new(connectivity: Arc<dyn Connectivity>, poll_interval: Duration, tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    let probe_tx = tx.clone();
    tokio::spawn(async move {
      let mut interval = tokio::time::interval(poll_interval);
      interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
      loop {
        interval.tick().await;
        let available = connectivity.is_available().await;
        if probe_tx.send(Event::Connectivity(available)).is_err() {
          break;
        }
      }
    });

    tokio::spawn(async move {
      let mut interval = tokio::time::interval(tick_rate);
      loop {
        interval.tick().await;
        if tx.send(Event::Tick).is_err() {
          break;
        }
      }
    });

    Self { rx }
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
