use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the configured filter. Logs go to stderr unless a
/// file is configured; keep the returned guard alive until exit so buffered
/// file output is flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
  let filter = filter(config)?;

  match &config.file {
    Some(path) => {
      let directory = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| std::path::Path::new("."));
      let file_name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      std::fs::create_dir_all(directory)
        .map_err(|e| eyre!("Failed to create log directory {}: {}", directory.display(), e))?;

      let appender = tracing_appender::rolling::never(directory, file_name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;
      Ok(None)
    }
  }
}

fn filter(config: &LoggingConfig) -> Result<EnvFilter> {
  let directives = std::env::var("RUST_LOG").unwrap_or_else(|_| config.filter.clone());
  EnvFilter::try_new(&directives)
    .map_err(|e| eyre!("Invalid log filter '{}': {}", directives, e))
}
