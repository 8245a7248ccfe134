use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub connectivity: ConnectivityConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
  pub base_url: String,
  /// Value sent in the X-RapidAPI-Host header
  pub host: String,
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: "https://mangaverse-api.p.rapidapi.com/".to_string(),
      host: "mangaverse-api.p.rapidapi.com".to_string(),
      timeout_secs: 30,
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// What to do when the remote answers a page request successfully but
/// with no items.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmptyPagePolicy {
  /// Persist and return deterministic placeholder items
  #[default]
  Synthesize,
  /// Return an empty result and leave the cache untouched
  Propagate,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Database location (default: $XDG_DATA_HOME/mangashelf/cache.db)
  pub path: Option<PathBuf>,
  pub page_size: usize,
  pub empty_page_policy: EmptyPagePolicy,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      path: None,
      page_size: 20,
      empty_page_policy: EmptyPagePolicy::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConnectivityConfig {
  pub poll_interval_secs: u64,
  pub probe_timeout_ms: u64,
}

impl Default for ConnectivityConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: 10,
      probe_timeout_ms: 3000,
    }
  }
}

impl ConnectivityConfig {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_secs(self.poll_interval_secs.max(1))
  }

  pub fn probe_timeout(&self) -> Duration {
    Duration::from_millis(self.probe_timeout_ms)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// tracing filter directive, overridden by RUST_LOG
  pub filter: String,
  /// Write logs to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      filter: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./mangashelf.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/mangashelf/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("mangashelf.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("mangashelf").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    if self.cache.page_size == 0 {
      return Err(eyre!("cache.page_size must be greater than zero"));
    }
    url::Url::parse(&self.api.base_url)
      .map_err(|e| eyre!("Invalid api.base_url '{}': {}", self.api.base_url, e))?;
    Ok(())
  }

  /// Get the API key from environment variables.
  ///
  /// Checks MANGASHELF_API_KEY first, then RAPIDAPI_KEY as fallback.
  pub fn get_api_key() -> Result<String> {
    std::env::var("MANGASHELF_API_KEY")
      .or_else(|_| std::env::var("RAPIDAPI_KEY"))
      .map_err(|_| {
        eyre!("API key not found. Set MANGASHELF_API_KEY or RAPIDAPI_KEY environment variable.")
      })
  }
}
