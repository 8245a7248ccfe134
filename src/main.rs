mod app;
mod cache;
mod config;
mod connectivity;
mod db;
mod event;
mod logging;
mod manga;
mod query;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mangashelf")]
#[command(about = "An offline-first manga catalogue client")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/mangashelf/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Never touch the network, serve from the cache only
  #[arg(long, global = true)]
  offline: bool,

  /// Print results as JSON
  #[arg(long, global = true)]
  json: bool,

  #[command(subcommand)]
  command: app::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;
  let _log_guard = logging::init(&config.logging)?;

  let app = app::App::new(&config, args.offline, args.json)?;
  app.run(args.command).await?;

  Ok(())
}
