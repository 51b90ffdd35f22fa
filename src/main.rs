mod commands;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use vlr_sync::config::Config;
use vlr_sync::logging;
use vlr_sync::store::{EntityStore, SqliteStorage};
use vlr_sync::sync::SyncCoordinator;
use vlr_sync::topics::{HttpBridge, NoopBridge, NotificationBridge, TopicTracker};
use vlr_sync::vlr::VlrClient;

#[derive(Parser, Debug)]
#[command(name = "vlr-sync")]
#[command(about = "Esports matches, events and news, cached locally")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/vlr-sync/config.yaml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Show cached data only, without refreshing
  #[arg(long, global = true)]
  offline: bool,

  /// Log at debug level
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: commands::Command,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init(&logging::default_log_dir()?, args.verbose)?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let storage = match &config.storage.path {
    Some(path) => SqliteStorage::open_at(path)?,
    None => SqliteStorage::open()?,
  };
  let store = EntityStore::new(storage);

  let bridge: Arc<dyn NotificationBridge> = match &config.notifications.url {
    Some(url) => Arc::new(HttpBridge::new(url, config.api.timeout())?),
    None => Arc::new(NoopBridge),
  };

  let client = VlrClient::new(&config)?;
  info!(api = %config.api.url, offline = args.offline, "starting");

  let runner = commands::Runner {
    coordinator: SyncCoordinator::new(Arc::new(client), store.clone()),
    tracker: TopicTracker::new(bridge, store),
    offline: args.offline,
  };
  runner.run(args.command).await
}
