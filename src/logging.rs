use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "vlr_sync=info";
const VERBOSE_FILTER: &str = "vlr_sync=debug";

/// Directory the daily log files go to ($XDG_DATA_HOME/vlr-sync/logs).
pub fn default_log_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir().ok_or_else(|| eyre!("Could not determine data directory"))?;
  Ok(data_dir.join("vlr-sync").join("logs"))
}

/// Route `tracing` output to a daily rolling file so stdout stays free for
/// command output.
///
/// `RUST_LOG` wins over `verbose`. Keep the returned guard alive for the
/// lifetime of the process or buffered lines are lost on exit.
pub fn init(dir: &Path, verbose: bool) -> Result<WorkerGuard> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, "vlr-sync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(filter(std::env::var("RUST_LOG").ok().as_deref(), verbose))
    .with_ansi(false)
    .with_writer(writer)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}

fn filter(env: Option<&str>, verbose: bool) -> EnvFilter {
  if let Some(directives) = env.filter(|d| !d.trim().is_empty()) {
    if let Ok(filter) = EnvFilter::try_new(directives) {
      return filter;
    }
  }

  EnvFilter::new(if verbose { VERBOSE_FILTER } else { DEFAULT_FILTER })
}
