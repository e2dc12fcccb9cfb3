//! Structured logging setup.
//!
//! Logs go to a daily rolling file under the platform data dir. stdout carries
//! rendered documents, so console output (with `--verbose`) goes to stderr.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::project_dirs;

pub fn log_dir() -> PathBuf {
  match project_dirs() {
    Some(proj_dirs) => proj_dirs.data_dir().join("logs"),
    None => std::env::temp_dir().join("screensavers-logs"),
  }
}

/// Install the global subscriber. Keep the returned guard alive until exit or
/// buffered lines are lost.
pub fn init_logging(verbose: bool) -> Result<WorkerGuard> {
  let dir = log_dir();
  std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create log dir {}", dir.display()))?;

  let file_appender = RollingFileAppender::new(Rotation::DAILY, &dir, "screensavers.log");
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  let stderr_layer = verbose.then(|| fmt::layer().with_writer(std::io::stderr));

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt::layer().with_ansi(false).with_writer(non_blocking))
    .with(stderr_layer)
    .try_init()
    .context("Failed to install tracing subscriber")?;

  tracing::info!(dir = %dir.display(), "logging initialized");
  Ok(guard)
}
