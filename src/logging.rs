use crate::config;
use anyhow::{Context, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const LOG_FILE: &str = "vectr.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the console + JSON file subscriber, writing under `log_dir`.
///
/// File output goes through a background writer; keep the guard alive until
/// exit or buffered lines are lost.
pub fn init_logging_in(log_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console = fmt::layer().with_target(false).compact();
    let file = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_line_number(true)
        .json();

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(file)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

/// `init_logging_in` with the directory from `VECTR_LOG_DIR`
pub fn init_logging() -> Result<WorkerGuard> {
    init_logging_in(&config::get_log_dir())
}
