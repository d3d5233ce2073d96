//! Shared logging utilities for Ecliptic binaries.
//!
//! Output goes to stderr and a per-binary log file. Stdout is never written:
//! the MCP transport owns it.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "ecliptic=info,ecliptic_catalog=info,ecliptic_datastore=info,\
                                  ecliptic_guard=info,ecliptic_service=info,ecliptic_mcp=info";

/// Logging configuration shared by Ecliptic binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    pub verbose: bool,
}

/// Initialize tracing with a file writer and stderr output.
pub fn init_logging(config: LogConfig<'_>) -> Result<()> {
    let logs = ensure_logs_dir().context("failed to ensure log directory")?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs.join(format!("{}.log", config.app_name)))
        .context("failed to open log file")?;

    let file_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .init();

    Ok(())
}

/// Data directory: `ECLIPTIC_HOME` when set, else the working directory.
pub fn ecliptic_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("ECLIPTIC_HOME") {
        return PathBuf::from(override_path);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Log directory: `<home>/logs`.
pub fn logs_dir() -> PathBuf {
    ecliptic_home().join("logs")
}

/// Ensure the log directory exists.
pub fn ensure_logs_dir() -> Result<PathBuf> {
    let logs = logs_dir();
    std::fs::create_dir_all(&logs)
        .with_context(|| format!("failed to create log directory: {}", logs.display()))?;
    Ok(logs)
}
