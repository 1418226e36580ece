// Logging setup
//
// The TUI owns the terminal, so in UI mode everything goes to a log file.
// One-shot commands log to stderr.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

pub fn init_logging(target: &LogTarget) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    match target {
        LogTarget::Stderr => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .context("Failed to initialize logging")?,
        LogTarget::File(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
            let log_file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;

            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(Arc::new(log_file))
                        .with_ansi(false),
                )
                .try_init()
                .context("Failed to initialize logging")?;
        }
    }

    Ok(())
}
