// ⚙️ Configuration - resolved from CLI flags, environment and defaults

use crate::cli::Args;
use crate::storage::{KeyValueStore, MemoryStore, SqliteStore};
use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;

const APP_DIR: &str = "materials-budget";
const DB_FILE: &str = "budget.db";
const LOG_FILE: &str = "budget.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Sqlite(PathBuf),
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storage: StorageConfig,
    pub log_file: PathBuf,
    pub refresh_interval: Duration,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        let storage = if args.ephemeral {
            StorageConfig::Memory
        } else {
            StorageConfig::Sqlite(args.db.clone().unwrap_or_else(|| data_dir().join(DB_FILE)))
        };

        Config {
            storage,
            log_file: args.log_file.clone().unwrap_or_else(|| data_dir().join(LOG_FILE)),
            // A zero interval would spin the UI loop
            refresh_interval: Duration::from_secs(args.refresh_secs.max(1)),
        }
    }

    pub fn open_store(&self) -> Result<Box<dyn KeyValueStore>> {
        match &self.storage {
            StorageConfig::Sqlite(path) => {
                tracing::info!(path = %path.display(), "opening budget database");
                Ok(Box::new(SqliteStore::open(path)?))
            }
            StorageConfig::Memory => Ok(Box::new(MemoryStore::new())),
        }
    }
}

/// `<platform data dir>/materials-budget`, or `./materials-budget` when the
/// platform has none
fn data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}
