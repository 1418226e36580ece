// Materials Budget - Core Library
// Budget store, persistence and export, shared by the TUI and the CLI commands

pub mod cli;
pub mod config;
pub mod display;
pub mod export;
pub mod logging;
pub mod material;
pub mod storage;
pub mod store;

// Re-export commonly used types
pub use config::{Config, StorageConfig};
pub use display::{format_last_saved, format_price};
pub use export::ExportSnapshot;
pub use material::{Material, MaterialId};
pub use storage::{
    KeyValueStore, MemoryStore, Persistence, SqliteStore,
    LAST_SAVED_KEY, MATERIALS_KEY,
};
pub use store::{BudgetStore, BudgetView, Confirmation};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
