// 💾 Storage - durable key-value records for the budget
//
// Two records live under fixed keys:
//   budgetMaterials -> JSON array of materials
//   budgetLastSaved -> ISO-8601 timestamp
//
// Errors never leave the Persistence adapter: loads degrade to "no data",
// saves are dropped. Both are logged.

use crate::material::{check_invariants, Material};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;

pub const MATERIALS_KEY: &str = "budgetMaterials";
pub const LAST_SAVED_KEY: &str = "budgetLastSaved";

// ============================================================================
// KEY-VALUE BACKENDS
// ============================================================================

/// A durable string-to-string store
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}

/// In-process store, gone when the process exits
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store: one `kv_store` table, upsert on write
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create database directory {}", parent.display())
                })?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::from_connection(conn)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn)?;
        Ok(Self { conn })
    }

    /// Number of records currently stored
    #[cfg(test)]
    pub(crate) fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM kv_store", [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases report "memory" instead
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    tracing::debug!(journal_mode = %mode, "database opened");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create kv_store table")?;

    Ok(())
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key {}", key))?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO kv_store (key, value, updated_at)
                 VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key {}", key))?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .with_context(|| format!("Failed to delete key {}", key))?;
        Ok(())
    }
}

// ============================================================================
// PERSISTENCE ADAPTER
// ============================================================================

/// Reads and writes the two budget records on top of any [`KeyValueStore`]
pub struct Persistence<S> {
    store: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Write the full ordered list. Empty lists are never written here,
    /// use [`Persistence::remove_materials`] instead.
    pub fn save_materials(&mut self, materials: &[Material]) -> bool {
        if materials.is_empty() {
            tracing::debug!("skipping save of empty material list");
            return false;
        }

        match self.try_save_materials(materials) {
            Ok(()) => {
                tracing::debug!(count = materials.len(), "materials saved");
                true
            }
            Err(err) => {
                tracing::error!(error = ?err, "Error saving materials");
                false
            }
        }
    }

    /// Stored list, or an empty one when the record is missing or unreadable
    pub fn load_materials(&self) -> Vec<Material> {
        match self.try_load_materials() {
            Ok(Some(materials)) => materials,
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(error = ?err, "Error loading materials, starting empty");
                Vec::new()
            }
        }
    }

    pub fn save_timestamp(&mut self, at: DateTime<Utc>) -> bool {
        let value = format_timestamp(at);
        match self.store.set(LAST_SAVED_KEY, &value) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = ?err, "Error saving last-saved timestamp");
                false
            }
        }
    }

    pub fn load_timestamp(&self) -> Option<DateTime<Utc>> {
        match self.try_load_timestamp() {
            Ok(at) => at,
            Err(err) => {
                tracing::warn!(error = ?err, "Error loading last-saved timestamp");
                None
            }
        }
    }

    /// Erase only the material list record
    pub fn remove_materials(&mut self) -> bool {
        self.remove_key(MATERIALS_KEY)
    }

    /// Erase both records
    pub fn clear(&mut self) -> bool {
        let materials = self.remove_key(MATERIALS_KEY);
        let timestamp = self.remove_key(LAST_SAVED_KEY);
        materials && timestamp
    }

    fn remove_key(&mut self, key: &str) -> bool {
        match self.store.remove(key) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(error = ?err, key, "Error erasing record");
                false
            }
        }
    }

    fn try_save_materials(&mut self, materials: &[Material]) -> Result<()> {
        let json = serde_json::to_string(materials).context("Failed to serialize materials")?;
        self.store.set(MATERIALS_KEY, &json)
    }

    fn try_load_materials(&self) -> Result<Option<Vec<Material>>> {
        let Some(json) = self.store.get(MATERIALS_KEY)? else {
            return Ok(None);
        };

        let materials: Vec<Material> =
            serde_json::from_str(&json).context("Failed to deserialize materials")?;
        check_invariants(&materials).map_err(anyhow::Error::msg)?;

        Ok(Some(materials))
    }

    fn try_load_timestamp(&self) -> Result<Option<DateTime<Utc>>> {
        let Some(value) = self.store.get(LAST_SAVED_KEY)? else {
            return Ok(None);
        };

        let at = DateTime::parse_from_rfc3339(&value)
            .with_context(|| format!("Invalid timestamp {:?}", value))?;
        Ok(Some(at.with_timezone(&Utc)))
    }
}

/// ISO-8601 in UTC with milliseconds, e.g. `2024-05-01T10:20:30.123Z`
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
