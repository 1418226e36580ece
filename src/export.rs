// 📥 Export - downloadable snapshot of the budget
//
// Write-only artifact: nothing in this crate reads it back.

use crate::material::Material;
use crate::storage::format_timestamp;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSnapshot {
    pub materials: Vec<Material>,
    #[serde(serialize_with = "serialize_export_date")]
    pub export_date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    pub total_budget: Decimal,
    pub selected_materials: usize,
}

fn serialize_export_date<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*at))
}

impl ExportSnapshot {
    /// `presupuesto_<YYYY-MM-DD>.json`, dated by the export date
    pub fn file_name(&self) -> String {
        format!("presupuesto_{}.json", self.export_date.format("%Y-%m-%d"))
    }

    /// Pretty-printed JSON, two-space indentation
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize export")
    }

    /// Write the snapshot into `dir` and return the full path of the file
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json()?)
            .with_context(|| format!("Failed to write export file {}", path.display()))?;

        tracing::info!(path = %path.display(), "budget exported");
        Ok(path)
    }
}
