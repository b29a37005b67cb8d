// Bulk export — writes the full store dump to a JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;

/// Default export file name for a given day: `followtrail-export-YYYY-MM-DD.json`.
pub fn default_export_name(day: NaiveDate) -> String {
    format!("followtrail-export-{}.json", day.format("%Y-%m-%d"))
}

/// Write already-serialized export JSON to `path`, creating parent directories.
pub fn write_export(json: &str, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write export to {}", path.display()))?;
    Ok(path.to_path_buf())
}
