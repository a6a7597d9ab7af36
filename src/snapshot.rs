//! Index snapshots on disk.
//!
//! A snapshot is the JSON form of an [`IndexSnapshot`], tagged with the
//! backend that produced it. Loading one restores a sealed index without
//! re-reading any report.

use anyhow::{Context, Result};
use std::path::Path;

use termrank_core::store::{IndexSnapshot, TermIndex};

pub fn write_snapshot(index: &dyn TermIndex, path: &Path) -> Result<()> {
    let json = serde_json::to_string(&index.snapshot())?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(())
}

pub fn read_snapshot(path: &Path) -> Result<IndexSnapshot> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse snapshot {}", path.display()))
}
