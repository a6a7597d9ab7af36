//! Discovery of report files and index snapshots in a source directory.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::SourceConfig;

/// Files found in a source directory.
#[derive(Debug, Clone, Default)]
pub struct SourceFiles {
    /// Report files, sorted by path.
    pub reports: Vec<PathBuf>,
    /// First snapshot file in path order, if any.
    pub snapshot: Option<PathBuf>,
}

/// Scan `dir` (not recursively) for reports and a snapshot.
pub fn discover(dir: &Path, config: &SourceConfig) -> Result<SourceFiles> {
    if !dir.is_dir() {
        bail!("Source directory does not exist: {}", dir.display());
    }

    let include_set = build_globset(&config.include_globs)?;
    let exclude_set = build_globset(&config.exclude_globs)?;
    let snapshot_set = build_globset(std::slice::from_ref(&config.snapshot_glob))?;

    let mut reports = Vec::new();
    let mut snapshots = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if exclude_set.is_match(&name) {
            continue;
        }
        if snapshot_set.is_match(&name) {
            snapshots.push(entry.path().to_path_buf());
        } else if include_set.is_match(&name) {
            reports.push(entry.path().to_path_buf());
        }
    }

    // Sort for deterministic ordering
    reports.sort();
    snapshots.sort();

    Ok(SourceFiles {
        reports,
        snapshot: snapshots.into_iter().next(),
    })
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
