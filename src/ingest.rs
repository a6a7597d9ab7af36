//! Report file ingestion.
//!
//! A report is a CSV file whose first line is metadata carrying the
//! `Viewing=[<date>]` marker, whose second line holds the column labels, and
//! whose remaining lines are data rows. Files are read with the `csv` crate
//! in flexible mode and handed to the core [`IndexBuilder`] one report at a
//! time.

use anyhow::{bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use termrank_core::builder::IndexBuilder;
use termrank_core::models::View;
use termrank_core::store::{Backend, TermIndex};

use crate::config::SourceConfig;
use crate::snapshot;
use crate::sources::{self, SourceFiles};

/// Summary of an ingestion pass.
#[derive(Debug, Clone, Default)]
pub struct IngestStats {
    pub files: usize,
    pub rows: usize,
}

/// Ingest one report file into `builder`. Returns the number of rows read.
pub fn ingest_file(builder: &mut IndexBuilder, path: &Path) -> Result<usize> {
    let file =
        File::open(path).with_context(|| format!("Failed to open report {}", path.display()))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(file);
    let source_ref = path.display().to_string();

    let mut records = reader.records();
    let header = match records.next() {
        Some(record) => {
            record_fields(record).with_context(|| format!("{}: unreadable header", source_ref))?
        }
        None => bail!("Malformed report {}: file is empty", source_ref),
    };
    let labels = match records.next() {
        Some(record) => record_fields(record)
            .with_context(|| format!("{}: unreadable column labels", source_ref))?,
        None => bail!("Malformed report {}: missing column labels", source_ref),
    };

    let rows = records.map(record_fields);
    builder.add_report(&source_ref, &header, labels, rows)
}

fn record_fields(record: csv::Result<csv::StringRecord>) -> Result<Vec<String>> {
    let record = record?;
    Ok(record
        .iter()
        .enumerate()
        .map(|(i, field)| {
            // Exported reports often start with a byte order mark.
            if i == 0 {
                field.trim_start_matches('\u{feff}').to_string()
            } else {
                field.to_string()
            }
        })
        .collect())
}

/// Ingest every report in `paths` into `builder`, in order.
pub fn ingest_files(builder: &mut IndexBuilder, paths: &[PathBuf]) -> Result<IngestStats> {
    let mut stats = IngestStats::default();
    let total = paths.len();
    for (i, path) in paths.iter().enumerate() {
        tracing::info!(file = %path.display(), "processing {}/{}", i + 1, total);
        stats.rows += ingest_file(builder, path)?;
        stats.files += 1;
    }
    Ok(stats)
}

/// Build a fresh index from the reports found in `files`.
pub fn build_index(files: &SourceFiles, backend: Backend, view: View) -> Result<Box<dyn TermIndex>> {
    if files.reports.is_empty() {
        bail!("No report files found");
    }
    let mut builder = IndexBuilder::new(backend, view);
    let stats = ingest_files(&mut builder, &files.reports)?;
    tracing::info!(
        files = stats.files,
        rows = stats.rows,
        backend = %backend,
        view = %view,
        "index built"
    );
    builder.finish()
}

/// Open a queryable index over `dir`.
///
/// A snapshot in the directory is used when it was built with the same
/// backend and view; otherwise the reports are ingested.
pub fn open_index(
    dir: &Path,
    config: &SourceConfig,
    backend: Backend,
    view: View,
) -> Result<Box<dyn TermIndex>> {
    let files = sources::discover(dir, config)?;
    if let Some(path) = &files.snapshot {
        let saved = snapshot::read_snapshot(path)?;
        if saved.backend() == backend && saved.view() == view {
            tracing::info!(snapshot = %path.display(), "loading index snapshot");
            return saved.into_index();
        }
        tracing::warn!(
            snapshot = %path.display(),
            snapshot_backend = %saved.backend(),
            snapshot_view = %saved.view(),
            "snapshot does not match requested {} {} index; ingesting reports",
            backend,
            view
        );
    }
    build_index(&files, backend, view)
}
