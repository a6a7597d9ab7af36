//! The query command: open an index, select, flatten and export.

use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;

use termrank_core::flatten::{flatten, FlatTable};
use termrank_core::query::{run_query, Query, QueryOutcome};
use termrank_core::store::Backend;

use crate::config::SourceConfig;
use crate::export::{self, Format};
use crate::ingest;

/// Everything `trk query` needs after flags and config are merged.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: Query,
    pub source_dir: PathBuf,
    pub backend: Backend,
    /// Export directory; defaults to the source directory.
    pub out_dir: Option<PathBuf>,
    pub format: Format,
    /// Print the table instead of writing a file.
    pub stdout: bool,
}

/// A finished query with its flattened table.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub outcome: QueryOutcome,
    pub table: FlatTable,
    pub label: String,
}

/// Open the index over the request's source and run its query.
///
/// The index is built in the view the query dimension needs.
pub fn search(request: &SearchRequest, source: &SourceConfig) -> Result<SearchResult> {
    let view = request.query.dimension.view();
    let mut index = ingest::open_index(&request.source_dir, source, request.backend, view)?;
    let outcome = run_query(index.as_mut(), &request.query)?;
    if outcome.matches.is_empty() {
        tracing::warn!(
            dimension = %outcome.dimension,
            policy = %outcome.policy,
            "no entries matched the selector"
        );
    }
    let table = flatten(&outcome)?;
    let label = export::result_label(&outcome, request.backend, Local::now());
    Ok(SearchResult {
        outcome,
        table,
        label,
    })
}

/// Run the query command end to end and report where the result went.
pub fn run_search(request: &SearchRequest, source: &SourceConfig) -> Result<()> {
    let result = search(request, source)?;

    if request.stdout {
        export::write_table(&result.table, request.format, std::io::stdout().lock())?;
        return Ok(());
    }

    let dir = request
        .out_dir
        .clone()
        .unwrap_or_else(|| request.source_dir.clone());
    let path = export::export_table(&result.table, request.format, &dir, &result.label)?;
    println!(
        "{} matched, {} rows written to {}",
        result.outcome.matches.len(),
        result.table.len(),
        path.display()
    );
    Ok(())
}
