//! Index statistics.
//!
//! Provides a quick summary of what an index holds: backend, view, how many
//! terms and dated snapshots, and which report dates were ingested. Used by
//! `trk stats` to confirm a source directory parses as expected.

use anyhow::Result;
use std::path::Path;

use termrank_core::models::View;
use termrank_core::store::{Backend, TermIndex};

use crate::config::SourceConfig;
use crate::ingest;

/// Render the summary of `index` as display lines.
pub fn summary_lines(index: &dyn TermIndex) -> Vec<String> {
    let summary = index.summary();
    let mut lines = vec![
        format!("  Backend:     {}", index.backend()),
        format!("  View:        {}", index.view()),
        String::new(),
        format!("  Terms:       {}", summary.terms),
        format!("  Snapshots:   {}", summary.snapshots),
        format!("  Dates:       {}", summary.dates.len()),
    ];
    if let (Some(first), Some(last)) = (summary.dates.first(), summary.dates.last()) {
        lines.push(format!("  Range:       {} .. {}", first, last));
    }
    if !summary.dates.is_empty() {
        lines.push(String::new());
        lines.push("  By date:".to_string());
        for date in &summary.dates {
            lines.push(format!("    {}", date));
        }
    }
    lines
}

/// Run the stats command: open the index over `dir` and print a summary.
pub fn run_stats(dir: &Path, config: &SourceConfig, backend: Backend, view: View) -> Result<()> {
    let index = ingest::open_index(dir, config, backend, view)?;

    println!("Term Rank Index Stats");
    println!("=====================");
    println!();
    println!("  Source:      {}", dir.display());
    for line in summary_lines(index.as_ref()) {
        println!("{}", line);
    }
    Ok(())
}
