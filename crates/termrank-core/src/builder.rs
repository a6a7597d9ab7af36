//! Index construction from report rows.
//!
//! [`IndexBuilder`] owns a [`TermIndex`] for the duration of a build pass.
//! For each report it reads the date marker, decodes every row for the
//! index's view and merges it in. Any malformed header or row aborts the
//! build; a half-built index is never returned.
//!
//! ```rust
//! use termrank_core::builder::IndexBuilder;
//! use termrank_core::models::View;
//! use termrank_core::store::{Backend, TermIndex};
//!
//! let mut builder = IndexBuilder::new(Backend::Associative, View::Basic);
//! let header = ["Department=[All]", "", "", "", "Viewing=[2024-01-01]"];
//! let labels: Vec<String> = vec!["Department".into(), "Search Term".into(), "Search Frequency Rank".into()];
//! let rows = vec![Ok(vec!["Dept".to_string(), "red shoes".to_string(), "5".to_string()])];
//! builder.add_report("2024-01-01.csv", &header, labels, rows).unwrap();
//! let index = builder.finish().unwrap();
//! assert_eq!(index.summary().terms, 1);
//! ```

use anyhow::{bail, Context, Result};

use crate::models::View;
use crate::row::{parse_row, report_date, required_fields, Report};
use crate::store::{Backend, TermIndex};

/// Drives rows from a sequence of reports into one index.
pub struct IndexBuilder {
    index: Box<dyn TermIndex>,
    reports: usize,
    rows: usize,
}

impl IndexBuilder {
    /// Start a fresh index.
    pub fn new(backend: Backend, view: View) -> Self {
        Self::resume(backend.create(view))
    }

    /// Continue accumulating into an existing index.
    ///
    /// Terms that receive new snapshots lose their cached aggregates.
    pub fn resume(index: Box<dyn TermIndex>) -> Self {
        Self {
            index,
            reports: 0,
            rows: 0,
        }
    }

    pub fn view(&self) -> View {
        self.index.view()
    }

    pub fn backend(&self) -> Backend {
        self.index.backend()
    }

    /// Reports and rows ingested so far by this builder.
    pub fn counts(&self) -> (usize, usize) {
        (self.reports, self.rows)
    }

    /// Ingest one report.
    ///
    /// `header` is the metadata line carrying the date marker, `labels` the
    /// column label line, and `rows` the data rows in file order. Returns the
    /// number of rows ingested.
    pub fn add_report<H, I>(
        &mut self,
        source_ref: &str,
        header: &[H],
        labels: Vec<String>,
        rows: I,
    ) -> Result<usize>
    where
        H: AsRef<str>,
        I: IntoIterator<Item = Result<Vec<String>>>,
    {
        let view = self.index.view();
        let date = report_date(header).with_context(|| format!("Malformed report {}", source_ref))?;
        if labels.len() < required_fields(view) {
            bail!(
                "Malformed report {}: {} column labels, {} view needs {}",
                source_ref,
                labels.len(),
                view,
                required_fields(view)
            );
        }
        let report = Report {
            date,
            source_ref: source_ref.to_string(),
            labels,
        };

        let mut ingested = 0;
        for (n, fields) in rows.into_iter().enumerate() {
            // Data rows start on the third line of the file.
            let line = n + 3;
            let fields = fields.with_context(|| format!("{}: unreadable line {}", source_ref, line))?;
            let row = parse_row(view, &fields)
                .with_context(|| format!("{}: malformed line {}", source_ref, line))?;
            self.index.ingest(&report, row)?;
            ingested += 1;
        }

        self.reports += 1;
        self.rows += ingested;
        tracing::debug!(
            source = source_ref,
            date = %report.date,
            rows = ingested,
            "ingested report"
        );
        Ok(ingested)
    }

    /// Seal the index and hand it over for querying.
    pub fn finish(mut self) -> Result<Box<dyn TermIndex>> {
        self.index.seal()?;
        Ok(self.index)
    }
}
