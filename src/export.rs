//! Export of flattened query results.
//!
//! A [`FlatTable`] is written either as CSV (header row, nulls as empty
//! cells) or as a JSON array of objects (nulls as `null`). Files are named
//! after the query that produced them:
//!
//! ```text
//! result-<policy>-<dimension>-<selector>-<backend>-<YYYYmmdd-HHMMSS>.<ext>
//! ```

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use termrank_core::flatten::FlatTable;
use termrank_core::query::QueryOutcome;
use termrank_core::store::Backend;

/// File format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Json,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Csv => "csv",
            Format::Json => "json",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "csv" => Ok(Format::Csv),
            "json" => Ok(Format::Json),
            other => bail!("Unknown output format: '{}'. Must be csv or json.", other),
        }
    }
}

/// Label identifying a query result.
pub fn result_label(outcome: &QueryOutcome, backend: Backend, at: DateTime<Local>) -> String {
    format!(
        "result-{}-{}-{}-{}-{}",
        outcome.policy,
        outcome.dimension,
        sanitize(&outcome.selector_label),
        backend,
        at.format("%Y%m%d-%H%M%S")
    )
}

// Selector text ends up in a file name.
fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':' | '\0') { '_' } else { c })
        .collect()
}

/// Serialize `table` in `format` into `out`.
pub fn write_table<W: Write>(table: &FlatTable, format: Format, out: W) -> Result<()> {
    match format {
        Format::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(&table.columns)?;
            for row in &table.rows {
                writer.write_record(row.iter().map(|cell| cell.to_string()))?;
            }
            writer.flush()?;
        }
        Format::Json => {
            let mut out = out;
            serde_json::to_writer_pretty(&mut out, &table.to_json_records())?;
            writeln!(out)?;
            out.flush()?;
        }
    }
    Ok(())
}

/// Write `table` into `dir` under the result label. Returns the file path.
pub fn export_table(table: &FlatTable, format: Format, dir: &Path, label: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    let path = dir.join(format!("{}.{}", label, format.extension()));
    let file = std::fs::File::create(&path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_table(table, format, std::io::BufWriter::new(file))
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use termrank_core::flatten::Cell;
    use termrank_core::query::{Dimension, Matches, Policy};

    fn table() -> FlatTable {
        FlatTable {
            columns: vec![
                "site".to_string(),
                "search_term".to_string(),
                "min_rank".to_string(),
                "2024-01-01".to_string(),
            ],
            rows: vec![
                vec![
                    Cell::Text("Dept".to_string()),
                    Cell::Text("red, shoes".to_string()),
                    Cell::Int(3),
                    Cell::Null,
                ],
                vec![
                    Cell::Text("Dept".to_string()),
                    Cell::Text("boots".to_string()),
                    Cell::Null,
                    Cell::Int(9),
                ],
            ],
        }
    }

    #[test]
    fn test_csv_output() {
        let mut buf = Vec::new();
        write_table(&table(), Format::Csv, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "site,search_term,min_rank,2024-01-01\nDept,\"red, shoes\",3,\nDept,boots,,9\n"
        );
    }

    #[test]
    fn test_json_output() {
        let mut buf = Vec::new();
        write_table(&table(), Format::Json, &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value[0]["search_term"], "red, shoes");
        assert_eq!(value[0]["2024-01-01"], serde_json::Value::Null);
        assert_eq!(value[1]["2024-01-01"], 9);
    }

    #[test]
    fn test_result_label() {
        let outcome = QueryOutcome {
            dimension: Dimension::ByRank,
            policy: Policy::Exact,
            selector_label: "40".to_string(),
            matches: Matches::Records(Vec::new()),
        };
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).single().unwrap();
        assert_eq!(
            result_label(&outcome, Backend::Columnar, at),
            "result-exact-by-rank-40-columnar-20240309-140507"
        );
    }

    #[test]
    fn test_export_table_writes_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = export_table(&table(), Format::Json, tmp.path(), "result-x").unwrap();
        assert_eq!(path, tmp.path().join("result-x.json"));
        assert!(path.exists());
    }
}
