//! Flattening of query results into export-ready tables.
//!
//! The table shape follows the query dimension:
//!
//! | Shape | Rows | Date handling |
//! |-------|------|---------------|
//! | rank pivot | one per term | one column per date, valued at the rank |
//! | product pivot | three per term (slots 1–3) | one column per date, valued at the slot's product id |
//! | detail | one per (term, date, product) | `date` column |
//! | product rows | one per (term, date, selected product) | `date` column |
//!
//! Date columns are the union of dates across all matched terms, in
//! chronological order (see [`compare_dates`](crate::models::compare_dates));
//! a term without a snapshot for some date gets a null there.

use std::fmt;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::models::{sort_dates, ProductClick, ProductHit, SearchTermRecord, PRODUCT_SLOTS};
use crate::query::{Matches, QueryOutcome, Shape};

/// One cell of a flattened table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
}

impl Cell {
    fn text(value: &str) -> Self {
        if value.is_empty() {
            Cell::Null
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Cell::Null, Cell::Int)
    }
}

impl From<Option<f64>> for Cell {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Float)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Int(v) => write!(f, "{}", v),
            Cell::Float(v) => write!(f, "{}", v),
            Cell::Text(v) => f.write_str(v),
        }
    }
}

/// A rectangular table of named columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlatTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl FlatTable {
    fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The cell at `row` under column `name`.
    pub fn get(&self, row: usize, name: &str) -> Option<&Cell> {
        let column = self.column(name)?;
        self.rows.get(row).map(|r| &r[column])
    }

    /// Rows as JSON objects keyed by column name.
    pub fn to_json_records(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .zip(row)
                    .map(|(name, cell)| {
                        let value = serde_json::to_value(cell).unwrap_or(serde_json::Value::Null);
                        (name.clone(), value)
                    })
                    .collect()
            })
            .collect()
    }

    /// Sort rows by their rendered cells, for order-insensitive comparison.
    pub fn sort_rows(&mut self) {
        self.rows.sort_by_cached_key(|row| {
            row.iter()
                .map(|c| match c {
                    Cell::Null => (0u8, String::new()),
                    Cell::Int(_) | Cell::Float(_) => (1, c.to_string()),
                    Cell::Text(t) => (2, t.clone()),
                })
                .collect::<Vec<_>>()
        });
    }
}

/// Flatten a query outcome into the table shape of its dimension.
pub fn flatten(outcome: &QueryOutcome) -> Result<FlatTable> {
    let shape = outcome.dimension.shape();
    match (&outcome.matches, shape) {
        (Matches::Records(records), Shape::RankPivot) => Ok(rank_pivot(records)),
        (Matches::Records(records), Shape::ProductPivot) => Ok(product_pivot(records)),
        (Matches::Records(records), Shape::Detail) => Ok(detail(records)),
        (Matches::Products(hits), Shape::ProductRows) => Ok(product_rows(hits)),
        _ => bail!(
            "Matches of dimension '{}' cannot be flattened as {:?}",
            outcome.dimension,
            shape
        ),
    }
}

fn columns(names: &[&str], dates: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.to_string())
        .chain(dates.iter().cloned())
        .collect()
}

fn observed_dates(records: &[SearchTermRecord]) -> Vec<String> {
    let mut dates: Vec<String> = records
        .iter()
        .flat_map(|r| r.data.keys().cloned())
        .collect();
    sort_dates(&mut dates);
    dates
}

fn rank_pivot(records: &[SearchTermRecord]) -> FlatTable {
    let dates = observed_dates(records);
    let mut table = FlatTable::new(columns(&["site", "search_term", "min_rank"], &dates));
    for record in records {
        let mut row = vec![
            Cell::Text(record.site.clone()),
            Cell::Text(record.search_term.clone()),
            Cell::from(record.min_rank),
        ];
        row.extend(
            dates
                .iter()
                .map(|d| Cell::from(record.data.get(d).map(|s| s.rank))),
        );
        table.rows.push(row);
    }
    table
}

fn aggregate_cells(record: &SearchTermRecord) -> [Cell; 5] {
    [
        Cell::Text(record.site.clone()),
        Cell::Text(record.search_term.clone()),
        Cell::from(record.min_rank),
        Cell::from(record.avg_rank),
        Cell::from(record.max_rank),
    ]
}

const AGGREGATE_COLUMNS: [&str; 5] = ["site", "search_term", "min_rank", "avg_rank", "max_rank"];

fn product_pivot(records: &[SearchTermRecord]) -> FlatTable {
    let dates = observed_dates(records);
    let mut names = AGGREGATE_COLUMNS.to_vec();
    names.push("order");
    let mut table = FlatTable::new(columns(&names, &dates));
    for record in records {
        let fixed = aggregate_cells(record);
        for order in 1..=PRODUCT_SLOTS as u8 {
            let mut row = fixed.to_vec();
            row.push(Cell::Int(order as i64));
            row.extend(dates.iter().map(|d| {
                record
                    .data
                    .get(d)
                    .and_then(|s| s.slot(order))
                    .map_or(Cell::Null, |p| Cell::Text(p.product_id.clone()))
            }));
            table.rows.push(row);
        }
    }
    table
}

const PRODUCT_COLUMNS: [&str; 5] = ["order", "product_id", "title", "click_share", "conversion_share"];

fn product_cells(product: Option<&ProductClick>) -> [Cell; 5] {
    match product {
        Some(p) => [
            Cell::Int(p.order as i64),
            Cell::Text(p.product_id.clone()),
            Cell::text(&p.title),
            Cell::text(&p.click_share),
            Cell::text(&p.conversion_share),
        ],
        None => [Cell::Null, Cell::Null, Cell::Null, Cell::Null, Cell::Null],
    }
}

fn detail(records: &[SearchTermRecord]) -> FlatTable {
    let mut names = AGGREGATE_COLUMNS.to_vec();
    names.push("date");
    names.extend(PRODUCT_COLUMNS);
    let mut table = FlatTable::new(columns(&names, &[]));
    for record in records {
        let fixed = aggregate_cells(record);
        for (date, snapshot) in record.dated_snapshots() {
            let filled: Vec<&ProductClick> =
                snapshot.products.iter().filter(|p| p.is_filled()).collect();
            // A date with no listed product still gets its row.
            let products: Vec<Option<&ProductClick>> = if filled.is_empty() {
                vec![None]
            } else {
                filled.into_iter().map(Some).collect()
            };
            for product in products {
                let mut row = fixed.to_vec();
                row.push(Cell::Text(date.clone()));
                row.extend(product_cells(product));
                table.rows.push(row);
            }
        }
    }
    table
}

fn product_rows(hits: &[ProductHit]) -> FlatTable {
    let mut names = vec!["site", "search_term", "rank", "date"];
    names.extend(PRODUCT_COLUMNS);
    let mut table = FlatTable::new(columns(&names, &[]));
    for hit in hits {
        let mut row = vec![
            Cell::Text(hit.site.clone()),
            Cell::Text(hit.search_term.clone()),
            Cell::Int(hit.rank),
            Cell::Text(hit.date.clone()),
        ];
        row.extend(product_cells(Some(&hit.product)));
        table.rows.push(row);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateSnapshot;
    use crate::query::{Dimension, Policy};
    use crate::rank::ensure_rank_stats;

    fn click(order: u8, id: &str) -> ProductClick {
        ProductClick {
            order,
            product_id: id.to_string(),
            title: format!("{} title", id),
            click_share: "10%".to_string(),
            conversion_share: String::new(),
        }
    }

    fn record(term: &str, days: &[(&str, i64, Vec<ProductClick>)]) -> SearchTermRecord {
        let mut record = SearchTermRecord::new("Dept", term);
        for (date, rank, products) in days {
            record.upsert_snapshot(
                date,
                DateSnapshot {
                    source_ref: String::new(),
                    rank: *rank,
                    products: products.clone(),
                },
            );
        }
        ensure_rank_stats(&mut record);
        record
    }

    fn outcome(dimension: Dimension, matches: Matches) -> QueryOutcome {
        QueryOutcome {
            dimension,
            policy: Policy::Loose,
            selector_label: String::new(),
            matches,
        }
    }

    #[test]
    fn test_rank_pivot_fills_missing_dates_with_null() {
        let records = vec![
            record("red shoes", &[("2024-01-01", 5, vec![]), ("2024-01-02", 3, vec![])]),
            record("boots", &[("2024-01-02", 9, vec![])]),
        ];
        let table = flatten(&outcome(Dimension::ByRank, Matches::Records(records))).unwrap();
        assert_eq!(
            table.columns,
            vec!["site", "search_term", "min_rank", "2024-01-01", "2024-01-02"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "min_rank"), Some(&Cell::Int(3)));
        assert_eq!(table.get(0, "2024-01-01"), Some(&Cell::Int(5)));
        assert_eq!(table.get(1, "2024-01-01"), Some(&Cell::Null));
        assert_eq!(table.get(1, "2024-01-02"), Some(&Cell::Int(9)));
    }

    #[test]
    fn test_us_style_dates_pivot_chronologically() {
        let records = vec![record(
            "red shoes",
            &[("01/02/2024", 4, vec![]), ("12/31/2023", 6, vec![])],
        )];
        let table = flatten(&outcome(Dimension::ByRank, Matches::Records(records.clone()))).unwrap();
        assert_eq!(
            table.columns,
            vec!["site", "search_term", "min_rank", "12/31/2023", "01/02/2024"]
        );

        let table = flatten(&outcome(Dimension::ByTermDetail, Matches::Records(records))).unwrap();
        assert_eq!(table.get(0, "date"), Some(&Cell::Text("12/31/2023".to_string())));
        assert_eq!(table.get(1, "date"), Some(&Cell::Text("01/02/2024".to_string())));
    }

    #[test]
    fn test_product_pivot_pads_three_rows_per_term() {
        let records = vec![
            record(
                "red shoes",
                &[
                    ("2024-01-01", 5, vec![click(1, "A"), click(2, ""), click(3, "")]),
                    ("2024-01-02", 3, vec![click(1, "B"), click(2, "A"), click(3, "C")]),
                ],
            ),
            record("boots", &[("2024-01-01", 9, vec![click(1, ""), click(2, ""), click(3, "")])]),
        ];
        let table =
            flatten(&outcome(Dimension::ByTermWithProducts, Matches::Records(records))).unwrap();
        assert_eq!(table.len(), 6);
        assert_eq!(table.get(0, "order"), Some(&Cell::Int(1)));
        assert_eq!(table.get(2, "order"), Some(&Cell::Int(3)));
        assert_eq!(table.get(0, "2024-01-01"), Some(&Cell::Text("A".to_string())));
        assert_eq!(table.get(1, "2024-01-01"), Some(&Cell::Null));
        assert_eq!(table.get(1, "2024-01-02"), Some(&Cell::Text("A".to_string())));
        for row in 0..3 {
            assert_eq!(table.get(row, "max_rank"), Some(&Cell::Int(5)));
            assert_eq!(table.get(row, "avg_rank"), Some(&Cell::Float(4.0)));
        }
        for row in 3..6 {
            assert_eq!(table.get(row, "search_term"), Some(&Cell::Text("boots".to_string())));
            assert_eq!(table.get(row, "2024-01-02"), Some(&Cell::Null));
        }
    }

    #[test]
    fn test_detail_emits_one_row_per_product() {
        let records = vec![record(
            "red shoes",
            &[
                ("2024-01-01", 5, vec![click(1, "A"), click(2, "B"), click(3, "")]),
                ("2024-01-02", 3, vec![click(1, ""), click(2, ""), click(3, "")]),
            ],
        )];
        let table = flatten(&outcome(Dimension::ByTermDetail, Matches::Records(records))).unwrap();
        assert!(table.column("2024-01-01").is_none());
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(1, "product_id"), Some(&Cell::Text("B".to_string())));
        assert_eq!(table.get(1, "click_share"), Some(&Cell::Text("10%".to_string())));
        assert_eq!(table.get(1, "conversion_share"), Some(&Cell::Null));
        assert_eq!(table.get(2, "date"), Some(&Cell::Text("2024-01-02".to_string())));
        assert_eq!(table.get(2, "order"), Some(&Cell::Null));
    }

    #[test]
    fn test_product_rows() {
        let hits = vec![ProductHit {
            site: "Dept".to_string(),
            search_term: "red shoes".to_string(),
            rank: 5,
            date: "2024-01-01".to_string(),
            product: click(2, "B000XYZ"),
        }];
        let table = flatten(&outcome(Dimension::ByProduct, Matches::Products(hits))).unwrap();
        assert_eq!(
            table.columns,
            vec![
                "site",
                "search_term",
                "rank",
                "date",
                "order",
                "product_id",
                "title",
                "click_share",
                "conversion_share"
            ]
        );
        assert_eq!(table.get(0, "order"), Some(&Cell::Int(2)));
        assert_eq!(table.get(0, "rank"), Some(&Cell::Int(5)));
    }

    #[test]
    fn test_mismatched_matches_are_rejected() {
        let result = flatten(&outcome(Dimension::ByProduct, Matches::Records(Vec::new())));
        assert!(result.is_err());
    }

    #[test]
    fn test_json_records_use_null() {
        let records = vec![
            record("red shoes", &[("2024-01-01", 5, vec![])]),
            record("boots", &[("2024-01-02", 9, vec![])]),
        ];
        let table = flatten(&outcome(Dimension::ByRank, Matches::Records(records))).unwrap();
        let json = table.to_json_records();
        assert_eq!(json[0]["2024-01-02"], serde_json::Value::Null);
        assert_eq!(json[0]["2024-01-01"], serde_json::json!(5));
        assert_eq!(json[1]["search_term"], serde_json::json!("boots"));
    }

    #[test]
    fn test_sort_rows_is_order_insensitive() {
        let a = vec![
            record("red shoes", &[("2024-01-01", 5, vec![])]),
            record("boots", &[("2024-01-01", 9, vec![])]),
        ];
        let b: Vec<SearchTermRecord> = a.iter().rev().cloned().collect();
        let mut ta = flatten(&outcome(Dimension::ByRank, Matches::Records(a))).unwrap();
        let mut tb = flatten(&outcome(Dimension::ByRank, Matches::Records(b))).unwrap();
        assert_ne!(ta, tb);
        ta.sort_rows();
        tb.sort_rows();
        assert_eq!(ta, tb);
    }
}
