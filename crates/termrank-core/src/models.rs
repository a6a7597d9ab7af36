//! Core data models for the search-term index.
//!
//! A [`SearchTermRecord`] holds everything known about one search term:
//! the marketplace it came from, lazily computed rank aggregates and one
//! [`DateSnapshot`] per report date. Extended reports additionally carry the
//! top clicked products for each date as [`ProductClick`] slots.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Number of product slots an extended report lists per search term.
pub const PRODUCT_SLOTS: usize = 3;

/// Layouts a report date label is tried against. Two-digit years come
/// before four-digit ones so `1/7/23` reads as 2023.
const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d"];

/// The calendar date a label starts with. Range labels such as
/// `12/31/2023 - 01/06/2024` use their first date.
pub fn parse_date_label(label: &str) -> Option<NaiveDate> {
    let first = label.split(" - ").next()?.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(first, format).ok())
}

/// Chronological order for date labels. Labels that do not parse sort after
/// the dated ones, by text.
pub fn compare_dates(a: &str, b: &str) -> Ordering {
    let key = |label: &str| {
        let date = parse_date_label(label);
        (date.is_none(), date)
    };
    key(a).cmp(&key(b)).then_with(|| a.cmp(b))
}

/// Sort and dedup date labels chronologically.
pub fn sort_dates(dates: &mut Vec<String>) {
    dates.sort_by(|a, b| compare_dates(a, b));
    dates.dedup();
}

/// Which row layout an index was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum View {
    /// Term and rank only.
    Basic,
    /// Term, rank and the three clicked-product slots.
    Extended,
}

impl View {
    pub fn as_str(self) -> &'static str {
        match self {
            View::Basic => "basic",
            View::Extended => "extended",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "basic" => Ok(View::Basic),
            "extended" => Ok(View::Extended),
            other => bail!("Unsupported view: '{}'. Use basic or extended.", other),
        }
    }
}

/// One clicked product listed against a term on a given date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductClick {
    /// Slot position, 1 to 3.
    pub order: u8,
    pub product_id: String,
    pub title: String,
    pub click_share: String,
    pub conversion_share: String,
}

impl ProductClick {
    /// A slot counts as filled when the report names a product for it.
    pub fn is_filled(&self) -> bool {
        !self.product_id.is_empty()
    }
}

/// The measurement for one term on one report date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateSnapshot {
    /// The report file this row came from.
    pub source_ref: String,
    /// Search frequency rank within that date's report (1 = most searched).
    pub rank: i64,
    /// Product slots in order; empty for basic-view indices.
    pub products: Vec<ProductClick>,
}

impl DateSnapshot {
    /// The product occupying `order`, if that slot is filled.
    pub fn slot(&self, order: u8) -> Option<&ProductClick> {
        self.products
            .iter()
            .find(|p| p.order == order && p.is_filled())
    }
}

/// Everything the index knows about one search term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTermRecord {
    pub site: String,
    pub search_term: String,
    pub min_rank: Option<i64>,
    pub avg_rank: Option<f64>,
    pub max_rank: Option<i64>,
    /// Snapshots keyed by date label.
    pub data: BTreeMap<String, DateSnapshot>,
}

impl SearchTermRecord {
    /// A record with no snapshots and unset aggregates.
    pub fn new(site: &str, search_term: &str) -> Self {
        Self {
            site: site.to_string(),
            search_term: search_term.to_string(),
            min_rank: None,
            avg_rank: None,
            max_rank: None,
            data: BTreeMap::new(),
        }
    }

    /// Insert the snapshot for `date`, replacing any earlier one.
    pub fn upsert_snapshot(&mut self, date: &str, snapshot: DateSnapshot) {
        self.data.insert(date.to_string(), snapshot);
    }

    /// Ranks in date order.
    pub fn ranks(&self) -> Vec<i64> {
        self.dated_snapshots().into_iter().map(|(_, s)| s.rank).collect()
    }

    /// Snapshots in chronological order of their date labels.
    pub fn dated_snapshots(&self) -> Vec<(&String, &DateSnapshot)> {
        let mut snapshots: Vec<_> = self.data.iter().collect();
        snapshots.sort_by(|(a, _), (b, _)| compare_dates(a, b));
        snapshots
    }

    /// Forget cached aggregates so the next query recomputes them.
    pub fn clear_ranks(&mut self) {
        self.min_rank = None;
        self.avg_rank = None;
        self.max_rank = None;
    }
}

/// One row of a by-product query: a product slot together with the term and
/// date it was listed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductHit {
    pub site: String,
    pub search_term: String,
    pub rank: i64,
    pub date: String,
    pub product: ProductClick,
}

/// Size overview of an index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSummary {
    pub terms: usize,
    pub snapshots: usize,
    pub dates: Vec<String>,
}
