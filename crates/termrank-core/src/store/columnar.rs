//! Columnar [`TermIndex`]: report rows appended to a column table.
//!
//! Rows are stored as text exactly as read, with the report date inserted as
//! a synthetic column at [`DATE_COLUMN`]. Sealing coerces the rank column to
//! integers and lower-cases the column labels. Aggregates live in a per-row
//! column shared by all rows of a term (a group-wise transform), and
//! selection masks rows before regrouping the survivors into records.
//!
//! When the same (term, date) pair was ingested more than once, only the
//! last row is live; earlier ones are ignored by every query.

use std::collections::{BTreeMap, HashSet};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::{
    sort_dates, DateSnapshot, IndexSummary, ProductClick, ProductHit, SearchTermRecord, View,
    PRODUCT_SLOTS,
};
use crate::rank::{apply_stats, RankStats};
use crate::row::{parse_rank, required_fields, Report, SourceRow, PRODUCT_GROUP_FIELDS};

use super::{matching_slots, Backend, IndexSnapshot, ProductMatch, TermFilter, TermIndex};

pub const DEPARTMENT_COLUMN: usize = 0;
pub const TERM_COLUMN: usize = 1;
pub const RANK_COLUMN: usize = 2;
/// Position of the synthetic date column.
pub const DATE_COLUMN: usize = 3;
const FIRST_PRODUCT_COLUMN: usize = DATE_COLUMN + 1;

const DATE_LABEL: &str = "date";

/// Column table of report rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnarIndex {
    view: View,
    labels: Vec<String>,
    /// Column-major text cells.
    columns: Vec<Vec<String>>,
    source_refs: Vec<String>,
    /// Numeric rank column, filled by `seal`.
    #[serde(skip)]
    ranks: Vec<i64>,
    /// Memoized per-row aggregates of the row's term.
    #[serde(skip)]
    stats: Vec<Option<RankStats>>,
    #[serde(skip)]
    dirty_terms: HashSet<String>,
    #[serde(skip)]
    sealed: bool,
}

impl ColumnarIndex {
    pub fn new(view: View) -> Self {
        Self {
            view,
            labels: Vec::new(),
            columns: Vec::new(),
            source_refs: Vec::new(),
            ranks: Vec::new(),
            stats: Vec::new(),
            dirty_terms: HashSet::new(),
            sealed: false,
        }
    }

    /// Column labels, lower-cased once sealed.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn row_count(&self) -> usize {
        self.source_refs.len()
    }

    fn column_count(&self) -> usize {
        match self.view {
            View::Basic => FIRST_PRODUCT_COLUMN,
            View::Extended => FIRST_PRODUCT_COLUMN + PRODUCT_SLOTS * PRODUCT_GROUP_FIELDS,
        }
    }

    fn text(&self, column: usize, row: usize) -> &str {
        &self.columns[column][row]
    }

    /// Take the column labels from the first report. Later reports are
    /// positional and only need as many labels as the view has fields.
    fn adopt_labels(&mut self, report: &Report) -> Result<()> {
        let needed = required_fields(self.view);
        if report.labels.len() < needed {
            bail!(
                "{}: {} column labels, {} view needs {}",
                report.source_ref,
                report.labels.len(),
                self.view,
                needed
            );
        }
        let mut labels: Vec<String> = report.labels[..needed]
            .iter()
            .map(|l| l.trim().to_string())
            .collect();
        labels.insert(DATE_COLUMN, DATE_LABEL.to_string());
        self.labels = labels;
        self.columns = vec![Vec::new(); self.column_count()];
        Ok(())
    }

    fn require_sealed(&self) -> Result<()> {
        if !self.sealed {
            bail!("Columnar index has unsealed rows; finish the build before querying");
        }
        Ok(())
    }

    /// Live rows per term after last-write-wins, ordered by term then date.
    fn live_groups(&self) -> BTreeMap<&str, TermRows<'_>> {
        let mut groups: BTreeMap<&str, TermRows<'_>> = BTreeMap::new();
        for row in 0..self.row_count() {
            groups
                .entry(self.text(TERM_COLUMN, row))
                .or_insert_with(|| TermRows {
                    first: row,
                    dates: BTreeMap::new(),
                })
                .dates
                .insert(self.text(DATE_COLUMN, row), row);
        }
        groups
    }

    fn products(&self, row: usize) -> Vec<ProductClick> {
        if self.view == View::Basic {
            return Vec::new();
        }
        (0..PRODUCT_SLOTS)
            .map(|slot| {
                let at = FIRST_PRODUCT_COLUMN + slot * PRODUCT_GROUP_FIELDS;
                ProductClick {
                    order: (slot + 1) as u8,
                    product_id: self.text(at, row).to_string(),
                    title: self.text(at + 1, row).to_string(),
                    click_share: self.text(at + 2, row).to_string(),
                    conversion_share: self.text(at + 3, row).to_string(),
                }
            })
            .collect()
    }

    /// Fill the aggregate column of every live row whose term lacks it.
    fn transform_stats(&mut self) -> usize {
        let mut updates: Vec<(Vec<usize>, RankStats)> = Vec::new();
        for group in self.live_groups().into_values() {
            let rows: Vec<usize> = group.dates.into_values().collect();
            if rows.iter().all(|r| self.stats[*r].is_some()) {
                continue;
            }
            let ranks: Vec<i64> = rows.iter().map(|r| self.ranks[*r]).collect();
            if let Some(stats) = RankStats::from_ranks(&ranks) {
                updates.push((rows, stats));
            }
        }
        let computed = updates.len();
        for (rows, stats) in updates {
            for row in rows {
                self.stats[row] = Some(stats);
            }
        }
        computed
    }

    fn assemble(&self, term: &str, group: &TermRows<'_>) -> SearchTermRecord {
        let mut record = SearchTermRecord::new(self.text(DEPARTMENT_COLUMN, group.first), term);
        for (date, row) in &group.dates {
            record.upsert_snapshot(
                date,
                DateSnapshot {
                    source_ref: self.source_refs[*row].clone(),
                    rank: self.ranks[*row],
                    products: self.products(*row),
                },
            );
        }
        let cached = group.dates.values().next().and_then(|row| self.stats[*row]);
        if let Some(stats) = cached {
            apply_stats(&mut record, stats);
        }
        record
    }
}

/// Rows of one term: the first row ever seen and the live row per date.
struct TermRows<'a> {
    first: usize,
    dates: BTreeMap<&'a str, usize>,
}

impl TermIndex for ColumnarIndex {
    fn backend(&self) -> Backend {
        Backend::Columnar
    }

    fn view(&self) -> View {
        self.view
    }

    fn ingest(&mut self, report: &Report, row: SourceRow) -> Result<()> {
        if matches!(row, SourceRow::Extended(_)) != (self.view == View::Extended) {
            bail!("Row layout does not match the {} view of this index", self.view);
        }
        if self.labels.is_empty() {
            self.adopt_labels(report)?;
        }

        let base = row.base();
        let mut cells = vec![
            base.department.clone(),
            base.search_term.clone(),
            base.rank_text.clone(),
            report.date.clone(),
        ];
        for product in row.products() {
            cells.push(product.product_id.clone());
            cells.push(product.title.clone());
            cells.push(product.click_share.clone());
            cells.push(product.conversion_share.clone());
        }
        debug_assert_eq!(cells.len(), self.column_count());
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(cell);
        }
        self.source_refs.push(report.source_ref.clone());
        self.dirty_terms.insert(base.search_term.clone());
        self.sealed = false;
        Ok(())
    }

    fn seal(&mut self) -> Result<()> {
        let rows = self.row_count();
        if self.columns.len() != self.column_count() && rows > 0 {
            bail!(
                "Columnar index has {} columns, {} view needs {}",
                self.columns.len(),
                self.view,
                self.column_count()
            );
        }
        if self.columns.iter().any(|c| c.len() != rows) {
            bail!("Columnar index columns have unequal lengths");
        }

        self.ranks = match self.columns.get(RANK_COLUMN) {
            Some(column) => column
                .iter()
                .enumerate()
                .map(|(row, raw)| {
                    parse_rank(raw).with_context(|| format!("Rank coercion failed at row {}", row))
                })
                .collect::<Result<_>>()?,
            None => Vec::new(),
        };
        for label in &mut self.labels {
            *label = label.to_lowercase();
        }

        self.stats.resize(rows, None);
        if !self.dirty_terms.is_empty() {
            for row in 0..rows {
                if self.dirty_terms.contains(self.text(TERM_COLUMN, row)) {
                    self.stats[row] = None;
                }
            }
            self.dirty_terms.clear();
        }
        self.sealed = true;
        Ok(())
    }

    fn summary(&self) -> IndexSummary {
        let groups = self.live_groups();
        let mut dates: Vec<String> = groups
            .values()
            .flat_map(|g| g.dates.keys().map(|d| d.to_string()))
            .collect();
        sort_dates(&mut dates);
        IndexSummary {
            terms: groups.len(),
            snapshots: groups.values().map(|g| g.dates.len()).sum(),
            dates,
        }
    }

    fn aggregate_ranks(&mut self) -> Result<usize> {
        self.require_sealed()?;
        Ok(self.transform_stats())
    }

    fn clear_ranks(&mut self) {
        self.stats.iter_mut().for_each(|s| *s = None);
    }

    fn select(
        &mut self,
        filter: &TermFilter<'_>,
        with_stats: bool,
    ) -> Result<Vec<SearchTermRecord>> {
        self.require_sealed()?;

        let mask: Vec<bool> = match *filter {
            TermFilter::Patterns { patterns, how } => {
                let mask: Vec<bool> = self.columns[TERM_COLUMN]
                    .iter()
                    .map(|term| patterns.iter().any(|p| how.matches(p, term)))
                    .collect();
                if with_stats && mask.iter().any(|m| *m) {
                    self.transform_stats();
                }
                mask
            }
            TermFilter::RankWithin { threshold, bound } => {
                self.transform_stats();
                self.stats
                    .iter()
                    .map(|s| matches!(s, Some(stats) if bound.admits(stats, threshold)))
                    .collect()
            }
        };

        let records = self
            .live_groups()
            .into_iter()
            .filter(|(_, group)| group.dates.values().any(|row| mask[*row]))
            .map(|(term, group)| self.assemble(term, &group))
            .collect();
        Ok(records)
    }

    fn product_hits(&self, ids: &[String], how: ProductMatch) -> Result<Vec<ProductHit>> {
        self.require_sealed()?;
        let mut hits = Vec::new();
        for (term, group) in self.live_groups() {
            for (date, row) in group.dates {
                let products = self.products(row);
                for product in matching_slots(how, &products, ids) {
                    hits.push(ProductHit {
                        site: self.text(DEPARTMENT_COLUMN, row).to_string(),
                        search_term: term.to_string(),
                        rank: self.ranks[row],
                        date: date.to_string(),
                        product: product.clone(),
                    });
                }
            }
        }
        Ok(hits)
    }

    fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::Columnar(self.clone())
    }
}
