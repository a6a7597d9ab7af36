//! Associative [`TermIndex`]: a sorted map from search term to its record.
//!
//! Ingestion mutates records in place and aggregates are memoized directly
//! on them, so repeated queries against one index reuse earlier work.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::{sort_dates, IndexSummary, ProductHit, SearchTermRecord, View};
use crate::rank::{cached_stats, ensure_rank_stats};
use crate::row::{Report, SourceRow};

use super::{matching_slots, Backend, IndexSnapshot, ProductMatch, TermFilter, TermIndex};

/// Term-keyed index of [`SearchTermRecord`]s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssociativeIndex {
    view: View,
    records: BTreeMap<String, SearchTermRecord>,
}

impl AssociativeIndex {
    pub fn new(view: View) -> Self {
        Self {
            view,
            records: BTreeMap::new(),
        }
    }

    /// The record for `term`, if indexed.
    pub fn record(&self, term: &str) -> Option<&SearchTermRecord> {
        self.records.get(term)
    }
}

impl TermIndex for AssociativeIndex {
    fn backend(&self) -> Backend {
        Backend::Associative
    }

    fn view(&self) -> View {
        self.view
    }

    fn ingest(&mut self, report: &Report, row: SourceRow) -> Result<()> {
        if matches!(row, SourceRow::Extended(_)) != (self.view == View::Extended) {
            bail!(
                "Cannot ingest a {} row into a {} index",
                if self.view == View::Extended { "basic" } else { "extended" },
                self.view
            );
        }
        let base = row.base();
        let record = self
            .records
            .entry(base.search_term.clone())
            .or_insert_with(|| SearchTermRecord::new(&base.department, &base.search_term));
        // The rank sequence is about to change.
        record.clear_ranks();
        record.upsert_snapshot(&report.date, row.into_snapshot(&report.source_ref));
        Ok(())
    }

    fn seal(&mut self) -> Result<()> {
        Ok(())
    }

    fn summary(&self) -> IndexSummary {
        let mut dates = Vec::new();
        let mut snapshots = 0;
        for record in self.records.values() {
            snapshots += record.data.len();
            dates.extend(record.data.keys().cloned());
        }
        sort_dates(&mut dates);
        IndexSummary {
            terms: self.records.len(),
            snapshots,
            dates,
        }
    }

    fn aggregate_ranks(&mut self) -> Result<usize> {
        Ok(self
            .records
            .values_mut()
            .filter_map(|r| ensure_rank_stats(r).then_some(()))
            .count())
    }

    fn clear_ranks(&mut self) {
        for record in self.records.values_mut() {
            record.clear_ranks();
        }
    }

    fn select(
        &mut self,
        filter: &TermFilter<'_>,
        with_stats: bool,
    ) -> Result<Vec<SearchTermRecord>> {
        let mut selected = Vec::new();
        for record in self.records.values_mut() {
            let keep = match *filter {
                TermFilter::Patterns { patterns, how } => {
                    let hit = patterns.iter().any(|p| how.matches(p, &record.search_term));
                    if hit && with_stats {
                        ensure_rank_stats(record);
                    }
                    hit
                }
                TermFilter::RankWithin { threshold, bound } => {
                    ensure_rank_stats(record);
                    cached_stats(record).is_some_and(|s| bound.admits(&s, threshold))
                }
            };
            if keep {
                selected.push(record.clone());
            }
        }
        Ok(selected)
    }

    fn product_hits(&self, ids: &[String], how: ProductMatch) -> Result<Vec<ProductHit>> {
        let mut hits = Vec::new();
        for record in self.records.values() {
            for (date, snapshot) in &record.data {
                for product in matching_slots(how, &snapshot.products, ids) {
                    hits.push(ProductHit {
                        site: record.site.clone(),
                        search_term: record.search_term.clone(),
                        rank: snapshot.rank,
                        date: date.clone(),
                        product: product.clone(),
                    });
                }
            }
        }
        Ok(hits)
    }

    fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot::Associative(self.clone())
    }
}
