//! Term index abstraction.
//!
//! The [`TermIndex`] trait is the one contract the builder and the query
//! engine talk to. Two backends implement it:
//!
//! | Backend | Representation |
//! |---------|----------------|
//! | [`AssociativeIndex`] | `term → SearchTermRecord` map, mutated in place |
//! | [`ColumnarIndex`] | growable column table, one row per ingested report row |
//!
//! Both must select the same records for the same filter; they differ only in
//! how they get there. A backend is chosen once, at construction, and an
//! index never changes backend afterwards.

pub mod associative;
pub mod columnar;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::models::{IndexSummary, ProductClick, ProductHit, SearchTermRecord, View};
use crate::rank::RankStats;
use crate::row::{Report, SourceRow};

pub use associative::AssociativeIndex;
pub use columnar::ColumnarIndex;

/// Storage representation of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Associative,
    Columnar,
}

impl Backend {
    /// Create an empty index of this backend for `view`.
    pub fn create(self, view: View) -> Box<dyn TermIndex> {
        match self {
            Backend::Associative => Box::new(AssociativeIndex::new(view)),
            Backend::Columnar => Box::new(ColumnarIndex::new(view)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Backend::Associative => "associative",
            Backend::Columnar => "columnar",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "associative" => Ok(Backend::Associative),
            "columnar" => Ok(Backend::Columnar),
            other => bail!(
                "Unsupported backend: '{}'. Use associative or columnar.",
                other
            ),
        }
    }
}

/// How a term pattern is compared against indexed terms. Case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMatch {
    /// The pattern occurs anywhere in the term.
    Contains,
    /// The pattern is the whole term.
    Equal,
}

impl TermMatch {
    pub fn matches(self, pattern: &str, term: &str) -> bool {
        let pattern = pattern.to_lowercase();
        let term = term.to_lowercase();
        match self {
            TermMatch::Contains => term.contains(&pattern),
            TermMatch::Equal => term == pattern,
        }
    }
}

/// Which aggregate a rank threshold bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankBound {
    /// Best rank on any date is within the threshold.
    Min,
    /// Worst rank on every date is within the threshold.
    Max,
    /// Mean rank is within the threshold.
    Mean,
}

impl RankBound {
    pub fn admits(self, stats: &RankStats, threshold: i64) -> bool {
        match self {
            RankBound::Min => stats.min <= threshold,
            RankBound::Max => stats.max <= threshold,
            RankBound::Mean => stats.avg <= threshold as f64,
        }
    }
}

/// How product identifiers select slots within one date snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductMatch {
    /// A snapshot listing any selected id contributes all of its filled slots.
    Membership,
    /// Only slots whose id equals a selected id.
    Equal,
}

/// The filled slots of one snapshot selected by `ids` under `how`.
pub fn matching_slots<'a>(
    how: ProductMatch,
    products: &'a [ProductClick],
    ids: &[String],
) -> Vec<&'a ProductClick> {
    let filled = products.iter().filter(|p| p.is_filled());
    match how {
        ProductMatch::Membership => {
            let listed = products
                .iter()
                .any(|p| p.is_filled() && ids.iter().any(|id| *id == p.product_id));
            if listed {
                filled.collect()
            } else {
                Vec::new()
            }
        }
        ProductMatch::Equal => filled
            .filter(|p| ids.iter().any(|id| *id == p.product_id))
            .collect(),
    }
}

/// Record selection criteria understood by every backend.
#[derive(Debug, Clone, Copy)]
pub enum TermFilter<'a> {
    /// Terms matching any of `patterns`.
    Patterns {
        patterns: &'a [String],
        how: TermMatch,
    },
    /// Terms whose `bound` aggregate is at most `threshold`.
    RankWithin { threshold: i64, bound: RankBound },
}

/// The operations every index backend provides.
///
/// Aggregation memoizes into the index, so selection takes `&mut self`.
pub trait TermIndex {
    /// Storage representation of this index.
    fn backend(&self) -> Backend;

    /// Row layout the index was built from.
    fn view(&self) -> View;

    /// Merge one decoded row from `report` into the index.
    fn ingest(&mut self, report: &Report, row: SourceRow) -> Result<()>;

    /// Finish a build pass. Must be called before querying.
    fn seal(&mut self) -> Result<()>;

    /// Term, snapshot and date counts.
    fn summary(&self) -> IndexSummary;

    /// Compute every aggregate that is not cached yet.
    ///
    /// Returns the number of terms whose aggregates were computed.
    fn aggregate_ranks(&mut self) -> Result<usize>;

    /// Drop all cached aggregates.
    fn clear_ranks(&mut self);

    /// Records matching `filter`, ordered by term.
    ///
    /// Rank filters always aggregate. Pattern filters aggregate the matched
    /// records only when `with_stats` is set.
    fn select(&mut self, filter: &TermFilter<'_>, with_stats: bool)
        -> Result<Vec<SearchTermRecord>>;

    /// One hit per (term, date, selected product slot).
    fn product_hits(&self, ids: &[String], how: ProductMatch) -> Result<Vec<ProductHit>>;

    /// A serializable copy of the index.
    fn snapshot(&self) -> IndexSnapshot;
}

/// A serialized index of either backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum IndexSnapshot {
    Associative(AssociativeIndex),
    Columnar(ColumnarIndex),
}

impl IndexSnapshot {
    pub fn backend(&self) -> Backend {
        match self {
            IndexSnapshot::Associative(_) => Backend::Associative,
            IndexSnapshot::Columnar(_) => Backend::Columnar,
        }
    }

    pub fn view(&self) -> View {
        match self {
            IndexSnapshot::Associative(i) => i.view(),
            IndexSnapshot::Columnar(i) => i.view(),
        }
    }

    /// Restore a sealed, queryable index.
    pub fn into_index(self) -> Result<Box<dyn TermIndex>> {
        let mut index: Box<dyn TermIndex> = match self {
            IndexSnapshot::Associative(i) => Box::new(i),
            IndexSnapshot::Columnar(i) => Box::new(i),
        };
        index.seal()?;
        Ok(index)
    }
}
