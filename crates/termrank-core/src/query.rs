//! Query engine.
//!
//! A query is a (dimension, policy, selector) triple. The dimension decides
//! what the selector means and which output shape the results flatten into;
//! the policy decides how the selector is compared.
//!
//! | Dimension | Selector | loose | exact | mean |
//! |-----------|----------|-------|-------|------|
//! | `by-term*` | term patterns | substring | equality | unsupported |
//! | `by-rank*` | one threshold | `min_rank <= t` | `max_rank <= t` | `avg_rank <= t` |
//! | `by-product` | product ids | snapshot lists an id | slot id equals | unsupported |
//!
//! `exact` therefore means two unrelated things depending on the dimension;
//! internally the two readings are the separate [`TermMatch::Equal`] and
//! [`RankBound::Max`] policies.

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::models::{compare_dates, ProductHit, SearchTermRecord, View};
use crate::store::{ProductMatch, RankBound, TermFilter, TermIndex, TermMatch};

/// What a query selects on and how its results are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    ByTerm,
    ByTermWithProducts,
    ByTermDetail,
    ByRank,
    ByRankWithProducts,
    ByRankDetail,
    ByProduct,
}

/// What the selector is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Term,
    Rank,
    Product,
}

/// Output layout of a flattened result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One row per term, one column per date holding the rank.
    RankPivot,
    /// Three rows per term, one column per date holding the slot's product.
    ProductPivot,
    /// One row per (term, date, product).
    Detail,
    /// One row per (term, date, selected product).
    ProductRows,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::ByTerm,
        Dimension::ByTermWithProducts,
        Dimension::ByTermDetail,
        Dimension::ByRank,
        Dimension::ByRankWithProducts,
        Dimension::ByRankDetail,
        Dimension::ByProduct,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::ByTerm => "by-term",
            Dimension::ByTermWithProducts => "by-term-with-products",
            Dimension::ByTermDetail => "by-term-detail",
            Dimension::ByRank => "by-rank",
            Dimension::ByRankWithProducts => "by-rank-with-products",
            Dimension::ByRankDetail => "by-rank-detail",
            Dimension::ByProduct => "by-product",
        }
    }

    pub fn target(self) -> Target {
        match self {
            Dimension::ByTerm | Dimension::ByTermWithProducts | Dimension::ByTermDetail => {
                Target::Term
            }
            Dimension::ByRank | Dimension::ByRankWithProducts | Dimension::ByRankDetail => {
                Target::Rank
            }
            Dimension::ByProduct => Target::Product,
        }
    }

    pub fn shape(self) -> Shape {
        match self {
            Dimension::ByTerm | Dimension::ByRank => Shape::RankPivot,
            Dimension::ByTermWithProducts | Dimension::ByRankWithProducts => Shape::ProductPivot,
            Dimension::ByTermDetail | Dimension::ByRankDetail => Shape::Detail,
            Dimension::ByProduct => Shape::ProductRows,
        }
    }

    /// Row layout the index must have been built from.
    pub fn view(self) -> View {
        match self {
            Dimension::ByTerm | Dimension::ByRank => View::Basic,
            _ => View::Extended,
        }
    }

    /// Whether matched records need their rank aggregates.
    pub fn needs_rank_stats(self) -> bool {
        !matches!(self, Dimension::ByTerm | Dimension::ByProduct)
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match Dimension::ALL.iter().find(|d| d.as_str() == s) {
            Some(d) => Ok(*d),
            None => {
                let known: Vec<&str> = Dimension::ALL.iter().map(|d| d.as_str()).collect();
                bail!(
                    "Unsupported dimension: '{}'. Use one of: {}.",
                    s,
                    known.join(", ")
                )
            }
        }
    }
}

/// Selection policy as given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Loose,
    Exact,
    Mean,
}

impl Policy {
    pub fn as_str(self) -> &'static str {
        match self {
            Policy::Loose => "loose",
            Policy::Exact => "exact",
            Policy::Mean => "mean",
        }
    }

    /// Term comparison for term dimensions.
    pub fn term_match(self) -> Result<TermMatch> {
        match self {
            Policy::Loose => Ok(TermMatch::Contains),
            Policy::Exact => Ok(TermMatch::Equal),
            Policy::Mean => bail!("Unsupported combination: policy 'mean' with a term dimension"),
        }
    }

    /// Product comparison for the product dimension.
    pub fn product_match(self) -> Result<ProductMatch> {
        match self {
            Policy::Loose => Ok(ProductMatch::Membership),
            Policy::Exact => Ok(ProductMatch::Equal),
            Policy::Mean => {
                bail!("Unsupported combination: policy 'mean' with dimension 'by-product'")
            }
        }
    }

    /// Aggregate bounded by a rank threshold.
    pub fn rank_bound(self) -> RankBound {
        match self {
            Policy::Loose => RankBound::Min,
            Policy::Exact => RankBound::Max,
            Policy::Mean => RankBound::Mean,
        }
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "loose" => Ok(Policy::Loose),
            "exact" => Ok(Policy::Exact),
            "mean" => Ok(Policy::Mean),
            other => bail!("Unsupported policy: '{}'. Use loose, exact, or mean.", other),
        }
    }
}

/// A fully specified query.
#[derive(Debug, Clone)]
pub struct Query {
    pub dimension: Dimension,
    pub policy: Policy,
    /// Raw selector values: term patterns, product ids, or a threshold.
    pub selector: Vec<String>,
}

/// Entries selected by a query.
#[derive(Debug, Clone)]
pub enum Matches {
    Records(Vec<SearchTermRecord>),
    Products(Vec<ProductHit>),
}

impl Matches {
    pub fn len(&self) -> usize {
        match self {
            Matches::Records(r) => r.len(),
            Matches::Products(p) => p.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of [`run_query`].
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub dimension: Dimension,
    pub policy: Policy,
    /// Short form of the selector, used when naming exported results.
    pub selector_label: String,
    pub matches: Matches,
}

/// Parse a rank threshold selector.
///
/// The value must be ASCII alphanumeric and convert to an integer.
pub fn parse_threshold(raw: &str) -> Result<i64> {
    let value = raw.trim();
    let alnum = !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric());
    match value.parse::<i64>() {
        Ok(threshold) if alnum => Ok(threshold),
        _ => bail!("Selector '{}' is not a numeric rank threshold", raw),
    }
}

fn selector_values(query: &Query) -> Result<Vec<String>> {
    let values: Vec<String> = query
        .selector
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        bail!("Dimension '{}' needs at least one selector value", query.dimension);
    }
    Ok(values)
}

/// Run `query` against `index`.
///
/// This is the single entry point the CLI and tests go through. It checks
/// the index is usable for the dimension, validates and parses the
/// selector, and selects through the backend.
pub fn run_query(index: &mut dyn TermIndex, query: &Query) -> Result<QueryOutcome> {
    if index.summary().terms == 0 {
        bail!("Index is empty; ingest at least one report before querying");
    }
    if query.dimension.view() == View::Extended && index.view() == View::Basic {
        bail!(
            "Dimension '{}' needs an index built from the extended view",
            query.dimension
        );
    }

    let (selector_label, matches) = match query.dimension.target() {
        Target::Term => {
            let how = query.policy.term_match()?;
            let patterns = selector_values(query)?;
            let filter = TermFilter::Patterns {
                patterns: &patterns,
                how,
            };
            let records = index.select(&filter, query.dimension.needs_rank_stats())?;
            (format!("{}++", patterns[0]), Matches::Records(records))
        }
        Target::Rank => {
            let raw = query.selector.first().map(String::as_str).unwrap_or("");
            let threshold = parse_threshold(raw)?;
            if query.selector.len() > 1 {
                tracing::warn!(
                    threshold,
                    ignored = query.selector.len() - 1,
                    "rank dimensions take one threshold; extra selector values ignored"
                );
            }
            let filter = TermFilter::RankWithin {
                threshold,
                bound: query.policy.rank_bound(),
            };
            let records = index.select(&filter, true)?;
            (threshold.to_string(), Matches::Records(records))
        }
        Target::Product => {
            let how = query.policy.product_match()?;
            let ids = selector_values(query)?;
            let mut hits = index.product_hits(&ids, how)?;
            hits.sort_by(|a, b| {
                a.search_term
                    .cmp(&b.search_term)
                    .then_with(|| compare_dates(&a.date, &b.date))
                    .then_with(|| a.product.order.cmp(&b.product.order))
            });
            (format!("{}++", ids[0]), Matches::Products(hits))
        }
    };

    tracing::debug!(
        dimension = %query.dimension,
        policy = %query.policy,
        matched = matches.len(),
        "query selected entries"
    );

    Ok(QueryOutcome {
        dimension: query.dimension,
        policy: query.policy,
        selector_label,
        matches,
    })
}
