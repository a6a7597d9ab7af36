//! Rank aggregation.
//!
//! Minimum, maximum and mean rank are derived from a term's per-date rank
//! sequence and cached on its [`SearchTermRecord`]. Each field is filled only
//! while it is `None`; a cached value (zero included) is never recomputed
//! until the record's aggregates are cleared.

use serde::{Deserialize, Serialize};

use crate::models::SearchTermRecord;

/// The three aggregates computed together from one rank sequence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankStats {
    pub min: i64,
    pub max: i64,
    pub avg: f64,
}

impl RankStats {
    /// Aggregate `ranks`. `None` for an empty sequence.
    pub fn from_ranks(ranks: &[i64]) -> Option<Self> {
        let min = *ranks.iter().min()?;
        let max = *ranks.iter().max()?;
        let sum: i128 = ranks.iter().map(|r| i128::from(*r)).sum();
        Some(Self {
            min,
            max,
            avg: sum as f64 / ranks.len() as f64,
        })
    }
}

/// Fill any unset aggregate on `record`.
///
/// Returns `true` when at least one field was computed by this call.
pub fn ensure_rank_stats(record: &mut SearchTermRecord) -> bool {
    if record.min_rank.is_some() && record.avg_rank.is_some() && record.max_rank.is_some() {
        return false;
    }
    let Some(stats) = RankStats::from_ranks(&record.ranks()) else {
        return false;
    };
    apply_stats(record, stats)
}

/// Copy `stats` into whichever aggregate fields of `record` are still unset.
pub fn apply_stats(record: &mut SearchTermRecord, stats: RankStats) -> bool {
    let mut computed = false;
    if record.min_rank.is_none() {
        record.min_rank = Some(stats.min);
        computed = true;
    }
    if record.avg_rank.is_none() {
        record.avg_rank = Some(stats.avg);
        computed = true;
    }
    if record.max_rank.is_none() {
        record.max_rank = Some(stats.max);
        computed = true;
    }
    computed
}

/// The cached aggregates of `record`, if all three are set.
pub fn cached_stats(record: &SearchTermRecord) -> Option<RankStats> {
    Some(RankStats {
        min: record.min_rank?,
        max: record.max_rank?,
        avg: record.avg_rank?,
    })
}
