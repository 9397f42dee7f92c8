// SPDX-License-Identifier: Apache-2.0

use crate::ScoreError;
use plenum_model::{Indicator, TermId, FENCE_K};
use rusqlite::Connection;

/// Distribution bounds for one (term, indicator) over the full population,
/// zero counts included. Computed once per scoring pass and passed into
/// per-member scoring; recomputing per member is the anti-pattern this type
/// exists to prevent.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorStats {
    pub term: TermId,
    pub indicator: Indicator,
    /// Raw per-member counts, ascending.
    pub counts: Vec<u64>,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower_fence: f64,
    pub upper_fence: f64,
    /// Fewer than the configured minimum of members had a non-zero count;
    /// the bounds are still computed but flagged low-confidence.
    pub low_confidence: bool,
}

/// Whole-population scan for one indicator in one term.
pub fn population_stats(
    conn: &Connection,
    term: TermId,
    indicator: Indicator,
    min_population: usize,
) -> Result<IndicatorStats, ScoreError> {
    // Column names come from the closed indicator enum, never from input.
    let sql = format!(
        "SELECT {} FROM activities WHERE term = ?1 ORDER BY member_id",
        indicator.column()
    );
    let mut stmt = conn.prepare_cached(&sql).map_err(ScoreError::sql)?;
    let mut counts = stmt
        .query_map([term.as_i64()], |row| row.get::<_, i64>(0))
        .map_err(ScoreError::sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ScoreError::sql)?
        .into_iter()
        .map(|c| c.max(0) as u64)
        .collect::<Vec<_>>();
    counts.sort_unstable();

    Ok(stats_from_sorted_counts(term, indicator, counts, min_population))
}

pub(crate) fn stats_from_sorted_counts(
    term: TermId,
    indicator: Indicator,
    counts: Vec<u64>,
    min_population: usize,
) -> IndicatorStats {
    let median = median_of(&counts);
    let (q1, q3) = quartiles(&counts);
    let iqr = q3 - q1;
    let non_zero = counts.iter().filter(|&&c| c > 0).count();
    IndicatorStats {
        term,
        indicator,
        median,
        q1,
        q3,
        iqr,
        lower_fence: q1 - FENCE_K * iqr,
        upper_fence: q3 + FENCE_K * iqr,
        low_confidence: non_zero < min_population,
        counts,
    }
}

fn median_of(sorted: &[u64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return 0.0;
    }
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Tukey median-of-halves: the lower half is everything below the median
/// position, the upper half everything above it (the median element itself
/// is excluded for odd-sized populations).
fn quartiles(sorted: &[u64]) -> (f64, f64) {
    let n = sorted.len();
    if n < 2 {
        let m = median_of(sorted);
        return (m, m);
    }
    let lower = &sorted[..n / 2];
    let upper = &sorted[(n + 1) / 2..];
    (median_of(lower), median_of(upper))
}
