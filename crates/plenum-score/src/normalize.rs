// SPDX-License-Identifier: Apache-2.0

use crate::stats::IndicatorStats;
use plenum_model::BucketTable;

/// A raw count bounded into the term/indicator's fences. `clamped` lets a
/// caller observe that the raw value was an outlier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalized {
    pub value: f64,
    pub clamped: bool,
}

/// Clamp a raw count into `[lower_fence, upper_fence]`, inclusive.
#[must_use]
pub fn clamp_to_fences(raw: u64, stats: &IndicatorStats) -> Normalized {
    let v = raw as f64;
    let bounded = v.clamp(stats.lower_fence, stats.upper_fence);
    Normalized {
        value: bounded,
        clamped: bounded != v,
    }
}

/// Discrete bucket score for a raw count: clamp to the fences, then walk the
/// term/indicator's bucket table ascending, first match wins. A raw count of
/// exactly zero keeps its dedicated score-0 bucket for indicators with a
/// "did nothing" case, even when the lower fence sits above zero.
#[must_use]
pub fn indicator_score(raw: u64, stats: &IndicatorStats, table: &BucketTable) -> u32 {
    if raw == 0 && stats.indicator.supports_zero_bucket() {
        return 0;
    }
    table.score(clamp_to_fences(raw, stats).value)
}
