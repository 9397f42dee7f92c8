use crate::ids::{MemberId, TermId};
use serde::{Deserialize, Serialize};

/// Computed scoring output for one (member, term). Derived data: always
/// regenerable from the fact tables, never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingResult {
    pub member_id: MemberId,
    pub term: TermId,
    pub production_score: f64,
    pub control_score: f64,
    pub engagement_score: f64,
    pub base_score: f64,
    pub role_multiplier: f64,
    pub attendance_penalty: f64,
    pub final_score: f64,
    /// 1-based position after the deterministic descending sort.
    pub rank: u32,
    /// The member had no activity row and was scored from all-zero facts.
    pub zero_filled: bool,
    /// At least one indicator's population statistics were computed from
    /// fewer than the minimum threshold of non-zero members.
    pub low_confidence: bool,
}
