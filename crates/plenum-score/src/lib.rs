// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Scoring engine: whole-population distribution bounds per (term,
//! indicator), outlier-bounded bucket scores, and the layered aggregation
//! that produces a reproducible ranking. Read-only against the fact tables;
//! sole writer of `rankings`.

mod aggregate;
mod normalize;
mod stats;

use plenum_model::MachineError;
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "plenum-score";

pub use aggregate::{compute_term_stats, score_all, score_member, MemberFacts, TermStats};
pub use normalize::{clamp_to_fences, indicator_score, Normalized};
pub use stats::{population_stats, IndicatorStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreErrorCode {
    Sql,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreError {
    pub code: ScoreErrorCode,
    pub message: String,
}

impl ScoreError {
    #[must_use]
    pub fn new(code: ScoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn sql(e: rusqlite::Error) -> Self {
        Self::new(ScoreErrorCode::Sql, e.to_string())
    }

    #[must_use]
    pub fn to_machine(&self) -> MachineError {
        let code = match self.code {
            ScoreErrorCode::Sql => "sql",
            ScoreErrorCode::Config => "config",
        };
        MachineError::new(code, &self.message)
    }
}

impl Display for ScoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl std::error::Error for ScoreError {}
