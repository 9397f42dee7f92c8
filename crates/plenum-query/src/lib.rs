// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Evidence drill-down: paginated per-member, per-category lookups backing
//! a ranking's numbers with the raw records behind them. Amendments are
//! served from the indexed association table; the other categories re-stream
//! the term's activities source on demand.

mod evidence;

use plenum_model::MachineError;
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "plenum-query";

pub use evidence::{get_evidence, EvidencePage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum QueryErrorCode {
    /// The category name is not one of the served evidence categories.
    InvalidCategory,
    /// The member id does not exist in the fact store.
    MemberNotFound,
    Sql,
    /// The dataset source backing a streamed category failed to resolve or
    /// decode.
    Source,
}

impl QueryErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidCategory => "invalid_category",
            Self::MemberNotFound => "member_not_found",
            Self::Sql => "sql",
            Self::Source => "source",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryError {
    pub code: QueryErrorCode,
    pub message: String,
}

impl QueryError {
    #[must_use]
    pub fn new(code: QueryErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn sql(e: rusqlite::Error) -> Self {
        Self::new(QueryErrorCode::Sql, e.to_string())
    }

    pub(crate) fn source(e: plenum_ingest::IngestError) -> Self {
        Self::new(QueryErrorCode::Source, e.to_string())
    }

    #[must_use]
    pub fn to_machine(&self) -> MachineError {
        MachineError::new(self.code.as_str(), &self.message)
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for QueryError {}
