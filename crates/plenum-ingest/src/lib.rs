// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Offline refresh pipeline: resolve dataset sources, stream-decode record
//! arrays, and rebuild the relational fact store one term at a time. This
//! crate is the only writer of the member/activity/amendment/role tables.

mod builder;
mod logging;
mod resolve;
mod store;
mod stream;

use plenum_model::MachineError;
use std::fmt::{Display, Formatter};

pub const CRATE_NAME: &str = "plenum-ingest";

pub use builder::{
    ingest_roster, ingest_term, run_refresh, IngestOptions, RefreshSummary, RosterSummary,
    TermSummary, BATCH_SIZE,
};
pub use logging::{IngestEvent, IngestLog, IngestStage};
pub use resolve::resolve_source;
pub use store::{open_store, rebuild_indices, SCHEMA_VERSION};
pub use stream::{decode_record, open_record_stream, RecordStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum IngestErrorCode {
    /// Neither the compressed nor the plain dataset variant resolves.
    /// Fatal for the refresh; the previous fact store stays authoritative.
    SourceNotFound,
    /// The file as a whole is not a valid record array.
    MalformedStream,
    /// One element failed typed decoding; skippable per caller policy.
    MalformedRecord,
    Sql,
    Io,
    Config,
}

impl IngestErrorCode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SourceNotFound => "source_not_found",
            Self::MalformedStream => "malformed_stream",
            Self::MalformedRecord => "malformed_record",
            Self::Sql => "sql",
            Self::Io => "io",
            Self::Config => "config",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestError {
    pub code: IngestErrorCode,
    pub message: String,
}

impl IngestError {
    #[must_use]
    pub fn new(code: IngestErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn sql(e: rusqlite::Error) -> Self {
        Self::new(IngestErrorCode::Sql, e.to_string())
    }

    pub(crate) fn io(e: std::io::Error) -> Self {
        Self::new(IngestErrorCode::Io, e.to_string())
    }

    #[must_use]
    pub fn to_machine(&self) -> MachineError {
        MachineError::new(self.code.as_str(), &self.message)
    }
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for IngestError {}
