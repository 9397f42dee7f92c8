use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError(pub String);

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for ValidationError {}

pub const TERM_MIN: u8 = 1;
pub const TERM_MAX: u8 = 99;

/// Stable numeric identifier of a member, assigned by the upstream register.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MemberId(u64);

impl MemberId {
    pub fn parse(raw: u64) -> Result<Self, ValidationError> {
        if raw == 0 {
            return Err(ValidationError(
                "member id must be a positive integer".to_string(),
            ));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for MemberId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One fixed parliamentary mandate, e.g. term 9 (2019-2024). The primary
/// partition key for all facts and statistics.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TermId(u8);

impl TermId {
    pub fn parse(raw: u8) -> Result<Self, ValidationError> {
        if !(TERM_MIN..=TERM_MAX).contains(&raw) {
            return Err(ValidationError(format!(
                "term must be in {TERM_MIN}..={TERM_MAX}, got {raw}"
            )));
        }
        Ok(Self(raw))
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn as_i64(self) -> i64 {
        self.0 as i64
    }
}

impl Display for TermId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Calendar year range used to bucket undated-by-term records into the
/// correct term when the source does not pre-partition them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermSpan {
    pub term: TermId,
    pub start_year: u16,
    pub end_year: u16,
}

impl TermSpan {
    pub fn new(term: TermId, start_year: u16, end_year: u16) -> Result<Self, ValidationError> {
        if end_year < start_year {
            return Err(ValidationError(format!(
                "term span end year {end_year} precedes start year {start_year}"
            )));
        }
        Ok(Self {
            term,
            start_year,
            end_year,
        })
    }

    #[must_use]
    pub fn contains_year(&self, year: u16) -> bool {
        (self.start_year..=self.end_year).contains(&year)
    }
}
