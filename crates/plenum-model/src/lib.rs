// SPDX-License-Identifier: Apache-2.0

#![forbid(unsafe_code)]

//! Domain types for the parliamentary-activity fact store: validated ids,
//! fact rows, source-record shapes, member-reference normalization, dataset
//! file layout, and the versioned per-term scoring configuration.

mod activity;
mod amendment;
mod config;
mod error;
mod ids;
mod layout;
mod member;
mod ranking;
mod r#ref;

pub const CRATE_NAME: &str = "plenum-model";

pub use activity::{
    ActivityFact, ActivityRecord, EvidenceCategory, EvidenceItem, Indicator, ALL_INDICATORS,
};
pub use amendment::AmendmentRecord;
pub use config::{
    AttendanceTiers, BonusProvenance, Bucket, BucketTable, ReportWeights, RoleBonus,
    ScoringConfig, DEFAULT_MIN_POPULATION, FENCE_K,
};
pub use error::MachineError;
pub use ids::{MemberId, TermId, TermSpan, ValidationError, TERM_MAX, TERM_MIN};
pub use layout::DatasetLayout;
pub use member::{Member, RoleFact, RoleRecord, RoleType, RosterRecord};
pub use ranking::RankingResult;
pub use r#ref::{MemberRef, MEMBER_REF_KEYS};
