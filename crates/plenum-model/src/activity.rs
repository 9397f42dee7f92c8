// SPDX-License-Identifier: Apache-2.0

use crate::ids::{MemberId, TermId};
use crate::r#ref::MemberRef;
use serde::{Deserialize, Serialize};

/// One countable activity type scored through the outlier-bounded bucket
/// tables before aggregation. Report and opinion counts are weighted raw in
/// the aggregator and are not bucketed, so they are not indicators here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum Indicator {
    Amendments,
    WrittenQuestions,
    OralQuestions,
    Explanations,
    Speeches,
    Motions,
}

pub const ALL_INDICATORS: [Indicator; 6] = [
    Indicator::Amendments,
    Indicator::WrittenQuestions,
    Indicator::OralQuestions,
    Indicator::Explanations,
    Indicator::Speeches,
    Indicator::Motions,
];

impl Indicator {
    /// Column of the `activities` table holding this indicator's count.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Amendments => "amendments",
            Self::WrittenQuestions => "written_questions",
            Self::OralQuestions => "oral_questions",
            Self::Explanations => "explanations",
            Self::Speeches => "speeches",
            Self::Motions => "motions",
        }
    }

    /// Whether a count of exactly zero is a meaningful "did nothing" case
    /// that gets its own score-0 bucket.
    #[must_use]
    pub const fn supports_zero_bucket(self) -> bool {
        match self {
            Self::WrittenQuestions | Self::OralQuestions | Self::Explanations | Self::Motions => {
                true
            }
            Self::Amendments | Self::Speeches => false,
        }
    }
}

/// One row per (member, term): integer counts for every tracked indicator
/// plus roll-call attendance. Missing source values are stored as zero,
/// never null, so population statistics are well-defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityFact {
    pub member_id: MemberId,
    pub term: TermId,
    pub amendments: u64,
    pub written_questions: u64,
    pub oral_questions: u64,
    pub explanations: u64,
    pub speeches: u64,
    pub motions: u64,
    pub reports_rapporteur: u64,
    pub reports_shadow: u64,
    pub opinions_rapporteur: u64,
    pub opinions_shadow: u64,
    pub votes_attended: u64,
    pub votes_total: u64,
}

impl ActivityFact {
    /// All-zero facts for a member with no activity row. Used when scoring
    /// must proceed without aborting the batch.
    #[must_use]
    pub fn zeroed(member_id: MemberId, term: TermId) -> Self {
        Self {
            member_id,
            term,
            amendments: 0,
            written_questions: 0,
            oral_questions: 0,
            explanations: 0,
            speeches: 0,
            motions: 0,
            reports_rapporteur: 0,
            reports_shadow: 0,
            opinions_rapporteur: 0,
            opinions_shadow: 0,
            votes_attended: 0,
            votes_total: 0,
        }
    }

    #[must_use]
    pub fn indicator_count(&self, indicator: Indicator) -> u64 {
        match indicator {
            Indicator::Amendments => self.amendments,
            Indicator::WrittenQuestions => self.written_questions,
            Indicator::OralQuestions => self.oral_questions,
            Indicator::Explanations => self.explanations,
            Indicator::Speeches => self.speeches,
            Indicator::Motions => self.motions,
        }
    }
}

/// One underlying raw record justifying an indicator's count: a dated item
/// surfaced by the evidence drill-down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub date: String,
    pub title: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub src: Option<String>,
}

/// Source shape of one per-member activity record. The five evidence-bearing
/// categories arrive as item lists; their counts are the list lengths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub member: MemberRef,
    #[serde(default)]
    pub written_questions: Vec<EvidenceItem>,
    #[serde(default)]
    pub oral_questions: Vec<EvidenceItem>,
    #[serde(default)]
    pub explanations: Vec<EvidenceItem>,
    #[serde(default)]
    pub speeches: Vec<EvidenceItem>,
    #[serde(default)]
    pub motions: Vec<EvidenceItem>,
    #[serde(default)]
    pub reports_rapporteur: u64,
    #[serde(default)]
    pub reports_shadow: u64,
    #[serde(default)]
    pub opinions_rapporteur: u64,
    #[serde(default)]
    pub opinions_shadow: u64,
    #[serde(default)]
    pub votes_attended: u64,
    #[serde(default)]
    pub votes_total: u64,
}

impl ActivityRecord {
    #[must_use]
    pub fn category_items(&self, category: EvidenceCategory) -> Option<&[EvidenceItem]> {
        match category {
            EvidenceCategory::WrittenQuestions => Some(&self.written_questions),
            EvidenceCategory::OralQuestions => Some(&self.oral_questions),
            EvidenceCategory::Explanations => Some(&self.explanations),
            EvidenceCategory::Speeches => Some(&self.speeches),
            EvidenceCategory::Motions => Some(&self.motions),
            EvidenceCategory::Amendments => None,
        }
    }
}

/// Categories the evidence drill-down accepts. Amendments are served from
/// the indexed association table; the rest from the activities source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum EvidenceCategory {
    Amendments,
    WrittenQuestions,
    OralQuestions,
    Explanations,
    Speeches,
    Motions,
}

impl EvidenceCategory {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Amendments => "amendments",
            Self::WrittenQuestions => "written_questions",
            Self::OralQuestions => "oral_questions",
            Self::Explanations => "explanations",
            Self::Speeches => "speeches",
            Self::Motions => "motions",
        }
    }

    #[must_use]
    pub fn from_str_opt(raw: &str) -> Option<Self> {
        match raw {
            "amendments" => Some(Self::Amendments),
            "written_questions" => Some(Self::WrittenQuestions),
            "oral_questions" => Some(Self::OralQuestions),
            "explanations" => Some(Self::Explanations),
            "speeches" => Some(Self::Speeches),
            "motions" => Some(Self::Motions),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ActivityRecord, EvidenceCategory, Indicator, ALL_INDICATORS};

    #[test]
    fn indicator_columns_are_distinct() {
        let mut cols: Vec<&str> = ALL_INDICATORS.iter().map(|i| i.column()).collect();
        cols.sort_unstable();
        cols.dedup();
        assert_eq!(cols.len(), ALL_INDICATORS.len());
    }

    #[test]
    fn activity_record_zero_fills_missing_fields() {
        let rec: ActivityRecord = serde_json::from_str(r#"{"member": 124936}"#).expect("record");
        assert_eq!(rec.reports_rapporteur, 0);
        assert_eq!(rec.votes_total, 0);
        assert!(rec.speeches.is_empty());
    }

    #[test]
    fn activity_records_compare_across_member_ref_shapes() {
        // Nested refs hold opaque JSON, so record equality is partial only.
        let a: ActivityRecord =
            serde_json::from_str(r#"{"member": {"mep_id": 7}}"#).expect("record");
        let b = a.clone();
        assert_eq!(a, b);
        let c: ActivityRecord = serde_json::from_str(r#"{"member": 7}"#).expect("record");
        assert_ne!(a, c);
    }

    #[test]
    fn evidence_category_parses_known_names_only() {
        assert_eq!(
            EvidenceCategory::from_str_opt("speeches"),
            Some(EvidenceCategory::Speeches)
        );
        assert_eq!(EvidenceCategory::from_str_opt("handshakes"), None);
    }

    #[test]
    fn zero_bucket_support_matches_question_like_indicators() {
        assert!(Indicator::WrittenQuestions.supports_zero_bucket());
        assert!(!Indicator::Amendments.supports_zero_bucket());
    }
}
