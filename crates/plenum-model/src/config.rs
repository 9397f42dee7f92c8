// SPDX-License-Identifier: Apache-2.0

use crate::activity::{Indicator, ALL_INDICATORS};
use crate::ids::{TermId, ValidationError};
use crate::member::{RoleFact, RoleType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fence constant for the IQR outlier bounds (Q1 - k*IQR, Q3 + k*IQR).
pub const FENCE_K: f64 = 1.5;

/// Minimum number of members with a non-zero count before a (term,
/// indicator) distribution is considered full-confidence.
pub const DEFAULT_MIN_POPULATION: usize = 10;

/// One inclusive bucket of the per-(term, indicator) score table. Buckets
/// are evaluated in ascending order and the first match wins, so a value on
/// a shared edge resolves to the lower-numbered bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub lo: u64,
    /// Inclusive upper edge; `None` marks the open-ended final bucket.
    pub hi: Option<u64>,
    pub score: u32,
}

/// Ascending, first-match-wins bucket table. Edges are configuration data
/// versioned with the term they apply to, never computed from the data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Bucket>", into = "Vec<Bucket>")]
pub struct BucketTable {
    buckets: Vec<Bucket>,
}

impl BucketTable {
    pub fn new(buckets: Vec<Bucket>) -> Result<Self, ValidationError> {
        if buckets.is_empty() {
            return Err(ValidationError("bucket table must not be empty".to_string()));
        }
        if buckets[0].lo != 0 {
            return Err(ValidationError(
                "bucket table must cover values from zero".to_string(),
            ));
        }
        for pair in buckets.windows(2) {
            let hi = pair[0].hi.ok_or_else(|| {
                ValidationError("only the final bucket may be open-ended".to_string())
            })?;
            if hi < pair[0].lo {
                return Err(ValidationError(format!(
                    "bucket upper edge {hi} precedes lower edge {}",
                    pair[0].lo
                )));
            }
            if pair[1].lo > hi.saturating_add(1) {
                return Err(ValidationError(format!(
                    "gap between bucket edge {hi} and next lower edge {}",
                    pair[1].lo
                )));
            }
            if pair[1].score < pair[0].score {
                return Err(ValidationError(
                    "bucket scores must be non-decreasing".to_string(),
                ));
            }
        }
        if buckets[buckets.len() - 1].hi.is_some() {
            return Err(ValidationError(
                "final bucket must be open-ended".to_string(),
            ));
        }
        Ok(Self { buckets })
    }

    /// First-match bucket score for a (possibly fence-clamped) value.
    /// Fractional values land in the bucket whose inclusive range contains
    /// them after comparing against integer edges as reals.
    #[must_use]
    pub fn score(&self, value: f64) -> u32 {
        let v = value.max(0.0);
        for bucket in &self.buckets {
            let above = v >= bucket.lo as f64;
            let below = bucket.hi.map_or(true, |hi| v <= hi as f64);
            if above && below {
                return bucket.score;
            }
        }
        // Full coverage is enforced at construction; a fractional value in a
        // unit gap between buckets rounds down to the preceding bucket.
        self.buckets
            .iter()
            .rev()
            .find(|b| v >= b.lo as f64)
            .map_or(0, |b| b.score)
    }

    #[must_use]
    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }
}

impl TryFrom<Vec<Bucket>> for BucketTable {
    type Error = ValidationError;
    fn try_from(buckets: Vec<Bucket>) -> Result<Self, ValidationError> {
        Self::new(buckets)
    }
}

impl From<BucketTable> for Vec<Bucket> {
    fn from(table: BucketTable) -> Self {
        table.buckets
    }
}

/// Whether a role coefficient comes from the documented methodology or is an
/// estimate for a role lacking an official value. Estimated entries stay
/// separately labeled and individually overridable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum BonusProvenance {
    Documented,
    Estimated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleBonus {
    pub role_type: RoleType,
    pub role_name: String,
    pub bonus: f64,
    pub provenance: BonusProvenance,
    /// Chamber chair/vice-chair cannot vote while presiding, so low
    /// attendance is not a performance signal for them.
    #[serde(default)]
    pub exempt_from_attendance: bool,
}

/// Attendance penalty tiers, evaluated most-severe-first.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttendanceTiers {
    pub severe_below: f64,
    pub severe_penalty: f64,
    pub reduced_below: f64,
    pub reduced_penalty: f64,
}

impl AttendanceTiers {
    #[must_use]
    pub fn penalty(&self, rate: f64) -> f64 {
        if rate < self.severe_below {
            self.severe_penalty
        } else if rate < self.reduced_below {
            self.reduced_penalty
        } else {
            1.0
        }
    }
}

impl Default for AttendanceTiers {
    fn default() -> Self {
        Self {
            severe_below: 0.55,
            severe_penalty: 0.5,
            reduced_below: 0.75,
            reduced_penalty: 0.75,
        }
    }
}

/// Fixed weights applied to raw report/opinion counts in the Legislative
/// Production category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReportWeights {
    pub report_rapporteur: f64,
    pub report_shadow: f64,
    pub opinion_rapporteur: f64,
    pub opinion_shadow: f64,
}

impl Default for ReportWeights {
    fn default() -> Self {
        Self {
            report_rapporteur: 3.0,
            report_shadow: 1.5,
            opinion_rapporteur: 1.0,
            opinion_shadow: 0.5,
        }
    }
}

/// Immutable scoring configuration for one term: loaded once at process
/// start and passed explicitly into the normalizer and aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub term: TermId,
    pub version: String,
    pub buckets: BTreeMap<Indicator, BucketTable>,
    #[serde(default)]
    pub report_weights: ReportWeights,
    pub role_bonuses: Vec<RoleBonus>,
    #[serde(default)]
    pub attendance: AttendanceTiers,
    #[serde(default = "default_min_population")]
    pub min_population: usize,
}

fn default_min_population() -> usize {
    DEFAULT_MIN_POPULATION
}

impl ScoringConfig {
    /// Built-in configuration for a supported term. Bucket edges differ per
    /// term because legislative volumes differ.
    #[must_use]
    pub fn builtin(term: TermId) -> Option<Self> {
        let buckets = match term.as_u8() {
            8 => builtin_buckets_term8(),
            9 => builtin_buckets_term9(),
            10 => builtin_buckets_term10(),
            _ => return None,
        };
        Some(Self {
            term,
            version: format!("builtin-term{}-v1", term),
            buckets,
            report_weights: ReportWeights::default(),
            role_bonuses: builtin_role_bonuses(),
            attendance: AttendanceTiers::default(),
            min_population: DEFAULT_MIN_POPULATION,
        })
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, ValidationError> {
        let cfg: Self = serde_json::from_slice(bytes)
            .map_err(|e| ValidationError(format!("scoring config decode failed: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        for indicator in ALL_INDICATORS {
            let table = self.buckets.get(&indicator).ok_or_else(|| {
                ValidationError(format!(
                    "scoring config missing bucket table for {}",
                    indicator.column()
                ))
            })?;
            let first = table.buckets()[0];
            if indicator.supports_zero_bucket()
                && !(first.lo == 0 && first.hi == Some(0) && first.score == 0)
            {
                return Err(ValidationError(format!(
                    "{} requires a dedicated zero bucket with score 0",
                    indicator.column()
                )));
            }
        }
        for w in [
            self.report_weights.report_rapporteur,
            self.report_weights.report_shadow,
            self.report_weights.opinion_rapporteur,
            self.report_weights.opinion_shadow,
        ] {
            if !w.is_finite() || w < 0.0 {
                return Err(ValidationError(
                    "report weights must be finite and non-negative".to_string(),
                ));
            }
        }
        for bonus in &self.role_bonuses {
            if !bonus.bonus.is_finite() || !(0.0..=1.0).contains(&bonus.bonus) {
                return Err(ValidationError(format!(
                    "role bonus for {}/{} must be in [0, 1]",
                    bonus.role_type.as_str(),
                    bonus.role_name
                )));
            }
        }
        Ok(())
    }

    pub fn bucket_table(&self, indicator: Indicator) -> Result<&BucketTable, ValidationError> {
        self.buckets.get(&indicator).ok_or_else(|| {
            ValidationError(format!(
                "no bucket table for indicator {}",
                indicator.column()
            ))
        })
    }

    /// Largest single role bonus among the member's roles this term; 0.0 for
    /// no matching role. Bonuses are never additive across roles.
    #[must_use]
    pub fn best_role_bonus(&self, roles: &[RoleFact]) -> f64 {
        roles
            .iter()
            .filter_map(|role| {
                self.role_bonuses
                    .iter()
                    .find(|b| b.role_type == role.role_type && b.role_name == role.role_name)
                    .map(|b| b.bonus)
            })
            .fold(0.0, f64::max)
    }

    /// Whether any of the member's roles exempts them from the attendance
    /// penalty.
    #[must_use]
    pub fn is_attendance_exempt(&self, roles: &[RoleFact]) -> bool {
        roles.iter().any(|role| {
            self.role_bonuses.iter().any(|b| {
                b.exempt_from_attendance
                    && b.role_type == role.role_type
                    && b.role_name == role.role_name
            })
        })
    }
}

fn table(edges: &[(u64, Option<u64>, u32)]) -> BucketTable {
    let buckets = edges
        .iter()
        .map(|&(lo, hi, score)| Bucket { lo, hi, score })
        .collect();
    BucketTable::new(buckets).expect("builtin bucket table")
}

fn builtin_buckets_term8() -> BTreeMap<Indicator, BucketTable> {
    BTreeMap::from([
        (
            Indicator::Amendments,
            table(&[
                (0, Some(24), 1),
                (25, Some(119), 2),
                (120, Some(349), 3),
                (350, Some(899), 4),
                (900, None, 5),
            ]),
        ),
        (
            Indicator::WrittenQuestions,
            table(&[
                (0, Some(0), 0),
                (1, Some(14), 1),
                (15, Some(59), 2),
                (60, Some(149), 3),
                (150, None, 4),
            ]),
        ),
        (
            Indicator::OralQuestions,
            table(&[(0, Some(0), 0), (1, Some(5), 1), (6, Some(19), 2), (20, None, 3)]),
        ),
        (
            Indicator::Explanations,
            table(&[
                (0, Some(0), 0),
                (1, Some(59), 1),
                (60, Some(249), 2),
                (250, None, 3),
            ]),
        ),
        (
            Indicator::Speeches,
            table(&[
                (0, Some(29), 1),
                (30, Some(119), 2),
                (120, Some(349), 3),
                (350, None, 4),
            ]),
        ),
        (
            Indicator::Motions,
            table(&[
                (0, Some(0), 0),
                (1, Some(11), 1),
                (12, Some(59), 2),
                (60, None, 3),
            ]),
        ),
    ])
}

fn builtin_buckets_term9() -> BTreeMap<Indicator, BucketTable> {
    BTreeMap::from([
        (
            Indicator::Amendments,
            table(&[
                (0, Some(19), 1),
                (20, Some(99), 2),
                (100, Some(299), 3),
                (300, Some(799), 4),
                (800, None, 5),
            ]),
        ),
        (
            Indicator::WrittenQuestions,
            table(&[
                (0, Some(0), 0),
                (1, Some(9), 1),
                (10, Some(39), 2),
                (40, Some(99), 3),
                (100, None, 4),
            ]),
        ),
        (
            Indicator::OralQuestions,
            table(&[(0, Some(0), 0), (1, Some(4), 1), (5, Some(14), 2), (15, None, 3)]),
        ),
        (
            Indicator::Explanations,
            table(&[
                (0, Some(0), 0),
                (1, Some(49), 1),
                (50, Some(199), 2),
                (200, None, 3),
            ]),
        ),
        (
            Indicator::Speeches,
            table(&[
                (0, Some(24), 1),
                (25, Some(99), 2),
                (100, Some(299), 3),
                (300, None, 4),
            ]),
        ),
        (
            Indicator::Motions,
            table(&[
                (0, Some(0), 0),
                (1, Some(9), 1),
                (10, Some(49), 2),
                (50, None, 3),
            ]),
        ),
    ])
}

fn builtin_buckets_term10() -> BTreeMap<Indicator, BucketTable> {
    // Term 10 is in progress; edges sit lower than a full mandate's.
    BTreeMap::from([
        (
            Indicator::Amendments,
            table(&[
                (0, Some(9), 1),
                (10, Some(49), 2),
                (50, Some(149), 3),
                (150, Some(399), 4),
                (400, None, 5),
            ]),
        ),
        (
            Indicator::WrittenQuestions,
            table(&[
                (0, Some(0), 0),
                (1, Some(4), 1),
                (5, Some(19), 2),
                (20, Some(49), 3),
                (50, None, 4),
            ]),
        ),
        (
            Indicator::OralQuestions,
            table(&[(0, Some(0), 0), (1, Some(2), 1), (3, Some(7), 2), (8, None, 3)]),
        ),
        (
            Indicator::Explanations,
            table(&[
                (0, Some(0), 0),
                (1, Some(24), 1),
                (25, Some(99), 2),
                (100, None, 3),
            ]),
        ),
        (
            Indicator::Speeches,
            table(&[
                (0, Some(14), 1),
                (15, Some(49), 2),
                (50, Some(149), 3),
                (150, None, 4),
            ]),
        ),
        (
            Indicator::Motions,
            table(&[
                (0, Some(0), 0),
                (1, Some(4), 1),
                (5, Some(24), 2),
                (25, None, 3),
            ]),
        ),
    ])
}

fn builtin_role_bonuses() -> Vec<RoleBonus> {
    vec![
        RoleBonus {
            role_type: RoleType::Chamber,
            role_name: "president".to_string(),
            bonus: 0.5,
            provenance: BonusProvenance::Documented,
            exempt_from_attendance: true,
        },
        RoleBonus {
            role_type: RoleType::Chamber,
            role_name: "vice_president".to_string(),
            bonus: 0.25,
            provenance: BonusProvenance::Documented,
            exempt_from_attendance: true,
        },
        RoleBonus {
            role_type: RoleType::Chamber,
            role_name: "quaestor".to_string(),
            bonus: 0.1,
            provenance: BonusProvenance::Estimated,
            exempt_from_attendance: false,
        },
        RoleBonus {
            role_type: RoleType::Committee,
            role_name: "chair".to_string(),
            bonus: 0.3,
            provenance: BonusProvenance::Documented,
            exempt_from_attendance: false,
        },
        RoleBonus {
            role_type: RoleType::Committee,
            role_name: "vice_chair".to_string(),
            bonus: 0.15,
            provenance: BonusProvenance::Estimated,
            exempt_from_attendance: false,
        },
        RoleBonus {
            role_type: RoleType::Delegation,
            role_name: "chair".to_string(),
            bonus: 0.15,
            provenance: BonusProvenance::Documented,
            exempt_from_attendance: false,
        },
        RoleBonus {
            role_type: RoleType::Delegation,
            role_name: "vice_chair".to_string(),
            bonus: 0.075,
            provenance: BonusProvenance::Estimated,
            exempt_from_attendance: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::{AttendanceTiers, Bucket, BucketTable, ScoringConfig};
    use crate::ids::{MemberId, TermId};
    use crate::member::{RoleFact, RoleType};

    fn term(n: u8) -> TermId {
        TermId::parse(n).expect("term")
    }

    #[test]
    fn builtin_configs_exist_and_validate() {
        for n in [8, 9, 10] {
            let cfg = ScoringConfig::builtin(term(n)).expect("builtin config");
            cfg.validate().expect("valid config");
        }
        assert!(ScoringConfig::builtin(term(7)).is_none());
    }

    #[test]
    fn bucket_shared_edge_resolves_to_first_match() {
        let table = BucketTable::new(vec![
            Bucket { lo: 0, hi: Some(10), score: 1 },
            Bucket { lo: 10, hi: Some(20), score: 2 },
            Bucket { lo: 21, hi: None, score: 3 },
        ])
        .expect("table");
        // 10 is on the inclusive upper edge of bucket 1 and the inclusive
        // lower edge of bucket 2; the lower-numbered bucket wins.
        assert_eq!(table.score(10.0), 1);
        assert_eq!(table.score(11.0), 2);
        assert_eq!(table.score(1_000_000.0), 3);
    }

    #[test]
    fn bucket_table_rejects_gaps_and_score_regressions() {
        assert!(BucketTable::new(vec![
            Bucket { lo: 0, hi: Some(5), score: 1 },
            Bucket { lo: 8, hi: None, score: 2 },
        ])
        .is_err());
        assert!(BucketTable::new(vec![
            Bucket { lo: 0, hi: Some(5), score: 2 },
            Bucket { lo: 6, hi: None, score: 1 },
        ])
        .is_err());
        assert!(BucketTable::new(vec![Bucket { lo: 0, hi: Some(5), score: 1 }]).is_err());
        assert!(BucketTable::new(vec![Bucket { lo: 1, hi: None, score: 1 }]).is_err());
    }

    #[test]
    fn attendance_tiers_evaluate_most_severe_first() {
        let tiers = AttendanceTiers::default();
        assert_eq!(tiers.penalty(0.40), 0.5);
        assert_eq!(tiers.penalty(0.60), 0.75);
        assert_eq!(tiers.penalty(0.80), 1.0);
        // Edge values: tiers are strict upper bounds.
        assert_eq!(tiers.penalty(0.55), 0.75);
        assert_eq!(tiers.penalty(0.75), 1.0);
    }

    #[test]
    fn role_bonus_takes_the_single_largest() {
        let cfg = ScoringConfig::builtin(term(9)).expect("config");
        let member = MemberId::parse(1).expect("id");
        let roles = vec![
            RoleFact {
                member_id: member,
                term: term(9),
                role_type: RoleType::Committee,
                role_name: "chair".to_string(),
                body: Some("ENVI".to_string()),
            },
            RoleFact {
                member_id: member,
                term: term(9),
                role_type: RoleType::Delegation,
                role_name: "chair".to_string(),
                body: None,
            },
        ];
        // 0.3 and 0.15 held together yield 0.3, never 0.45.
        assert_eq!(cfg.best_role_bonus(&roles), 0.3);
        assert!(!cfg.is_attendance_exempt(&roles));
    }

    #[test]
    fn chamber_leadership_is_attendance_exempt() {
        let cfg = ScoringConfig::builtin(term(9)).expect("config");
        let roles = vec![RoleFact {
            member_id: MemberId::parse(2).expect("id"),
            term: term(9),
            role_type: RoleType::Chamber,
            role_name: "vice_president".to_string(),
            body: None,
        }];
        assert!(cfg.is_attendance_exempt(&roles));
    }

    #[test]
    fn config_json_round_trip_preserves_tables() {
        let cfg = ScoringConfig::builtin(term(10)).expect("config");
        let bytes = serde_json::to_vec(&cfg).expect("encode");
        let back = ScoringConfig::from_json(&bytes).expect("decode");
        assert_eq!(back, cfg);
    }

    proptest::proptest! {
        #[test]
        fn builtin_tables_score_monotonically(
            v1 in 0u64..2_000_000,
            v2 in 0u64..2_000_000,
            n in proptest::sample::select(vec![8u8, 9, 10]),
        ) {
            proptest::prop_assume!(v1 <= v2);
            let cfg = ScoringConfig::builtin(term(n)).expect("config");
            for table in cfg.buckets.values() {
                proptest::prop_assert!(table.score(v1 as f64) <= table.score(v2 as f64));
            }
        }
    }
}
