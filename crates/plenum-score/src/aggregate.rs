// SPDX-License-Identifier: Apache-2.0

use crate::normalize::indicator_score;
use crate::stats::{population_stats, IndicatorStats};
use crate::{ScoreError, ScoreErrorCode};
use plenum_model::{
    ActivityFact, Indicator, MemberId, RankingResult, RoleFact, RoleType, ScoringConfig, TermId,
    ALL_INDICATORS,
};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

/// Immutable per-term statistics table: the synchronization point before
/// per-member scoring fans out.
#[derive(Debug, Clone)]
pub struct TermStats {
    pub term: TermId,
    by_indicator: BTreeMap<Indicator, IndicatorStats>,
}

impl TermStats {
    pub fn get(&self, indicator: Indicator) -> Result<&IndicatorStats, ScoreError> {
        self.by_indicator.get(&indicator).ok_or_else(|| {
            ScoreError::new(
                ScoreErrorCode::Config,
                format!("no statistics computed for {}", indicator.column()),
            )
        })
    }

    #[must_use]
    pub fn any_low_confidence(&self) -> bool {
        self.by_indicator.values().any(|s| s.low_confidence)
    }
}

/// Compute distribution bounds for every indicator of a term, once.
pub fn compute_term_stats(
    conn: &Connection,
    term: TermId,
    config: &ScoringConfig,
) -> Result<TermStats, ScoreError> {
    let mut by_indicator = BTreeMap::new();
    for indicator in ALL_INDICATORS {
        by_indicator.insert(
            indicator,
            population_stats(conn, term, indicator, config.min_population)?,
        );
    }
    Ok(TermStats { term, by_indicator })
}

/// Everything one member contributes to scoring.
#[derive(Debug, Clone)]
pub struct MemberFacts {
    pub activity: ActivityFact,
    pub roles: Vec<RoleFact>,
    /// The member had no activity row; scoring proceeds from all-zero facts.
    pub zero_filled: bool,
}

/// Pure per-member scoring: no suspension points, no store access. The rank
/// field is assigned by `score_all` after the deterministic sort.
pub fn score_member(
    facts: &MemberFacts,
    config: &ScoringConfig,
    stats: &TermStats,
) -> Result<RankingResult, ScoreError> {
    let a = &facts.activity;

    let mut scores: BTreeMap<Indicator, u32> = BTreeMap::new();
    for indicator in ALL_INDICATORS {
        let table = config
            .bucket_table(indicator)
            .map_err(|e| ScoreError::new(ScoreErrorCode::Config, e.to_string()))?;
        scores.insert(
            indicator,
            indicator_score(a.indicator_count(indicator), stats.get(indicator)?, table),
        );
    }

    let w = &config.report_weights;
    let production_score = a.reports_rapporteur as f64 * w.report_rapporteur
        + a.reports_shadow as f64 * w.report_shadow
        + a.opinions_rapporteur as f64 * w.opinion_rapporteur
        + a.opinions_shadow as f64 * w.opinion_shadow
        + scores[&Indicator::Amendments] as f64;
    let control_score = (scores[&Indicator::WrittenQuestions]
        + scores[&Indicator::OralQuestions]
        + scores[&Indicator::Explanations]) as f64;
    let engagement_score = (scores[&Indicator::Speeches] + scores[&Indicator::Motions]) as f64;
    let base_score = production_score + control_score + engagement_score;

    let role_multiplier = 1.0 + config.best_role_bonus(&facts.roles);

    let attendance_penalty = if config.is_attendance_exempt(&facts.roles) {
        1.0
    } else {
        let rate = if a.votes_total == 0 {
            0.0
        } else {
            a.votes_attended as f64 / a.votes_total as f64
        };
        config.attendance.penalty(rate)
    };

    Ok(RankingResult {
        member_id: a.member_id,
        term: a.term,
        production_score,
        control_score,
        engagement_score,
        base_score,
        role_multiplier,
        attendance_penalty,
        final_score: base_score * role_multiplier * attendance_penalty,
        rank: 0,
        zero_filled: facts.zero_filled,
        low_confidence: stats.any_low_confidence(),
    })
}

/// Score every member of a term and replace the term's `rankings` rows.
/// Members are scored in ascending id order, then stably sorted by final
/// score descending, so tie order is identical across reruns.
pub fn score_all(
    conn: &mut Connection,
    term: TermId,
    config: &ScoringConfig,
) -> Result<Vec<RankingResult>, ScoreError> {
    if config.term != term {
        return Err(ScoreError::new(
            ScoreErrorCode::Config,
            format!("config is versioned for term {}, not {term}", config.term),
        ));
    }

    let stats = compute_term_stats(conn, term, config)?;
    let member_ids = all_member_ids(conn)?;
    let mut activities = load_activities(conn, term)?;
    let mut roles = load_roles(conn, term)?;

    let mut results = Vec::with_capacity(member_ids.len());
    for member_id in member_ids {
        let (activity, zero_filled) = match activities.remove(&member_id) {
            Some(fact) => (fact, false),
            None => {
                tracing::warn!(member = %member_id, term = %term, "missing activity row, scoring all-zero facts");
                (ActivityFact::zeroed(member_id, term), true)
            }
        };
        let facts = MemberFacts {
            activity,
            roles: roles.remove(&member_id).unwrap_or_default(),
            zero_filled,
        };
        results.push(score_member(&facts, config, &stats)?);
    }

    // Stable sort over the ascending-id order established above.
    results.sort_by(|a, b| b.final_score.total_cmp(&a.final_score));
    for (position, result) in results.iter_mut().enumerate() {
        result.rank = (position + 1) as u32;
    }

    write_rankings(conn, term, &results)?;
    Ok(results)
}

fn all_member_ids(conn: &Connection) -> Result<Vec<MemberId>, ScoreError> {
    let mut stmt = conn
        .prepare_cached("SELECT id FROM members ORDER BY id")
        .map_err(ScoreError::sql)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(ScoreError::sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ScoreError::sql)?;
    ids.into_iter()
        .map(|id| {
            MemberId::parse(id.max(0) as u64)
                .map_err(|e| ScoreError::new(ScoreErrorCode::Sql, e.to_string()))
        })
        .collect()
}

fn load_activities(
    conn: &Connection,
    term: TermId,
) -> Result<BTreeMap<MemberId, ActivityFact>, ScoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT member_id, amendments, written_questions, oral_questions, explanations,
                    speeches, motions, reports_rapporteur, reports_shadow,
                    opinions_rapporteur, opinions_shadow, votes_attended, votes_total
             FROM activities WHERE term = ?1 ORDER BY member_id",
        )
        .map_err(ScoreError::sql)?;
    let rows = stmt
        .query_map([term.as_i64()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                [
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, i64>(11)?,
                    row.get::<_, i64>(12)?,
                ],
            ))
        })
        .map_err(ScoreError::sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ScoreError::sql)?;

    let mut out = BTreeMap::new();
    for (raw_id, c) in rows {
        let member_id = MemberId::parse(raw_id.max(0) as u64)
            .map_err(|e| ScoreError::new(ScoreErrorCode::Sql, e.to_string()))?;
        let count = |v: i64| v.max(0) as u64;
        out.insert(
            member_id,
            ActivityFact {
                member_id,
                term,
                amendments: count(c[0]),
                written_questions: count(c[1]),
                oral_questions: count(c[2]),
                explanations: count(c[3]),
                speeches: count(c[4]),
                motions: count(c[5]),
                reports_rapporteur: count(c[6]),
                reports_shadow: count(c[7]),
                opinions_rapporteur: count(c[8]),
                opinions_shadow: count(c[9]),
                votes_attended: count(c[10]),
                votes_total: count(c[11]),
            },
        );
    }
    Ok(out)
}

fn load_roles(
    conn: &Connection,
    term: TermId,
) -> Result<BTreeMap<MemberId, Vec<RoleFact>>, ScoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT member_id, role_type, role_name, body FROM roles
             WHERE term = ?1 ORDER BY member_id, role_type, role_name",
        )
        .map_err(ScoreError::sql)?;
    let rows = stmt
        .query_map([term.as_i64()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .map_err(ScoreError::sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(ScoreError::sql)?;

    let mut out: BTreeMap<MemberId, Vec<RoleFact>> = BTreeMap::new();
    for (raw_id, role_type, role_name, body) in rows {
        let member_id = MemberId::parse(raw_id.max(0) as u64)
            .map_err(|e| ScoreError::new(ScoreErrorCode::Sql, e.to_string()))?;
        // Unknown role types in the store are ignored rather than fatal.
        let Some(role_type) = RoleType::from_str_opt(&role_type) else {
            continue;
        };
        out.entry(member_id).or_default().push(RoleFact {
            member_id,
            term,
            role_type,
            role_name,
            body,
        });
    }
    Ok(out)
}

fn write_rankings(
    conn: &mut Connection,
    term: TermId,
    results: &[RankingResult],
) -> Result<(), ScoreError> {
    let tx = conn.transaction().map_err(ScoreError::sql)?;
    tx.execute(
        "DELETE FROM rankings WHERE term = ?1",
        params![term.as_i64()],
    )
    .map_err(ScoreError::sql)?;
    {
        let mut stmt = tx
            .prepare_cached(
                "INSERT INTO rankings (
                   member_id, term, production_score, control_score, engagement_score,
                   base_score, role_multiplier, attendance_penalty, final_score, rank,
                   zero_filled, low_confidence
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )
            .map_err(ScoreError::sql)?;
        for r in results {
            stmt.execute(params![
                r.member_id.as_u64() as i64,
                term.as_i64(),
                r.production_score,
                r.control_score,
                r.engagement_score,
                r.base_score,
                r.role_multiplier,
                r.attendance_penalty,
                r.final_score,
                r.rank,
                r.zero_filled as i64,
                r.low_confidence as i64
            ])
            .map_err(ScoreError::sql)?;
        }
    }
    tx.commit().map_err(ScoreError::sql)
}
