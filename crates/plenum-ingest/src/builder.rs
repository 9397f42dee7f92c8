// SPDX-License-Identifier: Apache-2.0

use crate::logging::{IngestLog, IngestStage};
use crate::store::{open_store, rebuild_indices};
use crate::stream::{decode_record, open_record_stream};
use crate::{IngestError, IngestEvent};
use plenum_model::{
    ActivityRecord, AmendmentRecord, DatasetLayout, MemberId, RoleType, RosterRecord, TermId,
    TermSpan,
};
use rusqlite::{params, Connection, Transaction};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// Rows buffered per bulk-insert flush. Trades a little durability lag for a
/// large reduction in per-row write overhead.
pub const BATCH_SIZE: usize = 4096;

/// Surrogate amendment ids are `term * stride + stream ordinal`: monotonic
/// in stream order, disjoint across terms, identical across reruns of the
/// same snapshot.
const TERM_ID_STRIDE: i64 = 10_000_000;

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub layout: DatasetLayout,
    pub store_path: PathBuf,
    pub term_spans: Vec<TermSpan>,
    pub batch_size: usize,
    /// Health-check threshold: warn when more than this fraction of a term's
    /// amendments resolved zero member links. Never aborts the run.
    pub unlinked_warn_fraction: f64,
}

impl IngestOptions {
    #[must_use]
    pub fn new(layout: DatasetLayout, store_path: PathBuf, term_spans: Vec<TermSpan>) -> Self {
        Self {
            layout,
            store_path,
            term_spans,
            batch_size: BATCH_SIZE,
            unlinked_warn_fraction: 0.5,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSummary {
    pub members: u64,
    pub roles: u64,
    pub malformed_records: u64,
    pub unknown_role_types: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermSummary {
    pub term: TermId,
    pub activity_rows: u64,
    pub zero_filled_rows: u64,
    pub amendments: u64,
    pub member_links: u64,
    pub malformed_records: u64,
    pub unresolved_member_refs: u64,
    pub unlinked_amendments: u64,
}

#[derive(Debug, Clone)]
pub struct RefreshSummary {
    pub roster: RosterSummary,
    pub terms: Vec<TermSummary>,
    pub events: Vec<IngestEvent>,
}

/// Full refresh: roster, then each configured term, then index rebuild.
/// Every table write happens inside a per-phase transaction, so a failed
/// build never leaves a half-populated term visible.
pub fn run_refresh(opts: &IngestOptions) -> Result<RefreshSummary, IngestError> {
    let mut log = IngestLog::default();
    log.emit(
        IngestStage::Prepare,
        "refresh.start",
        fields(&[("store", &opts.store_path.display().to_string())]),
    );

    let mut conn = open_store(&opts.store_path)?;
    let roster = ingest_roster(&mut conn, opts, &mut log)?;
    let mut terms = Vec::with_capacity(opts.term_spans.len());
    for span in &opts.term_spans {
        terms.push(ingest_term(&mut conn, opts, span.term, &mut log)?);
    }

    log.emit(IngestStage::Index, "index.rebuild.begin", BTreeMap::new());
    rebuild_indices(&conn)?;
    log.emit(IngestStage::Index, "index.rebuild.complete", BTreeMap::new());
    log.emit(IngestStage::Finalize, "refresh.complete", BTreeMap::new());

    Ok(RefreshSummary {
        roster,
        terms,
        events: log.events().to_vec(),
    })
}

/// Wholesale replacement of `members`, `roles`, and `terms` from the roster
/// file, in one transaction.
pub fn ingest_roster(
    conn: &mut Connection,
    opts: &IngestOptions,
    log: &mut IngestLog,
) -> Result<RosterSummary, IngestError> {
    log.emit(IngestStage::Roster, "roster.begin", BTreeMap::new());
    let stream = open_record_stream(&opts.layout.roster())?;

    let mut summary = RosterSummary::default();
    let tx = conn.transaction().map_err(IngestError::sql)?;
    tx.execute("DELETE FROM roles", [])
        .map_err(IngestError::sql)?;
    tx.execute("DELETE FROM members", [])
        .map_err(IngestError::sql)?;
    tx.execute("DELETE FROM terms", [])
        .map_err(IngestError::sql)?;
    for span in &opts.term_spans {
        tx.execute(
            "INSERT INTO terms (term, start_year, end_year) VALUES (?1, ?2, ?3)",
            params![span.term.as_i64(), span.start_year, span.end_year],
        )
        .map_err(IngestError::sql)?;
    }

    let mut member_rows: Vec<MemberRow> = Vec::with_capacity(opts.batch_size);
    let mut role_rows: Vec<RoleRow> = Vec::with_capacity(opts.batch_size);

    for element in stream {
        let value = element?;
        let rec: RosterRecord = match decode_record(value) {
            Ok(rec) => rec,
            Err(_) => {
                summary.malformed_records += 1;
                continue;
            }
        };
        let Ok(member_id) = MemberId::parse(rec.id) else {
            summary.malformed_records += 1;
            continue;
        };
        member_rows.push(MemberRow {
            id: member_id.as_u64() as i64,
            name: rec.name,
            country: rec.country,
            political_group: rec.group,
            national_party: rec.national_party,
        });
        summary.members += 1;
        for role in rec.roles {
            let Some(role_type) = RoleType::from_str_opt(&role.role_type) else {
                summary.unknown_role_types += 1;
                continue;
            };
            let Ok(term) = TermId::parse(role.term) else {
                summary.unknown_role_types += 1;
                continue;
            };
            role_rows.push(RoleRow {
                member_id: member_id.as_u64() as i64,
                term: term.as_i64(),
                role_type: role_type.as_str(),
                role_name: role.role_name,
                body: role.body,
            });
            summary.roles += 1;
        }
        if member_rows.len() >= opts.batch_size {
            flush_members(&tx, &mut member_rows)?;
        }
        if role_rows.len() >= opts.batch_size {
            flush_roles(&tx, &mut role_rows)?;
        }
    }
    flush_members(&tx, &mut member_rows)?;
    flush_roles(&tx, &mut role_rows)?;
    tx.commit().map_err(IngestError::sql)?;

    log.emit(
        IngestStage::Roster,
        "roster.complete",
        fields(&[
            ("members", &summary.members.to_string()),
            ("roles", &summary.roles.to_string()),
            ("malformed", &summary.malformed_records.to_string()),
        ]),
    );
    Ok(summary)
}

/// Rebuild one term's activity and amendment facts: delete-then-repopulate
/// inside a single transaction. Stream order determines surrogate ids, so a
/// term must be processed by exactly one worker.
pub fn ingest_term(
    conn: &mut Connection,
    opts: &IngestOptions,
    term: TermId,
    log: &mut IngestLog,
) -> Result<TermSummary, IngestError> {
    log.emit(
        IngestStage::Activities,
        "term.begin",
        fields(&[("term", &term.to_string())]),
    );

    let mut summary = TermSummary {
        term,
        activity_rows: 0,
        zero_filled_rows: 0,
        amendments: 0,
        member_links: 0,
        malformed_records: 0,
        unresolved_member_refs: 0,
        unlinked_amendments: 0,
    };

    let tx = conn.transaction().map_err(IngestError::sql)?;
    tx.execute(
        "DELETE FROM amendment_member WHERE amendment_id IN
         (SELECT id FROM amendments WHERE term = ?1)",
        params![term.as_i64()],
    )
    .map_err(IngestError::sql)?;
    tx.execute(
        "DELETE FROM amendments WHERE term = ?1",
        params![term.as_i64()],
    )
    .map_err(IngestError::sql)?;
    tx.execute(
        "DELETE FROM activities WHERE term = ?1",
        params![term.as_i64()],
    )
    .map_err(IngestError::sql)?;

    let roster_ids = roster_member_ids(&tx)?;

    load_activities(&tx, opts, term, &roster_ids, &mut summary)?;
    log.emit(
        IngestStage::Activities,
        "activities.complete",
        fields(&[
            ("term", &term.to_string()),
            ("rows", &summary.activity_rows.to_string()),
            ("zero_filled", &summary.zero_filled_rows.to_string()),
        ]),
    );

    load_amendments(&tx, opts, term, &mut summary)?;

    // Amendment counts live in the activities row like every other
    // indicator; backfill them from the association table.
    tx.execute(
        "UPDATE activities SET amendments = COALESCE(
           (SELECT COUNT(*) FROM amendment_member am
             JOIN amendments a ON a.id = am.amendment_id
            WHERE am.member_id = activities.member_id AND a.term = ?1), 0)
         WHERE term = ?1",
        params![term.as_i64()],
    )
    .map_err(IngestError::sql)?;

    tx.commit().map_err(IngestError::sql)?;

    if summary.amendments > 0 {
        let unlinked_fraction = summary.unlinked_amendments as f64 / summary.amendments as f64;
        if unlinked_fraction > opts.unlinked_warn_fraction {
            log.warn(
                IngestStage::Amendments,
                "amendments.unlinked_fraction_high",
                fields(&[
                    ("term", &term.to_string()),
                    ("unlinked", &summary.unlinked_amendments.to_string()),
                    ("total", &summary.amendments.to_string()),
                ]),
            );
        }
    }
    log.emit(
        IngestStage::Amendments,
        "term.complete",
        fields(&[
            ("term", &term.to_string()),
            ("amendments", &summary.amendments.to_string()),
            ("links", &summary.member_links.to_string()),
            ("malformed", &summary.malformed_records.to_string()),
            ("unresolved_refs", &summary.unresolved_member_refs.to_string()),
        ]),
    );
    Ok(summary)
}

fn load_activities(
    tx: &Transaction<'_>,
    opts: &IngestOptions,
    term: TermId,
    roster_ids: &BTreeSet<i64>,
    summary: &mut TermSummary,
) -> Result<(), IngestError> {
    let stream = open_record_stream(&opts.layout.activities(term))?;
    let mut rows: Vec<ActivityRow> = Vec::with_capacity(opts.batch_size);
    let mut seen: BTreeSet<i64> = BTreeSet::new();

    for element in stream {
        let value = element?;
        let rec: ActivityRecord = match decode_record(value) {
            Ok(rec) => rec,
            Err(_) => {
                summary.malformed_records += 1;
                continue;
            }
        };
        let Some(member_id) = rec.member.normalize() else {
            summary.unresolved_member_refs += 1;
            continue;
        };
        let id = member_id.as_u64() as i64;
        seen.insert(id);
        rows.push(ActivityRow {
            member_id: id,
            written_questions: rec.written_questions.len() as i64,
            oral_questions: rec.oral_questions.len() as i64,
            explanations: rec.explanations.len() as i64,
            speeches: rec.speeches.len() as i64,
            motions: rec.motions.len() as i64,
            reports_rapporteur: rec.reports_rapporteur as i64,
            reports_shadow: rec.reports_shadow as i64,
            opinions_rapporteur: rec.opinions_rapporteur as i64,
            opinions_shadow: rec.opinions_shadow as i64,
            votes_attended: rec.votes_attended as i64,
            votes_total: rec.votes_total as i64,
        });
        summary.activity_rows += 1;
        if rows.len() >= opts.batch_size {
            flush_activities(tx, term, &mut rows)?;
        }
    }

    // Zero-fill: every roster member of the term gets a row so population
    // statistics are well-defined over the full population.
    for &member_id in roster_ids {
        if !seen.contains(&member_id) {
            rows.push(ActivityRow::zeroed(member_id));
            summary.zero_filled_rows += 1;
            if rows.len() >= opts.batch_size {
                flush_activities(tx, term, &mut rows)?;
            }
        }
    }
    flush_activities(tx, term, &mut rows)?;
    Ok(())
}

fn load_amendments(
    tx: &Transaction<'_>,
    opts: &IngestOptions,
    term: TermId,
    summary: &mut TermSummary,
) -> Result<(), IngestError> {
    let stream = open_record_stream(&opts.layout.amendments(term))?;
    let base = term.as_i64() * TERM_ID_STRIDE;
    let mut ordinal: i64 = 0;
    let mut amendment_rows: Vec<AmendmentRow> = Vec::with_capacity(opts.batch_size);
    let mut link_rows: Vec<(i64, i64)> = Vec::with_capacity(opts.batch_size);

    for element in stream {
        let value = element?;
        let rec: AmendmentRecord = match decode_record(value) {
            Ok(rec) => rec,
            Err(_) => {
                summary.malformed_records += 1;
                continue;
            }
        };
        ordinal += 1;
        let amendment_id = base + ordinal;

        let mut linked: BTreeSet<i64> = BTreeSet::new();
        for member_ref in &rec.members {
            match member_ref.normalize() {
                Some(member_id) => {
                    linked.insert(member_id.as_u64() as i64);
                }
                None => summary.unresolved_member_refs += 1,
            }
        }
        // An amendment with zero resolvable members is still stored; it is
        // simply unreachable from any per-member query.
        if linked.is_empty() {
            summary.unlinked_amendments += 1;
        }
        for member_id in linked {
            link_rows.push((amendment_id, member_id));
            summary.member_links += 1;
        }

        amendment_rows.push(AmendmentRow {
            id: amendment_id,
            date: rec.date,
            reference: rec.reference,
            title: rec.title,
            committee: rec.committee,
            location: rec.location,
            authors: rec.authors,
            new_payload: encode_payload(rec.new_text.as_ref())?,
            old_payload: encode_payload(rec.old_text.as_ref())?,
            src: rec.src,
            dossiers: encode_payload(rec.dossiers.as_ref())?,
        });
        summary.amendments += 1;

        if amendment_rows.len() >= opts.batch_size {
            flush_amendments(tx, term, &mut amendment_rows)?;
        }
        if link_rows.len() >= opts.batch_size {
            flush_links(tx, &mut link_rows)?;
        }
    }
    flush_amendments(tx, term, &mut amendment_rows)?;
    flush_links(tx, &mut link_rows)?;
    Ok(())
}

fn roster_member_ids(tx: &Transaction<'_>) -> Result<BTreeSet<i64>, IngestError> {
    let mut stmt = tx
        .prepare("SELECT id FROM members ORDER BY id")
        .map_err(IngestError::sql)?;
    let ids = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(IngestError::sql)?
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(IngestError::sql)?;
    Ok(ids)
}

fn encode_payload(value: Option<&serde_json::Value>) -> Result<Option<Vec<u8>>, IngestError> {
    value
        .map(|v| {
            serde_json::to_vec(v).map_err(|e| {
                IngestError::new(crate::IngestErrorCode::MalformedRecord, e.to_string())
            })
        })
        .transpose()
}

struct MemberRow {
    id: i64,
    name: String,
    country: String,
    political_group: String,
    national_party: String,
}

struct RoleRow {
    member_id: i64,
    term: i64,
    role_type: &'static str,
    role_name: String,
    body: Option<String>,
}

struct ActivityRow {
    member_id: i64,
    written_questions: i64,
    oral_questions: i64,
    explanations: i64,
    speeches: i64,
    motions: i64,
    reports_rapporteur: i64,
    reports_shadow: i64,
    opinions_rapporteur: i64,
    opinions_shadow: i64,
    votes_attended: i64,
    votes_total: i64,
}

impl ActivityRow {
    fn zeroed(member_id: i64) -> Self {
        Self {
            member_id,
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
}

struct AmendmentRow {
    id: i64,
    date: String,
    reference: String,
    title: String,
    committee: Option<String>,
    location: Option<String>,
    authors: Option<String>,
    new_payload: Option<Vec<u8>>,
    old_payload: Option<Vec<u8>>,
    src: Option<String>,
    dossiers: Option<Vec<u8>>,
}

fn flush_members(tx: &Transaction<'_>, rows: &mut Vec<MemberRow>) -> Result<(), IngestError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO members (id, name, country, political_group, national_party)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(IngestError::sql)?;
    for row in rows.drain(..) {
        stmt.execute(params![
            row.id,
            row.name,
            row.country,
            row.political_group,
            row.national_party
        ])
        .map_err(IngestError::sql)?;
    }
    Ok(())
}

fn flush_roles(tx: &Transaction<'_>, rows: &mut Vec<RoleRow>) -> Result<(), IngestError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO roles (member_id, term, role_type, role_name, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .map_err(IngestError::sql)?;
    for row in rows.drain(..) {
        stmt.execute(params![
            row.member_id,
            row.term,
            row.role_type,
            row.role_name,
            row.body
        ])
        .map_err(IngestError::sql)?;
    }
    Ok(())
}

fn flush_activities(
    tx: &Transaction<'_>,
    term: TermId,
    rows: &mut Vec<ActivityRow>,
) -> Result<(), IngestError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = tx
        .prepare_cached(
            "INSERT OR REPLACE INTO activities (
               member_id, term, written_questions, oral_questions, explanations,
               speeches, motions, reports_rapporteur, reports_shadow,
               opinions_rapporteur, opinions_shadow, votes_attended, votes_total
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )
        .map_err(IngestError::sql)?;
    for row in rows.drain(..) {
        stmt.execute(params![
            row.member_id,
            term.as_i64(),
            row.written_questions,
            row.oral_questions,
            row.explanations,
            row.speeches,
            row.motions,
            row.reports_rapporteur,
            row.reports_shadow,
            row.opinions_rapporteur,
            row.opinions_shadow,
            row.votes_attended,
            row.votes_total
        ])
        .map_err(IngestError::sql)?;
    }
    Ok(())
}

fn flush_amendments(
    tx: &Transaction<'_>,
    term: TermId,
    rows: &mut Vec<AmendmentRow>,
) -> Result<(), IngestError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = tx
        .prepare_cached(
            "INSERT INTO amendments (
               id, term, date, reference, title, committee, location, authors,
               new_payload, old_payload, src, dossiers
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .map_err(IngestError::sql)?;
    for row in rows.drain(..) {
        stmt.execute(params![
            row.id,
            term.as_i64(),
            row.date,
            row.reference,
            row.title,
            row.committee,
            row.location,
            row.authors,
            row.new_payload,
            row.old_payload,
            row.src,
            row.dossiers
        ])
        .map_err(IngestError::sql)?;
    }
    Ok(())
}

fn flush_links(tx: &Transaction<'_>, rows: &mut Vec<(i64, i64)>) -> Result<(), IngestError> {
    if rows.is_empty() {
        return Ok(());
    }
    let mut stmt = tx
        .prepare_cached(
            "INSERT OR IGNORE INTO amendment_member (amendment_id, member_id) VALUES (?1, ?2)",
        )
        .map_err(IngestError::sql)?;
    for (amendment_id, member_id) in rows.drain(..) {
        stmt.execute(params![amendment_id, member_id])
            .map_err(IngestError::sql)?;
    }
    Ok(())
}

fn fields(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}
