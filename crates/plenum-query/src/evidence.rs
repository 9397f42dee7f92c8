// SPDX-License-Identifier: Apache-2.0

use crate::{QueryError, QueryErrorCode};
use plenum_ingest::{decode_record, open_record_stream};
use plenum_model::{
    ActivityRecord, DatasetLayout, EvidenceCategory, EvidenceItem, MemberId, TermId,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

/// One page of evidence items, newest first. `total_count` covers the whole
/// category for the member and term, not just this page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvidencePage {
    pub items: Vec<EvidenceItem>,
    pub total_count: u64,
    pub has_more: bool,
}

/// Paginated evidence lookup for one (member, category, term). The category
/// arrives as a string because this is the request boundary; anything not in
/// the closed category set is rejected before touching the store.
pub fn get_evidence(
    conn: &Connection,
    layout: &DatasetLayout,
    member_id: MemberId,
    category: &str,
    term: TermId,
    offset: usize,
    limit: usize,
) -> Result<EvidencePage, QueryError> {
    let Some(category) = EvidenceCategory::from_str_opt(category) else {
        return Err(QueryError::new(
            QueryErrorCode::InvalidCategory,
            format!("unknown evidence category {category:?}"),
        ));
    };
    ensure_member_exists(conn, member_id)?;

    let page = match category {
        EvidenceCategory::Amendments => amendments_page(conn, member_id, term, offset, limit)?,
        streamed => streamed_page(layout, member_id, streamed, term, offset, limit)?,
    };
    tracing::debug!(
        member = %member_id,
        category = category.as_str(),
        term = %term,
        total = page.total_count,
        returned = page.items.len(),
        "evidence page served"
    );
    Ok(page)
}

fn ensure_member_exists(conn: &Connection, member_id: MemberId) -> Result<(), QueryError> {
    let found = conn
        .query_row(
            "SELECT 1 FROM members WHERE id = ?1",
            params![member_id.as_u64() as i64],
            |_| Ok(()),
        )
        .optional()
        .map_err(QueryError::sql)?;
    if found.is_none() {
        return Err(QueryError::new(
            QueryErrorCode::MemberNotFound,
            format!("member {member_id} is not in the fact store"),
        ));
    }
    Ok(())
}

/// Amendments are the high-volume category; one indexed count plus one
/// indexed page scan, ordered newest first with the surrogate id breaking
/// same-day ties.
fn amendments_page(
    conn: &Connection,
    member_id: MemberId,
    term: TermId,
    offset: usize,
    limit: usize,
) -> Result<EvidencePage, QueryError> {
    let id = member_id.as_u64() as i64;
    let total_count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM amendment_member am
             JOIN amendments a ON a.id = am.amendment_id
             WHERE am.member_id = ?1 AND a.term = ?2",
            params![id, term.as_i64()],
            |row| row.get(0),
        )
        .map_err(QueryError::sql)?;

    let mut stmt = conn
        .prepare_cached(
            "SELECT a.date, a.title, a.reference, a.src FROM amendment_member am
             JOIN amendments a ON a.id = am.amendment_id
             WHERE am.member_id = ?1 AND a.term = ?2
             ORDER BY a.date DESC, a.id DESC
             LIMIT ?3 OFFSET ?4",
        )
        .map_err(QueryError::sql)?;
    let items = stmt
        .query_map(
            params![id, term.as_i64(), limit as i64, offset as i64],
            |row| {
                Ok(EvidenceItem {
                    date: row.get(0)?,
                    title: row.get(1)?,
                    reference: Some(row.get(2)?),
                    src: row.get(3)?,
                })
            },
        )
        .map_err(QueryError::sql)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(QueryError::sql)?;

    Ok(page_of(items, total_count.max(0) as u64, offset))
}

/// The streamed categories keep no per-item rows in the store; their counts
/// in `activities` are backed by the source file, which is re-scanned here.
/// Per-element decode failures are skipped exactly as ingestion skips them,
/// so counts and evidence stay consistent.
fn streamed_page(
    layout: &DatasetLayout,
    member_id: MemberId,
    category: EvidenceCategory,
    term: TermId,
    offset: usize,
    limit: usize,
) -> Result<EvidencePage, QueryError> {
    let stream = open_record_stream(&layout.activities(term)).map_err(QueryError::source)?;
    let mut items: Vec<EvidenceItem> = Vec::new();
    for element in stream {
        let value = element.map_err(QueryError::source)?;
        let rec: ActivityRecord = match decode_record(value) {
            Ok(rec) => rec,
            Err(_) => continue,
        };
        if rec.member.normalize() != Some(member_id) {
            continue;
        }
        if let Some(list) = rec.category_items(category) {
            items.extend_from_slice(list);
        }
    }

    // Stable: same-day items keep their source order.
    items.sort_by(|a, b| b.date.cmp(&a.date));
    let total_count = items.len() as u64;
    let items = items.into_iter().skip(offset).take(limit).collect();
    Ok(page_of(items, total_count, offset))
}

fn page_of(items: Vec<EvidenceItem>, total_count: u64, offset: usize) -> EvidencePage {
    let has_more = total_count > (offset + items.len()) as u64;
    EvidencePage {
        items,
        total_count,
        has_more,
    }
}

#[cfg(test)]
mod tests {
    use super::page_of;
    use plenum_model::EvidenceItem;

    fn item(date: &str) -> EvidenceItem {
        EvidenceItem {
            date: date.to_string(),
            title: "t".to_string(),
            reference: None,
            src: None,
        }
    }

    #[test]
    fn has_more_accounts_for_offset_and_short_pages() {
        assert!(page_of(vec![item("2025-01-01")], 5, 0).has_more);
        assert!(!page_of(vec![item("2025-01-01")], 5, 4).has_more);
        // Offset past the end: empty page, nothing more.
        assert!(!page_of(vec![], 5, 30).has_more);
        assert!(!page_of(vec![], 0, 0).has_more);
    }
}
