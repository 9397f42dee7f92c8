use crate::IngestError;
use rusqlite::Connection;
use std::path::Path;

pub const SCHEMA_VERSION: i64 = 1;

const BULK_LOAD_PRAGMAS: &str = "
    PRAGMA journal_mode=WAL;
    PRAGMA synchronous=NORMAL;
    PRAGMA temp_store=MEMORY;
    PRAGMA cache_size=-32000;
";

/// Open (creating if absent) the fact store and ensure its schema.
pub fn open_store(path: &Path) -> Result<Connection, IngestError> {
    let conn = Connection::open(path).map_err(IngestError::sql)?;
    conn.execute_batch(BULK_LOAD_PRAGMAS)
        .map_err(IngestError::sql)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

fn ensure_schema(conn: &Connection) -> Result<(), IngestError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS members (
          id INTEGER PRIMARY KEY,
          name TEXT NOT NULL,
          country TEXT NOT NULL,
          political_group TEXT NOT NULL,
          national_party TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS terms (
          term INTEGER PRIMARY KEY,
          start_year INTEGER NOT NULL,
          end_year INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS activities (
          member_id INTEGER NOT NULL,
          term INTEGER NOT NULL,
          amendments INTEGER NOT NULL DEFAULT 0,
          written_questions INTEGER NOT NULL DEFAULT 0,
          oral_questions INTEGER NOT NULL DEFAULT 0,
          explanations INTEGER NOT NULL DEFAULT 0,
          speeches INTEGER NOT NULL DEFAULT 0,
          motions INTEGER NOT NULL DEFAULT 0,
          reports_rapporteur INTEGER NOT NULL DEFAULT 0,
          reports_shadow INTEGER NOT NULL DEFAULT 0,
          opinions_rapporteur INTEGER NOT NULL DEFAULT 0,
          opinions_shadow INTEGER NOT NULL DEFAULT 0,
          votes_attended INTEGER NOT NULL DEFAULT 0,
          votes_total INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY (member_id, term)
        );
        CREATE TABLE IF NOT EXISTS amendments (
          id INTEGER PRIMARY KEY,
          term INTEGER NOT NULL,
          date TEXT NOT NULL,
          reference TEXT NOT NULL,
          title TEXT NOT NULL,
          committee TEXT,
          location TEXT,
          authors TEXT,
          new_payload BLOB,
          old_payload BLOB,
          src TEXT,
          dossiers BLOB
        );
        CREATE TABLE IF NOT EXISTS amendment_member (
          amendment_id INTEGER NOT NULL,
          member_id INTEGER NOT NULL,
          PRIMARY KEY (amendment_id, member_id)
        );
        CREATE TABLE IF NOT EXISTS roles (
          member_id INTEGER NOT NULL,
          term INTEGER NOT NULL,
          role_type TEXT NOT NULL,
          role_name TEXT NOT NULL,
          body TEXT
        );
        CREATE TABLE IF NOT EXISTS rankings (
          member_id INTEGER NOT NULL,
          term INTEGER NOT NULL,
          production_score REAL NOT NULL,
          control_score REAL NOT NULL,
          engagement_score REAL NOT NULL,
          base_score REAL NOT NULL,
          role_multiplier REAL NOT NULL,
          attendance_penalty REAL NOT NULL,
          final_score REAL NOT NULL,
          rank INTEGER NOT NULL,
          zero_filled INTEGER NOT NULL DEFAULT 0,
          low_confidence INTEGER NOT NULL DEFAULT 0,
          PRIMARY KEY (member_id, term)
        );
        ",
    )
    .map_err(IngestError::sql)?;
    conn.execute_batch(&format!("PRAGMA user_version={SCHEMA_VERSION};"))
        .map_err(IngestError::sql)?;
    Ok(())
}

/// Drop and recreate the covering indices for the two access patterns that
/// matter, then refresh planner statistics. Ingestion is a full-refresh
/// batch job, so indices are rebuilt rather than maintained incrementally.
pub fn rebuild_indices(conn: &Connection) -> Result<(), IngestError> {
    conn.execute_batch(
        "
        DROP INDEX IF EXISTS idx_amendments_term_date;
        DROP INDEX IF EXISTS idx_amendment_member;
        DROP INDEX IF EXISTS idx_roles_member_term;
        CREATE INDEX idx_amendments_term_date ON amendments(term, date DESC, id DESC);
        CREATE INDEX idx_amendment_member ON amendment_member(member_id, amendment_id);
        CREATE INDEX idx_roles_member_term ON roles(member_id, term);
        ",
    )
    .map_err(IngestError::sql)?;
    conn.execute_batch("ANALYZE;").map_err(IngestError::sql)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{open_store, rebuild_indices, SCHEMA_VERSION};
    use tempfile::tempdir;

    #[test]
    fn schema_is_created_once_and_reopens_cleanly() {
        let tmp = tempdir().expect("tempdir");
        let path = tmp.path().join("facts.sqlite");
        {
            let conn = open_store(&path).expect("open");
            rebuild_indices(&conn).expect("indices");
        }
        let conn = open_store(&path).expect("reopen");
        let version: i64 = conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))
            .expect("user_version");
        assert_eq!(version, SCHEMA_VERSION);
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
                 ('members','terms','activities','amendments','amendment_member','roles','rankings')",
                [],
                |row| row.get(0),
            )
            .expect("tables");
        assert_eq!(tables, 7);
    }
}
