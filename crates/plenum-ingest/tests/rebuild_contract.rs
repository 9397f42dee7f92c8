use plenum_ingest::{run_refresh, IngestOptions};
use plenum_model::{DatasetLayout, TermId, TermSpan};
use rusqlite::Connection;
use std::fs;
use std::io::Write;
use std::path::Path;

fn term(n: u8) -> TermId {
    TermId::parse(n).expect("term")
}

fn spans() -> Vec<TermSpan> {
    vec![TermSpan::new(term(10), 2024, 2029).expect("span")]
}

fn write_fixture_files(dir: &Path) {
    fs::write(
        dir.join("members.json"),
        r#"[
          {"id": 1001, "name": "Alice Adams", "country": "AT", "group": "G1",
           "national_party": "P1",
           "roles": [{"term": 10, "role_type": "committee", "role_name": "chair", "body": "ENVI"}]},
          {"id": 1002, "name": "Bram Bakker", "country": "NL", "group": "G2", "national_party": "P2"},
          {"id": 1003, "name": "Carla Costa", "country": "PT", "group": "G1", "national_party": "P3"}
        ]"#,
    )
    .expect("roster");

    fs::write(
        dir.join("activities_term10.json"),
        r#"[
          {"member": 1001,
           "speeches": [{"date": "2024-09-01", "title": "s1"}, {"date": "2024-09-02", "title": "s2"}],
           "written_questions": [{"date": "2024-09-03", "title": "q1"}],
           "reports_rapporteur": 2, "votes_attended": 80, "votes_total": 100},
          {"member": {"mep_id": 1002},
           "motions": [{"date": "2024-10-01", "title": "m1"}],
           "votes_attended": 40, "votes_total": 100},
          {"member": {"label": "nobody"}, "votes_total": 10},
          "not a record"
        ]"#,
    )
    .expect("activities");

    fs::write(
        dir.join("amendments_term10.json"),
        r#"[
          {"date": "2024-11-05", "reference": "AM 1", "title": "first", "members": [1001, 1002]},
          {"date": "2024-11-06", "reference": "AM 2", "title": "second", "members": [{"id": 1001}]},
          {"date": "2024-11-06", "reference": "AM 3", "title": "orphan", "members": [{"label": "x"}]}
        ]"#,
    )
    .expect("amendments");
}

fn refreshed_store(dir: &Path) -> (IngestOptions, plenum_ingest::RefreshSummary) {
    let opts = IngestOptions::new(
        DatasetLayout::new(dir),
        dir.join("facts.sqlite"),
        spans(),
    );
    let summary = run_refresh(&opts).expect("refresh");
    (opts, summary)
}

#[test]
fn refresh_builds_all_fact_tables_and_counters() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_fixture_files(tmp.path());
    let (opts, summary) = refreshed_store(tmp.path());

    assert_eq!(summary.roster.members, 3);
    assert_eq!(summary.roster.roles, 1);
    let t = &summary.terms[0];
    assert_eq!(t.activity_rows, 2);
    assert_eq!(t.zero_filled_rows, 1); // member 1003 absent from activities
    assert_eq!(t.amendments, 3);
    assert_eq!(t.member_links, 3);
    assert_eq!(t.malformed_records, 1); // the bare string element
    assert_eq!(t.unresolved_member_refs, 2); // one activity record, one amendment author
    assert_eq!(t.unlinked_amendments, 1);

    let conn = Connection::open(&opts.store_path).expect("open");
    let speeches: i64 = conn
        .query_row(
            "SELECT speeches FROM activities WHERE member_id = 1001 AND term = 10",
            [],
            |row| row.get(0),
        )
        .expect("speeches");
    assert_eq!(speeches, 2);

    // Zero-fill invariant: the silent member has a row of zeros, not no row.
    let (wq, vt): (i64, i64) = conn
        .query_row(
            "SELECT written_questions, votes_total FROM activities
             WHERE member_id = 1003 AND term = 10",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .expect("zero-filled row");
    assert_eq!((wq, vt), (0, 0));

    // Amendment counts are backfilled from the association table.
    let amendments_1001: i64 = conn
        .query_row(
            "SELECT amendments FROM activities WHERE member_id = 1001 AND term = 10",
            [],
            |row| row.get(0),
        )
        .expect("amendments count");
    assert_eq!(amendments_1001, 2);

    // The orphan amendment is stored but linked to nobody.
    let orphan_links: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM amendment_member am
             JOIN amendments a ON a.id = am.amendment_id WHERE a.reference = 'AM 3'",
            [],
            |row| row.get(0),
        )
        .expect("orphan links");
    assert_eq!(orphan_links, 0);
}

#[test]
fn rebuild_is_idempotent_and_surrogate_ids_are_deterministic() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_fixture_files(tmp.path());
    let (opts, _) = refreshed_store(tmp.path());

    let dump = |path: &Path| -> Vec<(i64, String, String)> {
        let conn = Connection::open(path).expect("open");
        let mut stmt = conn
            .prepare("SELECT id, date, reference FROM amendments ORDER BY id")
            .expect("prepare");
        stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .expect("query")
            .collect::<Result<Vec<_>, _>>()
            .expect("rows")
    };

    let first = dump(&opts.store_path);
    run_refresh(&opts).expect("second refresh");
    let second = dump(&opts.store_path);
    assert_eq!(first, second);

    // Builder-assigned ids: term stride plus stream ordinal.
    assert_eq!(first[0].0, 100_000_001);
    assert_eq!(first[2].0, 100_000_003);
}

#[test]
fn compressed_variants_are_ingested_transparently() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_fixture_files(tmp.path());

    // Replace the amendments file with a gzip container only.
    let plain = tmp.path().join("amendments_term10.json");
    let content = fs::read(&plain).expect("read plain");
    fs::remove_file(&plain).expect("remove plain");
    let gz_file = fs::File::create(tmp.path().join("amendments_term10.json.gz")).expect("gz");
    let mut enc = flate2::write::GzEncoder::new(gz_file, flate2::Compression::default());
    enc.write_all(&content).expect("compress");
    enc.finish().expect("finish");

    let (_, summary) = refreshed_store(tmp.path());
    assert_eq!(summary.terms[0].amendments, 3);
}

#[test]
fn high_unlinked_fraction_surfaces_a_warning_not_an_abort() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_fixture_files(tmp.path());
    fs::write(
        tmp.path().join("amendments_term10.json"),
        r#"[
          {"date": "2024-11-05", "reference": "AM 1", "members": []},
          {"date": "2024-11-06", "reference": "AM 2", "members": []},
          {"date": "2024-11-07", "reference": "AM 3", "members": [1001]}
        ]"#,
    )
    .expect("amendments");

    let (_, summary) = refreshed_store(tmp.path());
    assert_eq!(summary.terms[0].unlinked_amendments, 2);
    assert!(summary
        .events
        .iter()
        .any(|e| e.name == "amendments.unlinked_fraction_high"));
}

#[test]
fn missing_source_fails_and_preserves_previous_term_data() {
    let tmp = tempfile::tempdir().expect("tempdir");
    write_fixture_files(tmp.path());
    let (opts, _) = refreshed_store(tmp.path());

    // Remove the activities source and refresh again: the run fails, the
    // previously committed term stays authoritative.
    fs::remove_file(tmp.path().join("activities_term10.json")).expect("remove");
    let err = run_refresh(&opts).err().expect("refresh must fail");
    assert_eq!(err.code, plenum_ingest::IngestErrorCode::SourceNotFound);

    let conn = Connection::open(&opts.store_path).expect("open");
    let rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM activities WHERE term = 10",
            [],
            |row| row.get(0),
        )
        .expect("rows");
    assert_eq!(rows, 3);
}
