use std::fs;

use chrono::{Duration, TimeZone, Utc};
use prov_core::{CodeIdentity, ProvError, VcsKind};
use prov_record::{CommandLine, ExitStatus, ParameterSet, Record, RecordDraft};
use prov_store::{open_store, FileRecordStore, RecordStore, SqliteRecordStore};
use rusqlite::{params, Connection};
use tempfile::tempdir;

fn record(label: &str, minutes: i64, n: i64) -> Record {
    let base = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).single().expect("timestamp");
    let mut draft = RecordDraft::new(label, base + Duration::minutes(minutes), "/work/project");
    draft.command = CommandLine::new("python").with_main_file("main.py");
    draft.code_identity = Some(CodeIdentity::versioned(VcsKind::Git, "abc123", "", "/work/project").expect("identity"));
    draft.parameters = ParameterSet::from_json_str(&format!(r#"{{"n": {n}}}"#)).expect("params");
    draft.exit_status = ExitStatus::Success;
    draft.seal().expect("seal")
}

fn exercise(store: &mut dyn RecordStore) {
    assert!(store.list().expect("list").is_empty());
    assert!(store.most_recent().expect("recent").is_none());
    let err = store.resolve_label("last").expect_err("empty store");
    assert_eq!(err.info().code, "store_empty");

    let late = record("late", 30, 1);
    let early = record("early", 5, 2);
    let same_time = record("alpha", 30, 3);
    store.save(&late).expect("save late");
    store.save(&early).expect("save early");
    store.save(&same_time).expect("save alpha");

    assert_eq!(store.labels().expect("labels"), vec!["early", "alpha", "late"]);
    assert_eq!(store.get("early").expect("get"), early);
    assert_eq!(store.resolve_label("last").expect("last"), "late");
    assert_eq!(store.resolve_label("early").expect("plain"), "early");
    assert!(store.contains("late").expect("contains"));
    assert!(!store.contains("missing").expect("contains"));

    let clash = record("late", 45, 99);
    let err = store.save(&clash).expect_err("duplicate");
    assert!(matches!(err, ProvError::DuplicateLabel(_)));
    assert_eq!(store.get("late").expect("unchanged"), late);

    let err = store.get("missing").expect_err("missing");
    assert!(matches!(err, ProvError::NotFound(_)));

    store.add_tag("early", "baseline").expect("tag");
    store.add_tag("early", "paper").expect("tag");
    store.add_tag("late", "paper").expect("tag");
    store.set_outcome("early", "converged after 40 steps").expect("outcome");
    let notes = store.annotations("early").expect("annotations");
    assert_eq!(notes.tags.iter().map(String::as_str).collect::<Vec<_>>(), vec!["baseline", "paper"]);
    assert_eq!(notes.outcome.as_deref(), Some("converged after 40 steps"));
    assert_eq!(store.labels_with_tag("paper").expect("tagged"), vec!["early", "late"]);
    let err = store.add_tag("early", "two words").expect_err("bad tag");
    assert_eq!(err.info().code, "invalid_tag");

    store.remove_tag("early", "baseline").expect("untag");
    store.set_outcome("early", "  ").expect("clear outcome");
    let notes = store.annotations("early").expect("annotations");
    assert_eq!(notes.tags.len(), 1);
    assert!(notes.outcome.is_none());
    // Annotating never touches the sealed record.
    assert_eq!(store.get("early").expect("get"), early);

    store.delete("late").expect("delete");
    assert!(matches!(store.delete("late"), Err(ProvError::NotFound(_))));
    assert!(matches!(store.annotations("late"), Err(ProvError::NotFound(_))));
    assert_eq!(store.labels().expect("labels"), vec!["early", "alpha"]);
}

#[test]
fn sqlite_store_behaves() {
    let dir = tempdir().expect("tempdir");
    let mut store = SqliteRecordStore::open(dir.path().join("records.db")).expect("open");
    exercise(&mut store);
}

#[test]
fn file_store_behaves() {
    let dir = tempdir().expect("tempdir");
    let mut store = FileRecordStore::open(dir.path().join("store")).expect("open");
    exercise(&mut store);
}

#[test]
fn open_store_picks_backend_by_extension() {
    let dir = tempdir().expect("tempdir");
    let sqlite = open_store(&dir.path().join("prov.sqlite")).expect("sqlite");
    assert_eq!(sqlite.backend(), "sqlite");
    let files = open_store(&dir.path().join("records")).expect("dir");
    assert_eq!(files.backend(), "file");
}

#[test]
fn sqlite_store_survives_reopen() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("records.db");
    {
        let mut store = SqliteRecordStore::open(&path).expect("open");
        store.save(&record("one", 0, 1)).expect("save");
        store.add_tag("one", "kept").expect("tag");
    }
    let store = SqliteRecordStore::open(&path).expect("reopen");
    assert_eq!(store.labels().expect("labels"), vec!["one"]);
    assert!(store.annotations("one").expect("notes").tags.contains("kept"));
}

#[test]
fn sqlite_rejects_tampered_rows() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("records.db");
    let mut store = SqliteRecordStore::open(&path).expect("open");
    store.save(&record("one", 0, 10)).expect("save");

    let conn = Connection::open(&path).expect("raw connection");
    let body: String = conn
        .query_row("SELECT body FROM records WHERE label = ?1", params!["one"], |row| row.get(0))
        .expect("body");
    let tampered = body.replace("\"n\":10", "\"n\":11");
    assert_ne!(tampered, body);
    conn.execute("UPDATE records SET body = ?1 WHERE label = ?2", params![tampered, "one"])
        .expect("update");

    let err = store.get("one").expect_err("tampered");
    assert_eq!(err.info().code, "digest_mismatch");
}

#[test]
fn sqlite_rejects_foreign_schema_version() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("records.db");
    SqliteRecordStore::open(&path).expect("create");
    let conn = Connection::open(&path).expect("raw connection");
    conn.execute("UPDATE meta SET version = 99", []).expect("bump");
    drop(conn);
    let err = SqliteRecordStore::open(&path).expect_err("version mismatch");
    assert_eq!(err.info().code, "sqlite_schema_version");
}

#[test]
fn file_store_rejects_tampered_files_and_bad_labels() {
    let dir = tempdir().expect("tempdir");
    let mut store = FileRecordStore::open(dir.path()).expect("open");
    store.save(&record("one", 0, 10)).expect("save");

    let path = dir.path().join("records").join("one.json");
    let text = fs::read_to_string(&path).expect("read");
    fs::write(&path, text.replace("\"n\": 10", "\"n\": 12")).expect("tamper");
    let err = store.get("one").expect_err("tampered");
    assert_eq!(err.info().code, "digest_mismatch");
    assert!(store.list().is_err());

    let err = store.get("../escape").expect_err("path label");
    assert_eq!(err.info().code, "invalid_label");
}
