use std::time::Duration;

use chrono::{TimeZone, Utc};
use prov_core::{CodeIdentity, Dependency, ProvError, VcsKind, VersionOrigin};
use prov_record::{
    timestamp_label, validate_label, CaptureStage, CommandLine, DataKey, ExitStatus, ParameterSet,
    Record, RecordDraft,
};

fn draft(label: &str) -> RecordDraft {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).single().expect("timestamp");
    let mut draft = RecordDraft::new(label, timestamp, "/work/project");
    draft.command = CommandLine::new("python").with_main_file("run.py").with_arguments(["default.param"]);
    draft.code_identity = Some(
        CodeIdentity::versioned(VcsKind::Git, "abc123", "", "/work/project").expect("identity"),
    );
    draft.parameters = ParameterSet::from_json_str(r#"{"n": 10, "dt": 0.25}"#).expect("params");
    draft.dependencies = vec![
        Dependency::external("numpy", "1.26.4", None, VersionOrigin::DistributionMetadata),
        Dependency::local("helpers", None),
    ];
    draft.outputs = vec![DataKey::new("out.dat", "a".repeat(64), 12)];
    draft.exit_status = ExitStatus::Success;
    draft.duration = Duration::from_millis(1500);
    draft
}

#[test]
fn sealed_record_round_trips_and_verifies() {
    let record = draft("run-1").seal().expect("seal");
    assert_eq!(record.label(), "run-1");
    assert_eq!(record.digest().len(), 64);
    record.verify_digest().expect("fresh digest");
    assert!(!record.flagged_non_reproducible());
    // Dependencies are stored sorted by name.
    assert_eq!(record.dependencies()[0].name, "helpers");

    let bytes = record.to_json_bytes().expect("json");
    let reloaded = Record::from_json_slice(&bytes).expect("reload");
    assert_eq!(reloaded, record);
    assert_eq!(reloaded.parameters(), record.parameters());
}

#[test]
fn tampering_is_detected_on_load() {
    let record = draft("run-2").seal().expect("seal");
    let text = String::from_utf8(record.to_json_bytes().expect("json")).expect("utf8");
    let tampered = text.replace("\"n\":10", "\"n\":11");
    assert_ne!(tampered, text);
    let err = Record::from_json_slice(tampered.as_bytes()).expect_err("tampered");
    assert!(matches!(err, ProvError::Store(_)));
    assert_eq!(err.info().code, "digest_mismatch");
}

#[test]
fn failed_runs_are_flagged() {
    let mut failed = draft("run-3");
    failed.exit_status = ExitStatus::Failed { code: 2 };
    assert!(failed.seal().expect("seal").flagged_non_reproducible());

    let mut broken = draft("run-4");
    broken.fail(
        CaptureStage::PostRunSnapshot,
        ProvError::store("hash_read", "permission denied"),
    );
    broken.fail(CaptureStage::Sealing, ProvError::store("later", "ignored"));
    let record = broken.seal().expect("seal");
    assert!(record.flagged_non_reproducible());
    let failure = record.failure().expect("failure");
    assert_eq!(failure.stage, CaptureStage::PostRunSnapshot);
    assert_eq!(failure.error.info().code, "hash_read");
}

#[test]
fn missing_identity_seals_as_unversioned() {
    let mut draft = draft("run-5");
    draft.code_identity = None;
    draft.exit_status = ExitStatus::NotRun;
    let record = draft.seal().expect("seal");
    assert_eq!(record.code_identity().vcs_type(), VcsKind::None);
    assert_eq!(record.exit_status(), ExitStatus::NotRun);
}

#[test]
fn labels_are_validated() {
    assert_eq!(
        timestamp_label(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).single().expect("ts")),
        "20240301-123005"
    );
    validate_label("20240301-123005").expect("timestamp label");
    for bad in ["", " padded", "../escape", "a/b", ".hidden"] {
        assert!(validate_label(bad).is_err(), "{bad:?} accepted");
    }
    assert!(draft("bad/label").seal().is_err());
}
