use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use prov_core::{CodeIdentity, Dependency, VcsKind, VersionOrigin, WhitespacePolicy};
use prov_record::{
    CompareOptions, DataKey, DiffFormatter, Dimension, DimensionStatus, ExitStatus, ParamValue,
    ParameterSet, Record, RecordComparator, RecordDraft, LABEL_PARAMETER,
};

fn hash(byte: char) -> String {
    byte.to_string().repeat(64)
}

fn base_draft(label: &str) -> RecordDraft {
    let timestamp = Utc.with_ymd_and_hms(2024, 5, 2, 9, 0, 0).single().expect("timestamp");
    let mut draft = RecordDraft::new(label, timestamp, "/work/project");
    draft.code_identity = Some(
        CodeIdentity::versioned(VcsKind::Git, "abc123", "", "/work/project").expect("identity"),
    );
    draft.parameters = ParameterSet::from_json_str(r#"{"n": 10}"#).expect("params");
    draft.dependencies = vec![Dependency::external(
        "numpy",
        "1.26.4",
        None,
        VersionOrigin::DistributionMetadata,
    )];
    draft.outputs = vec![
        DataKey::new("out.dat", hash('a'), 10),
        DataKey::new("log.txt", hash('b'), 3),
    ];
    draft.exit_status = ExitStatus::Success;
    draft.duration = Duration::from_secs(2);
    draft
}

fn seal(draft: RecordDraft) -> Record {
    draft.seal().expect("seal")
}

#[test]
fn same_inputs_compare_identical_in_every_dimension() {
    let first = seal(base_draft("first"));
    let mut later = base_draft("second");
    later.timestamp = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).single().expect("ts");
    later.duration = Duration::from_secs(9);
    let second = seal(later);

    let report = RecordComparator::default().compare(&first, &second);
    assert!(report.is_identical(), "{report:?}");
    assert_eq!(report.dimensions.len(), Dimension::ALL.len());
}

#[test]
fn single_output_change_is_reported_alone() {
    let first = seal(base_draft("first"));
    let mut changed = base_draft("second");
    changed.outputs[0] = DataKey::new("out.dat", hash('c'), 10);
    let second = seal(changed);

    let report = RecordComparator::default().compare(&first, &second);
    assert!(!report.is_identical());
    let outputs = report.dimension(Dimension::Outputs).expect("outputs");
    assert_eq!(outputs.status, DimensionStatus::Differs);
    assert_eq!(outputs.differing_keys(), vec!["out.dat"]);
    for dimension in Dimension::ALL.iter().filter(|d| **d != Dimension::Outputs) {
        assert!(report.dimension(*dimension).expect("present").is_identical(), "{dimension}");
    }

    let ignoring = RecordComparator::new(CompareOptions {
        ignore_outputs: vec![r"\.dat$".to_string()],
        ..CompareOptions::default()
    })
    .expect("comparator");
    assert!(ignoring.compare(&first, &second).is_identical());
}

#[test]
fn dependency_and_parameter_changes_name_their_keys() {
    let first = seal(base_draft("first"));
    let mut changed = base_draft("second");
    changed.dependencies = vec![
        Dependency::external("numpy", "2.0.0", None, VersionOrigin::DistributionMetadata),
        Dependency::external("scipy", "1.13.0", None, VersionOrigin::DistributionMetadata),
    ];
    changed.parameters.apply_override("n=20").expect("override");
    changed.parameters.apply_override("solver.tol=1e-6").expect("override");
    let second = seal(changed);

    let report = RecordComparator::default().compare(&first, &second);
    let deps = report.dimension(Dimension::Dependencies).expect("deps");
    assert_eq!(deps.differing_keys(), vec!["numpy", "scipy"]);
    let params = report.dimension(Dimension::Parameters).expect("params");
    assert_eq!(params.differing_keys(), vec!["n", "solver.tol"]);

    let long = DiffFormatter::Long.render(&report);
    assert!(long.contains("n: 10 -> 20"), "{long}");
    assert!(long.contains("+ scipy: (absent) -> 1.13.0"), "{long}");
    let short = DiffFormatter::Short.render(&report);
    assert!(short.contains("parameters"));
    assert!(short.contains("DIFFERS: numpy, scipy"), "{short}");
}

#[test]
fn ignore_patterns_are_unanchored_regular_expressions() {
    let first = seal(base_draft("first"));
    let mut changed = base_draft("second");
    changed.outputs[0] = DataKey::new("out.dat", hash('c'), 10);
    let second = seal(changed);

    let comparator = |patterns: &[&str]| {
        RecordComparator::new(CompareOptions {
            ignore_outputs: patterns.iter().map(|p| p.to_string()).collect(),
            ..CompareOptions::default()
        })
    };
    assert!(comparator(&["^out"]).expect("regex").compare(&first, &second).is_identical());
    assert!(comparator(&["t\\.d"]).expect("regex").compare(&first, &second).is_identical());
    assert!(!comparator(&["log", "^dat"]).expect("regex").compare(&first, &second).is_identical());
    // Globs are not valid patterns.
    let err = comparator(&["*.dat"]).expect_err("invalid regex");
    assert_eq!(err.info().code, "output_ignore_pattern");
}

#[test]
fn label_parameter_does_not_count_as_a_difference() {
    let mut first = base_draft("first");
    first.parameters.insert(LABEL_PARAMETER, "first").expect("label");
    let mut second = base_draft("second");
    second.parameters.insert(LABEL_PARAMETER, "second").expect("label");
    let report = RecordComparator::default().compare(&seal(first), &seal(second));
    assert!(report.dimension(Dimension::Parameters).expect("params").is_identical());
}

#[test]
fn dotted_key_is_not_confused_with_a_nested_path() {
    let mut literal = base_draft("literal");
    literal.parameters = ParameterSet::from_json_str(r#"{"solver.tol": 1}"#).expect("params");
    let mut nested = base_draft("nested");
    nested.parameters = ParameterSet::from_json_str(r#"{"solver": {"tol": 1}}"#).expect("params");
    let (literal, nested) = (seal(literal), seal(nested));

    let report = RecordComparator::default().compare(&literal, &nested);
    let params = report.dimension(Dimension::Parameters).expect("params");
    assert_eq!(params.status, DimensionStatus::Differs);
    assert_eq!(params.differing_keys(), vec!["solver.tol", "solver\\.tol"]);
}

#[test]
fn code_identity_compares_revision_and_normalized_diff() {
    let diff = "--- a/run.py\n+++ b/run.py\n@@ -1 +1 @@\n-x = 1\n+x =  1\n";
    let make = |label: &str, revision: &str, patch: &str| {
        let mut draft = base_draft(label);
        draft.code_identity = Some(
            CodeIdentity::versioned(VcsKind::Git, revision, patch, "/work/project").expect("identity"),
        );
        seal(draft)
    };
    let clean = make("clean", "abc123", "");
    let dirty = make("dirty", "abc123", diff);
    let other_rev = make("other", "def456", "");

    let strict = RecordComparator::default();
    let report = strict.compare(&clean, &dirty);
    assert_eq!(
        report.dimension(Dimension::CodeIdentity).expect("code").differing_keys(),
        vec!["working_copy_diff"]
    );
    assert!(strict.compare(&dirty, &dirty).is_identical());
    assert_eq!(
        strict
            .compare(&clean, &other_rev)
            .dimension(Dimension::CodeIdentity)
            .expect("code")
            .differing_keys(),
        vec!["revision_id"]
    );

    let lenient = RecordComparator::new(CompareOptions {
        whitespace: WhitespacePolicy::Ignore,
        ..CompareOptions::default()
    })
    .expect("comparator");
    assert!(lenient.compare(&clean, &dirty).is_identical());
}

#[test]
fn selected_dimensions_only() {
    let first = seal(base_draft("first"));
    let mut changed = base_draft("second");
    changed.exit_status = ExitStatus::Failed { code: 1 };
    let second = seal(changed);

    let core = RecordComparator::new(CompareOptions {
        dimensions: Dimension::CORE.to_vec(),
        ..CompareOptions::default()
    })
    .expect("comparator");
    let report = core.compare(&first, &second);
    assert_eq!(report.dimensions.len(), 4);
    assert!(report.is_identical());
    assert!(!RecordComparator::default().compare(&first, &second).is_identical());
}

#[test]
fn reference_scenario_reproduces() {
    let make = |label: &str| {
        let mut draft = base_draft(label);
        draft.outputs = vec![DataKey::new("out.dat", hash('7'), 42)];
        seal(draft)
    };
    let original = make("original");
    let rerun = make("rerun");
    let report = RecordComparator::default().compare(&original, &rerun);
    assert!(report.is_identical());
    assert_eq!(
        DiffFormatter::Short.render(&report).trim(),
        "Records original and rerun are identical."
    );
}

fn param_value() -> impl Strategy<Value = ParamValue> {
    let leaf = prop_oneof![
        any::<bool>().prop_map(ParamValue::Bool),
        any::<i64>().prop_map(ParamValue::Int),
        (-1.0e9f64..1.0e9).prop_map(ParamValue::Float),
        "[a-z]{0,8}".prop_map(ParamValue::Str),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(ParamValue::List),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4).prop_map(ParamValue::Map),
        ]
    })
}

proptest! {
    #[test]
    fn comparison_is_reflexive(values in prop::collection::btree_map("[a-z]{1,6}", param_value(), 0..6)) {
        let mut draft = base_draft("generated");
        draft.parameters = ParameterSet::try_from(values.into_iter().collect::<BTreeMap<_, _>>()).expect("finite");
        let record = seal(draft);
        let reloaded = Record::from_json_slice(&record.to_json_bytes().expect("json")).expect("reload");
        let report = RecordComparator::default().compare(&record, &reloaded);
        prop_assert!(report.is_identical(), "{:?}", report);
    }
}
