use std::fs;
use std::path::{Path, PathBuf};

use prov_capture::{OnChanged, ProjectConfig};
use prov_core::{VcsKind, WhitespacePolicy};
use tempfile::tempdir;

#[test]
fn save_load_round_trip_with_defaults() {
    let dir = tempdir().expect("tempdir");
    let mut config = ProjectConfig::new("diffusion");
    config.executable = Some("python".to_string());
    config.main_file = Some("main.py".to_string());
    config.on_changed = OnChanged::StoreDiff;
    config.vcs = Some(VcsKind::Mercurial);
    config.save(dir.path()).expect("save");

    assert!(dir.path().join(".prov/project.toml").is_file());
    let loaded = ProjectConfig::load(dir.path()).expect("load");
    assert_eq!(loaded, config);
    assert_eq!(loaded.data_path, PathBuf::from("Data"));
    assert!(loaded.include_untracked);
}

#[test]
fn minimal_file_fills_defaults() {
    let dir = tempdir().expect("tempdir");
    fs::create_dir_all(dir.path().join(".prov")).expect("dir");
    fs::write(
        dir.path().join(".prov/project.toml"),
        "name = \"demo\"\nwhitespace = \"ignore\"\n",
    )
    .expect("write");
    let config = ProjectConfig::load(dir.path()).expect("load");
    assert_eq!(config.name, "demo");
    assert_eq!(config.on_changed, OnChanged::Error);
    assert_eq!(config.whitespace, WhitespacePolicy::Ignore);
    assert_eq!(config.store, Path::new(".prov").join("records.db"));
}

#[test]
fn invalid_files_are_config_errors() {
    let dir = tempdir().expect("tempdir");
    let err = ProjectConfig::load(dir.path()).expect_err("missing");
    assert_eq!(err.info().code, "project_read");

    fs::create_dir_all(dir.path().join(".prov")).expect("dir");
    fs::write(dir.path().join(".prov/project.toml"), "name = \"x\"\non_changed = \"panic\"\n").expect("write");
    let err = ProjectConfig::load(dir.path()).expect_err("bad value");
    assert_eq!(err.family(), "config");
    assert_eq!(err.info().code, "project_parse");
}

#[test]
fn discover_walks_up_to_the_project() {
    let dir = tempdir().expect("tempdir");
    ProjectConfig::new("nested").save(dir.path()).expect("save");
    let deep = dir.path().join("src/models");
    fs::create_dir_all(&deep).expect("mkdir");
    assert_eq!(ProjectConfig::discover(&deep).as_deref(), Some(dir.path()));
}

#[test]
fn adapter_options_hide_project_state_and_data() {
    let dir = tempdir().expect("tempdir");
    let mut config = ProjectConfig::new("demo");
    config.untracked_ignore = vec!["*.log".to_string()];
    let options = config.adapter_options(dir.path()).expect("options");
    assert!(!options.reports_untracked(Path::new("Data/out.dat")));
    assert!(!options.reports_untracked(Path::new(".prov/records.db")));
    assert!(!options.reports_untracked(Path::new("run.log")));
    assert!(options.reports_untracked(Path::new("model.py")));

    config.vcs = Some(VcsKind::Subversion);
    let options = config.adapter_options(dir.path()).expect("options");
    assert_eq!(options.preference, vec![VcsKind::Subversion]);
}

#[test]
fn capture_config_resolves_paths_against_the_root() {
    let root = Path::new("/work/project");
    let mut config = ProjectConfig::new("demo");
    config.input_path = PathBuf::from("/data/shared");
    config.auto_commit = true;
    let capture = config.capture_config(root).expect("capture config");
    assert_eq!(capture.data_root, root.join("Data"));
    assert_eq!(capture.input_root, PathBuf::from("/data/shared"));
    assert!(capture.strict());
    assert!(capture.auto_commit);
    assert_eq!(capture.resolver.project_root, root);
}
