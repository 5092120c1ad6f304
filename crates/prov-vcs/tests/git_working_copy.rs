use std::fs;
use std::path::Path;
use std::process::Command;

use prov_core::{ProvError, VcsKind};
use prov_vcs::{get_identity, AdapterOptions, VcsAdapter, WorkingCopy};

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo(dir: &Path) {
    git(dir, &["init", "-q"]);
    git(dir, &["config", "user.email", "runner@example.org"]);
    git(dir, &["config", "user.name", "Runner"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

fn committed_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tmp");
    init_repo(dir.path());
    fs::write(dir.path().join("model.py"), "n = 10\nprint(n)\n").expect("write");
    git(dir.path(), &["add", "model.py"]);
    git(dir.path(), &["commit", "-q", "-m", "initial"]);
    dir
}

#[test]
fn clean_modified_and_reverted_copies() {
    if !git_available() {
        eprintln!("git not installed; skipping");
        return;
    }
    let repo = committed_repo();
    let options = AdapterOptions::default();

    let clean = get_identity(repo.path(), &options).expect("clean identity");
    assert_eq!(clean.vcs_type(), VcsKind::Git);
    assert!(!clean.dirty());
    assert!(clean.working_copy_diff().is_empty());
    let revision = clean.revision_id().expect("revision").to_string();
    assert_eq!(revision.len(), 40);

    fs::write(repo.path().join("model.py"), "n = 20\nprint(n)\n").expect("modify");
    let dirty = get_identity(repo.path(), &options).expect("dirty identity");
    assert!(dirty.dirty());
    assert!(dirty.working_copy_diff().contains("model.py"));
    assert!(dirty.working_copy_diff().contains("+n = 20"));
    assert_eq!(dirty.revision_id(), Some(revision.as_str()));

    fs::write(repo.path().join("model.py"), "n = 10\nprint(n)\n").expect("revert");
    let reverted = get_identity(repo.path(), &options).expect("reverted identity");
    assert!(!reverted.dirty());
    assert_eq!(reverted, clean);
}

#[test]
fn untracked_files_appear_unless_ignored() {
    if !git_available() {
        return;
    }
    let repo = committed_repo();
    fs::create_dir(repo.path().join("Data")).expect("data dir");
    fs::write(repo.path().join("Data/out.dat"), "1 2 3\n").expect("output");
    fs::write(repo.path().join("helper.py"), "x = 1\n").expect("helper");

    let options = AdapterOptions::new(true, Vec::new(), &["Data/**".to_string()]).expect("options");
    let adapter = VcsAdapter::open(repo.path(), &options).expect("open");
    let diff = adapter.diff().expect("diff");
    assert!(diff.contains("+++ b/helper.py"));
    assert!(diff.contains("+x = 1"));
    assert!(!diff.contains("out.dat"));
    assert!(adapter.has_changes().expect("changes"));

    let without = AdapterOptions::new(false, Vec::new(), &[]).expect("options");
    let identity = get_identity(repo.path(), &without).expect("identity");
    assert!(!identity.dirty());
}

#[test]
fn repository_without_commits_is_an_error() {
    if !git_available() {
        return;
    }
    let dir = tempfile::tempdir().expect("tmp");
    init_repo(dir.path());
    let err = get_identity(dir.path(), &AdapterOptions::default()).expect_err("no commits");
    assert!(matches!(err, ProvError::Repository(_)));
    assert_eq!(err.info().code, "no_commits");
    assert_eq!(err.info().context.get("backend").map(String::as_str), Some("git"));
}

#[test]
fn commit_records_changes_but_not_ignored_files() {
    if !git_available() {
        return;
    }
    let repo = committed_repo();
    fs::create_dir(repo.path().join("Data")).expect("data dir");
    fs::write(repo.path().join("Data/out.dat"), "result\n").expect("output");
    fs::write(repo.path().join("model.py"), "n = 30\nprint(n)\n").expect("modify");

    let options = AdapterOptions::new(true, Vec::new(), &["Data/**".to_string()]).expect("options");
    let adapter = VcsAdapter::open(repo.path(), &options).expect("open");
    let before = adapter.current_revision().expect("rev").expect("some");
    let after = adapter.commit("auto commit").expect("commit");
    assert_ne!(before, after);
    assert!(!adapter.has_changes().expect("changes"));

    let everything = VcsAdapter::open(repo.path(), &AdapterOptions::default()).expect("open");
    assert!(everything.diff().expect("diff").contains("out.dat"));
}

#[test]
fn nothing_to_commit_is_refused() {
    if !git_available() {
        return;
    }
    let repo = committed_repo();
    let adapter = VcsAdapter::open(repo.path(), &AdapterOptions::default()).expect("open");
    let err = adapter.commit("empty").expect_err("refused");
    assert!(matches!(err, ProvError::Repository(_)));
    assert!(err.info().context.contains_key("stderr"));
}

#[test]
fn plain_directory_falls_back_to_null_adapter() {
    let dir = tempfile::tempdir().expect("tmp");
    let adapter = VcsAdapter::null(dir.path());
    let identity = adapter.identity().expect("identity");
    assert_eq!(identity.vcs_type(), VcsKind::None);
    assert_eq!(identity.revision_id(), None);
    assert!(!identity.dirty());
    assert!(adapter.commit("nope").is_err());
}
