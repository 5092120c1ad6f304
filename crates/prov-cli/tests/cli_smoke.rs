use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn prov(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("prov").expect("prov binary");
    cmd.current_dir(dir).env_remove("PROV_LOG");
    cmd
}

fn init(dir: &Path) {
    prov(dir)
        .args(["init", "demo", "--vcs", "none"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized prov project 'demo'"));
}

#[test]
fn version_prints_the_package_version() {
    let dir = tempdir().expect("tempdir");
    prov(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(format!("{}\n", env!("CARGO_PKG_VERSION")));

    let output = prov(dir.path()).args(["version", "--long"]).output().expect("run");
    assert!(output.status.success());
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(info["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(info["record_schema"]["major"], 1);
    assert!(info["backends"]["git"].is_string());
}

#[test]
fn commands_outside_a_project_fail() {
    let dir = tempdir().expect("tempdir");
    prov(dir.path())
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a prov project"));
}

#[test]
fn init_writes_config_and_refuses_to_run_twice() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());
    assert!(dir.path().join(".prov/project.toml").is_file());
    assert!(dir.path().join("Data").is_dir());

    prov(dir.path())
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("Project name        : demo"))
        .stdout(predicate::str::contains("Version control     : none"))
        .stdout(predicate::str::contains("Records             : 0"));
    prov(dir.path())
        .args(["init", "again"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    prov(dir.path())
        .args(["configure", "--on-changed", "store-diff", "--executable", "python3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Code change policy  : store-diff"))
        .stdout(predicate::str::contains("Default executable  : python3"));
}

#[cfg(unix)]
#[test]
fn run_list_tag_comment_and_diff() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());

    for (label, content) in [("first", "one"), ("second", "two")] {
        prov(dir.path())
            .args(["run", "--label", label, "--reason", "smoke", "--executable", "sh", "--"])
            .args(["-c", &format!("echo {content} > Data/out.txt")])
            .assert()
            .success()
            .stdout(predicate::str::contains(format!("Record '{label}' stored: success")));
    }
    prov(dir.path()).arg("list").assert().success().stdout("first\nsecond\n");

    prov(dir.path()).args(["tag", "baseline", "first"]).assert().success();
    prov(dir.path()).args(["list", "baseline"]).assert().success().stdout("first\n");

    prov(dir.path()).args(["comment", "looks good"]).assert().success();
    prov(dir.path()).args(["comment", "second", "checked twice"]).assert().success();
    prov(dir.path())
        .args(["list", "--long"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Outcome    : looks good"))
        .stdout(predicate::str::contains("checked twice"))
        .stdout(predicate::str::contains("Tags       : baseline"));

    prov(dir.path())
        .args(["diff", "first", "last"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Record 2: second"))
        .stdout(predicate::str::contains("DIFFERS: out.txt"));
    prov(dir.path())
        .args(["diff", "--long", "first", "first"])
        .assert()
        .success()
        .stdout(predicate::str::contains("identical"));
}

#[cfg(unix)]
#[test]
fn failed_program_is_still_recorded() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());
    prov(dir.path())
        .args(["run", "--label", "broken", "--executable", "sh", "--", "-c", "exit 2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("program did not succeed"));
    prov(dir.path()).arg("list").assert().success().stdout("broken\n");
    prov(dir.path())
        .args(["run", "--label", "broken", "--executable", "sh", "--", "-c", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[cfg(unix)]
#[test]
fn repeat_reports_a_matching_rerun() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());
    let script = "sleep 1; echo stable > Data/out.txt";
    prov(dir.path())
        .args(["run", "--label", "base", "--executable", "sh", "--", "-c", script])
        .assert()
        .success();
    prov(dir.path())
        .args(["repeat", "base"])
        .assert()
        .success()
        .stdout(predicate::str::contains("The new record exactly matches the original."));
    prov(dir.path())
        .args(["list", "--long"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Label      : base_repeat"))
        .stdout(predicate::str::contains("Repeats    : base"))
        .stdout(predicate::str::contains("Reason     : Repeat experiment base"));
}

#[cfg(unix)]
#[test]
fn export_delete_import_and_sync() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());
    prov(dir.path())
        .args(["run", "--label", "kept", "--executable", "sh", "--", "-c", "true"])
        .assert()
        .success();
    let export = dir.path().join("records.json");
    prov(dir.path())
        .args(["export"])
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 records"));

    prov(dir.path()).args(["delete", "last"]).assert().success().stdout("Deleted kept\n");
    prov(dir.path()).arg("list").assert().success().stdout("");
    prov(dir.path())
        .arg("import")
        .arg(&export)
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 1 records (0 already present)"));

    let mirror = dir.path().join("mirror");
    prov(dir.path())
        .arg("sync")
        .arg(&mirror)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 records into the first store and 1 into the second"));
    prov(dir.path())
        .arg("sync")
        .arg(&mirror)
        .assert()
        .success()
        .stdout("Stores are already in sync.\n");
}

#[cfg(unix)]
#[test]
fn labels_reach_the_program_and_outputs_are_archived() {
    let dir = tempdir().expect("tempdir");
    init(dir.path());
    prov(dir.path())
        .args(["configure", "--addlabel", "cmdline", "--archive", "true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Add label           : cmdline"));
    prov(dir.path())
        .args(["run", "--label", "named", "--executable", "sh", "--", "-c", "echo \"$0\" > Data/label.txt"])
        .assert()
        .success();
    let written = std::fs::read_to_string(dir.path().join("Data/label.txt")).expect("output");
    assert_eq!(written, "named\n");
    let archived = std::fs::read_to_string(dir.path().join(".prov/archive/named/label.txt")).expect("archive");
    assert_eq!(archived, "named\n");

    prov(dir.path())
        .args(["list", "--table"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("label\ttimestamp\treason"))
        .stdout(predicate::str::contains("\nnamed\t"));
}
