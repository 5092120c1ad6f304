use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use prov_core::{ProvError, VcsKind};
use prov_vcs::{AdapterOptions, CommandOutput, CommandRunner, VcsAdapter, WorkingCopy};

/// Answers backend commands from a table keyed by "program arg arg ...".
#[derive(Debug, Default)]
struct ScriptedRunner {
    responses: HashMap<String, CommandOutput>,
    calls: Mutex<Vec<String>>,
    missing: bool,
}

impl ScriptedRunner {
    fn with(mut self, command: &str, output: CommandOutput) -> Self {
        self.responses.insert(command.to_string(), output);
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls").clone()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[&str], _cwd: &Path) -> io::Result<CommandOutput> {
        if self.missing {
            return Err(io::Error::new(io::ErrorKind::NotFound, "not installed"));
        }
        let key = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().expect("calls").push(key.clone());
        Ok(self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(255, format!("unscripted: {key}"))))
    }
}

fn adapter(kind: VcsKind, runner: ScriptedRunner) -> (VcsAdapter, Arc<ScriptedRunner>) {
    let runner = Arc::new(runner);
    let adapter = VcsAdapter::for_kind(
        kind,
        PathBuf::from("/nonexistent/project"),
        AdapterOptions::new(false, Vec::new(), &[]).expect("options"),
        runner.clone(),
    );
    (adapter, runner)
}

const NODE: &str = "9f2c1d6e3a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d";

#[test]
fn mercurial_clean_and_dirty() {
    let runner = ScriptedRunner::default()
        .with("hg log -r . --template {node}", CommandOutput::ok(NODE))
        .with("hg branch", CommandOutput::ok("default\n"))
        .with("hg diff", CommandOutput::ok(""));
    let (hg, _) = adapter(VcsKind::Mercurial, runner);
    let identity = hg.identity().expect("identity");
    assert_eq!(identity.vcs_type(), VcsKind::Mercurial);
    assert_eq!(identity.revision_id(), Some(NODE));
    assert_eq!(identity.branch(), Some("default"));
    assert!(!identity.dirty());

    let diff = "diff -r 9f2c run.py\n--- a/run.py\n+++ b/run.py\n@@ -1 +1 @@\n-a\n+b\n";
    let runner = ScriptedRunner::default()
        .with("hg log -r . --template {node}", CommandOutput::ok(NODE))
        .with("hg branch", CommandOutput::ok("default\n"))
        .with("hg diff", CommandOutput::ok(diff));
    let (hg, _) = adapter(VcsKind::Mercurial, runner);
    let identity = hg.identity().expect("identity");
    assert!(identity.dirty());
    assert_eq!(identity.working_copy_diff(), diff);
}

#[test]
fn mercurial_null_node_means_no_commits() {
    let runner = ScriptedRunner::default().with(
        "hg log -r . --template {node}",
        CommandOutput::ok("0000000000000000000000000000000000000000"),
    );
    let (hg, _) = adapter(VcsKind::Mercurial, runner);
    let err = hg.identity().expect_err("no commits");
    assert_eq!(err.info().code, "no_commits");
}

#[test]
fn subversion_revision_zero_is_rejected_and_commit_parses_banner() {
    let runner = ScriptedRunner::default().with("svn info --show-item revision", CommandOutput::ok("0\n"));
    let (svn, _) = adapter(VcsKind::Subversion, runner);
    assert!(matches!(svn.identity(), Err(ProvError::Repository(_))));

    let runner = ScriptedRunner::default()
        .with("svn info --show-item revision", CommandOutput::ok("41\n"))
        .with("svn diff", CommandOutput::ok(""))
        .with(
            "svn commit -m snapshot",
            CommandOutput::ok("Sending        run.py\nCommitted revision 42.\n"),
        );
    let (svn, runner) = adapter(VcsKind::Subversion, runner);
    let identity = svn.identity().expect("identity");
    assert_eq!(identity.revision_id(), Some("41"));
    assert_eq!(identity.branch(), None);
    assert_eq!(svn.commit("snapshot").expect("commit"), "42");
    assert!(runner.calls().contains(&"svn commit -m snapshot".to_string()));
}

#[test]
fn subversion_status_lists_unknown_files() {
    let runner = ScriptedRunner::default()
        .with("svn status", CommandOutput::ok("M       run.py\n?       notes.txt\n?       Data\n"));
    let runner = Arc::new(runner);
    let svn = VcsAdapter::for_kind(
        VcsKind::Subversion,
        PathBuf::from("/nonexistent/project"),
        AdapterOptions::new(true, Vec::new(), &["Data".to_string()]).expect("options"),
        runner,
    );
    assert_eq!(
        svn.untracked_files().expect("untracked"),
        vec![PathBuf::from("notes.txt")]
    );
}

#[test]
fn bazaar_diff_exit_one_means_changes() {
    let diff = "=== modified file 'run.py'\n--- run.py\n+++ run.py\n@@ -1 +1 @@\n-a\n+b\n";
    let runner = ScriptedRunner::default()
        .with("bzr revision-info", CommandOutput::ok("7 joe@example.org-20240101-abc\n"))
        .with("bzr nick", CommandOutput::ok("trunk\n"))
        .with(
            "bzr diff",
            CommandOutput {
                status: Some(1),
                stdout: diff.as_bytes().to_vec(),
                stderr: Vec::new(),
            },
        );
    let (bzr, _) = adapter(VcsKind::Bazaar, runner);
    let identity = bzr.identity().expect("identity");
    assert_eq!(identity.revision_id(), Some("joe@example.org-20240101-abc"));
    assert_eq!(identity.branch(), Some("trunk"));
    assert!(identity.dirty());
}

#[test]
fn bazaar_empty_branch_and_diff_errors() {
    let runner = ScriptedRunner::default().with("bzr revision-info", CommandOutput::ok("0 null:\n"));
    let (bzr, _) = adapter(VcsKind::Bazaar, runner);
    assert_eq!(bzr.identity().expect_err("empty").info().code, "no_commits");

    let runner = ScriptedRunner::default()
        .with("bzr revision-info", CommandOutput::ok("3 rev-3\n"))
        .with("bzr diff", CommandOutput::failed(3, "bzr: ERROR: broken"));
    let (bzr, _) = adapter(VcsKind::Bazaar, runner);
    let err = bzr.diff().expect_err("diff fails");
    assert_eq!(err.info().code, "backend_command_failed");
    assert_eq!(
        err.info().context.get("stderr").map(String::as_str),
        Some("bzr: ERROR: broken")
    );
}

#[test]
fn missing_backend_binary_reports_unavailable() {
    let runner = ScriptedRunner {
        missing: true,
        ..ScriptedRunner::default()
    };
    let (hg, _) = adapter(VcsKind::Mercurial, runner);
    let err = hg.identity().expect_err("missing");
    assert!(matches!(err, ProvError::Repository(_)));
    assert_eq!(err.info().code, "backend_unavailable");
    assert!(err.info().hint.is_some());
}

#[test]
fn use_revision_updates_only_a_clean_copy() {
    let runner = ScriptedRunner::default()
        .with("hg log -r . --template {node}", CommandOutput::ok(NODE))
        .with("hg diff", CommandOutput::ok(""))
        .with("hg update --rev 3", CommandOutput::ok("1 files updated\n"));
    let (hg, runner) = adapter(VcsKind::Mercurial, runner);
    hg.use_revision("3").expect("update");
    assert!(runner.calls().contains(&"hg update --rev 3".to_string()));

    hg.use_revision(NODE).expect("already there");
    assert_eq!(
        runner.calls().iter().filter(|call| call.starts_with("hg update")).count(),
        1
    );

    let runner = ScriptedRunner::default()
        .with("hg log -r . --template {node}", CommandOutput::ok(NODE))
        .with("hg diff", CommandOutput::ok("--- a/x\n+++ b/x\n@@ -1 +1 @@\n-a\n+b\n"));
    let (hg, runner) = adapter(VcsKind::Mercurial, runner);
    let err = hg.use_revision("3").expect_err("dirty");
    assert!(matches!(err, ProvError::DirtyRepository(_)));
    assert!(!runner.calls().iter().any(|call| call.starts_with("hg update")));
}

#[test]
fn unversioned_copy_cannot_switch_revisions() {
    let null = VcsAdapter::null(Path::new("/nonexistent/project"));
    let err = null.use_revision("3").expect_err("unversioned");
    assert_eq!(err.info().code, "checkout_unsupported");
}
