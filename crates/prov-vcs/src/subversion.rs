use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_core::errors::ProvError;
use prov_core::VcsKind;

use crate::adapter::{AdapterOptions, Backend, WorkingCopy};
use crate::runner::CommandRunner;

/// Subversion working copy.
///
/// Subversion has no branch concept of its own, so `branch` is always `None`.
#[derive(Debug, Clone)]
pub struct SubversionWorkingCopy {
    backend: Backend,
}

impl SubversionWorkingCopy {
    pub fn new(root: PathBuf, runner: Arc<dyn CommandRunner>, options: AdapterOptions) -> Self {
        Self {
            backend: Backend::new(VcsKind::Subversion, "svn", root, runner, options),
        }
    }

    fn parse_revision(&self, text: &str) -> Result<String, ProvError> {
        let revision = text.trim();
        match revision.parse::<u64>() {
            Ok(0) => Err(self
                .backend
                .error("no_commits", "repository has no commits yet")
                .with_hint("commit the project once before capturing runs")),
            Ok(_) => Ok(revision.to_string()),
            Err(_) => Err(self
                .backend
                .error("revision_parse", format!("unexpected revision '{revision}'"))),
        }
    }
}

/// Extracts N from "Committed revision N." in `svn commit` output.
fn committed_revision(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        line.trim()
            .strip_prefix("Committed revision ")
            .map(|rest| rest.trim_end_matches('.').trim().to_string())
    })
}

impl WorkingCopy for SubversionWorkingCopy {
    fn kind(&self) -> VcsKind {
        VcsKind::Subversion
    }

    fn root(&self) -> &Path {
        &self.backend.root
    }

    fn options(&self) -> &AdapterOptions {
        &self.backend.options
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        let output = self.backend.exec(&["info", "--show-item", "revision"])?;
        self.parse_revision(&output.stdout_text()).map(Some)
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        Ok(None)
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        Ok(self.backend.exec(&["diff"])?.stdout_text())
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        let output = self.backend.exec(&["status"])?;
        Ok(Backend::lines(&output)
            .into_iter()
            .filter_map(|line| {
                line.strip_prefix('?')
                    .map(|rest| PathBuf::from(rest.trim_start()))
            })
            .collect())
    }

    fn checkout(&self, revision: &str) -> Result<(), ProvError> {
        self.backend.exec(&["update", "-r", revision])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String, ProvError> {
        let untracked = self.untracked_files()?;
        if !untracked.is_empty() {
            let names: Vec<String> = untracked
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
            let mut args = vec!["add"];
            args.extend(names.iter().map(String::as_str));
            self.backend.exec(&args)?;
        }
        let output = self.backend.exec(&["commit", "-m", message])?;
        match committed_revision(&output.stdout_text()) {
            Some(revision) => self.parse_revision(&revision),
            None => Err(self
                .backend
                .error("nothing_to_commit", "subversion did not create a revision")
                .with_context("stdout", output.stdout_text().trim().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::committed_revision;

    #[test]
    fn parses_commit_banner() {
        let out = "Sending        run.py\nTransmitting file data .done\nCommitting transaction...\nCommitted revision 42.\n";
        assert_eq!(committed_revision(out).as_deref(), Some("42"));
        assert_eq!(committed_revision(""), None);
    }
}
