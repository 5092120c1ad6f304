use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_core::errors::ProvError;
use prov_core::VcsKind;

use crate::adapter::{AdapterOptions, Backend, WorkingCopy};
use crate::runner::CommandRunner;

/// Bazaar branch.
#[derive(Debug, Clone)]
pub struct BazaarWorkingCopy {
    backend: Backend,
}

impl BazaarWorkingCopy {
    pub fn new(root: PathBuf, runner: Arc<dyn CommandRunner>, options: AdapterOptions) -> Self {
        Self {
            backend: Backend::new(VcsKind::Bazaar, "bzr", root, runner, options),
        }
    }
}

impl WorkingCopy for BazaarWorkingCopy {
    fn kind(&self) -> VcsKind {
        VcsKind::Bazaar
    }

    fn root(&self) -> &Path {
        &self.backend.root
    }

    fn options(&self) -> &AdapterOptions {
        &self.backend.options
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        // `revision-info` prints "<revno> <revision-id>".
        let output = self.backend.exec(&["revision-info"])?;
        let text = output.stdout_text();
        let mut parts = text.split_whitespace();
        let revno = parts.next().unwrap_or_default();
        let revid = parts.next().unwrap_or_default();
        if revno.is_empty() || revno == "0" || revid.is_empty() || revid == "null:" {
            return Err(self
                .backend
                .error("no_commits", "branch has no commits yet")
                .with_hint("commit the project once before capturing runs"));
        }
        Ok(Some(revid.to_string()))
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        let output = self.backend.exec(&["nick"])?;
        Ok(Some(output.stdout_text().trim().to_string()).filter(|name| !name.is_empty()))
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        // Exit status 1 means "differences found".
        Ok(self.backend.exec_accepting(&["diff"], &[0, 1])?.stdout_text())
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        let output = self.backend.exec(&["ls", "-R", "--unknown"])?;
        Ok(Backend::lines(&output)
            .into_iter()
            .filter(|line| !line.ends_with('/'))
            .map(PathBuf::from)
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
        self.backend.exec(&["commit", "-m", message])?;
        self.current_revision()?
            .ok_or_else(|| self.backend.error("commit_revision", "no revision after commit"))
    }
}
