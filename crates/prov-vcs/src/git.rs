use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_core::errors::ProvError;
use prov_core::VcsKind;

use crate::adapter::{AdapterOptions, Backend, WorkingCopy};
use crate::runner::CommandRunner;

/// Git working copy.
#[derive(Debug, Clone)]
pub struct GitWorkingCopy {
    backend: Backend,
}

impl GitWorkingCopy {
    pub fn new(root: PathBuf, runner: Arc<dyn CommandRunner>, options: AdapterOptions) -> Self {
        Self {
            backend: Backend::new(VcsKind::Git, "git", root, runner, options),
        }
    }
}

impl WorkingCopy for GitWorkingCopy {
    fn kind(&self) -> VcsKind {
        VcsKind::Git
    }

    fn root(&self) -> &Path {
        &self.backend.root
    }

    fn options(&self) -> &AdapterOptions {
        &self.backend.options
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        let output = self
            .backend
            .exec(&["rev-parse", "--verify", "HEAD"])
            .map_err(|err| {
                if err.info().code != "backend_command_failed" {
                    return err;
                }
                let stderr = err.info().context.get("stderr").cloned().unwrap_or_default();
                self.backend
                    .error("no_commits", "repository has no commits yet")
                    .with_context("stderr", stderr)
                    .with_hint("commit the project once before capturing runs")
            })?;
        let revision = output.stdout_text().trim().to_string();
        if revision.is_empty() {
            return Err(self.backend.error("no_commits", "repository has no commits yet"));
        }
        Ok(Some(revision))
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        let output = self.backend.exec(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let branch = output.stdout_text().trim().to_string();
        // Detached checkouts report the literal "HEAD".
        Ok(Some(branch).filter(|name| !name.is_empty() && name != "HEAD"))
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        Ok(self.backend.exec(&["diff", "HEAD"])?.stdout_text())
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        let output = self
            .backend
            .exec(&["ls-files", "--others", "--exclude-standard", "-z"])?;
        Ok(output
            .stdout_text()
            .split('\0')
            .filter(|entry| !entry.is_empty())
            .map(PathBuf::from)
            .collect())
    }

    fn checkout(&self, revision: &str) -> Result<(), ProvError> {
        self.backend.exec(&["checkout", "--quiet", revision])?;
        Ok(())
    }

    fn commit(&self, message: &str) -> Result<String, ProvError> {
        self.backend.exec(&["add", "-u"])?;
        let untracked = self.untracked_files()?;
        if !untracked.is_empty() {
            let names: Vec<String> = untracked
                .iter()
                .map(|path| path.to_string_lossy().into_owned())
                .collect();
            let mut args = vec!["add", "--"];
            args.extend(names.iter().map(String::as_str));
            self.backend.exec(&args)?;
        }
        self.backend.exec(&["commit", "-m", message])?;
        self.current_revision()?
            .ok_or_else(|| self.backend.error("commit_revision", "no revision after commit"))
    }
}
