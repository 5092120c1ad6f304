use std::path::{Path, PathBuf};
use std::sync::Arc;

use prov_core::errors::ProvError;
use prov_core::VcsKind;

use crate::adapter::{AdapterOptions, Backend, WorkingCopy};
use crate::runner::CommandRunner;

const NULL_NODE: &str = "0000000000000000000000000000000000000000";

/// Mercurial working copy.
#[derive(Debug, Clone)]
pub struct MercurialWorkingCopy {
    backend: Backend,
}

impl MercurialWorkingCopy {
    pub fn new(root: PathBuf, runner: Arc<dyn CommandRunner>, options: AdapterOptions) -> Self {
        Self {
            backend: Backend::new(VcsKind::Mercurial, "hg", root, runner, options),
        }
    }
}

impl WorkingCopy for MercurialWorkingCopy {
    fn kind(&self) -> VcsKind {
        VcsKind::Mercurial
    }

    fn root(&self) -> &Path {
        &self.backend.root
    }

    fn options(&self) -> &AdapterOptions {
        &self.backend.options
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        let output = self.backend.exec(&["log", "-r", ".", "--template", "{node}"])?;
        let node = output.stdout_text().trim().to_string();
        if node.is_empty() || node == NULL_NODE {
            return Err(self
                .backend
                .error("no_commits", "repository has no commits yet")
                .with_hint("commit the project once before capturing runs"));
        }
        Ok(Some(node))
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        let output = self.backend.exec(&["branch"])?;
        Ok(Some(output.stdout_text().trim().to_string()).filter(|name| !name.is_empty()))
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        Ok(self.backend.exec(&["diff"])?.stdout_text())
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        let output = self.backend.exec(&["status", "-u", "-n"])?;
        Ok(Backend::lines(&output).into_iter().map(PathBuf::from).collect())
    }

    fn checkout(&self, revision: &str) -> Result<(), ProvError> {
        self.backend.exec(&["update", "--rev", revision])?;
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
