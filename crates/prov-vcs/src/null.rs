use std::path::{Path, PathBuf};

use prov_core::errors::ProvError;
use prov_core::{CodeIdentity, VcsKind};

use crate::adapter::{AdapterOptions, WorkingCopy};

/// Code that is not under version control.
#[derive(Debug, Clone)]
pub struct NullWorkingCopy {
    root: PathBuf,
    options: AdapterOptions,
}

impl NullWorkingCopy {
    pub fn new(root: PathBuf) -> Self {
        let mut options = AdapterOptions::default();
        options.include_untracked = false;
        Self { root, options }
    }
}

impl WorkingCopy for NullWorkingCopy {
    fn kind(&self) -> VcsKind {
        VcsKind::None
    }

    fn root(&self) -> &Path {
        &self.root
    }

    fn options(&self) -> &AdapterOptions {
        &self.options
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        Ok(None)
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        Ok(None)
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        Ok(String::new())
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        Ok(Vec::new())
    }

    fn commit(&self, _message: &str) -> Result<String, ProvError> {
        Err(ProvError::repository(
            "commit_unsupported",
            "cannot commit: project is not under version control",
        )
        .with_context("path", self.root.display().to_string()))
    }

    fn checkout(&self, revision: &str) -> Result<(), ProvError> {
        Err(ProvError::repository(
            "checkout_unsupported",
            "cannot check out a revision: project is not under version control",
        )
        .with_context("revision", revision)
        .with_context("path", self.root.display().to_string()))
    }

    fn identity(&self) -> Result<CodeIdentity, ProvError> {
        Ok(CodeIdentity::unversioned(self.root.clone()))
    }
}
