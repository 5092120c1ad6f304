use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::{hash_data_files, DataKey};
use walkdir::WalkDir;

/// Modification time and size of every file under a data root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataSnapshot {
    files: BTreeMap<PathBuf, (Option<SystemTime>, u64)>,
}

impl DataSnapshot {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Directory tree holding program inputs or outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataStore {
    root: PathBuf,
}

impl DataStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether `path` names an existing file inside the store.
    pub fn contains_path(&self, path: &Path) -> bool {
        let candidate = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        if !candidate.is_file() {
            return false;
        }
        match (candidate.canonicalize(), self.root.canonicalize()) {
            (Ok(file), Ok(root)) => file.starts_with(root),
            _ => false,
        }
    }

    /// Path of `path` relative to the store root, if it lies inside.
    pub fn relative(&self, path: &Path) -> Option<PathBuf> {
        let file = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        };
        let file = file.canonicalize().ok()?;
        let root = self.root.canonicalize().ok()?;
        file.strip_prefix(root).ok().map(Path::to_path_buf)
    }

    /// Records every file currently under the root. A missing root is empty.
    pub fn snapshot(&self) -> Result<DataSnapshot, ProvError> {
        let mut files = BTreeMap::new();
        if !self.root.exists() {
            return Ok(DataSnapshot { files });
        }
        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|err| self.walk_error(err.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let metadata = entry.metadata().map_err(|err| self.walk_error(err.into()))?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| entry.path().to_path_buf());
            files.insert(relative, (metadata.modified().ok(), metadata.len()));
        }
        Ok(DataSnapshot { files })
    }

    /// Files created or rewritten since `before`, relative to the root.
    pub fn changed_since(&self, before: &DataSnapshot) -> Result<Vec<PathBuf>, ProvError> {
        let after = self.snapshot()?;
        Ok(after
            .files
            .into_iter()
            .filter(|(path, stamp)| before.files.get(path) != Some(stamp))
            .map(|(path, _)| path)
            .collect())
    }

    /// Content keys of the given files, plus the files that could not be hashed.
    pub fn keys(&self, paths: &[PathBuf]) -> (Vec<DataKey>, Vec<ProvError>) {
        hash_data_files(&self.root, paths)
    }

    /// Copies `paths` (relative to the root) into `destination`, keeping
    /// their relative layout. Returns the files that could not be copied.
    pub fn archive(&self, paths: &[PathBuf], destination: &Path) -> Vec<ProvError> {
        let mut errors = Vec::new();
        for path in paths {
            let target = destination.join(path);
            let copied = target
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::copy(self.root.join(path), &target));
            if let Err(err) = copied {
                errors.push(ProvError::Store(
                    ErrorInfo::new("archive_copy", err.to_string())
                        .with_context("path", path.display().to_string())
                        .with_context("archive", destination.display().to_string()),
                ));
            }
        }
        errors
    }

    fn walk_error(&self, err: io::Error) -> ProvError {
        ProvError::Store(
            ErrorInfo::new("datastore_walk", err.to_string()).with_context("path", self.root.display().to_string()),
        )
    }
}
