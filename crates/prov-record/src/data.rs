use std::fmt;
use std::path::{Path, PathBuf};

use prov_core::errors::ProvError;
use prov_core::hash_file;
use serde::{Deserialize, Serialize};

/// Content identity of one data file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DataKey {
    /// Path relative to the datastore root, `/`-separated.
    pub path: String,
    /// Hex sha256 of the contents.
    pub sha256: String,
    pub size: u64,
}

impl DataKey {
    pub fn new(path: impl Into<String>, sha256: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            sha256: sha256.into(),
            size,
        }
    }

    /// Hashes `root/relative`.
    pub fn from_file(root: &Path, relative: &Path) -> Result<Self, ProvError> {
        let (sha256, size) = hash_file(&root.join(relative))?;
        Ok(Self::new(display_path(relative), sha256, size))
    }
}

impl fmt::Display for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.sha256.get(..12).unwrap_or(&self.sha256);
        write!(f, "{} ({short}, {} bytes)", self.path, self.size)
    }
}

/// Hashes every path under `root`, sorted by relative path.
///
/// Absolute paths outside `root` are kept as given. Files that cannot be
/// hashed are returned as errors so the caller can still seal the record.
pub fn hash_data_files(root: &Path, paths: &[PathBuf]) -> (Vec<DataKey>, Vec<ProvError>) {
    let mut keys = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        let relative = if path.is_absolute() {
            path.strip_prefix(root).map(Path::to_path_buf).unwrap_or_else(|_| path.clone())
        } else {
            path.clone()
        };
        let result = if relative.is_absolute() {
            hash_file(&relative).map(|(sha, size)| DataKey::new(display_path(&relative), sha, size))
        } else {
            DataKey::from_file(root, &relative)
        };
        match result {
            Ok(key) => keys.push(key),
            Err(err) => errors.push(err),
        }
    }
    keys.sort();
    keys.dedup();
    (keys, errors)
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outputs_are_keyed_relative_to_root() {
        let dir = tempfile::tempdir().expect("tmp");
        std::fs::create_dir(dir.path().join("run1")).expect("mkdir");
        std::fs::write(dir.path().join("run1/out.dat"), b"42\n").expect("write");
        std::fs::write(dir.path().join("log.txt"), b"").expect("write");

        let (keys, errors) = hash_data_files(
            dir.path(),
            &[dir.path().join("run1/out.dat"), PathBuf::from("log.txt"), PathBuf::from("gone.dat")],
        );
        assert_eq!(errors.len(), 1);
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].path, "log.txt");
        assert_eq!(keys[1].path, "run1/out.dat");
        assert_eq!(keys[1].size, 3);
        assert_eq!(keys[1].sha256.len(), 64);
    }
}
