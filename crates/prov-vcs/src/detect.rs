use std::fs;
use std::path::{Path, PathBuf};

use prov_core::VcsKind;

/// Working copy located by [`detect`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub kind: VcsKind,
    pub root: PathBuf,
}

/// Finds the innermost working copy enclosing `path` using the default backend order.
pub fn detect(path: &Path) -> Option<Detected> {
    detect_with_preference(path, &VcsKind::VERSIONED)
}

/// Finds the innermost working copy enclosing `path`.
///
/// Symlinks are resolved first, so a link into a repository resolves to the
/// repository that physically contains the target. When one directory holds
/// metadata for several backends, `preference` decides.
pub fn detect_with_preference(path: &Path, preference: &[VcsKind]) -> Option<Detected> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let start = if resolved.is_file() {
        resolved.parent()?.to_path_buf()
    } else {
        resolved
    };
    for dir in start.ancestors() {
        for kind in preference {
            let Some(marker) = kind.metadata_dir() else {
                continue;
            };
            if dir.join(marker).exists() {
                tracing::debug!(backend = %kind, root = %dir.display(), "detected working copy");
                return Some(Detected {
                    kind: *kind,
                    root: dir.to_path_buf(),
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_repository_wins() {
        let outer = tempfile::tempdir().expect("tmp");
        fs::create_dir(outer.path().join(".hg")).expect("hg");
        let inner = outer.path().join("vendor/lib");
        fs::create_dir_all(inner.join(".git")).expect("git");
        fs::create_dir_all(inner.join("src")).expect("src");

        let found = detect(&inner.join("src")).expect("detected");
        assert_eq!(found.kind, VcsKind::Git);
        assert_eq!(found.root, fs::canonicalize(&inner).expect("canon"));

        let found = detect(outer.path()).expect("detected outer");
        assert_eq!(found.kind, VcsKind::Mercurial);
    }

    #[test]
    fn preference_breaks_ties_in_one_directory() {
        let dir = tempfile::tempdir().expect("tmp");
        fs::create_dir(dir.path().join(".git")).expect("git");
        fs::create_dir(dir.path().join(".bzr")).expect("bzr");
        let found = detect_with_preference(dir.path(), &[VcsKind::Bazaar, VcsKind::Git])
            .expect("detected");
        assert_eq!(found.kind, VcsKind::Bazaar);
    }

    #[test]
    fn plain_directory_has_no_working_copy() {
        let dir = tempfile::tempdir().expect("tmp");
        let nested = dir.path().join("a/b");
        fs::create_dir_all(&nested).expect("mkdir");
        // The temp dir itself may live inside a checkout on developer machines.
        if let Some(found) = detect(&nested) {
            assert!(!found.root.starts_with(fs::canonicalize(dir.path()).expect("canon")));
        }
    }
}
