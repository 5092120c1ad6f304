//! Reproducible description of the code state that produced a run.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, ProvError};

/// Version control backend family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VcsKind {
    /// Git working copies (`.git`).
    #[serde(rename = "git")]
    Git,
    /// Mercurial working copies (`.hg`).
    #[serde(rename = "hg")]
    Mercurial,
    /// Subversion working copies (`.svn`).
    #[serde(rename = "svn")]
    Subversion,
    /// Bazaar branches (`.bzr`).
    #[serde(rename = "bzr")]
    Bazaar,
    /// No version control.
    #[serde(rename = "none")]
    None,
}

impl VcsKind {
    /// Every versioned backend, in the default preference order.
    pub const VERSIONED: [VcsKind; 4] = [
        VcsKind::Git,
        VcsKind::Mercurial,
        VcsKind::Subversion,
        VcsKind::Bazaar,
    ];

    /// Short identifier used in configuration files and error context.
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsKind::Git => "git",
            VcsKind::Mercurial => "hg",
            VcsKind::Subversion => "svn",
            VcsKind::Bazaar => "bzr",
            VcsKind::None => "none",
        }
    }

    /// Name of the metadata directory that marks a working copy root.
    pub fn metadata_dir(&self) -> Option<&'static str> {
        match self {
            VcsKind::Git => Some(".git"),
            VcsKind::Mercurial => Some(".hg"),
            VcsKind::Subversion => Some(".svn"),
            VcsKind::Bazaar => Some(".bzr"),
            VcsKind::None => None,
        }
    }
}

impl fmt::Display for VcsKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcsKind {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "git" => Ok(VcsKind::Git),
            "hg" | "mercurial" => Ok(VcsKind::Mercurial),
            "svn" | "subversion" => Ok(VcsKind::Subversion),
            "bzr" | "bazaar" => Ok(VcsKind::Bazaar),
            "none" => Ok(VcsKind::None),
            other => Err(ProvError::Config(
                ErrorInfo::new("vcs_kind", format!("unknown version control backend '{other}'"))
                    .with_hint("expected one of git, hg, svn, bzr, none"),
            )),
        }
    }
}

/// Code identity captured once per run.
///
/// `dirty` always mirrors whether `working_copy_diff` is non-empty, and a
/// revision is present exactly when the kind is versioned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCodeIdentity", into = "RawCodeIdentity")]
pub struct CodeIdentity {
    vcs_type: VcsKind,
    revision_id: Option<String>,
    working_copy_diff: String,
    dirty: bool,
    working_copy_root: PathBuf,
    branch: Option<String>,
}

impl CodeIdentity {
    /// Identity of a versioned working copy at `revision_id`.
    pub fn versioned(
        vcs_type: VcsKind,
        revision_id: impl Into<String>,
        working_copy_diff: impl Into<String>,
        working_copy_root: impl Into<PathBuf>,
    ) -> Result<Self, ProvError> {
        let identity = Self::from_parts(
            vcs_type,
            Some(revision_id.into()),
            working_copy_diff.into(),
            working_copy_root.into(),
            None,
        );
        identity.validate()?;
        Ok(identity)
    }

    /// Identity of code that is not under version control.
    pub fn unversioned(working_copy_root: impl Into<PathBuf>) -> Self {
        Self::from_parts(
            VcsKind::None,
            None,
            String::new(),
            working_copy_root.into(),
            None,
        )
    }

    fn from_parts(
        vcs_type: VcsKind,
        revision_id: Option<String>,
        working_copy_diff: String,
        working_copy_root: PathBuf,
        branch: Option<String>,
    ) -> Self {
        let dirty = !working_copy_diff.is_empty();
        Self {
            vcs_type,
            revision_id,
            working_copy_diff,
            dirty,
            working_copy_root,
            branch,
        }
    }

    /// Attaches the branch name reported by the backend.
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch.filter(|name| !name.trim().is_empty());
        self
    }

    /// Checks the structural invariants.
    pub fn validate(&self) -> Result<(), ProvError> {
        if self.dirty == self.working_copy_diff.is_empty() {
            return Err(invalid("dirty flag disagrees with working copy diff", self));
        }
        match (&self.vcs_type, &self.revision_id) {
            (VcsKind::None, Some(_)) => Err(invalid("unversioned identity carries a revision", self)),
            (VcsKind::None, None) if self.dirty => {
                Err(invalid("unversioned identity carries a diff", self))
            }
            (VcsKind::None, None) => Ok(()),
            (_, None) => Err(invalid("versioned identity is missing a revision", self)),
            (_, Some(rev)) if rev.trim().is_empty() => {
                Err(invalid("versioned identity has an empty revision", self))
            }
            _ => Ok(()),
        }
    }

    /// Backend kind.
    pub fn vcs_type(&self) -> VcsKind {
        self.vcs_type
    }

    /// Backend-native revision identifier.
    pub fn revision_id(&self) -> Option<&str> {
        self.revision_id.as_deref()
    }

    /// Patch of uncommitted changes, empty when clean.
    pub fn working_copy_diff(&self) -> &str {
        &self.working_copy_diff
    }

    /// Whether the working copy had uncommitted changes.
    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Root directory that was inspected.
    pub fn working_copy_root(&self) -> &Path {
        &self.working_copy_root
    }

    /// Branch name when the backend reports one.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }
}

fn invalid(message: &str, identity: &CodeIdentity) -> ProvError {
    ProvError::Serde(
        ErrorInfo::new("code_identity_invariant", message)
            .with_context("backend", identity.vcs_type.as_str())
            .with_context("path", identity.working_copy_root.display().to_string()),
    )
}

#[derive(Serialize, Deserialize)]
struct RawCodeIdentity {
    vcs_type: VcsKind,
    #[serde(default)]
    revision_id: Option<String>,
    #[serde(default)]
    working_copy_diff: String,
    dirty: bool,
    #[serde(default)]
    working_copy_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    branch: Option<String>,
}

impl TryFrom<RawCodeIdentity> for CodeIdentity {
    type Error = ProvError;

    fn try_from(raw: RawCodeIdentity) -> Result<Self, Self::Error> {
        let identity = CodeIdentity {
            vcs_type: raw.vcs_type,
            revision_id: raw.revision_id,
            working_copy_diff: raw.working_copy_diff,
            dirty: raw.dirty,
            working_copy_root: raw.working_copy_root,
            branch: raw.branch,
        };
        identity.validate()?;
        Ok(identity)
    }
}

impl From<CodeIdentity> for RawCodeIdentity {
    fn from(identity: CodeIdentity) -> Self {
        Self {
            vcs_type: identity.vcs_type,
            revision_id: identity.revision_id,
            working_copy_diff: identity.working_copy_diff,
            dirty: identity.dirty,
            working_copy_root: identity.working_copy_root,
            branch: identity.branch,
        }
    }
}
