//! External libraries (and project-local modules) used by an executed program.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Version string recorded when no source could resolve one.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Where a dependency's version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionOrigin {
    /// Module is part of the project's own working copy.
    Local,
    /// Installed-package metadata (`METADATA` / `PKG-INFO`).
    DistributionMetadata,
    /// A `__version__`-style attribute in the module source.
    VersionAttribute,
    /// The nearest package manifest (Cargo.toml, pyproject.toml, package.json).
    PackageManifest,
    /// Versions supplied directly by the caller.
    Registry,
    /// Nothing resolved.
    Unknown,
}

impl VersionOrigin {
    /// Higher is more trustworthy; used when merging duplicates.
    pub fn confidence(&self) -> u8 {
        match self {
            VersionOrigin::Local => 5,
            VersionOrigin::DistributionMetadata => 4,
            VersionOrigin::VersionAttribute => 3,
            VersionOrigin::PackageManifest => 2,
            VersionOrigin::Registry => 1,
            VersionOrigin::Unknown => 0,
        }
    }
}

/// One resolved dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// Top-level installable unit name.
    pub name: String,
    /// Resolved version or [`UNKNOWN_VERSION`].
    pub version: String,
    /// Physical location of the module, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
    /// True when the module lives inside the project repository.
    pub is_local_module: bool,
    /// Source that produced `version`.
    pub origin: VersionOrigin,
}

impl Dependency {
    /// Dependency on a module that belongs to the project itself.
    pub fn local(name: impl Into<String>, source_path: Option<PathBuf>) -> Self {
        Self {
            name: name.into(),
            version: UNKNOWN_VERSION.to_string(),
            source_path,
            is_local_module: true,
            origin: VersionOrigin::Local,
        }
    }

    /// External dependency whose version is known.
    pub fn external(
        name: impl Into<String>,
        version: impl Into<String>,
        source_path: Option<PathBuf>,
        origin: VersionOrigin,
    ) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            source_path,
            is_local_module: false,
            origin,
        }
    }

    /// External dependency that no source could resolve.
    pub fn unresolved(name: impl Into<String>, source_path: Option<PathBuf>) -> Self {
        Self::external(name, UNKNOWN_VERSION, source_path, VersionOrigin::Unknown)
    }

    /// Whether the version is a real value rather than the placeholder.
    pub fn has_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }
}
