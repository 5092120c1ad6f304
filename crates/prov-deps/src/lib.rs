//! Turns the list of modules a program imported into versioned dependencies.
//!
//! Each entry is reduced to its top-level unit, classified as project-local or
//! external, and external units are looked up in [`sources`] in a fixed
//! priority order. Resolution degrades to `"unknown"` instead of failing.

pub mod locate;
pub mod module;
pub mod resolver;
pub mod sources;

pub use locate::{Locator, ModuleUnit};
pub use module::{normalize_name, ModuleRef};
pub use resolver::{
    resolve_dependencies, DependencyResolver, Resolution, ResolutionWarning, ResolverConfig,
    WarningKind,
};
pub use sources::{DistributionMetadata, PackageManifest, Registry, VersionAttribute, VersionSource};
