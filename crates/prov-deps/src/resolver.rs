use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use prov_core::{Dependency, VersionOrigin};
use serde::{Deserialize, Serialize};

use crate::locate::{Locator, ModuleUnit};
use crate::module::ModuleRef;
use crate::sources::{DistributionMetadata, PackageManifest, Registry, VersionAttribute, VersionSource};

fn default_extensions() -> Vec<String> {
    vec!["py".to_string()]
}

/// Inputs that shape dependency resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Project directory; modules under it are local.
    pub project_root: PathBuf,
    /// Working copy enclosing the project, when it is larger than the
    /// project directory. Modules anywhere in it are local as well.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_root: Option<PathBuf>,
    /// Where installed modules live, searched after the project root.
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    /// Module names skipped entirely (interpreter built-ins and the like).
    #[serde(default)]
    pub ignore: BTreeSet<String>,
    /// Versions known up front, consulted last.
    #[serde(default)]
    pub registry: BTreeMap<String, String>,
    /// Source extensions tried when mapping names to files.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl ResolverConfig {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            repository_root: None,
            search_roots: Vec::new(),
            ignore: BTreeSet::new(),
            registry: BTreeMap::new(),
            extensions: default_extensions(),
        }
    }

    pub fn with_repository_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.repository_root = Some(root.into());
        self
    }

    /// Project directory followed by the enclosing working copy, if any.
    pub fn local_roots(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.project_root.clone()];
        roots.extend(self.repository_root.iter().cloned());
        roots
    }

    pub fn with_search_roots(mut self, roots: impl IntoIterator<Item = PathBuf>) -> Self {
        self.search_roots.extend(roots);
        self
    }

    pub fn with_ignore<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ignore.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_registry<I, K, V>(mut self, versions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.registry
            .extend(versions.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// Why a warning was raised.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// No source produced a version.
    Unresolved,
    /// A path entry does not exist.
    MissingPath,
    /// A source failed while reading.
    SourceError,
}

/// Non-fatal problem met while resolving a module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub module: String,
    pub kind: WarningKind,
    pub message: String,
}

impl fmt::Display for ResolutionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.module, self.message)
    }
}

/// Outcome of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// One entry per top-level unit, sorted by name.
    pub dependencies: Vec<Dependency>,
    pub warnings: Vec<ResolutionWarning>,
}

impl Resolution {
    /// Dependencies whose version could not be determined.
    pub fn unresolved(&self) -> impl Iterator<Item = &Dependency> {
        self.dependencies
            .iter()
            .filter(|dep| !dep.is_local_module && !dep.has_version())
    }
}

/// Classifies imported modules and resolves versions of external ones.
#[derive(Debug, Clone)]
pub struct DependencyResolver {
    config: ResolverConfig,
    locator: Locator,
}

impl DependencyResolver {
    pub fn new(config: ResolverConfig) -> Self {
        let locator = Locator::new(
            &config.local_roots(),
            &config.search_roots,
            config.extensions.clone(),
        );
        Self { config, locator }
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Built-in sources in priority order, plus warnings from indexing them.
    fn default_sources(&self) -> (Vec<Box<dyn VersionSource>>, Vec<ResolutionWarning>) {
        let mut warnings = Vec::new();
        let mut sources: Vec<Box<dyn VersionSource>> = Vec::new();

        let (metadata, failures) = DistributionMetadata::scan(self.locator.roots());
        for (path, err) in failures {
            warnings.push(ResolutionWarning {
                module: path.display().to_string(),
                kind: WarningKind::SourceError,
                message: format!("unreadable package metadata: {err}"),
            });
        }
        tracing::debug!(distributions = metadata.len(), "indexed installed packages");
        sources.push(Box::new(metadata));

        match VersionAttribute::new(self.config.extensions.clone()) {
            Ok(attribute) => sources.push(Box::new(attribute)),
            Err(err) => tracing::warn!(error = %err, "version attribute source disabled"),
        }
        sources.push(Box::new(PackageManifest));
        sources.push(Box::new(Registry::new(&self.config.registry)));
        (sources, warnings)
    }

    /// Resolves `imports` with the built-in sources. Never fails.
    pub fn resolve<S: AsRef<str>>(&self, imports: &[S]) -> Resolution {
        let (sources, warnings) = self.default_sources();
        self.resolve_with(imports, &sources, warnings)
    }

    /// Resolves `imports` consulting `sources` in order.
    pub fn resolve_with_sources<S: AsRef<str>>(
        &self,
        imports: &[S],
        sources: &[Box<dyn VersionSource>],
    ) -> Resolution {
        self.resolve_with(imports, sources, Vec::new())
    }

    fn resolve_with<S: AsRef<str>>(
        &self,
        imports: &[S],
        sources: &[Box<dyn VersionSource>],
        mut warnings: Vec<ResolutionWarning>,
    ) -> Resolution {
        let mut merged: BTreeMap<String, Dependency> = BTreeMap::new();

        for entry in imports {
            let entry = entry.as_ref().trim();
            let Some(module) = ModuleRef::parse(entry) else {
                continue;
            };
            if self.is_ignored(entry, &module) {
                continue;
            }
            if let ModuleRef::Path(path) = &module {
                if !path.exists() {
                    warnings.push(ResolutionWarning {
                        module: entry.to_string(),
                        kind: WarningKind::MissingPath,
                        message: "imported path does not exist".to_string(),
                    });
                }
            }
            let unit = self.locator.locate(entry, &module);
            if self.config.ignore.contains(&unit.name) {
                continue;
            }
            let dependency = self.classify(&unit, sources, &mut warnings);
            merge(&mut merged, dependency);
        }

        for dep in merged.values().filter(|dep| dep.origin == VersionOrigin::Unknown) {
            warnings.push(ResolutionWarning {
                module: dep.name.clone(),
                kind: WarningKind::Unresolved,
                message: "no version source produced a version".to_string(),
            });
        }
        warnings.sort();
        warnings.dedup();
        for warning in &warnings {
            tracing::warn!(module = %warning.module, kind = ?warning.kind, "{}", warning.message);
        }

        Resolution {
            dependencies: merged.into_values().collect(),
            warnings,
        }
    }

    fn is_ignored(&self, entry: &str, module: &ModuleRef) -> bool {
        self.config.ignore.contains(entry)
            || module
                .top_level_hint()
                .is_some_and(|top| self.config.ignore.contains(&top))
    }

    fn classify(
        &self,
        unit: &ModuleUnit,
        sources: &[Box<dyn VersionSource>],
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Dependency {
        let location = unit.unit_path.clone().or_else(|| unit.source_path.clone());
        if unit.is_local(self.locator.local_roots()) {
            return Dependency::local(unit.name.clone(), location);
        }
        for source in sources {
            match source.lookup(unit) {
                Ok(Some(version)) => {
                    return Dependency::external(
                        unit.name.clone(),
                        version,
                        location,
                        source.origin(),
                    );
                }
                Ok(None) => {}
                Err(err) => warnings.push(ResolutionWarning {
                    module: unit.name.clone(),
                    kind: WarningKind::SourceError,
                    message: format!("{:?} source failed: {err}", source.origin()),
                }),
            }
        }
        Dependency::unresolved(unit.name.clone(), location)
    }
}

/// Keeps the highest-confidence entry per name; ties keep the first seen.
fn merge(merged: &mut BTreeMap<String, Dependency>, dependency: Dependency) {
    let replace = merged.get(&dependency.name).map_or(true, |existing| {
        dependency.origin.confidence() > existing.origin.confidence()
    });
    if replace {
        merged.insert(dependency.name.clone(), dependency);
    }
}

/// Resolves `imports` for a project with default settings.
pub fn resolve_dependencies<S: AsRef<str>>(config: ResolverConfig, imports: &[S]) -> Resolution {
    DependencyResolver::new(config).resolve(imports)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_higher_confidence_and_keeps_first_on_ties() {
        let mut merged = BTreeMap::new();
        merge(&mut merged, Dependency::unresolved("numpy", None));
        merge(
            &mut merged,
            Dependency::external("numpy", "1.26.4", None, VersionOrigin::VersionAttribute),
        );
        merge(
            &mut merged,
            Dependency::external("numpy", "1.0", None, VersionOrigin::Registry),
        );
        merge(
            &mut merged,
            Dependency::external("numpy", "9.9", None, VersionOrigin::VersionAttribute),
        );
        assert_eq!(merged.len(), 1);
        assert_eq!(merged["numpy"].version, "1.26.4");
        assert_eq!(merged["numpy"].origin, VersionOrigin::VersionAttribute);
    }
}
