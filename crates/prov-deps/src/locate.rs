use std::fs;
use std::path::{Path, PathBuf};

use crate::module::{unit_name, ModuleRef};

/// Top-level installable unit an imported module belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleUnit {
    /// Entry as reported by the launcher.
    pub requested: String,
    /// Name of the top-level unit.
    pub name: String,
    /// Physical location of the requested module, when found.
    pub source_path: Option<PathBuf>,
    /// Location of the top-level unit (package directory or module file).
    pub unit_path: Option<PathBuf>,
    /// Search root the unit was found under.
    pub search_root: Option<PathBuf>,
}

impl ModuleUnit {
    /// Source file that would carry a `__version__`-style attribute.
    pub fn top_level_source(&self, extensions: &[String]) -> Option<PathBuf> {
        let unit = self.unit_path.as_ref()?;
        if unit.is_file() {
            return Some(unit.clone());
        }
        extensions
            .iter()
            .map(|ext| unit.join(format!("__init__.{ext}")))
            .chain([unit.join("src/lib.rs"), unit.join("lib.rs")])
            .find(|candidate| candidate.is_file())
    }

    /// Whether the unit belongs to the project rather than to an installed package.
    ///
    /// A search root nested inside the project (a virtualenv, a vendor dir)
    /// still makes its units external.
    pub fn is_local(&self, local_roots: &[PathBuf]) -> bool {
        match &self.search_root {
            Some(root) => local_roots.contains(root),
            None => self
                .source_path
                .as_ref()
                .or(self.unit_path.as_ref())
                .is_some_and(|path| local_roots.iter().any(|root| path.starts_with(root))),
        }
    }
}

/// Maps module references to physical locations.
///
/// The local roots (project directory, then the repository enclosing it) are
/// searched first, then the search roots in order.
#[derive(Debug, Clone)]
pub struct Locator {
    local_roots: Vec<PathBuf>,
    roots: Vec<PathBuf>,
    extensions: Vec<String>,
}

impl Locator {
    pub fn new(local_roots: &[PathBuf], search_roots: &[PathBuf], extensions: Vec<String>) -> Self {
        let mut local: Vec<PathBuf> = Vec::new();
        for root in local_roots {
            let root = canonical(root);
            if !local.contains(&root) {
                local.push(root);
            }
        }
        let mut roots = local.clone();
        for root in search_roots {
            let root = canonical(root);
            if !roots.contains(&root) {
                roots.push(root);
            }
        }
        Self {
            local_roots: local,
            roots,
            extensions,
        }
    }

    /// Roots whose modules belong to the project.
    pub fn local_roots(&self) -> &[PathBuf] {
        &self.local_roots
    }

    /// Project root followed by the search roots.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Finds the unit for `module`. Unknown names yield a unit without a path.
    pub fn locate(&self, requested: &str, module: &ModuleRef) -> ModuleUnit {
        match module {
            ModuleRef::Name(parts) => self.locate_name(requested, parts),
            ModuleRef::Path(path) => self.locate_path(requested, path),
        }
    }

    fn locate_name(&self, requested: &str, parts: &[String]) -> ModuleUnit {
        let top = parts.first().cloned().unwrap_or_default();
        for root in &self.roots {
            let nested: PathBuf = parts.iter().collect();
            let mut candidates: Vec<PathBuf> = Vec::new();
            for ext in &self.extensions {
                candidates.push(root.join(&nested).with_extension(ext));
            }
            for ext in &self.extensions {
                candidates.push(root.join(&nested).join(format!("__init__.{ext}")));
            }
            candidates.push(root.join(&nested));
            for ext in &self.extensions {
                candidates.push(root.join(format!("{top}.{ext}")));
            }
            candidates.push(root.join(&top));

            if let Some(found) = candidates.into_iter().find(|path| path.exists()) {
                let unit_path = self.unit_in_root(root, &top);
                return ModuleUnit {
                    requested: requested.to_string(),
                    name: top,
                    source_path: Some(found),
                    unit_path,
                    search_root: Some(root.clone()),
                };
            }
        }
        ModuleUnit {
            requested: requested.to_string(),
            name: top,
            source_path: None,
            unit_path: None,
            search_root: None,
        }
    }

    fn unit_in_root(&self, root: &Path, top: &str) -> Option<PathBuf> {
        let dir = root.join(top);
        if dir.is_dir() {
            return Some(dir);
        }
        self.extensions
            .iter()
            .map(|ext| root.join(format!("{top}.{ext}")))
            .find(|file| file.is_file())
    }

    fn locate_path(&self, requested: &str, path: &Path) -> ModuleUnit {
        let resolved = canonical(path);
        let containing = self
            .roots
            .iter()
            .filter(|root| resolved.starts_with(root) && resolved != **root)
            .max_by_key(|root| root.components().count());

        let (name, unit_path, search_root) = match containing {
            Some(root) if self.local_roots.contains(root) => {
                let unit = package_top(&resolved, Some(root.as_path()));
                (unit_name(&unit), Some(unit), Some(root.clone()))
            }
            Some(root) => {
                let first = resolved
                    .strip_prefix(root)
                    .ok()
                    .and_then(|rel| rel.components().next())
                    .map(|comp| root.join(comp.as_os_str()));
                let name = first.as_deref().and_then(unit_name);
                (name, first, Some(root.clone()))
            }
            None => {
                let unit = package_top(&resolved, None);
                (unit_name(&unit), Some(unit), None)
            }
        };
        ModuleUnit {
            requested: requested.to_string(),
            name: name.unwrap_or_else(|| requested.to_string()),
            source_path: Some(resolved),
            unit_path,
            search_root,
        }
    }
}

/// Highest ancestor package (directory with `__init__.*`) containing `path`,
/// or `path` itself. Never climbs to `stop` or above it.
fn package_top(path: &Path, stop: Option<&Path>) -> PathBuf {
    let mut top = path.to_path_buf();
    let mut current = if path.is_dir() {
        Some(path)
    } else {
        path.parent()
    };
    while let Some(dir) = current {
        if stop.is_some_and(|stop| !dir.starts_with(stop) || dir == stop) || !is_package_dir(dir) {
            break;
        }
        top = dir.to_path_buf();
        current = dir.parent();
    }
    top
}

fn is_package_dir(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        entry.file_name().to_string_lossy().starts_with("__init__.")
    })
}

pub(crate) fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
