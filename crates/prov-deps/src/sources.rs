//! Version sources, queried in priority order by the resolver.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use prov_core::VersionOrigin;
use regex::Regex;

use crate::locate::ModuleUnit;
use crate::module::normalize_name;

/// One place a module's version can be read from.
pub trait VersionSource: fmt::Debug {
    /// Origin recorded when this source produces the version.
    fn origin(&self) -> VersionOrigin;

    /// Version of `unit`, `Ok(None)` when this source knows nothing about it.
    fn lookup(&self, unit: &ModuleUnit) -> io::Result<Option<String>>;
}

/// Installed-package metadata: `*.dist-info/METADATA` and `*.egg-info/PKG-INFO`.
#[derive(Debug, Clone, Default)]
pub struct DistributionMetadata {
    index: BTreeMap<String, String>,
}

impl DistributionMetadata {
    /// Indexes every distribution found directly under `roots`.
    ///
    /// Unreadable entries are skipped and returned alongside the index. The
    /// first root that provides a name wins.
    pub fn scan(roots: &[PathBuf]) -> (Self, Vec<(PathBuf, io::Error)>) {
        let mut index = BTreeMap::new();
        let mut failures = Vec::new();
        for root in roots {
            let mut entries: Vec<PathBuf> = match fs::read_dir(root) {
                Ok(entries) => entries.flatten().map(|entry| entry.path()).collect(),
                Err(err) => {
                    if err.kind() != io::ErrorKind::NotFound {
                        failures.push((root.clone(), err));
                    }
                    continue;
                }
            };
            entries.sort();
            for entry in entries {
                let Some(file_name) = entry.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                let metadata_file = if file_name.ends_with(".dist-info") {
                    entry.join("METADATA")
                } else if file_name.ends_with(".egg-info") && entry.is_dir() {
                    entry.join("PKG-INFO")
                } else if file_name.ends_with(".egg-info") {
                    entry.clone()
                } else {
                    continue;
                };
                let text = match fs::read_to_string(&metadata_file) {
                    Ok(text) => text,
                    Err(err) => {
                        failures.push((metadata_file, err));
                        continue;
                    }
                };
                let headers = parse_headers(&text);
                let Some(version) = headers.get("version").cloned() else {
                    continue;
                };
                let name = headers
                    .get("name")
                    .cloned()
                    .unwrap_or_else(|| distribution_from_dir(&file_name));
                index
                    .entry(normalize_name(&name))
                    .or_insert_with(|| version.clone());
                // Import names can differ from the distribution name (PyYAML -> yaml).
                if let Ok(top_level) = fs::read_to_string(entry.join("top_level.txt")) {
                    for import in top_level.lines().map(str::trim).filter(|l| !l.is_empty()) {
                        index
                            .entry(normalize_name(import))
                            .or_insert_with(|| version.clone());
                    }
                }
            }
        }
        (Self { index }, failures)
    }

    /// Number of indexed names.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

impl VersionSource for DistributionMetadata {
    fn origin(&self) -> VersionOrigin {
        VersionOrigin::DistributionMetadata
    }

    fn lookup(&self, unit: &ModuleUnit) -> io::Result<Option<String>> {
        Ok(self.index.get(&normalize_name(&unit.name)).cloned())
    }
}

/// RFC 822 style headers up to the first blank line, keys lowercased.
fn parse_headers(text: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if let Some((key, value)) = line.split_once(':') {
            let value = value.trim();
            if !value.is_empty() {
                headers
                    .entry(key.trim().to_ascii_lowercase())
                    .or_insert_with(|| value.to_string());
            }
        }
    }
    headers
}

/// `foo_bar-1.2.dist-info` -> `foo_bar`.
fn distribution_from_dir(dir_name: &str) -> String {
    let stem = dir_name
        .trim_end_matches(".dist-info")
        .trim_end_matches(".egg-info");
    stem.split('-').next().unwrap_or(stem).to_string()
}

/// `__version__ = "..."` assignment in the unit's top-level source file.
#[derive(Debug, Clone)]
pub struct VersionAttribute {
    pattern: Regex,
    extensions: Vec<String>,
}

impl VersionAttribute {
    pub fn new(extensions: Vec<String>) -> Result<Self, regex::Error> {
        let pattern = Regex::new(
            r#"(?m)^\s*__version__\s*(?::\s*[A-Za-z_.\[\]]+\s*)?=\s*(?:u|r)?['"]([^'"]+)['"]"#,
        )?;
        Ok(Self {
            pattern,
            extensions,
        })
    }
}

impl VersionSource for VersionAttribute {
    fn origin(&self) -> VersionOrigin {
        VersionOrigin::VersionAttribute
    }

    fn lookup(&self, unit: &ModuleUnit) -> io::Result<Option<String>> {
        let Some(source) = unit.top_level_source(&self.extensions) else {
            return Ok(None);
        };
        let bytes = fs::read(&source)?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(self
            .pattern
            .captures(&text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|version| !version.is_empty()))
    }
}

/// Nearest `Cargo.toml`, `pyproject.toml` or `package.json` above the unit,
/// never looking at or above its search root.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageManifest;

impl PackageManifest {
    fn read(dir: &Path) -> io::Result<Option<String>> {
        let cargo = dir.join("Cargo.toml");
        if cargo.is_file() {
            let value = parse_toml(&fs::read_to_string(&cargo)?)?;
            if let Some(version) = toml_str(&value, &["package", "version"]) {
                return Ok(Some(version));
            }
        }
        let pyproject = dir.join("pyproject.toml");
        if pyproject.is_file() {
            let value = parse_toml(&fs::read_to_string(&pyproject)?)?;
            if let Some(version) = toml_str(&value, &["project", "version"])
                .or_else(|| toml_str(&value, &["tool", "poetry", "version"]))
            {
                return Ok(Some(version));
            }
        }
        let package_json = dir.join("package.json");
        if package_json.is_file() {
            let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&package_json)?)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
            if let Some(version) = value.get("version").and_then(|v| v.as_str()) {
                if !version.trim().is_empty() {
                    return Ok(Some(version.trim().to_string()));
                }
            }
        }
        Ok(None)
    }
}

fn parse_toml(text: &str) -> io::Result<toml::Value> {
    toml::from_str(text).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
}

fn toml_str(value: &toml::Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(key)?;
    }
    // `version.workspace = true` is a table, not a version.
    current
        .as_str()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

impl VersionSource for PackageManifest {
    fn origin(&self) -> VersionOrigin {
        VersionOrigin::PackageManifest
    }

    fn lookup(&self, unit: &ModuleUnit) -> io::Result<Option<String>> {
        let Some(unit_path) = unit.unit_path.as_deref() else {
            return Ok(None);
        };
        let start = if unit_path.is_dir() {
            unit_path
        } else {
            match unit_path.parent() {
                Some(parent) => parent,
                None => return Ok(None),
            }
        };
        for dir in start.ancestors() {
            match &unit.search_root {
                Some(root) if !dir.starts_with(root) || dir == root.as_path() => break,
                _ => {}
            }
            if let Some(version) = Self::read(dir)? {
                return Ok(Some(version));
            }
            if unit.search_root.is_none() {
                break;
            }
        }
        Ok(None)
    }
}

/// Static name -> version map supplied by the caller.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    versions: BTreeMap<String, String>,
}

impl Registry {
    pub fn new(versions: &BTreeMap<String, String>) -> Self {
        Self {
            versions: versions
                .iter()
                .map(|(name, version)| (normalize_name(name), version.clone()))
                .collect(),
        }
    }
}

impl VersionSource for Registry {
    fn origin(&self) -> VersionOrigin {
        VersionOrigin::Registry
    }

    fn lookup(&self, unit: &ModuleUnit) -> io::Result<Option<String>> {
        Ok(self
            .versions
            .get(&normalize_name(&unit.name))
            .filter(|version| !version.trim().is_empty())
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_stop_at_body() {
        let headers = parse_headers("Metadata-Version: 2.1\nName: PyYAML\nVersion: 6.0.1\n\nVersion: 9\n");
        assert_eq!(headers.get("name").map(String::as_str), Some("PyYAML"));
        assert_eq!(headers.get("version").map(String::as_str), Some("6.0.1"));
    }

    #[test]
    fn distribution_name_from_directory() {
        assert_eq!(distribution_from_dir("scikit_learn-1.4.0.dist-info"), "scikit_learn");
        assert_eq!(distribution_from_dir("six.egg-info"), "six");
    }
}
