use std::path::{Path, PathBuf};

/// Extensions that mark an entry as a source file rather than a module name.
pub const SOURCE_EXTENSIONS: [&str; 5] = ["py", "rs", "jl", "r", "pyc"];

/// One entry of the imported-module list, as reported by the launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleRef {
    /// Filesystem location of a module source file or package directory.
    Path(PathBuf),
    /// Qualified name split into its components (`a.b.c` or `a::b::c`).
    Name(Vec<String>),
}

impl ModuleRef {
    /// Classifies an entry; `None` for blank entries.
    pub fn parse(entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }
        if entry.contains('/') || entry.contains('\\') || has_source_extension(entry) {
            return Some(ModuleRef::Path(PathBuf::from(entry)));
        }
        let parts: Vec<String> = if entry.contains("::") {
            entry.split("::").map(str::to_string).collect()
        } else {
            entry.split('.').map(str::to_string).collect()
        };
        let parts: Vec<String> = parts.into_iter().filter(|part| !part.is_empty()).collect();
        if parts.is_empty() {
            None
        } else {
            Some(ModuleRef::Name(parts))
        }
    }

    /// Name of the top-level unit implied by the entry alone.
    pub fn top_level_hint(&self) -> Option<String> {
        match self {
            ModuleRef::Name(parts) => parts.first().cloned(),
            ModuleRef::Path(path) => unit_name(path),
        }
    }
}

fn has_source_extension(entry: &str) -> bool {
    Path::new(entry)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SOURCE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

/// Unit name for a file or directory: the file stem, or the directory name.
pub fn unit_name(path: &Path) -> Option<String> {
    let name = if path.is_dir() {
        path.file_name()
    } else {
        path.file_stem()
    }?;
    Some(name.to_string_lossy().into_owned())
}

/// Normalized form used to match distribution and import names.
pub fn normalize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|ch| match ch {
            '-' | '.' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}
