//! Project configuration stored in `.prov/project.toml`.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::{VcsKind, WhitespacePolicy};
use prov_deps::ResolverConfig;
use prov_vcs::AdapterOptions;
use serde::{Deserialize, Serialize};

/// Directory holding project state, relative to the project root.
pub const PROJECT_DIR: &str = ".prov";
pub const CONFIG_FILE: &str = "project.toml";

/// What to do when the working copy has uncommitted changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnChanged {
    /// Refuse to run (or auto-commit first when enabled).
    #[default]
    Error,
    /// Run anyway and keep the diff in the record.
    StoreDiff,
}

impl OnChanged {
    pub fn as_str(&self) -> &'static str {
        match self {
            OnChanged::Error => "error",
            OnChanged::StoreDiff => "store-diff",
        }
    }
}

impl fmt::Display for OnChanged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OnChanged {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "error" => Ok(OnChanged::Error),
            "store-diff" => Ok(OnChanged::StoreDiff),
            other => Err(ProvError::Config(
                ErrorInfo::new("on_changed", format!("unknown on-changed action '{other}'"))
                    .with_hint("expected 'error' or 'store-diff'"),
            )),
        }
    }
}

/// Where the record label is handed to the launched program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddLabel {
    /// Appended as the last command-line argument.
    Cmdline,
    /// Written into the parameter file under [`prov_record::LABEL_PARAMETER`].
    Parameters,
}

impl AddLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddLabel::Cmdline => "cmdline",
            AddLabel::Parameters => "parameters",
        }
    }
}

impl fmt::Display for AddLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AddLabel {
    type Err = ProvError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "cmdline" => Ok(AddLabel::Cmdline),
            "parameters" => Ok(AddLabel::Parameters),
            other => Err(ProvError::Config(
                ErrorInfo::new("add_label", format!("unknown label destination '{other}'"))
                    .with_hint("expected 'cmdline' or 'parameters'"),
            )),
        }
    }
}

/// Archive directory used when archiving is switched on without a path.
pub fn default_archive() -> PathBuf {
    Path::new(PROJECT_DIR).join("archive")
}

fn default_data_path() -> PathBuf {
    PathBuf::from("Data")
}

fn default_input_path() -> PathBuf {
    PathBuf::from(".")
}

fn default_store() -> PathBuf {
    Path::new(PROJECT_DIR).join("records.db")
}

fn default_true() -> bool {
    true
}

fn default_env_allow() -> Vec<String> {
    vec!["OMP_NUM_THREADS".to_string(), "PYTHONPATH".to_string()]
}

fn default_ignore_modules() -> Vec<String> {
    ["sys", "builtins", "__main__", "std", "core", "alloc"]
        .iter()
        .map(|name| name.to_string())
        .collect()
}

/// Persistent project settings. Relative paths are relative to the project root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
    /// Where the program writes its output files.
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,
    /// Root that input data arguments are resolved against.
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,
    /// Record store location; `.db`/`.sqlite` selects SQLite.
    #[serde(default = "default_store")]
    pub store: PathBuf,
    #[serde(default)]
    pub on_changed: OnChanged,
    #[serde(default)]
    pub auto_commit: bool,
    /// Force a backend (`none` disables version control).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vcs: Option<VcsKind>,
    #[serde(default)]
    pub vcs_preference: Vec<VcsKind>,
    #[serde(default)]
    pub whitespace: WhitespacePolicy,
    #[serde(default = "default_true")]
    pub include_untracked: bool,
    /// Extra globs excluded from untracked-file reporting.
    #[serde(default)]
    pub untracked_ignore: Vec<String>,
    #[serde(default)]
    pub search_roots: Vec<PathBuf>,
    #[serde(default = "default_ignore_modules")]
    pub ignore_modules: Vec<String>,
    /// Glob patterns over environment variable names recorded with each run.
    #[serde(default = "default_env_allow")]
    pub environment: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add_label: Option<AddLabel>,
    /// Output files are copied here, one subdirectory per record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executable: None,
            main_file: None,
            data_path: default_data_path(),
            input_path: default_input_path(),
            store: default_store(),
            on_changed: OnChanged::default(),
            auto_commit: false,
            vcs: None,
            vcs_preference: Vec::new(),
            whitespace: WhitespacePolicy::default(),
            include_untracked: true,
            untracked_ignore: Vec::new(),
            search_roots: Vec::new(),
            ignore_modules: default_ignore_modules(),
            environment: default_env_allow(),
            add_label: None,
            archive: None,
        }
    }

    pub fn validate(&self) -> Result<(), ProvError> {
        if self.name.trim().is_empty() {
            return Err(ProvError::config("project_name", "project name is empty"));
        }
        if self.data_path.as_os_str().is_empty() {
            return Err(ProvError::config("data_path", "data path is empty"));
        }
        Ok(())
    }

    pub fn config_path(project_root: &Path) -> PathBuf {
        project_root.join(PROJECT_DIR).join(CONFIG_FILE)
    }

    /// Walks up from `start` to the nearest directory holding a project.
    pub fn discover(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .find(|dir| Self::config_path(dir).is_file())
            .map(Path::to_path_buf)
    }

    pub fn load(project_root: &Path) -> Result<Self, ProvError> {
        let path = Self::config_path(project_root);
        let text = fs::read_to_string(&path).map_err(|err| {
            ProvError::Config(
                ErrorInfo::new("project_read", err.to_string())
                    .with_context("path", path.display().to_string())
                    .with_hint("run `prov init NAME` to create a project"),
            )
        })?;
        let config: ProjectConfig = toml::from_str(&text).map_err(|err| {
            ProvError::Config(
                ErrorInfo::new("project_parse", err.to_string()).with_context("path", path.display().to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, project_root: &Path) -> Result<(), ProvError> {
        self.validate()?;
        let path = Self::config_path(project_root);
        let text = toml::to_string_pretty(self).map_err(|err| ProvError::serde("project_serialize", err))?;
        let write = |path: &Path| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, text.as_bytes())
        };
        write(&path).map_err(|err| {
            ProvError::Config(
                ErrorInfo::new("project_write", err.to_string()).with_context("path", path.display().to_string()),
            )
        })
    }

    fn absolute(project_root: &Path, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            project_root.join(path)
        }
    }

    pub fn data_root(&self, project_root: &Path) -> PathBuf {
        Self::absolute(project_root, &self.data_path)
    }

    pub fn input_root(&self, project_root: &Path) -> PathBuf {
        Self::absolute(project_root, &self.input_path)
    }

    pub fn store_path(&self, project_root: &Path) -> PathBuf {
        Self::absolute(project_root, &self.store)
    }

    pub fn archive_root(&self, project_root: &Path) -> Option<PathBuf> {
        self.archive.as_deref().map(|path| Self::absolute(project_root, path))
    }

    /// Adapter options; the data directory never counts as a code change.
    pub fn adapter_options(&self, project_root: &Path) -> Result<AdapterOptions, ProvError> {
        let mut ignore = self.untracked_ignore.clone();
        ignore.push(format!("{PROJECT_DIR}/**"));
        let skipped = [Some(self.data_root(project_root)), self.archive_root(project_root)];
        for dir in skipped.iter().flatten() {
            if let Ok(relative) = dir.strip_prefix(project_root) {
                let relative = relative.to_string_lossy().replace('\\', "/");
                if !relative.is_empty() {
                    ignore.push(format!("{relative}/**"));
                }
            }
        }
        let preference = match self.vcs {
            Some(kind) if kind != VcsKind::None => vec![kind],
            _ => self.vcs_preference.clone(),
        };
        AdapterOptions::new(self.include_untracked, preference, &ignore)
    }

    pub fn resolver_config(&self, project_root: &Path) -> ResolverConfig {
        ResolverConfig::new(project_root)
            .with_search_roots(
                self.search_roots
                    .iter()
                    .map(|root| Self::absolute(project_root, root)),
            )
            .with_ignore(self.ignore_modules.iter().cloned())
    }

    /// Settings handed to the orchestrator for one run.
    pub fn capture_config(&self, project_root: &Path) -> Result<CaptureConfig, ProvError> {
        Ok(CaptureConfig {
            project_root: project_root.to_path_buf(),
            data_root: self.data_root(project_root),
            input_root: self.input_root(project_root),
            scratch_dir: project_root.join(PROJECT_DIR).join("scratch"),
            on_changed: self.on_changed,
            auto_commit: self.auto_commit,
            whitespace: self.whitespace,
            environment: self.environment.clone(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            resolver: self.resolver_config(project_root),
            add_label: self.add_label,
            archive_root: self.archive_root(project_root),
        })
    }

    /// Human-readable summary for `prov info`.
    pub fn describe(&self, project_root: &Path) -> String {
        let optional = |value: &Option<String>| value.clone().unwrap_or_else(|| "(not set)".to_string());
        let vcs = self
            .vcs
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "auto".to_string());
        [
            format!("Project name        : {}", self.name),
            format!("Project root        : {}", project_root.display()),
            format!("Default executable  : {}", optional(&self.executable)),
            format!("Default main file   : {}", optional(&self.main_file)),
            format!("Data path           : {}", self.data_root(project_root).display()),
            format!("Input path          : {}", self.input_root(project_root).display()),
            format!("Record store        : {}", self.store_path(project_root).display()),
            format!("Code change policy  : {}", self.on_changed),
            format!("Auto commit         : {}", self.auto_commit),
            format!("Version control     : {vcs}"),
            format!(
                "Add label           : {}",
                self.add_label.map_or("(not set)", |add| add.as_str())
            ),
            format!(
                "Archive             : {}",
                self.archive_root(project_root)
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            ),
        ]
        .join("\n")
    }
}

/// Everything the orchestrator needs that is not a collaborator.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub project_root: PathBuf,
    /// Output files are keyed relative to this directory.
    pub data_root: PathBuf,
    pub input_root: PathBuf,
    /// Parameter files and import lists written for the launched program.
    pub scratch_dir: PathBuf,
    pub on_changed: OnChanged,
    pub auto_commit: bool,
    pub whitespace: WhitespacePolicy,
    pub environment: Vec<String>,
    pub tool_version: String,
    pub resolver: ResolverConfig,
    pub add_label: Option<AddLabel>,
    /// Output files are copied under `<archive_root>/<label>/` when set.
    pub archive_root: Option<PathBuf>,
}

impl CaptureConfig {
    /// Defaults for a project rooted at `project_root` with data in `Data/`.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        Self {
            data_root: project_root.join(default_data_path()),
            input_root: project_root.clone(),
            scratch_dir: project_root.join(PROJECT_DIR).join("scratch"),
            on_changed: OnChanged::default(),
            auto_commit: false,
            whitespace: WhitespacePolicy::default(),
            environment: Vec::new(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            resolver: ResolverConfig::new(project_root.clone()),
            add_label: None,
            archive_root: None,
            project_root,
        }
    }

    /// Whether a dirty working copy stops the run.
    pub fn strict(&self) -> bool {
        self.on_changed == OnChanged::Error
    }
}
