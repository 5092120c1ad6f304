//! Structured error types shared across prov crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`ProvError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (path, backend, label, ...).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for prov.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum ProvError {
    /// Version control backend missing, not a working copy, or a backend command failed.
    #[error("repository error: {0}")]
    Repository(ErrorInfo),
    /// Uncommitted changes block a strict-mode capture.
    #[error("dirty repository: {0}")]
    DirtyRepository(ErrorInfo),
    /// A record with the same label already exists in the store.
    #[error("duplicate label: {0}")]
    DuplicateLabel(ErrorInfo),
    /// Requested record does not exist.
    #[error("not found: {0}")]
    NotFound(ErrorInfo),
    /// The external program could not be started.
    #[error("launch error: {0}")]
    Launch(ErrorInfo),
    /// Record store I/O failures.
    #[error("store error: {0}")]
    Store(ErrorInfo),
    /// Invalid parameter files or overrides.
    #[error("parameter error: {0}")]
    Parameters(ErrorInfo),
    /// Invalid or unreadable configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl ProvError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            ProvError::Repository(info)
            | ProvError::DirtyRepository(info)
            | ProvError::DuplicateLabel(info)
            | ProvError::NotFound(info)
            | ProvError::Launch(info)
            | ProvError::Store(info)
            | ProvError::Parameters(info)
            | ProvError::Config(info)
            | ProvError::Serde(info) => info,
        }
    }

    /// Short family name, stable across releases.
    pub fn family(&self) -> &'static str {
        match self {
            ProvError::Repository(_) => "repository",
            ProvError::DirtyRepository(_) => "dirty_repository",
            ProvError::DuplicateLabel(_) => "duplicate_label",
            ProvError::NotFound(_) => "not_found",
            ProvError::Launch(_) => "launch",
            ProvError::Store(_) => "store",
            ProvError::Parameters(_) => "parameters",
            ProvError::Config(_) => "config",
            ProvError::Serde(_) => "serde",
        }
    }

    /// Builds a [`ProvError::Repository`] error.
    pub fn repository(code: &str, message: impl Into<String>) -> Self {
        ProvError::Repository(ErrorInfo::new(code, message))
    }

    /// Builds a [`ProvError::Store`] error.
    pub fn store(code: &str, message: impl Into<String>) -> Self {
        ProvError::Store(ErrorInfo::new(code, message))
    }

    /// Builds a [`ProvError::Serde`] error.
    pub fn serde(code: &str, err: impl ToString) -> Self {
        ProvError::Serde(ErrorInfo::new(code, err.to_string()))
    }

    /// Builds a [`ProvError::Config`] error.
    pub fn config(code: &str, message: impl Into<String>) -> Self {
        ProvError::Config(ErrorInfo::new(code, message))
    }

    /// Builds a [`ProvError::Parameters`] error.
    pub fn parameters(code: &str, message: impl Into<String>) -> Self {
        ProvError::Parameters(ErrorInfo::new(code, message))
    }

    /// Adds a context entry to the payload, whatever the family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.map_info(|info| info.with_context(key, value))
    }

    /// Sets the remediation hint, whatever the family.
    pub fn with_hint(self, hint: impl Into<String>) -> Self {
        self.map_info(|info| info.with_hint(hint))
    }

    fn map_info(self, f: impl FnOnce(ErrorInfo) -> ErrorInfo) -> Self {
        match self {
            ProvError::Repository(info) => ProvError::Repository(f(info)),
            ProvError::DirtyRepository(info) => ProvError::DirtyRepository(f(info)),
            ProvError::DuplicateLabel(info) => ProvError::DuplicateLabel(f(info)),
            ProvError::NotFound(info) => ProvError::NotFound(f(info)),
            ProvError::Launch(info) => ProvError::Launch(f(info)),
            ProvError::Store(info) => ProvError::Store(f(info)),
            ProvError::Parameters(info) => ProvError::Parameters(f(info)),
            ProvError::Config(info) => ProvError::Config(f(info)),
            ProvError::Serde(info) => ProvError::Serde(f(info)),
        }
    }
}
