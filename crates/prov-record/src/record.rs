//! Run records: a mutable [`RecordDraft`] filled during capture, sealed into
//! an immutable, digest-protected [`Record`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::{stable_hash_string, CodeIdentity, Dependency, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::data::DataKey;
use crate::params::ParameterSet;
use crate::platform::PlatformInfo;

/// How the program was invoked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandLine {
    pub executable: String,
    #[serde(default)]
    pub arguments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub main_file: Option<String>,
    /// Parameter file the user supplied; the arguments hold a placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameter_file: Option<String>,
}

impl CommandLine {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn with_main_file(mut self, main_file: impl Into<String>) -> Self {
        self.main_file = Some(main_file.into());
        self
    }

    pub fn with_parameter_file(mut self, parameter_file: impl Into<String>) -> Self {
        self.parameter_file = Some(parameter_file.into());
        self
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments.extend(arguments.into_iter().map(Into::into));
        self
    }

    /// Full argv: executable, main file, then arguments.
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.executable.clone())
            .chain(self.main_file.clone())
            .chain(self.arguments.iter().cloned())
            .collect()
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// Terminal state of the launched program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    Failed { code: i32 },
    Signalled { signal: i32 },
    Interrupted,
    LaunchFailed,
    NotRun,
}

impl ExitStatus {
    pub fn from_code(code: i32) -> Self {
        if code == 0 {
            ExitStatus::Success
        } else {
            ExitStatus::Failed { code }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExitStatus::Success)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitStatus::Success => write!(f, "success"),
            ExitStatus::Failed { code } => write!(f, "failed (exit code {code})"),
            ExitStatus::Signalled { signal } => write!(f, "killed by signal {signal}"),
            ExitStatus::Interrupted => write!(f, "interrupted"),
            ExitStatus::LaunchFailed => write!(f, "launch failed"),
            ExitStatus::NotRun => write!(f, "not run"),
        }
    }
}

/// Capture stage at which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    PreRunSnapshot,
    Running,
    PostRunSnapshot,
    Sealing,
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureStage::PreRunSnapshot => "pre-run snapshot",
            CaptureStage::Running => "running",
            CaptureStage::PostRunSnapshot => "post-run snapshot",
            CaptureStage::Sealing => "sealing",
        };
        f.write_str(name)
    }
}

/// Why a capture did not complete normally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFailure {
    pub stage: CaptureStage,
    pub error: ProvError,
}

/// Default label: the UTC timestamp as `YYYYMMDD-HHMMSS`.
pub fn timestamp_label(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y%m%d-%H%M%S").to_string()
}

/// Labels double as file names, so path syntax is rejected.
pub fn validate_label(label: &str) -> Result<(), ProvError> {
    let reason = if label.trim().is_empty() {
        Some("label is empty")
    } else if label != label.trim() {
        Some("label has leading or trailing whitespace")
    } else if label.contains(['/', '\\', '\0']) {
        Some("label contains a path separator")
    } else if label.starts_with('.') {
        Some("label starts with a dot")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(ProvError::Config(
            ErrorInfo::new("invalid_label", reason).with_context("label", label.to_string()),
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RecordContent {
    schema_version: SchemaVersion,
    label: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    repeats: Option<String>,
    command: CommandLine,
    code_identity: CodeIdentity,
    dependencies: Vec<Dependency>,
    parameters: ParameterSet,
    environment: PlatformInfo,
    input_data: Vec<DataKey>,
    outputs: Vec<DataKey>,
    exit_status: ExitStatus,
    duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure: Option<CaptureFailure>,
}

/// Record under construction. Every field can be filled in any order until
/// [`RecordDraft::seal`] consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDraft {
    pub label: String,
    pub timestamp: DateTime<Utc>,
    pub reason: Option<String>,
    /// Label of the record this run repeats.
    pub repeats: Option<String>,
    pub command: CommandLine,
    /// Missing when the pre-run snapshot failed; sealed as unversioned.
    pub code_identity: Option<CodeIdentity>,
    pub project_root: PathBuf,
    pub dependencies: Vec<Dependency>,
    pub parameters: ParameterSet,
    pub environment: PlatformInfo,
    pub input_data: Vec<DataKey>,
    pub outputs: Vec<DataKey>,
    pub exit_status: ExitStatus,
    pub duration: Duration,
    pub failure: Option<CaptureFailure>,
}

impl RecordDraft {
    pub fn new(label: impl Into<String>, timestamp: DateTime<Utc>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            label: label.into(),
            timestamp,
            reason: None,
            repeats: None,
            command: CommandLine::default(),
            code_identity: None,
            project_root: project_root.into(),
            dependencies: Vec::new(),
            parameters: ParameterSet::new(),
            environment: PlatformInfo::default(),
            input_data: Vec::new(),
            outputs: Vec::new(),
            exit_status: ExitStatus::NotRun,
            duration: Duration::ZERO,
            failure: None,
        }
    }

    /// Records the first failure; later ones are only logged.
    pub fn fail(&mut self, stage: CaptureStage, error: ProvError) {
        if self.failure.is_some() {
            tracing::debug!(stage = %stage, error = %error, "additional capture failure");
            return;
        }
        self.failure = Some(CaptureFailure { stage, error });
    }

    /// Freezes the draft and computes its digest.
    pub fn seal(self) -> Result<Record, ProvError> {
        validate_label(&self.label)?;
        let code_identity = self
            .code_identity
            .unwrap_or_else(|| CodeIdentity::unversioned(self.project_root.clone()));
        let mut dependencies = self.dependencies;
        dependencies.sort_by(|a, b| a.name.cmp(&b.name));
        let mut input_data = self.input_data;
        input_data.sort();
        let mut outputs = self.outputs;
        outputs.sort();
        let content = RecordContent {
            schema_version: SchemaVersion::CURRENT,
            label: self.label,
            timestamp: self.timestamp,
            reason: self.reason,
            repeats: self.repeats,
            command: self.command,
            code_identity,
            dependencies,
            parameters: self.parameters,
            environment: self.environment,
            input_data,
            outputs,
            exit_status: self.exit_status,
            duration: self.duration,
            failure: self.failure,
        };
        let digest = stable_hash_string(&content)?;
        Ok(Record { content, digest })
    }
}

/// Sealed, immutable record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(flatten)]
    content: RecordContent,
    digest: String,
}

impl Record {
    pub fn label(&self) -> &str {
        &self.content.label
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.content.timestamp
    }

    pub fn schema_version(&self) -> SchemaVersion {
        self.content.schema_version
    }

    pub fn reason(&self) -> Option<&str> {
        self.content.reason.as_deref()
    }

    pub fn repeats(&self) -> Option<&str> {
        self.content.repeats.as_deref()
    }

    pub fn command(&self) -> &CommandLine {
        &self.content.command
    }

    pub fn code_identity(&self) -> &CodeIdentity {
        &self.content.code_identity
    }

    pub fn dependencies(&self) -> &[Dependency] {
        &self.content.dependencies
    }

    pub fn parameters(&self) -> &ParameterSet {
        &self.content.parameters
    }

    pub fn environment(&self) -> &PlatformInfo {
        &self.content.environment
    }

    pub fn input_data(&self) -> &[DataKey] {
        &self.content.input_data
    }

    pub fn outputs(&self) -> &[DataKey] {
        &self.content.outputs
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.content.exit_status
    }

    pub fn duration(&self) -> Duration {
        self.content.duration
    }

    pub fn failure(&self) -> Option<&CaptureFailure> {
        self.content.failure.as_ref()
    }

    /// sha256 over the canonical JSON of every other field.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Runs that failed or did not exit cleanly are not trusted for reproduction.
    pub fn flagged_non_reproducible(&self) -> bool {
        !self.content.exit_status.is_success() || self.content.failure.is_some()
    }

    /// Recomputes the digest and compares it to the stored one.
    pub fn verify_digest(&self) -> Result<(), ProvError> {
        let actual = stable_hash_string(&self.content)?;
        if actual == self.digest {
            return Ok(());
        }
        Err(ProvError::Store(
            ErrorInfo::new("digest_mismatch", "record content does not match its digest")
                .with_context("label", self.content.label.clone())
                .with_context("expected", self.digest.clone())
                .with_context("actual", actual)
                .with_hint("the stored record was modified after sealing"),
        ))
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ProvError> {
        prov_core::to_canonical_json_bytes(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, ProvError> {
        prov_core::to_canonical_json_pretty(self)
    }

    /// Parses a record and checks its digest and schema version.
    pub fn from_json_slice(bytes: &[u8]) -> Result<Self, ProvError> {
        let record: Record = prov_core::from_json_slice(bytes)?;
        if !record.schema_version().is_compatible_with(&SchemaVersion::CURRENT) {
            return Err(ProvError::Serde(
                ErrorInfo::new("schema_version", "record schema is not supported")
                    .with_context("label", record.label().to_string())
                    .with_context("found", record.schema_version().to_string())
                    .with_context("supported", SchemaVersion::CURRENT.to_string()),
            ));
        }
        record.verify_digest()?;
        Ok(record)
    }
}
