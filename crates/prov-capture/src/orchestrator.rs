//! One capture: snapshot the code, run the program, seal and store the record.
//!
//! ```text
//! Idle -> PreRunSnapshot -> Running -> PostRunSnapshot -> Sealed
//!   \___________\______________\______________\_______-> Failed
//! ```
//!
//! Every path through the machine ends with a sealed record in the store,
//! failed runs included.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::{CodeIdentity, VcsKind};
use prov_deps::{DependencyResolver, ResolutionWarning};
use prov_record::{
    timestamp_label, validate_label, CaptureStage, CommandLine, ExitStatus, ParamFormat, ParameterSet,
    PlatformInfo, Record, RecordDraft, LABEL_PARAMETER,
};
use prov_store::RecordStore;
use prov_vcs::{VcsAdapter, WorkingCopy};

use crate::config::{AddLabel, CaptureConfig};
use crate::datastore::DataStore;
use crate::launch::{LaunchRequest, Launcher, ParameterFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    PreRunSnapshot,
    Running,
    PostRunSnapshot,
    Sealed,
    Failed,
}

impl CaptureState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Sealed | CaptureState::Failed)
    }

    pub fn can_transition_to(&self, next: CaptureState) -> bool {
        use CaptureState::*;
        match (self, next) {
            (current, Failed) => !current.is_terminal(),
            (Idle, PreRunSnapshot) | (PreRunSnapshot, Running) | (Running, PostRunSnapshot) => true,
            (PostRunSnapshot, Sealed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CaptureState::Idle => "idle",
            CaptureState::PreRunSnapshot => "pre-run snapshot",
            CaptureState::Running => "running",
            CaptureState::PostRunSnapshot => "post-run snapshot",
            CaptureState::Sealed => "sealed",
            CaptureState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to run and how to describe it.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRequest {
    /// Defaults to the start timestamp as `YYYYMMDD-HHMMSS`.
    pub label: Option<String>,
    pub reason: Option<String>,
    /// Label of the record being repeated.
    pub repeats: Option<String>,
    pub command: CommandLine,
    pub parameters: ParameterSet,
    /// Write the parameters to a file in this format for the program.
    pub parameter_format: Option<ParamFormat>,
    /// Input files, relative to the input root or absolute.
    pub input_data: Vec<PathBuf>,
    /// Extra environment for the program.
    pub environment: BTreeMap<String, String>,
}

impl CaptureRequest {
    pub fn new(command: CommandLine) -> Self {
        Self {
            label: None,
            reason: None,
            repeats: None,
            command,
            parameters: ParameterSet::new(),
            parameter_format: None,
            input_data: Vec::new(),
            environment: BTreeMap::new(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_parameters(mut self, parameters: ParameterSet, format: Option<ParamFormat>) -> Self {
        self.parameters = parameters;
        self.parameter_format = format;
        self
    }

    pub fn with_input_data(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        self.input_data.extend(paths);
        self
    }
}

/// Result of a capture that produced a stored record.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureReport {
    pub record: Record,
    /// The failure that ended the capture early, also kept in the record.
    pub error: Option<ProvError>,
    pub trace: Vec<CaptureState>,
    pub warnings: Vec<ResolutionWarning>,
}

impl CaptureReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.record.exit_status().is_success()
    }

    pub fn final_state(&self) -> CaptureState {
        self.trace.last().copied().unwrap_or(CaptureState::Idle)
    }
}

/// Drives a single capture. Consumed by [`CaptureOrchestrator::run`].
pub struct CaptureOrchestrator<'s, L: Launcher> {
    config: CaptureConfig,
    adapter: VcsAdapter,
    resolver: DependencyResolver,
    launcher: L,
    store: &'s mut dyn RecordStore,
    timestamp: Option<DateTime<Utc>>,
    state: CaptureState,
    trace: Vec<CaptureState>,
}

impl<'s, L: Launcher> CaptureOrchestrator<'s, L> {
    pub fn new(config: CaptureConfig, adapter: VcsAdapter, launcher: L, store: &'s mut dyn RecordStore) -> Self {
        let resolver = DependencyResolver::new(config.resolver.clone());
        Self {
            config,
            adapter,
            resolver,
            launcher,
            store,
            timestamp: None,
            state: CaptureState::Idle,
            trace: vec![CaptureState::Idle],
        }
    }

    /// Fixes the record timestamp instead of reading the clock.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    fn transition(&mut self, next: CaptureState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal capture transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "capture state");
        self.state = next;
        self.trace.push(next);
    }

    /// Runs the whole capture. Errors are returned only when no record could
    /// be stored (invalid or taken label, store failure); every other failure
    /// is reported inside the stored record.
    pub fn run(mut self, request: CaptureRequest) -> Result<CaptureReport, ProvError> {
        let timestamp = self.timestamp.unwrap_or_else(Utc::now);
        let label = request
            .label
            .clone()
            .unwrap_or_else(|| timestamp_label(timestamp));
        validate_label(&label)?;
        if self.store.contains(&label)? {
            return Err(ProvError::DuplicateLabel(
                ErrorInfo::new("duplicate_label", format!("a record labelled '{label}' already exists"))
                    .with_context("label", label.clone())
                    .with_hint("choose another label with --label"),
            ));
        }
        let span = tracing::info_span!("capture", label = %label);
        let _guard = span.enter();

        let (command, parameters) = self.labelled(&request, &label)?;
        let mut draft = RecordDraft::new(label.clone(), timestamp, self.config.project_root.clone());
        draft.reason = request.reason.clone();
        draft.repeats = request.repeats.clone();
        draft.command = command.clone();
        draft.parameters = parameters.clone();

        self.transition(CaptureState::PreRunSnapshot);
        match self.snapshot(&label) {
            Ok(identity) => {
                self.widen_local_roots(&identity);
                draft.code_identity = Some(identity);
            }
            Err(err) => {
                draft.fail(CaptureStage::PreRunSnapshot, err);
                return self.conclude(draft, Vec::new());
            }
        }

        self.transition(CaptureState::Running);
        let launch = LaunchRequest {
            label: label.clone(),
            command,
            parameters: request.parameter_format.map(|format| ParameterFile { parameters, format }),
            working_dir: self.config.project_root.clone(),
            data_root: self.config.data_root.clone(),
            environment: request.environment.clone(),
        };
        let outcome = match self.launcher.execute(&launch) {
            Ok(outcome) => outcome,
            Err(err) => {
                draft.exit_status = ExitStatus::LaunchFailed;
                draft.fail(CaptureStage::Running, err);
                return self.conclude(draft, Vec::new());
            }
        };
        draft.exit_status = outcome.exit_status;
        draft.duration = outcome.duration;

        self.transition(CaptureState::PostRunSnapshot);
        let resolution = self.resolver.resolve(&outcome.imported_modules);
        for warning in &resolution.warnings {
            tracing::warn!(module = %warning.module, "{}", warning.message);
        }
        draft.dependencies = resolution.dependencies;

        if let Some(err) = outcome.output_scan_error.clone() {
            draft.fail(CaptureStage::PostRunSnapshot, err);
        }
        let data = DataStore::new(&self.config.data_root);
        let (outputs, output_errors) = data.keys(&outcome.outputs);
        draft.outputs = outputs;
        if let Some(archive_root) = &self.config.archive_root {
            let destination = archive_root.join(&label);
            for err in data.archive(&outcome.outputs, &destination) {
                tracing::warn!(error = %err, "could not archive output file");
                draft.fail(CaptureStage::PostRunSnapshot, err);
            }
        }
        let inputs = DataStore::new(&self.config.input_root);
        let input_paths: Vec<PathBuf> = request
            .input_data
            .iter()
            .map(|path| inputs.relative(path).unwrap_or_else(|| path.clone()))
            .collect();
        let (input_keys, input_errors) = inputs.keys(&input_paths);
        draft.input_data = input_keys;
        for err in output_errors.into_iter().chain(input_errors) {
            tracing::warn!(error = %err, "could not hash data file");
            draft.fail(CaptureStage::PostRunSnapshot, err);
        }

        self.conclude(draft, resolution.warnings)
    }

    /// Command line and parameters with the label added where configured.
    fn labelled(&self, request: &CaptureRequest, label: &str) -> Result<(CommandLine, ParameterSet), ProvError> {
        let mut command = request.command.clone();
        let mut parameters = request.parameters.clone();
        match self.config.add_label {
            Some(AddLabel::Cmdline) => command.arguments.push(label.to_string()),
            Some(AddLabel::Parameters) if request.parameter_format.is_some() => {
                parameters.insert(LABEL_PARAMETER, label)?;
            }
            Some(AddLabel::Parameters) => {
                tracing::warn!("no parameter file to add the label to");
            }
            None => {}
        }
        Ok((command, parameters))
    }

    /// Pre-run code identity, enforcing the clean-copy policy.
    fn snapshot(&self, label: &str) -> Result<CodeIdentity, ProvError> {
        let identity = self.adapter.identity()?;
        if !self.config.strict() || self.config.whitespace.treats_as_clean(identity.working_copy_diff()) {
            return Ok(identity);
        }
        if !self.config.auto_commit {
            return Err(self.dirty(&identity));
        }
        let revision = self
            .adapter
            .commit(&format!("Automatic commit by prov before run {label}"))?;
        tracing::info!(revision = %revision, "committed working copy changes");
        let identity = self.adapter.identity()?;
        if self.config.whitespace.treats_as_clean(identity.working_copy_diff()) {
            Ok(identity)
        } else {
            Err(self.dirty(&identity))
        }
    }

    /// Modules anywhere in the working copy count as local, even when the
    /// project lives in a subdirectory of it.
    fn widen_local_roots(&mut self, identity: &CodeIdentity) {
        let root = identity.working_copy_root();
        if identity.vcs_type() == VcsKind::None || root == self.config.resolver.project_root {
            return;
        }
        let config = self.config.resolver.clone().with_repository_root(root);
        tracing::debug!(repository = %root.display(), "resolving against the working copy root");
        self.resolver = DependencyResolver::new(config);
    }

    fn dirty(&self, identity: &CodeIdentity) -> ProvError {
        let changed = identity
            .working_copy_diff()
            .lines()
            .filter(|line| {
                (line.starts_with('+') || line.starts_with('-'))
                    && !line.starts_with("+++")
                    && !line.starts_with("---")
            })
            .count();
        ProvError::DirtyRepository(
            ErrorInfo::new("uncommitted_changes", "the working copy has uncommitted changes")
                .with_context("backend", identity.vcs_type().as_str())
                .with_context("path", identity.working_copy_root().display().to_string())
                .with_context("changed_lines", changed.to_string())
                .with_hint("commit the changes, enable auto_commit, or set on_changed = \"store-diff\""),
        )
    }

    /// Seals and stores whatever the draft holds.
    fn conclude(mut self, mut draft: RecordDraft, warnings: Vec<ResolutionWarning>) -> Result<CaptureReport, ProvError> {
        draft.environment = PlatformInfo::capture(&self.config.environment, &self.config.tool_version);
        let error = draft.failure.as_ref().map(|failure| failure.error.clone());
        let final_state = if error.is_some() {
            CaptureState::Failed
        } else {
            CaptureState::Sealed
        };
        if let Some(err) = &error {
            tracing::warn!(error = %err, "capture failed, storing partial record");
        }
        let record = draft.seal()?;
        self.store.save(&record)?;
        self.transition(final_state);
        tracing::info!(label = record.label(), digest = record.digest(), status = %record.exit_status(), "record stored");
        Ok(CaptureReport {
            record,
            error,
            trace: self.trace,
            warnings,
        })
    }
}
