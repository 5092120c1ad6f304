use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use prov_capture::{AddLabel, CaptureRequest};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::{
    CompareOptions, ComparisonReport, DiffFormatter, Dimension, ParamFormat, Record, RecordComparator,
    LABEL_PARAMETER,
};
use prov_store::RecordStore;
use prov_vcs::WorkingCopy;

use crate::project::{report_capture, Project};

#[derive(Args, Debug)]
pub struct RepeatArgs {
    /// Record to repeat; `last` for the most recent one.
    pub original: String,
    /// Label of the new record; defaults to `<original>_repeat`.
    #[arg(short = 'l', long)]
    pub label: Option<String>,
}

/// Request that re-runs `original` as recorded. A label the project added
/// to the command line or parameters is taken out again; the capture adds
/// the new one.
fn repeat_request(original: &Record, label: String, add_label: Option<AddLabel>) -> CaptureRequest {
    let mut command = original.command().clone();
    let mut parameters = original.parameters().clone();
    match add_label {
        Some(AddLabel::Cmdline) if command.arguments.last().map(String::as_str) == Some(original.label()) => {
            command.arguments.pop();
        }
        Some(AddLabel::Parameters) => {
            parameters.remove(LABEL_PARAMETER);
        }
        _ => {}
    }
    let format = command
        .parameter_file
        .as_deref()
        .map(|file| ParamFormat::from_path(Path::new(file)).unwrap_or(ParamFormat::Json));
    let inputs: Vec<PathBuf> = original
        .input_data()
        .iter()
        .map(|key| PathBuf::from(&key.path))
        .collect();
    let mut request = CaptureRequest::new(command)
        .with_label(label)
        .with_reason(format!("Repeat experiment {}", original.label()))
        .with_parameters(parameters, format)
        .with_input_data(inputs);
    request.repeats = Some(original.label().to_string());
    request
}

fn summary(report: &ComparisonReport) -> String {
    if report.is_identical() {
        return "The new record exactly matches the original.".to_string();
    }
    format!(
        "The new record does not match the original. It differs as follows.\n{}\
         run `prov diff --long {} {}` to see the differences in detail.",
        DiffFormatter::Short.render(report),
        report.left,
        report.right
    )
}

pub fn run(args: &RepeatArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let mut store = project.store()?;
    let original = store.get(&store.resolve_label(&args.original)?)?;

    let identity = original.code_identity();
    if let Some(revision) = identity.revision_id() {
        let current = project.adapter()?.current_revision()?;
        if current.as_deref() != Some(revision) {
            return Err(ProvError::Repository(
                ErrorInfo::new("revision_mismatch", "the working copy is not at the recorded revision")
                    .with_context("recorded", revision)
                    .with_context("current", current.unwrap_or_else(|| "(none)".to_string()))
                    .with_hint(format!("check out {revision} before repeating {}", original.label())),
            )
            .into());
        }
    }
    if identity.dirty() {
        eprintln!(
            "warning: {} ran with uncommitted changes that are not reapplied",
            original.label()
        );
    }

    let label = args
        .label
        .clone()
        .unwrap_or_else(|| format!("{}_repeat", original.label()));
    let request = repeat_request(&original, label, project.config.add_label);
    let report = project.capture(store.as_mut(), request)?;
    let comparator = RecordComparator::new(CompareOptions {
        whitespace: project.config.whitespace,
        dimensions: Dimension::CORE.to_vec(),
        ..CompareOptions::default()
    })?;
    let message = summary(&comparator.compare(&original, &report.record));
    store.set_outcome(report.record.label(), &message)?;
    println!("{message}");
    report_capture(&report)
}
