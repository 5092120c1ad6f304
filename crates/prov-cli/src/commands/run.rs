use std::env;
use std::error::Error;
use std::path::{Path, PathBuf};

use clap::Args;
use prov_capture::{CaptureRequest, PARAMETER_PLACEHOLDER};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::{CommandLine, ParamFormat, ParameterSet};
use prov_store::RecordStore;
use prov_vcs::WorkingCopy;

use crate::project::{report_capture, Project};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Label for the record; defaults to the start time as YYYYMMDD-HHMMSS.
    #[arg(short = 'l', long)]
    pub label: Option<String>,
    /// Why the run is being made.
    #[arg(short = 'r', long)]
    pub reason: Option<String>,
    /// Executable to launch instead of the project default.
    #[arg(short = 'e', long)]
    pub executable: Option<String>,
    /// Main file to pass to the executable instead of the project default.
    #[arg(short = 'm', long = "main")]
    pub main_file: Option<String>,
    /// Tag the new record.
    #[arg(short = 't', long)]
    pub tag: Vec<String>,
    /// Check out this revision of the code before running.
    #[arg(short = 'v', long, value_name = "REV")]
    pub version: Option<String>,
    /// Program arguments. A parameter file (.json, .yaml, .toml) is recorded
    /// as parameters, `name=value` overrides entries of it, and files under
    /// the input directory are recorded as input data.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

/// Program arguments sorted into their roles.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct ClassifiedArguments {
    pub arguments: Vec<String>,
    pub parameter_file: Option<String>,
    pub parameters: ParameterSet,
    pub parameter_format: Option<ParamFormat>,
    pub input_data: Vec<PathBuf>,
}

fn is_override(arg: &str) -> bool {
    !arg.starts_with('-') && arg.split_once('=').is_some_and(|(name, _)| !name.is_empty())
}

pub(crate) fn classify_arguments(
    args: &[String],
    cwd: &Path,
    input_root: &Path,
) -> Result<ClassifiedArguments, ProvError> {
    let mut classified = ClassifiedArguments::default();
    let mut overrides = Vec::new();
    for arg in args {
        let path = cwd.join(arg);
        if is_override(arg) {
            overrides.push(arg.clone());
            continue;
        }
        if path.is_file() {
            if let (None, Some(format)) = (&classified.parameter_file, ParamFormat::from_path(&path)) {
                classified.parameters = ParameterSet::load(&path)?;
                classified.parameter_format = Some(format);
                classified.parameter_file = Some(arg.clone());
                classified.arguments.push(PARAMETER_PLACEHOLDER.to_string());
                continue;
            }
            if let Ok(relative) = path.strip_prefix(input_root) {
                classified.input_data.push(relative.to_path_buf());
            }
        }
        classified.arguments.push(arg.clone());
    }
    if !overrides.is_empty() {
        if classified.parameter_file.is_none() {
            return Err(ProvError::Parameters(
                ErrorInfo::new("override_without_file", "parameter overrides need a parameter file")
                    .with_context("overrides", overrides.join(" "))
                    .with_hint("pass a .json, .yaml or .toml parameter file before name=value arguments"),
            ));
        }
        classified.parameters.apply_overrides(&overrides)?;
    }
    Ok(classified)
}

/// Interpreter for a main file, by extension.
fn infer_executable(main_file: &str) -> Option<&'static str> {
    match Path::new(main_file).extension()?.to_str()? {
        "py" => Some("python3"),
        "R" | "r" => Some("Rscript"),
        "jl" => Some("julia"),
        "m" => Some("matlab"),
        "sh" => Some("sh"),
        "pl" => Some("perl"),
        _ => None,
    }
}

pub fn run(args: &RunArgs) -> Result<(), Box<dyn Error>> {
    let project = Project::locate()?;
    let cwd = env::current_dir()?;
    let input_root = project.config.input_root(&project.root);
    let mut classified = classify_arguments(&args.args, &cwd, &input_root)?;

    let main_file = args.main_file.clone().or_else(|| project.config.main_file.clone());
    let executable = match (&args.executable, &project.config.executable, &main_file) {
        (Some(executable), _, _) | (None, Some(executable), _) => executable.clone(),
        (None, None, Some(main)) => infer_executable(main)
            .map(str::to_string)
            .ok_or_else(|| format!("cannot tell how to run {main}; pass --executable"))?,
        (None, None, None) => {
            if classified.arguments.is_empty() {
                return Err("nothing to run: give an executable or configure a default".into());
            }
            classified.arguments.remove(0)
        }
    };

    let mut command = CommandLine::new(executable).with_arguments(classified.arguments);
    if let Some(main) = main_file {
        command = command.with_main_file(main);
    }
    if let Some(parameter_file) = classified.parameter_file {
        command = command.with_parameter_file(parameter_file);
    }
    let mut request = CaptureRequest::new(command)
        .with_parameters(classified.parameters, classified.parameter_format)
        .with_input_data(classified.input_data);
    request.label = args.label.clone();
    request.reason = args.reason.clone();

    if let Some(revision) = &args.version {
        project.adapter()?.use_revision(revision)?;
    }
    let mut store = project.store()?;
    let report = project.capture(store.as_mut(), request)?;
    for tag in &args.tag {
        store.add_tag(report.record.label(), tag)?;
    }
    report_capture(&report)
}
