//! Capture orchestration for prov: project configuration, the data
//! directories, launching the program and the [`CaptureOrchestrator`] that
//! ties code identity, dependencies and outputs into a stored record.

pub mod config;
pub mod datastore;
pub mod launch;
pub mod orchestrator;

pub use config::{
    default_archive, AddLabel, CaptureConfig, OnChanged, ProjectConfig, CONFIG_FILE, PROJECT_DIR,
};
pub use datastore::{DataSnapshot, DataStore};
pub use launch::{
    CancelToken, LaunchOutcome, LaunchRequest, Launcher, ParameterFile, ProcessLauncher, IMPORTS_ENV, LABEL_ENV,
    PARAMETER_PLACEHOLDER,
};
pub use orchestrator::{CaptureOrchestrator, CaptureReport, CaptureRequest, CaptureState};
