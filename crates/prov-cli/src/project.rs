//! The project the command runs in and the collaborators built from it.

use std::env;
use std::error::Error;
use std::path::PathBuf;

use prov_capture::{CaptureOrchestrator, CaptureReport, CaptureRequest, ProcessLauncher, ProjectConfig};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::VcsKind;
use prov_store::{open_store, RecordStore};
use prov_vcs::VcsAdapter;

use crate::interrupt;

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Finds the project enclosing the working directory.
    pub fn locate() -> Result<Self, ProvError> {
        let cwd = env::current_dir().map_err(|err| ProvError::config("current_dir", err.to_string()))?;
        let root = ProjectConfig::discover(&cwd).ok_or_else(|| {
            ProvError::Config(
                ErrorInfo::new("no_project", "not inside a prov project")
                    .with_context("path", cwd.display().to_string())
                    .with_hint("run `prov init NAME` first"),
            )
        })?;
        let config = ProjectConfig::load(&root)?;
        Ok(Self { root, config })
    }

    pub fn store(&self) -> Result<Box<dyn RecordStore>, ProvError> {
        open_store(&self.config.store_path(&self.root))
    }

    /// The configured backend, or the detected working copy.
    pub fn adapter(&self) -> Result<VcsAdapter, ProvError> {
        let options = self.config.adapter_options(&self.root)?;
        match self.config.vcs {
            Some(VcsKind::None) => Ok(VcsAdapter::null(&self.root)),
            _ => VcsAdapter::open(&self.root, &options),
        }
    }

    /// Runs one capture with Ctrl-C routed to the launched program.
    pub fn capture(
        &self,
        store: &mut dyn RecordStore,
        request: CaptureRequest,
    ) -> Result<CaptureReport, ProvError> {
        let config = self.config.capture_config(&self.root)?;
        let adapter = self.adapter()?;
        let launcher = ProcessLauncher::new(config.scratch_dir.clone()).with_cancel(interrupt::install());
        CaptureOrchestrator::new(config, adapter, launcher, store).run(request)
    }
}

/// Prints the outcome of a capture and turns a failed run into an error.
pub fn report_capture(report: &CaptureReport) -> Result<(), Box<dyn Error>> {
    let record = &report.record;
    for warning in &report.warnings {
        eprintln!("warning: {}: {}", warning.module, warning.message);
    }
    println!(
        "Record '{}' stored: {} after {:.2}s",
        record.label(),
        record.exit_status(),
        record.duration().as_secs_f64()
    );
    if let Some(err) = &report.error {
        return Err(format!("capture failed: {err}").into());
    }
    if !record.exit_status().is_success() {
        return Err(format!("program did not succeed: {}", record.exit_status()).into());
    }
    Ok(())
}
