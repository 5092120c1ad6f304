//! Launching the user's program.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use prov_core::errors::{ErrorInfo, ProvError};
use prov_record::{CommandLine, ExitStatus, ParamFormat, ParameterSet};

use crate::datastore::DataStore;

/// Environment variable naming the file the program may list its imports in.
pub const IMPORTS_ENV: &str = "PROV_IMPORTS_FILE";
/// Environment variable carrying the record label.
pub const LABEL_ENV: &str = "PROV_LABEL";
/// Argument replaced by the path of the written parameter file.
pub const PARAMETER_PLACEHOLDER: &str = "<parameters>";

#[cfg(unix)]
const SIGINT: i32 = libc::SIGINT;
#[cfg(not(unix))]
const SIGINT: i32 = 2;

/// Shared cancellation flag, set from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Parameters written to a file for the program to read.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterFile {
    pub parameters: ParameterSet,
    pub format: ParamFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub label: String,
    pub command: CommandLine,
    pub parameters: Option<ParameterFile>,
    pub working_dir: PathBuf,
    pub data_root: PathBuf,
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOutcome {
    pub exit_status: ExitStatus,
    pub duration: Duration,
    /// Module names or source paths the program reported importing.
    pub imported_modules: Vec<String>,
    /// Files written under the data root, relative to it.
    pub outputs: Vec<PathBuf>,
    /// Set when the data root could not be rescanned after the program
    /// exited; `outputs` is then empty.
    pub output_scan_error: Option<ProvError>,
}

/// Runs one program invocation to completion.
pub trait Launcher {
    fn execute(&self, request: &LaunchRequest) -> Result<LaunchOutcome, ProvError>;
}

impl<L: Launcher + ?Sized> Launcher for &L {
    fn execute(&self, request: &LaunchRequest) -> Result<LaunchOutcome, ProvError> {
        (**self).execute(request)
    }
}

/// Runs the program as a child process with inherited stdio.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    scratch_dir: PathBuf,
    cancel: CancelToken,
    poll_interval: Duration,
    grace_period: Duration,
}

fn launch_error(code: &str, message: impl Into<String>, path: &Path) -> ProvError {
    ProvError::Launch(ErrorInfo::new(code, message).with_context("path", path.display().to_string()))
}

impl ProcessLauncher {
    pub fn new(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: scratch_dir.into(),
            cancel: CancelToken::new(),
            poll_interval: Duration::from_millis(50),
            grace_period: Duration::from_secs(5),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    fn write_parameters(&self, label: &str, file: &ParameterFile) -> Result<PathBuf, ProvError> {
        let path = self
            .scratch_dir
            .join(format!("{label}.{}", file.format.extension()));
        let text = file.parameters.render(file.format)?;
        fs::write(&path, text).map_err(|err| launch_error("parameter_write", err.to_string(), &path))?;
        Ok(path)
    }

    fn argv(&self, request: &LaunchRequest) -> Result<Vec<String>, ProvError> {
        let mut argv = request.command.argv();
        if let Some(file) = &request.parameters {
            let path = self.write_parameters(&request.label, file)?.display().to_string();
            if argv.iter().any(|arg| arg.as_str() == PARAMETER_PLACEHOLDER) {
                for arg in argv.iter_mut().filter(|arg| arg.as_str() == PARAMETER_PLACEHOLDER) {
                    *arg = path.clone();
                }
            } else {
                argv.push(path);
            }
        }
        Ok(argv)
    }

    /// Polls the child, stopping it once the token is cancelled.
    fn wait(&self, child: &mut Child) -> io::Result<ExitStatus> {
        loop {
            if let Some(status) = child.try_wait()? {
                // A terminal Ctrl-C reaches the child too; it may exit on its own.
                if self.cancel.is_cancelled() {
                    return Ok(ExitStatus::Interrupted);
                }
                return Ok(convert_status(status));
            }
            if self.cancel.is_cancelled() {
                tracing::warn!(pid = child.id(), "run cancelled, stopping program");
                interrupt(child);
                let deadline = Instant::now() + self.grace_period;
                while Instant::now() < deadline {
                    if child.try_wait()?.is_some() {
                        return Ok(ExitStatus::Interrupted);
                    }
                    thread::sleep(self.poll_interval);
                }
                child.kill()?;
                child.wait()?;
                return Ok(ExitStatus::Interrupted);
            }
            thread::sleep(self.poll_interval);
        }
    }
}

#[cfg(unix)]
fn interrupt(child: &Child) {
    let result = unsafe { libc::kill(child.id() as i32, libc::SIGINT) };
    if result == -1 {
        tracing::debug!(error = %io::Error::last_os_error(), "failed to signal child");
    }
}

#[cfg(not(unix))]
fn interrupt(_child: &Child) {}

fn convert_status(status: std::process::ExitStatus) -> ExitStatus {
    if let Some(code) = status.code() {
        return ExitStatus::from_code(code);
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        match status.signal() {
            Some(SIGINT) => ExitStatus::Interrupted,
            Some(signal) => ExitStatus::Signalled { signal },
            None => ExitStatus::Failed { code: -1 },
        }
    }
    #[cfg(not(unix))]
    {
        let _ = SIGINT;
        ExitStatus::Failed { code: -1 }
    }
}

fn read_imports(path: &Path) -> Vec<String> {
    match fs::read_to_string(path) {
        Ok(text) => {
            let mut modules: Vec<String> = text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string)
                .collect();
            modules.sort();
            modules.dedup();
            modules
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "could not read import list");
            Vec::new()
        }
    }
}

impl Launcher for ProcessLauncher {
    fn execute(&self, request: &LaunchRequest) -> Result<LaunchOutcome, ProvError> {
        fs::create_dir_all(&self.scratch_dir)
            .map_err(|err| launch_error("scratch_dir", err.to_string(), &self.scratch_dir))?;
        let imports_file = self.scratch_dir.join(format!("{}.imports", request.label));
        if imports_file.exists() {
            fs::remove_file(&imports_file)
                .map_err(|err| launch_error("scratch_dir", err.to_string(), &imports_file))?;
        }
        let argv = self.argv(request)?;
        let Some((program, args)) = argv.split_first() else {
            return Err(launch_error("empty_command", "no executable given", &request.working_dir));
        };
        let datastore = DataStore::new(&request.data_root);
        let before = datastore.snapshot()?;

        tracing::info!(command = %argv.join(" "), label = %request.label, "launching program");
        let started = Instant::now();
        let mut child = Command::new(program)
            .args(args)
            .current_dir(&request.working_dir)
            .envs(&request.environment)
            .env(IMPORTS_ENV, &imports_file)
            .env(LABEL_ENV, &request.label)
            .spawn()
            .map_err(|err| {
                let hint = if err.kind() == io::ErrorKind::NotFound {
                    format!("`{program}` was not found on PATH")
                } else {
                    "check that the executable is runnable".to_string()
                };
                ProvError::Launch(
                    ErrorInfo::new("spawn_failed", err.to_string())
                        .with_context("command", argv.join(" "))
                        .with_hint(hint),
                )
            })?;
        let exit_status = self.wait(&mut child).map_err(|err| {
            ProvError::Launch(ErrorInfo::new("wait_failed", err.to_string()).with_context("command", argv.join(" ")))
        })?;
        let duration = started.elapsed();
        tracing::info!(status = %exit_status, elapsed_ms = duration.as_millis() as u64, "program finished");

        let (outputs, output_scan_error) = match datastore.changed_since(&before) {
            Ok(outputs) => (outputs, None),
            Err(err) => {
                tracing::warn!(error = %err, "could not rescan the data root");
                (Vec::new(), Some(err))
            }
        };
        Ok(LaunchOutcome {
            exit_status,
            duration,
            imported_modules: read_imports(&imports_file),
            outputs,
            output_scan_error,
        })
    }
}
