use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use prov_core::errors::{ErrorInfo, ProvError};
use prov_core::{CodeIdentity, VcsKind};

use crate::bazaar::BazaarWorkingCopy;
use crate::detect::detect_with_preference;
use crate::git::GitWorkingCopy;
use crate::mercurial::MercurialWorkingCopy;
use crate::null::NullWorkingCopy;
use crate::runner::{CommandOutput, CommandRunner, SystemRunner};
use crate::subversion::SubversionWorkingCopy;
use crate::untracked::new_file_patch;

/// Options shared by every backend.
#[derive(Debug, Clone)]
pub struct AdapterOptions {
    /// Report untracked, non-ignored files as part of the diff.
    pub include_untracked: bool,
    /// Backend order used when one directory holds several metadata dirs.
    pub preference: Vec<VcsKind>,
    ignore_patterns: Vec<String>,
    ignore: GlobSet,
}

impl AdapterOptions {
    /// Builds options, compiling the untracked-file ignore globs.
    pub fn new(
        include_untracked: bool,
        preference: Vec<VcsKind>,
        ignore_patterns: &[String],
    ) -> Result<Self, ProvError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in ignore_patterns {
            let glob = Glob::new(pattern).map_err(|err| {
                ProvError::Config(
                    ErrorInfo::new("untracked_ignore_glob", err.to_string())
                        .with_context("pattern", pattern.clone()),
                )
            })?;
            builder.add(glob);
        }
        let ignore = builder
            .build()
            .map_err(|err| ProvError::config("untracked_ignore_glob", err.to_string()))?;
        let preference = if preference.is_empty() {
            VcsKind::VERSIONED.to_vec()
        } else {
            preference
        };
        Ok(Self {
            include_untracked,
            preference,
            ignore_patterns: ignore_patterns.to_vec(),
            ignore,
        })
    }

    /// Glob patterns excluded from untracked-file reporting.
    pub fn ignore_patterns(&self) -> &[String] {
        &self.ignore_patterns
    }

    /// Whether an untracked path (relative to the root) is reported.
    pub fn reports_untracked(&self, relative: &Path) -> bool {
        self.include_untracked && !self.ignore.is_match(relative)
    }
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            include_untracked: true,
            preference: VcsKind::VERSIONED.to_vec(),
            ignore_patterns: Vec::new(),
            ignore: GlobSet::empty(),
        }
    }
}

/// Command plumbing shared by the concrete backends.
#[derive(Clone)]
pub(crate) struct Backend {
    pub(crate) kind: VcsKind,
    pub(crate) program: &'static str,
    pub(crate) root: PathBuf,
    pub(crate) runner: Arc<dyn CommandRunner>,
    pub(crate) options: AdapterOptions,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("kind", &self.kind)
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl Backend {
    pub(crate) fn new(
        kind: VcsKind,
        program: &'static str,
        root: PathBuf,
        runner: Arc<dyn CommandRunner>,
        options: AdapterOptions,
    ) -> Self {
        Self {
            kind,
            program,
            root,
            runner,
            options,
        }
    }

    /// Runs the backend, accepting exit code 0 only.
    pub(crate) fn exec(&self, args: &[&str]) -> Result<CommandOutput, ProvError> {
        self.exec_accepting(args, &[0])
    }

    /// Runs the backend, accepting any of `ok_codes`.
    pub(crate) fn exec_accepting(
        &self,
        args: &[&str],
        ok_codes: &[i32],
    ) -> Result<CommandOutput, ProvError> {
        let command = format!("{} {}", self.program, args.join(" "));
        tracing::trace!(command = %command, root = %self.root.display(), "running backend command");
        let output = self
            .runner
            .run(self.program, args, &self.root)
            .map_err(|err| self.spawn_error(&command, err))?;
        match output.status {
            Some(code) if ok_codes.contains(&code) => Ok(output),
            status => Err(self
                .error(
                    "backend_command_failed",
                    format!(
                        "`{command}` exited with {}",
                        status.map_or_else(|| "a signal".to_string(), |code| code.to_string())
                    ),
                )
                .with_context("command", command)
                .with_context("stderr", output.stderr_text())),
        }
    }

    pub(crate) fn error(&self, code: &str, message: impl Into<String>) -> ProvError {
        ProvError::Repository(
            ErrorInfo::new(code, message)
                .with_context("backend", self.kind.as_str())
                .with_context("path", self.root.display().to_string()),
        )
    }

    fn spawn_error(&self, command: &str, err: io::Error) -> ProvError {
        let (code, hint) = if err.kind() == io::ErrorKind::NotFound {
            (
                "backend_unavailable",
                format!("install `{}` or make it available on PATH", self.program),
            )
        } else {
            ("backend_spawn", "check permissions of the working copy".to_string())
        };
        self.error(code, format!("failed to run `{command}`: {err}"))
            .with_context("command", command.to_string())
            .with_hint(hint)
    }

    /// Non-empty, trimmed lines of a command's stdout.
    pub(crate) fn lines(output: &CommandOutput) -> Vec<String> {
        output
            .stdout_text()
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Capability set every backend provides.
pub trait WorkingCopy {
    /// Backend family.
    fn kind(&self) -> VcsKind;

    /// Root directory of the working copy.
    fn root(&self) -> &Path;

    /// Options in effect.
    fn options(&self) -> &AdapterOptions;

    /// Current revision; `Ok(None)` only for the null backend.
    fn current_revision(&self) -> Result<Option<String>, ProvError>;

    /// Branch (or nick) name when the backend has the concept.
    fn branch(&self) -> Result<Option<String>, ProvError>;

    /// Patch of tracked files against the current revision.
    fn tracked_diff(&self) -> Result<String, ProvError>;

    /// Untracked, non-ignored files relative to the root, unfiltered.
    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError>;

    /// Records all reportable changes as a new revision and returns its id.
    fn commit(&self, message: &str) -> Result<String, ProvError>;

    /// Updates the working copy to `revision`.
    fn checkout(&self, revision: &str) -> Result<(), ProvError>;

    /// Checks out `revision` unless the working copy is already there.
    /// Refuses while there are uncommitted changes.
    fn use_revision(&self, revision: &str) -> Result<(), ProvError> {
        if self.has_changes()? {
            return Err(ProvError::DirtyRepository(
                ErrorInfo::new("uncommitted_changes", "cannot switch revisions with uncommitted changes")
                    .with_context("backend", self.kind().as_str())
                    .with_context("path", self.root().display().to_string())
                    .with_hint("commit or discard the changes first"),
            ));
        }
        if self.current_revision()?.as_deref() == Some(revision) {
            return Ok(());
        }
        tracing::info!(backend = %self.kind(), revision, "checking out requested revision");
        self.checkout(revision)
    }

    /// Untracked files that belong in the diff under the current options.
    fn untracked_files(&self) -> Result<Vec<PathBuf>, ProvError> {
        if !self.options().include_untracked {
            return Ok(Vec::new());
        }
        let mut files: Vec<PathBuf> = self
            .list_untracked()?
            .into_iter()
            .filter(|path| self.options().reports_untracked(path))
            .collect();
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Tracked diff followed by new-file hunks for untracked files.
    fn diff(&self) -> Result<String, ProvError> {
        let mut diff = self.tracked_diff()?;
        for path in self.untracked_files()? {
            if !diff.is_empty() && !diff.ends_with('\n') {
                diff.push('\n');
            }
            diff.push_str(&new_file_patch(self.root(), &path));
        }
        Ok(diff)
    }

    /// Whether the working copy differs from its current revision.
    fn has_changes(&self) -> Result<bool, ProvError> {
        Ok(!self.diff()?.is_empty())
    }

    /// Reproducible description of the working copy.
    fn identity(&self) -> Result<CodeIdentity, ProvError> {
        let revision = self.current_revision()?.ok_or_else(|| {
            ProvError::Repository(
                ErrorInfo::new("revision_unavailable", "backend reported no revision")
                    .with_context("backend", self.kind().as_str())
                    .with_context("path", self.root().display().to_string()),
            )
        })?;
        let diff = self.diff()?;
        let identity = CodeIdentity::versioned(self.kind(), revision, diff, self.root())?
            .with_branch(self.branch().unwrap_or(None));
        tracing::debug!(
            backend = %self.kind(),
            revision = identity.revision_id().unwrap_or_default(),
            dirty = identity.dirty(),
            "captured code identity"
        );
        Ok(identity)
    }
}

/// One adapter per backend kind behind a single interface.
#[derive(Debug, Clone)]
pub enum VcsAdapter {
    Git(GitWorkingCopy),
    Mercurial(MercurialWorkingCopy),
    Subversion(SubversionWorkingCopy),
    Bazaar(BazaarWorkingCopy),
    Null(NullWorkingCopy),
}

impl VcsAdapter {
    /// Opens the innermost working copy enclosing `path`, running backends as processes.
    pub fn open(path: &Path, options: &AdapterOptions) -> Result<Self, ProvError> {
        Self::open_with_runner(path, options, Arc::new(SystemRunner))
    }

    /// Opens the innermost working copy enclosing `path` with a custom runner.
    pub fn open_with_runner(
        path: &Path,
        options: &AdapterOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ProvError> {
        let detected = detect_with_preference(path, &options.preference).ok_or_else(|| {
            ProvError::Repository(
                ErrorInfo::new(
                    "not_a_working_copy",
                    "no git, mercurial, subversion or bazaar metadata found",
                )
                .with_context("path", path.display().to_string())
                .with_hint("run inside a checkout or configure `vcs = \"none\"`"),
            )
        })?;
        Ok(Self::for_kind(
            detected.kind,
            detected.root,
            options.clone(),
            runner,
        ))
    }

    /// Like [`VcsAdapter::open`], falling back to the null adapter.
    pub fn open_or_null(path: &Path, options: &AdapterOptions) -> Self {
        match Self::open(path, options) {
            Ok(adapter) => adapter,
            Err(err) => {
                tracing::info!(error = %err, "no working copy detected, using null adapter");
                Self::null(path)
            }
        }
    }

    /// Builds the adapter for an explicitly chosen backend.
    pub fn for_kind(
        kind: VcsKind,
        root: PathBuf,
        options: AdapterOptions,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        match kind {
            VcsKind::Git => VcsAdapter::Git(GitWorkingCopy::new(root, runner, options)),
            VcsKind::Mercurial => {
                VcsAdapter::Mercurial(MercurialWorkingCopy::new(root, runner, options))
            }
            VcsKind::Subversion => {
                VcsAdapter::Subversion(SubversionWorkingCopy::new(root, runner, options))
            }
            VcsKind::Bazaar => VcsAdapter::Bazaar(BazaarWorkingCopy::new(root, runner, options)),
            VcsKind::None => VcsAdapter::Null(NullWorkingCopy::new(root)),
        }
    }

    /// "No version control" adapter rooted at `root`.
    pub fn null(root: &Path) -> Self {
        VcsAdapter::Null(NullWorkingCopy::new(root.to_path_buf()))
    }

    fn inner(&self) -> &dyn WorkingCopy {
        match self {
            VcsAdapter::Git(wc) => wc,
            VcsAdapter::Mercurial(wc) => wc,
            VcsAdapter::Subversion(wc) => wc,
            VcsAdapter::Bazaar(wc) => wc,
            VcsAdapter::Null(wc) => wc,
        }
    }
}

impl WorkingCopy for VcsAdapter {
    fn kind(&self) -> VcsKind {
        self.inner().kind()
    }

    fn root(&self) -> &Path {
        self.inner().root()
    }

    fn options(&self) -> &AdapterOptions {
        self.inner().options()
    }

    fn current_revision(&self) -> Result<Option<String>, ProvError> {
        self.inner().current_revision()
    }

    fn branch(&self) -> Result<Option<String>, ProvError> {
        self.inner().branch()
    }

    fn tracked_diff(&self) -> Result<String, ProvError> {
        self.inner().tracked_diff()
    }

    fn list_untracked(&self) -> Result<Vec<PathBuf>, ProvError> {
        self.inner().list_untracked()
    }

    fn commit(&self, message: &str) -> Result<String, ProvError> {
        self.inner().commit(message)
    }

    fn checkout(&self, revision: &str) -> Result<(), ProvError> {
        self.inner().checkout(revision)
    }

    fn untracked_files(&self) -> Result<Vec<PathBuf>, ProvError> {
        self.inner().untracked_files()
    }

    fn diff(&self) -> Result<String, ProvError> {
        self.inner().diff()
    }

    fn identity(&self) -> Result<CodeIdentity, ProvError> {
        self.inner().identity()
    }
}

/// Code identity of the working copy enclosing `path`.
pub fn get_identity(path: &Path, options: &AdapterOptions) -> Result<CodeIdentity, ProvError> {
    VcsAdapter::open(path, options)?.identity()
}
