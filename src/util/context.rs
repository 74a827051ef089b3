//! Global context for stanza operations.
//!
//! Owns the merged configuration and every process-local cache (manifest
//! recognition, lockfile snapshots, environment validity, package managers),
//! so tests can build an isolated context instead of sharing globals.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use thiserror::Error;

use crate::core::lockfile::{LockCache, POETRY_LOCK};
use crate::core::manifest::{ManifestCache, PY_PROJECT_TOML};
use crate::ops::environment::EnvironmentCache;
use crate::ops::package_manager::{PackageManager, PackageManagerRegistry};
use crate::util::config::{global_config_path, load_config, project_config_path, Config};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::process::{locate_poetry, CancellationToken, OutputTrim, PoetryRunner, Runner};

/// Error locating the Poetry project.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("could not find a Poetry `{}` in `{}` or any parent directory", PY_PROJECT_TOML, dir.display())]
    NotFound { dir: PathBuf },
}

impl ProjectError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ProjectError::NotFound { dir } => Diagnostic::error(self.to_string())
                .with_location(dir.clone())
                .with_context("a Poetry project has a [tool.poetry] table in pyproject.toml")
                .with_suggestion(suggestions::NO_MANIFEST),
        }
    }
}

/// Global context containing configuration, caches and the poetry runner.
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Directory holding the Poetry manifest, if one was found
    project_root: Option<PathBuf>,

    /// Merged global + project configuration
    config: Config,

    /// `--poetry` override; beats the configured path
    poetry_override: Option<PathBuf>,

    verbose: bool,
    color: bool,

    manifests: ManifestCache,
    locks: LockCache,
    environments: EnvironmentCache,
    managers: PackageManagerRegistry,

    cancel: CancellationToken,
    runner: OnceLock<Arc<dyn Runner>>,
}

impl std::fmt::Debug for GlobalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalContext")
            .field("cwd", &self.cwd)
            .field("project_root", &self.project_root)
            .field("config", &self.config)
            .field("poetry_override", &self.poetry_override)
            .finish_non_exhaustive()
    }
}

impl GlobalContext {
    /// Create a context for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a context for a specific working directory.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let manifests = ManifestCache::new();
        let project_root = find_project_root(&manifests, &cwd);

        let project_config = project_config_path(project_root.as_deref().unwrap_or(&cwd));
        let config = load_config(global_config_path().as_deref(), &project_config);
        tracing::debug!("loaded config: {:?}", config);

        Ok(GlobalContext {
            cwd,
            project_root,
            config,
            poetry_override: None,
            verbose: false,
            color: true,
            manifests,
            locks: LockCache::new(),
            environments: EnvironmentCache::new(),
            managers: PackageManagerRegistry::new(),
            cancel: CancellationToken::new(),
            runner: OnceLock::new(),
        })
    }

    /// Replace the poetry runner (used by tests and embedders).
    pub fn with_runner(self, runner: Arc<dyn Runner>) -> Self {
        let _ = self.runner.set(runner);
        self
    }

    /// Share a cancellation token, e.g. one fired by an interrupt handler.
    ///
    /// Takes effect only before the first call to [`GlobalContext::runner`].
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Set color output.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// Override the poetry executable for this run.
    pub fn set_poetry_override(&mut self, poetry: Option<PathBuf>) {
        self.poetry_override = poetry;
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Check if color output is enabled.
    pub fn color(&self) -> bool {
        self.color
    }

    /// Get the Poetry project root, or an error when cwd is not inside one.
    pub fn project_root(&self) -> Result<&Path, ProjectError> {
        self.project_root
            .as_deref()
            .ok_or_else(|| ProjectError::NotFound {
                dir: self.cwd.clone(),
            })
    }

    /// Get the Poetry manifest path.
    pub fn manifest_path(&self) -> Result<PathBuf, ProjectError> {
        Ok(self.project_root()?.join(PY_PROJECT_TOML))
    }

    /// Get the lockfile path (which may not exist).
    pub fn lock_path(&self) -> Result<PathBuf, ProjectError> {
        Ok(self.project_root()?.join(POETRY_LOCK))
    }

    /// Directory poetry commands run in: the project root, else cwd.
    pub fn work_dir(&self) -> &Path {
        self.project_root.as_deref().unwrap_or(&self.cwd)
    }

    /// Resolve the poetry executable: `--poetry`, then config, then search.
    pub fn poetry_executable(&self) -> Option<PathBuf> {
        let configured = self
            .poetry_override
            .as_deref()
            .or(self.config.poetry.path.as_deref());
        locate_poetry(configured)
    }

    /// Get the shared poetry runner.
    pub fn runner(&self) -> Arc<dyn Runner> {
        let runner = self.runner.get_or_init(|| {
            let executable = self.poetry_executable();
            match &executable {
                Some(path) => tracing::debug!("using poetry at {}", path.display()),
                None => tracing::debug!("no poetry executable found"),
            }
            Arc::new(
                PoetryRunner::new(executable)
                    .with_trim(OutputTrim::from_flag(self.config.trim_output()))
                    .with_query_timeout(self.config.timeout())
                    .with_cancellation(self.cancel.clone()),
            )
        });
        Arc::clone(runner)
    }

    /// Token cancelling every process this context's runner starts.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Package manager for the environment of `project`.
    pub fn package_manager(&self, project: &Path) -> Arc<PackageManager> {
        let key = project.display().to_string();
        self.managers.for_key(&key, project, self.runner())
    }

    /// Manifest recognition cache.
    pub fn manifests(&self) -> &ManifestCache {
        &self.manifests
    }

    /// Lockfile snapshot cache.
    pub fn locks(&self) -> &LockCache {
        &self.locks
    }

    /// Environment validity cache.
    pub fn environments(&self) -> &EnvironmentCache {
        &self.environments
    }

    /// Drop every cached result.
    pub fn clear_caches(&self) {
        self.manifests.clear();
        self.locks.clear();
        self.environments.clear();
        self.managers.clear();
    }
}

/// Walk from `start` upward to the first directory with a Poetry manifest.
pub fn find_project_root(manifests: &ManifestCache, start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| manifests.find_in(dir).is_some())
        .map(Path::to_path_buf)
}
