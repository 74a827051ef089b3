//! Typed wrappers around the poetry command line.
//!
//! Interactive actions (install, add, lock, ...) propagate every failure and
//! run without a time limit; they stay cancellable through the runner's
//! token. Best-effort queries (`env list`, `--version`, config lookups)
//! use the runner's bounded variant and fall back to a default.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use pep440_rs::Version;
use thiserror::Error;

use crate::core::lockfile::POETRY_LOCK;
use crate::core::manifest::{is_poetry_manifest, PoetryManifest, PY_PROJECT_TOML};
use crate::ops::dry_run::{parse_dry_run, DryRunReport};
use crate::ops::env::{self, EnvEntry};
use crate::ops::outdated::{parse_outdated, OutdatedEntry};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::ModificationStamp;
use crate::util::process::{ProcessError, Runner};

/// Options for `poetry install`.
#[derive(Debug, Clone, Default)]
pub struct InstallOptions {
    /// Skip installing the project itself
    pub no_root: bool,
    /// Extras to install
    pub extras: Vec<String>,
}

impl InstallOptions {
    fn to_args(&self) -> Vec<&str> {
        let mut args = vec!["install"];
        if self.no_root {
            args.push("--no-root");
        }
        for extra in &self.extras {
            args.push("--extras");
            args.push(extra);
        }
        args
    }
}

/// `poetry install [--no-root] [--extras X]...`
pub fn install(
    runner: &dyn Runner,
    project: &Path,
    opts: &InstallOptions,
) -> Result<String, ProcessError> {
    runner.run(project, &opts.to_args(), None)
}

/// `poetry install --dry-run`, parsed.
pub fn install_dry_run(runner: &dyn Runner, project: &Path) -> Result<DryRunReport, ProcessError> {
    let output = runner.run(project, &["install", "--dry-run"], None)?;
    Ok(parse_dry_run(&output))
}

/// `poetry install --extras <extra>`
pub fn install_extras(
    runner: &dyn Runner,
    project: &Path,
    extra: &str,
) -> Result<String, ProcessError> {
    runner.run(project, &["install", "--extras", extra], None)
}

/// `poetry add <name>...`
pub fn add(runner: &dyn Runner, project: &Path, packages: &[String]) -> Result<String, ProcessError> {
    let mut args = vec!["add"];
    args.extend(packages.iter().map(String::as_str));
    runner.run(project, &args, None)
}

/// `poetry remove <name>...`
pub fn remove(
    runner: &dyn Runner,
    project: &Path,
    packages: &[String],
) -> Result<String, ProcessError> {
    let mut args = vec!["remove"];
    args.extend(packages.iter().map(String::as_str));
    runner.run(project, &args, None)
}

/// `poetry run <args>...`
pub fn run(runner: &dyn Runner, project: &Path, args: &[String]) -> Result<String, ProcessError> {
    let mut full = vec!["run"];
    full.extend(args.iter().map(String::as_str));
    runner.run(project, &full, None)
}

/// `poetry lock [--no-update]`
pub fn lock(runner: &dyn Runner, project: &Path, no_update: bool) -> Result<String, ProcessError> {
    if no_update {
        runner.run(project, &["lock", "--no-update"], None)
    } else {
        runner.run(project, &["lock"], None)
    }
}

/// `poetry update`
pub fn update(runner: &dyn Runner, project: &Path) -> Result<String, ProcessError> {
    runner.run(project, &["update"], None)
}

/// `poetry init -n`
pub fn init(runner: &dyn Runner, project: &Path) -> Result<String, ProcessError> {
    runner.run(project, &["init", "-n"], None)
}

/// `poetry env use <python>`
pub fn env_use(runner: &dyn Runner, project: &Path, python: &str) -> Result<String, ProcessError> {
    runner.run(project, &["env", "use", python], None)
}

/// `poetry env info -p`: the project's virtualenv.
pub fn env_info_path(runner: &dyn Runner, project: &Path) -> Result<PathBuf, ProcessError> {
    let output = runner.run(project, &["env", "info", "-p"], None)?;
    Ok(PathBuf::from(output.trim()))
}

/// `poetry show --outdated`, parsed.
pub fn show_outdated(
    runner: &dyn Runner,
    project: &Path,
) -> Result<BTreeMap<String, OutdatedEntry>, ProcessError> {
    let output = runner.run(project, &["show", "--outdated"], None)?;
    Ok(parse_outdated(&output))
}

/// `poetry env list --full-path` (best effort).
pub fn env_list(runner: &dyn Runner, project: &Path) -> Vec<EnvEntry> {
    env::parse_env_list(&runner.run_or_default(project, &["env", "list", "--full-path"], ""))
}

/// `poetry config virtualenvs.in-project` (best effort).
pub fn in_project(runner: &dyn Runner, project: &Path) -> Option<bool> {
    env::parse_in_project(&runner.run_or_default(
        project,
        &["config", "virtualenvs.in-project"],
        "null",
    ))
}

/// `poetry --version` (best effort).
pub fn version(runner: &dyn Runner, project: &Path) -> Option<Version> {
    env::parse_poetry_version(&runner.run_or_default(project, &["--version"], ""))
}

/// Create or select the project's environment and return its path.
///
/// Runs `init -n` when the project has no Poetry manifest. Then either
/// installs (after `env use` when a python is given), selects the python,
/// or lets `run python -V` create the default environment.
pub fn setup_environment(
    runner: &dyn Runner,
    project: &Path,
    python: Option<&str>,
    install_packages: bool,
) -> Result<PathBuf, ProcessError> {
    let manifest = project.join(PY_PROJECT_TOML);
    let has_manifest = std::fs::read(&manifest)
        .map(|bytes| is_poetry_manifest(&bytes))
        .unwrap_or(false);

    if !has_manifest {
        tracing::info!("initializing poetry project in {}", project.display());
        init(runner, project)?;
    }

    match (install_packages, python) {
        (true, python) => {
            if let Some(python) = python {
                env_use(runner, project, python)?;
            }
            install(runner, project, &InstallOptions::default())?;
        }
        (false, Some(python)) => {
            env_use(runner, project, python)?;
        }
        (false, None) => {
            runner.run(project, &["run", "python", "-V"], None)?;
        }
    }

    env_info_path(runner, project)
}

/// Freshness of poetry.lock relative to pyproject.toml.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    NotFound,
    OutOfDate,
    UpToDate,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::NotFound => "not-found",
            LockStatus::OutOfDate => "out-of-date",
            LockStatus::UpToDate => "up-to-date",
        }
    }
}

/// Compare the manifest and lockfile modification stamps.
pub fn lock_status(project: &Path) -> LockStatus {
    let Ok(lock) = ModificationStamp::of(&project.join(POETRY_LOCK)) else {
        return LockStatus::NotFound;
    };
    let manifest = ModificationStamp::of(&project.join(PY_PROJECT_TOML))
        .unwrap_or_else(|_| ModificationStamp::missing());

    if manifest.modified().is_some() && manifest.is_newer_than(&lock) {
        LockStatus::OutOfDate
    } else {
        LockStatus::UpToDate
    }
}

/// Diagnostic for a missing or stale lockfile.
pub fn lock_diagnostic(status: LockStatus, project: &Path) -> Option<Diagnostic> {
    let location = project.join(POETRY_LOCK);
    match status {
        LockStatus::UpToDate => None,
        LockStatus::NotFound => Some(
            Diagnostic::warning(format!("{} is not found", POETRY_LOCK))
                .with_location(location)
                .with_suggestion(suggestions::RUN_LOCK),
        ),
        LockStatus::OutOfDate => Some(
            Diagnostic::warning(format!("{} is out of date", POETRY_LOCK))
                .with_location(location)
                .with_suggestion(suggestions::RUN_LOCK_NO_UPDATE)
                .with_suggestion(suggestions::RUN_UPDATE),
        ),
    }
}

/// Error resolving a `[tool.poetry.scripts]` entry.
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("script `{name}` is not declared in [tool.poetry.scripts]")]
    NotDeclared { name: String, available: Vec<String> },

    #[error("cannot find script file `{}`", path.display())]
    NotInstalled { path: PathBuf },
}

impl ScriptError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ScriptError::NotDeclared { name, available } => {
                let mut diag = Diagnostic::error(format!("script `{}` is not declared", name));
                if !available.is_empty() {
                    diag = diag.with_context(format!("declared scripts: {}", available.join(", ")));
                }
                diag
            }
            ScriptError::NotInstalled { path } => {
                Diagnostic::error(format!("cannot find script file `{}`", path.display()))
                    .with_suggestion("Run `poetry install` before executing scripts")
            }
        }
    }
}

/// Resolve a declared script to its file inside the environment.
pub fn resolve_script(
    manifest: &PoetryManifest,
    env_path: &Path,
    name: &str,
) -> Result<PathBuf, ScriptError> {
    let available = manifest.script_names();
    if !available.contains(&name) {
        return Err(ScriptError::NotDeclared {
            name: name.to_string(),
            available: available.iter().map(|s| s.to_string()).collect(),
        });
    }

    let path = env::script_path(env_path, name);
    if !path.is_file() {
        return Err(ScriptError::NotInstalled { path });
    }
    Ok(path)
}
