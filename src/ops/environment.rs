//! Memoized "is this interpreter the project's Poetry environment" checks.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::ops::poetry;
use crate::util::fs::normalize_path;
use crate::util::process::Runner;

/// Validity results keyed by project path and interpreter path.
///
/// A result is only stored when both paths are known.
#[derive(Debug, Default)]
pub struct EnvironmentCache {
    entries: Mutex<HashMap<String, bool>>,
}

impl EnvironmentCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        EnvironmentCache::default()
    }

    fn key(project: Option<&Path>, interpreter: Option<&Path>) -> Option<String> {
        Some(format!("{}{}", project?.display(), interpreter?.display()))
    }

    /// Cached verdict, if any.
    pub fn get(&self, project: Option<&Path>, interpreter: Option<&Path>) -> Option<bool> {
        let key = Self::key(project, interpreter)?;
        self.entries.lock().ok()?.get(&key).copied()
    }

    /// Store a verdict. Returns false (and stores nothing) when a path is missing.
    pub fn insert(&self, project: Option<&Path>, interpreter: Option<&Path>, value: bool) -> bool {
        let Some(key) = Self::key(project, interpreter) else {
            return false;
        };
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.insert(key, value);
                true
            }
            Err(_) => false,
        }
    }

    /// Drop every entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of cached verdicts.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Check whether `interpreter` lives inside the environment poetry reports
/// for `project` (`poetry env info -p`).
///
/// The poetry query is bounded by the runner's query timeout. A failed or
/// timed-out query answers "not a Poetry environment" without caching, so
/// the next call asks poetry again.
pub fn is_poetry_environment(
    runner: &dyn Runner,
    cache: &EnvironmentCache,
    project: Option<&Path>,
    interpreter: Option<&Path>,
) -> bool {
    let (Some(project_path), Some(interpreter_path)) = (project, interpreter) else {
        return false;
    };

    if let Some(cached) = cache.get(project, interpreter) {
        tracing::debug!("environment cache hit for {}", interpreter_path.display());
        return cached;
    }

    let env = match runner.run(
        project_path,
        &["env", "info", "-p"],
        Some(runner.query_timeout()),
    ) {
        Ok(env) => env,
        Err(e) => {
            tracing::debug!("could not query the environment of {}: {}", project_path.display(), e);
            return false;
        }
    };
    let env = env.trim();
    let verdict = !env.is_empty()
        && normalize_path(interpreter_path).starts_with(normalize_path(Path::new(env)));

    cache.insert(project, interpreter, verdict);
    verdict
}

/// Interpreter path of the project's Poetry environment, if poetry reports one.
pub fn poetry_interpreter(runner: &dyn Runner, project: &Path) -> Option<std::path::PathBuf> {
    let env = runner.run_or_default(project, &["env", "info", "-p"], "");
    let env = env.trim();
    if env.is_empty() {
        None
    } else {
        Some(crate::ops::env::env_python(Path::new(env)))
    }
}
