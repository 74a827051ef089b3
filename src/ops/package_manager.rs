//! Per-environment package state.
//!
//! A [`PackageManager`] remembers what the last `poetry install --dry-run`
//! reported for one environment: the packages already installed and the
//! requirements an install would still bring in. Mutating actions refresh
//! that state afterwards.
//!
//! At most one refresh runs per manager. A refresh requested while another
//! is in flight marks the manager pending and returns the current snapshot;
//! the running refresh then repeats once so the latest request is observed.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::core::package::Package;
use crate::core::requirement::Requirement;
use crate::ops::poetry::{self, InstallOptions};
use crate::util::process::{ProcessError, Runner};

/// Observer notified after a refresh updates a manager's state.
pub trait PackagesListener: Send + Sync {
    fn packages_refreshed(&self, manager: &PackageManager);
}

#[derive(Debug, Default)]
struct PackageState {
    /// `None` until the first refresh
    packages: Option<Vec<Package>>,
    requirements: Vec<Requirement>,
}

/// Package state and actions for one environment.
pub struct PackageManager {
    key: String,
    project: PathBuf,
    runner: Arc<dyn Runner>,
    state: RwLock<PackageState>,
    refreshing: AtomicBool,
    pending: AtomicBool,
    suppress_notification: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn PackagesListener>>>,
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("key", &self.key)
            .field("project", &self.project)
            .finish_non_exhaustive()
    }
}

impl PackageManager {
    /// Create a manager for the project at `project`.
    pub fn new(key: impl Into<String>, project: impl Into<PathBuf>, runner: Arc<dyn Runner>) -> Self {
        PackageManager {
            key: key.into(),
            project: project.into(),
            runner,
            state: RwLock::new(PackageState::default()),
            refreshing: AtomicBool::new(false),
            pending: AtomicBool::new(false),
            suppress_notification: AtomicBool::new(false),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Environment key this manager belongs to.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Project directory poetry runs in.
    pub fn project(&self) -> &Path {
        &self.project
    }

    /// Register a listener.
    pub fn add_listener(&self, listener: Arc<dyn PackagesListener>) {
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push(listener);
        }
    }

    /// Installed packages from the last refresh (empty before the first).
    pub fn packages(&self) -> Vec<Package> {
        self.state
            .read()
            .ok()
            .and_then(|s| s.packages.clone())
            .unwrap_or_default()
    }

    /// Requirements the last refresh reported as still to install.
    pub fn requirements(&self) -> Vec<Requirement> {
        self.state
            .read()
            .map(|s| s.requirements.clone())
            .unwrap_or_default()
    }

    /// Check whether a refresh has completed at least once.
    pub fn has_packages(&self) -> bool {
        self.state.read().is_ok_and(|s| s.packages.is_some())
    }

    /// Skip the listener notification of the next refresh only.
    pub fn suppress_next_notification(&self) {
        self.suppress_notification.store(true, Ordering::SeqCst);
    }

    /// Refresh without notifying listeners.
    pub fn refresh_quietly(&self) -> Result<Vec<Package>, ProcessError> {
        self.suppress_next_notification();
        self.refresh_and_get_packages(true)
    }

    /// Return installed packages, refreshing when `always` is set or nothing
    /// is cached yet.
    ///
    /// A failed refresh leaves the package list empty and returns the error.
    pub fn refresh_and_get_packages(&self, always: bool) -> Result<Vec<Package>, ProcessError> {
        if !always && self.has_packages() {
            return Ok(self.packages());
        }

        if self.refreshing.swap(true, Ordering::SeqCst) {
            tracing::debug!("refresh already running for {}, coalescing", self.key);
            self.pending.store(true, Ordering::SeqCst);
            return Ok(self.packages());
        }

        loop {
            self.pending.store(false, Ordering::SeqCst);
            let result = self.refresh_once();

            if self.pending.load(Ordering::SeqCst) {
                continue;
            }
            self.refreshing.store(false, Ordering::SeqCst);

            // A request may have landed between the check and the release.
            if self.pending.load(Ordering::SeqCst) && !self.refreshing.swap(true, Ordering::SeqCst) {
                continue;
            }
            return result;
        }
    }

    fn refresh_once(&self) -> Result<Vec<Package>, ProcessError> {
        tracing::debug!("refreshing packages for {}", self.key);
        let result = poetry::install_dry_run(self.runner.as_ref(), &self.project);

        let outcome = match result {
            Ok(report) => {
                let (installed, to_install) = report.into_parts();
                self.store(installed.clone(), to_install);
                Ok(installed)
            }
            Err(e) => {
                if !e.is_cancelled() {
                    tracing::warn!("failed to refresh packages for {}: {}", self.key, e);
                }
                self.store(Vec::new(), Vec::new());
                Err(e)
            }
        };

        if self.suppress_notification.swap(false, Ordering::SeqCst) {
            tracing::debug!("notification suppressed for {}", self.key);
        } else {
            self.notify();
        }
        outcome
    }

    fn store(&self, packages: Vec<Package>, requirements: Vec<Requirement>) {
        if let Ok(mut state) = self.state.write() {
            state.packages = Some(packages);
            state.requirements = requirements;
        }
    }

    fn notify(&self) {
        let listeners = match self.listeners.read() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in listeners {
            listener.packages_refreshed(self);
        }
    }

    /// `poetry install`, then refresh.
    pub fn install(&self, opts: &InstallOptions) -> Result<String, ProcessError> {
        self.then_refresh(poetry::install(self.runner.as_ref(), &self.project, opts))
    }

    /// `poetry install --extras <extra>`, then refresh.
    pub fn install_extras(&self, extra: &str) -> Result<String, ProcessError> {
        self.then_refresh(poetry::install_extras(self.runner.as_ref(), &self.project, extra))
    }

    /// `poetry add`, then refresh.
    pub fn add(&self, packages: &[String]) -> Result<String, ProcessError> {
        self.then_refresh(poetry::add(self.runner.as_ref(), &self.project, packages))
    }

    /// `poetry remove`, then refresh.
    pub fn remove(&self, packages: &[String]) -> Result<String, ProcessError> {
        self.then_refresh(poetry::remove(self.runner.as_ref(), &self.project, packages))
    }

    /// `poetry lock [--no-update]`, then refresh.
    pub fn lock(&self, no_update: bool) -> Result<String, ProcessError> {
        self.then_refresh(poetry::lock(self.runner.as_ref(), &self.project, no_update))
    }

    /// `poetry update`, then refresh.
    pub fn update(&self) -> Result<String, ProcessError> {
        self.then_refresh(poetry::update(self.runner.as_ref(), &self.project))
    }

    /// Refresh after an action whatever its outcome; the action's result wins.
    fn then_refresh(&self, action: Result<String, ProcessError>) -> Result<String, ProcessError> {
        if matches!(&action, Err(e) if e.is_cancelled()) {
            return action;
        }
        if let Err(e) = self.refresh_and_get_packages(true) {
            tracing::debug!("refresh after action failed: {}", e);
        }
        action
    }
}

/// One [`PackageManager`] per environment key.
#[derive(Default)]
pub struct PackageManagerRegistry {
    managers: Mutex<HashMap<String, Arc<PackageManager>>>,
}

impl PackageManagerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        PackageManagerRegistry::default()
    }

    /// Return the manager for `key`, creating it on first use.
    pub fn for_key(
        &self,
        key: &str,
        project: &Path,
        runner: Arc<dyn Runner>,
    ) -> Arc<PackageManager> {
        let mut managers = self.managers.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            managers
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(PackageManager::new(key, project, runner))),
        )
    }

    /// Drop every manager.
    pub fn clear(&self) {
        self.managers.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Number of registered managers.
    pub fn len(&self) -> usize {
        self.managers.lock().map(|m| m.len()).unwrap_or(0)
    }

    /// Check if no manager is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
