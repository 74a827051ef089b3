//! Drift detection: declared requirements that the environment does not
//! satisfy.
//!
//! Installed packages come from the package manager's last refresh. Package
//! metadata directories (`*.egg-info`, `*.dist-info`) found under the
//! project's source roots count as secondary evidence for packages
//! installed outside the tracked environment.
//!
//! Requirements guarded by environment markers are not checked: there is no
//! marker environment to evaluate them against, and a dependency declared
//! as marker-split alternatives always leaves all but one branch unmatched.
//! Marker-bearing lock entries are excluded the same way.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::lockfile::LockFile;
use crate::core::package::{Package, PackageName};
use crate::core::requirement::{requirements_to_string, Requirement};
use crate::util::diagnostic::{suggestions, Diagnostic, Severity};

const METADATA_EXTENSIONS: [&str; 2] = ["egg-info", "dist-info"];

/// Decides which unsatisfied requirements are reported, and how loudly.
pub trait DriftPolicy: Send + Sync {
    /// Return true to never report this requirement.
    fn is_ignored(&self, requirement: &Requirement) -> bool;

    /// Severity of the drift diagnostic.
    fn severity(&self) -> Severity {
        Severity::Warning
    }
}

/// Ignore requirements by name, compared after normalization.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    names: HashSet<PackageName>,
    severity: Option<Severity>,
}

impl IgnoreList {
    /// Build from raw names.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        IgnoreList {
            names: names.into_iter().map(|n| PackageName::new(n.as_ref())).collect(),
            severity: None,
        }
    }

    /// Override the reported severity.
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Check whether nothing is ignored.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl DriftPolicy for IgnoreList {
    fn is_ignored(&self, requirement: &Requirement) -> bool {
        self.names.contains(&requirement.normalized_name())
    }

    fn severity(&self) -> Severity {
        self.severity.unwrap_or(Severity::Warning)
    }
}

/// Requirements matched by neither the installed nor the local packages.
///
/// Requirements carrying markers are skipped. Output order follows
/// `requirements`.
pub fn find_unsatisfied(
    requirements: &[Requirement],
    installed: &[Package],
    local: &[Package],
    ignored: &HashSet<String>,
) -> Vec<Requirement> {
    find_unsatisfied_with(requirements, installed, local, &IgnoreList::new(ignored))
}

/// [`find_unsatisfied`] with a custom policy.
pub fn find_unsatisfied_with(
    requirements: &[Requirement],
    installed: &[Package],
    local: &[Package],
    policy: &dyn DriftPolicy,
) -> Vec<Requirement> {
    requirements
        .iter()
        .filter(|req| match req.markers() {
            Some(markers) => {
                tracing::debug!("not checking {} (markers: {})", req.name(), markers);
                false
            }
            None => true,
        })
        .filter(|req| !policy.is_ignored(req))
        .filter(|req| req.match_in(installed).is_none() && req.match_in(local).is_none())
        .cloned()
        .collect()
}

/// Locked packages a dry-run install would leave alone.
///
/// Newer Poetry releases omit "Already installed" lines from dry-run output,
/// so anything locked and not pending installation counts as installed.
pub fn installed_from_lock(lock: &LockFile, pending: &[Requirement]) -> Vec<Package> {
    let pending: HashSet<PackageName> = pending.iter().map(Requirement::normalized_name).collect();
    lock.to_packages()
        .into_iter()
        .filter(|pkg| !pending.contains(&pkg.normalized_name()))
        .collect()
}

/// Scan source roots for package metadata directories.
///
/// `foo_bar-1.0.dist-info` and `foo-1.0-py3.8.egg-info` both yield a package
/// from the first two dash-separated fields of the stem.
pub fn collect_local_packages(roots: &[PathBuf]) -> Vec<Package> {
    let mut packages = Vec::new();

    for root in roots {
        for extension in METADATA_EXTENSIONS {
            let pattern = format!(
                "{}/*.{}",
                glob::Pattern::escape(&root.to_string_lossy()),
                extension
            );
            let entries = match glob::glob(&pattern) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!("bad metadata pattern {}: {}", pattern, e);
                    continue;
                }
            };

            for path in entries.flatten() {
                if let Some(package) = package_from_metadata(&path) {
                    packages.push(package);
                }
            }
        }
    }

    packages
}

fn package_from_metadata(path: &Path) -> Option<Package> {
    let stem = path.file_stem()?.to_str()?;
    let mut fields = stem.splitn(3, '-');
    let name = fields.next()?;
    let version = fields.next()?;
    Package::new(name, version).ok()
}

/// Render the unsatisfied-requirements diagnostic, if there is anything to report.
pub fn drift_diagnostic(unsatisfied: &[Requirement], policy: &dyn DriftPolicy) -> Option<Diagnostic> {
    if unsatisfied.is_empty() {
        return None;
    }

    let plural = unsatisfied.len() > 1;
    let message = format!(
        "Package requirement{} {} {} not satisfied",
        if plural { "s" } else { "" },
        requirements_to_string(unsatisfied),
        if plural { "are" } else { "is" }
    );

    Some(Diagnostic::new(policy.severity(), message).with_suggestion(suggestions::RUN_INSTALL))
}
