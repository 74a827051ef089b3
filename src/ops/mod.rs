//! Operations over poetry and its output.
//!
//! Parsers for the human-oriented CLI output live beside the typed command
//! wrappers that produce it.

pub mod drift;
pub mod dry_run;
pub mod env;
pub mod environment;
pub mod outdated;
pub mod package_manager;
pub mod poetry;

pub use drift::{collect_local_packages, drift_diagnostic, find_unsatisfied, DriftPolicy, IgnoreList};
pub use dry_run::{parse_dry_run, DryRunReport};
pub use env::{parse_env_list, parse_in_project, parse_poetry_version, EnvEntry};
pub use environment::{is_poetry_environment, EnvironmentCache};
pub use outdated::{parse_outdated, OutdatedEntry};
pub use package_manager::{PackageManager, PackageManagerRegistry, PackagesListener};
pub use poetry::{lock_status, setup_environment, InstallOptions, LockStatus};
