//! Stanza - a companion toolkit for Poetry projects
//!
//! This crate reads `pyproject.toml` and `poetry.lock`, drives the `poetry`
//! executable, scrapes its output into typed records, and reports
//! dependency drift between declared requirements and the environment.

pub mod core;
pub mod ops;
pub mod util;

/// Test utilities and mocks for stanza unit tests.
///
/// Only compiled for tests. Provides a scripted [`util::process::Runner`]
/// and on-disk Poetry project fixtures.
#[cfg(test)]
pub mod test_support;

pub use core::{
    lockfile::LockFile, manifest::PoetryManifest, package::Package, requirement::Requirement,
};

pub use ops::package_manager::PackageManager;
pub use util::context::GlobalContext;
