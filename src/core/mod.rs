//! Core data structures for Stanza.
//!
//! This module contains the foundational types used throughout Stanza:
//! - Packages and normalized names
//! - Requirements and version constraints
//! - The pyproject.toml manifest model
//! - poetry.lock snapshots

pub mod lockfile;
pub mod manifest;
pub mod package;
pub mod requirement;
pub mod version;

pub use lockfile::{LockCache, LockFile, LockFormat, LockOutcome, LockedPackage};
pub use manifest::{ManifestCache, PoetryManifest, PY_PROJECT_TOML};
pub use package::{Package, PackageName};
pub use requirement::Requirement;
pub use version::Constraint;
