//! Package - a concrete installed or resolvable distribution.
//!
//! Packages are produced by the output parsers, the lockfile parser and the
//! local metadata scan. They are immutable once constructed.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error constructing a package from untrusted input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PackageError {
    #[error("package name must not be empty")]
    EmptyName,

    #[error("version of `{0}` must not be empty")]
    EmptyVersion(String),
}

/// A distribution name normalized per PEP 503.
///
/// Comparison is case-insensitive and treats runs of `-`, `_` and `.` as a
/// single `-`, so `Foo_Bar`, `foo.bar` and `foo--bar` are the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageName(String);

impl PackageName {
    /// Normalize a raw distribution name.
    pub fn new(raw: &str) -> Self {
        let mut normalized = String::with_capacity(raw.len());
        let mut pending_separator = false;

        for c in raw.trim().chars() {
            if matches!(c, '-' | '_' | '.') {
                pending_separator = true;
                continue;
            }
            if pending_separator && !normalized.is_empty() {
                normalized.push('-');
            }
            pending_separator = false;
            normalized.extend(c.to_lowercase());
        }

        PackageName(normalized)
    }

    /// Get the normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the normalized name is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PackageName {
    fn from(raw: &str) -> Self {
        PackageName::new(raw)
    }
}

/// A concrete package: name, version and optional source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Package {
    /// Name as written by the producer (not normalized)
    name: String,

    /// Version token
    version: String,

    /// Source location (index URL, VCS URL or path), if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<String>,
}

impl Package {
    /// Create a new package, rejecting empty names and versions.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Result<Self, PackageError> {
        let name = name.into().trim().to_string();
        let version = version.into().trim().to_string();

        if name.is_empty() {
            return Err(PackageError::EmptyName);
        }
        if version.is_empty() {
            return Err(PackageError::EmptyVersion(name));
        }

        Ok(Package {
            name,
            version,
            source: None,
        })
    }

    /// Attach a source location.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Get the package name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the normalized package name.
    pub fn normalized_name(&self) -> PackageName {
        PackageName::new(&self.name)
    }

    /// Get the version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the source location.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Check whether two packages denote the same distribution.
    pub fn same_identity(&self, other: &Package) -> bool {
        self.normalized_name() == other.normalized_name()
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}
