//! Requirement - a named dependency constraint.
//!
//! Requirements come from the manifest, the lockfile and the
//! `Installing` lines of `poetry install --dry-run`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::package::{Package, PackageError, PackageName};
use crate::core::version::Constraint;

/// A declared dependency: name plus optional constraint, extras and markers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requirement {
    /// Name as written
    name: String,

    /// Version constraint (`==1.2.3`, `^1.0`, `>=1,<2`, or a raw VCS/path string)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    version_constraint: Option<String>,

    /// Requested extras
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    extras: BTreeSet<String>,

    /// Environment markers, kept verbatim
    #[serde(default, skip_serializing_if = "Option::is_none")]
    markers: Option<String>,
}

impl Requirement {
    /// Create a requirement with no constraint.
    pub fn new(name: impl Into<String>) -> Result<Self, PackageError> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(PackageError::EmptyName);
        }
        Ok(Requirement {
            name,
            version_constraint: None,
            extras: BTreeSet::new(),
            markers: None,
        })
    }

    /// Create a requirement from a name and a resolved version.
    ///
    /// Versions starting with a digit become exact pins (`==1.2.3`); anything
    /// else (already-constrained, VCS or path references) is kept as-is.
    pub fn pinned(name: impl Into<String>, version: &str) -> Result<Self, PackageError> {
        let req = Requirement::new(name)?;
        let version = version.trim();
        if version.is_empty() {
            return Ok(req);
        }
        Ok(req.with_constraint(pin_version(version)))
    }

    /// Parse a requirement line: `name[extra1,extra2] constraint ; markers`.
    pub fn parse(line: &str) -> Result<Self, PackageError> {
        let (spec, markers) = match line.split_once(';') {
            Some((spec, markers)) => (spec.trim(), Some(markers.trim().to_string())),
            None => (line.trim(), None),
        };

        let name_end = spec
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '-' | '_' | '.')))
            .unwrap_or(spec.len());
        let mut req = Requirement::new(&spec[..name_end])?;
        let mut rest = spec[name_end..].trim_start();

        if let Some(after_bracket) = rest.strip_prefix('[') {
            let (extras, tail) = after_bracket.split_once(']').unwrap_or((after_bracket, ""));
            req.extras = extras
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            rest = tail.trim_start();
        }

        let rest = rest.trim_start_matches('@').trim();
        if !rest.is_empty() {
            req.version_constraint = Some(rest.to_string());
        }
        req.markers = markers.filter(|m| !m.is_empty());

        Ok(req)
    }

    /// Set the version constraint.
    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        let constraint = constraint.into();
        self.version_constraint = if constraint.trim().is_empty() {
            None
        } else {
            Some(constraint.trim().to_string())
        };
        self
    }

    /// Add extras.
    pub fn with_extras<I, S>(mut self, extras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extras.extend(extras.into_iter().map(Into::into));
        self
    }

    /// Set environment markers.
    pub fn with_markers(mut self, markers: impl Into<String>) -> Self {
        self.markers = Some(markers.into());
        self
    }

    /// Get the name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the normalized name.
    pub fn normalized_name(&self) -> PackageName {
        PackageName::new(&self.name)
    }

    /// Get the version constraint.
    pub fn version_constraint(&self) -> Option<&str> {
        self.version_constraint.as_deref()
    }

    /// Get the requested extras.
    pub fn extras(&self) -> &BTreeSet<String> {
        &self.extras
    }

    /// Get the environment markers.
    pub fn markers(&self) -> Option<&str> {
        self.markers.as_deref()
    }

    /// Check whether a package satisfies this requirement.
    ///
    /// Names must be equal after normalization. A constraint that cannot be
    /// interpreted as a version range (VCS URL, path) is satisfied by name.
    pub fn matches(&self, package: &Package) -> bool {
        if self.normalized_name() != package.normalized_name() {
            return false;
        }

        let Some(raw) = self.version_constraint.as_deref() else {
            return true;
        };

        match Constraint::parse(raw) {
            Ok(constraint) => constraint.contains_str(package.version()),
            Err(e) => {
                tracing::debug!(
                    "treating `{}` as satisfied by name only: {}",
                    self,
                    e
                );
                true
            }
        }
    }

    /// Find the first package satisfying this requirement.
    pub fn match_in<'a>(&self, packages: &'a [Package]) -> Option<&'a Package> {
        packages.iter().find(|pkg| self.matches(pkg))
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            let extras: Vec<&str> = self.extras.iter().map(String::as_str).collect();
            write!(f, "[{}]", extras.join(","))?;
        }
        if let Some(ref constraint) = self.version_constraint {
            f.write_str(constraint)?;
        }
        if let Some(ref markers) = self.markers {
            write!(f, "; {}", markers)?;
        }
        Ok(())
    }
}

impl FromStr for Requirement {
    type Err = PackageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Requirement::parse(s)
    }
}

/// Turn a resolved version into a constraint: digits become `==version`.
pub fn pin_version(version: &str) -> String {
    if version.starts_with(|c: char| c.is_ascii_digit()) {
        format!("=={}", version)
    } else {
        version.to_string()
    }
}

/// Format a list of requirements for display: `foo>=1.0, bar`.
pub fn requirements_to_string(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
