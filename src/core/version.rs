//! Version constraint handling.
//!
//! Poetry accepts its own constraint dialect on top of PEP 440: caret and
//! tilde ranges, bare versions, wildcard versions, space separated
//! conjunctions and `||` alternatives. Everything is lowered to
//! `pep440_rs::VersionSpecifiers` so satisfaction checks follow PEP 440
//! ordering.

use std::fmt;
use std::str::FromStr;

use pep440_rs::{Version, VersionSpecifiers};
use thiserror::Error;

/// Error parsing a version constraint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstraintError {
    #[error("invalid version `{version}` in constraint `{constraint}`")]
    InvalidVersion { constraint: String, version: String },

    #[error("invalid constraint `{constraint}`: {message}")]
    InvalidSpecifier { constraint: String, message: String },
}

/// A parsed constraint: any alternative satisfying means the constraint holds.
///
/// An alternative of `None` places no restriction on the version.
#[derive(Debug, Clone)]
pub struct Constraint {
    raw: String,
    alternatives: Vec<Option<VersionSpecifiers>>,
}

impl Constraint {
    /// Parse a Poetry or PEP 440 constraint string.
    pub fn parse(raw: &str) -> Result<Self, ConstraintError> {
        let trimmed = raw.trim();
        let mut alternatives = Vec::new();

        for alternative in trimmed.split("||").flat_map(|s| s.split('|')) {
            let mut specifiers = Vec::new();
            for term in split_terms(alternative) {
                if let Some(lowered) = lower_term(trimmed, &term)? {
                    specifiers.push(lowered);
                }
            }

            if specifiers.is_empty() {
                alternatives.push(None);
                continue;
            }

            let joined = specifiers.join(", ");
            let parsed = VersionSpecifiers::from_str(&joined).map_err(|e| {
                ConstraintError::InvalidSpecifier {
                    constraint: trimmed.to_string(),
                    message: e.to_string(),
                }
            })?;
            alternatives.push(Some(parsed));
        }

        Ok(Constraint {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    /// Check if a version satisfies this constraint.
    pub fn contains(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|alternative| match alternative {
            Some(specs) => specs.contains(version),
            None => true,
        })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Unparseable versions only satisfy an exact pin with the same text.
    pub fn contains_str(&self, version: &str) -> bool {
        match parse_version_lenient(version) {
            Some(v) => self.contains(&v),
            None => {
                let pinned = self.raw.trim_start_matches("==").trim();
                pinned == version.trim()
            }
        }
    }

    /// Get the constraint as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for Constraint {
    type Err = ConstraintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Constraint::parse(s)
    }
}

/// Split one alternative into terms, joining detached operators
/// (`>= 1.2`) with their operand.
fn split_terms(alternative: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    let mut pending_op: Option<String> = None;

    for token in alternative
        .split(',')
        .flat_map(|piece| piece.split_whitespace())
    {
        if token.chars().all(|c| "<>=!~^".contains(c)) {
            pending_op = Some(pending_op.unwrap_or_default() + token);
            continue;
        }
        match pending_op.take() {
            Some(op) => terms.push(format!("{}{}", op, token)),
            None => terms.push(token.to_string()),
        }
    }

    terms
}

/// Lower a single Poetry term to a PEP 440 specifier string.
///
/// Returns `None` for terms that place no restriction (`*`).
fn lower_term(constraint: &str, term: &str) -> Result<Option<String>, ConstraintError> {
    let term = term.trim();
    if term.is_empty() || term == "*" {
        return Ok(None);
    }

    for op in ["===", "==", "!=", "~=", ">=", "<=", ">", "<"] {
        if term.starts_with(op) {
            return Ok(Some(term.to_string()));
        }
    }

    if let Some(rest) = term.strip_prefix('^') {
        let (lower, release) = release_of(constraint, rest)?;
        let upper = caret_upper(&release).ok_or_else(|| overflow(constraint, rest))?;
        return Ok(Some(format!(">={}, <{}", lower, upper)));
    }

    if let Some(rest) = term.strip_prefix('~') {
        let (lower, release) = release_of(constraint, rest)?;
        let upper = tilde_upper(&release).ok_or_else(|| overflow(constraint, rest))?;
        return Ok(Some(format!(">={}, <{}", lower, upper)));
    }

    if let Some(rest) = term.strip_prefix('=') {
        return Ok(Some(format!("=={}", rest.trim())));
    }

    // Bare versions and wildcards are exact matches in Poetry.
    Ok(Some(format!("=={}", term)))
}

/// Parse the operand of a caret or tilde term.
fn release_of(constraint: &str, operand: &str) -> Result<(Version, Vec<u64>), ConstraintError> {
    let operand = operand.trim().trim_end_matches(".*");
    let version =
        Version::from_str(operand).map_err(|_| ConstraintError::InvalidVersion {
            constraint: constraint.to_string(),
            version: operand.to_string(),
        })?;
    let release = version.release().to_vec();
    Ok((version, release))
}

fn overflow(constraint: &str, operand: &str) -> ConstraintError {
    ConstraintError::InvalidVersion {
        constraint: constraint.to_string(),
        version: operand.trim().to_string(),
    }
}

/// Upper bound for `^x.y.z`: bump the left-most non-zero component.
///
/// `^1.2.3` means `<2.0.0`, `^0.2.3` means `<0.3.0`, `^0.0.3` means `<0.0.4`.
/// With fewer components the last given one is bumped: `^0.0` means `<0.1`,
/// `^0` means `<1`.
fn caret_upper(release: &[u64]) -> Option<String> {
    let position = release
        .iter()
        .position(|&part| part != 0)
        .unwrap_or(release.len().saturating_sub(1));
    bump(release, position)
}

/// Upper bound for `~x.y.z`: `~1.2.3` means `<1.3.0`, `~1` means `<2`.
fn tilde_upper(release: &[u64]) -> Option<String> {
    let position = if release.len() > 1 { 1 } else { 0 };
    bump(release, position)
}

/// `None` when the bumped component overflows.
fn bump(release: &[u64], position: usize) -> Option<String> {
    let mut parts: Vec<u64> = release.iter().take(position + 1).copied().collect();
    if parts.is_empty() {
        parts.push(0);
    }
    if let Some(last) = parts.last_mut() {
        *last = last.checked_add(1)?;
    }
    Some(
        parts
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join("."),
    )
}

/// Parse a version string, tolerating a leading `v` and surrounding parentheses.
pub fn parse_version_lenient(s: &str) -> Option<Version> {
    let cleaned = s
        .trim()
        .trim_matches(|c| c == '(' || c == ')')
        .trim_start_matches('v');
    Version::from_str(cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::from_str(s).unwrap()
    }

    #[test]
    fn test_caret_range() {
        let c = Constraint::parse("^1.2.3").unwrap();

        assert!(c.contains(&v("1.2.3")));
        assert!(c.contains(&v("1.9.0")));
        assert!(!c.contains(&v("2.0.0")));
        assert!(!c.contains(&v("1.2.2")));
    }

    #[test]
    fn test_bound_overflow_is_an_error() {
        for constraint in ["^18446744073709551615", "~1.18446744073709551615"] {
            assert!(matches!(
                Constraint::parse(constraint),
                Err(ConstraintError::InvalidVersion { .. })
            ));
        }
    }

    #[test]
    fn test_caret_range_zero_major() {
        let c = Constraint::parse("^0.2.3").unwrap();
        assert!(c.contains(&v("0.2.9")));
        assert!(!c.contains(&v("0.3.0")));

        let c = Constraint::parse("^0.0.3").unwrap();
        assert!(c.contains(&v("0.0.3")));
        assert!(!c.contains(&v("0.0.4")));
    }

    #[test]
    fn test_tilde_range() {
        let c = Constraint::parse("~1.2.3").unwrap();
        assert!(c.contains(&v("1.2.9")));
        assert!(!c.contains(&v("1.3.0")));

        let c = Constraint::parse("~1").unwrap();
        assert!(c.contains(&v("1.9")));
        assert!(!c.contains(&v("2.0")));
    }

    #[test]
    fn test_compatible_release_passes_through() {
        let c = Constraint::parse("~=1.4").unwrap();
        assert!(c.contains(&v("1.9")));
        assert!(!c.contains(&v("2.0")));
    }

    #[test]
    fn test_bare_and_wildcard_versions_are_exact() {
        let c = Constraint::parse("1.2.3").unwrap();
        assert!(c.contains(&v("1.2.3")));
        assert!(!c.contains(&v("1.2.4")));

        let c = Constraint::parse("1.2.*").unwrap();
        assert!(c.contains(&v("1.2.7")));
        assert!(!c.contains(&v("1.3.0")));
    }

    #[test]
    fn test_conjunctions_with_commas_and_spaces() {
        for raw in [">=1.0,<2.0", ">=1.0 <2.0", ">= 1.0, < 2.0"] {
            let c = Constraint::parse(raw).unwrap();
            assert!(c.contains(&v("1.5")), "{raw}");
            assert!(!c.contains(&v("2.0")), "{raw}");
            assert!(!c.contains(&v("0.9")), "{raw}");
        }
    }

    #[test]
    fn test_alternatives() {
        let c = Constraint::parse("^1.0 || ^3.0").unwrap();
        assert!(c.contains(&v("1.4")));
        assert!(c.contains(&v("3.1")));
        assert!(!c.contains(&v("2.0")));
    }

    #[test]
    fn test_star_matches_anything() {
        let c = Constraint::parse("*").unwrap();
        assert!(c.contains(&v("0.0.1")));
        assert!(c.contains(&v("99.0")));
    }

    #[test]
    fn test_invalid_constraint() {
        assert!(Constraint::parse("^banana").is_err());
        assert!(Constraint::parse("git+https://example.com/repo.git").is_err());
    }

    #[test]
    fn test_contains_str_with_unparseable_version() {
        let c = Constraint::parse(">=1.0").unwrap();
        assert!(c.contains_str("1.5"));
        assert!(!c.contains_str("not-a-version"));
    }

    #[test]
    fn test_parse_version_lenient() {
        assert_eq!(parse_version_lenient("(1.2.3)"), Some(v("1.2.3")));
        assert_eq!(parse_version_lenient("v2.0"), Some(v("2.0")));
        assert_eq!(parse_version_lenient("garbage"), None);
    }
}
