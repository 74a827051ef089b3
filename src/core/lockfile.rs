//! poetry.lock parsing.
//!
//! Two historical formats are understood:
//!
//! - the native TOML format, an array of `[[package]]` tables;
//! - the legacy JSON format with `_meta`, `default` and `develop` keys.
//!
//! Parsing is all-or-nothing. Malformed input never yields a partially
//! populated `LockFile`; it is reported as [`LockError::Malformed`], which
//! callers on passive paths treat as "no data". I/O failures other than a
//! missing file are real errors and propagate.

use std::collections::{BTreeMap, HashMap};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use thiserror::Error;

use crate::core::package::{Package, PackageName};
use crate::core::requirement::Requirement;
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::ModificationStamp;

/// Lockfile name.
pub const POETRY_LOCK: &str = "poetry.lock";

/// Index used when the lockfile names no sources.
pub const DEFAULT_SOURCE_URL: &str = "https://pypi.org/simple";

/// Error loading a lockfile.
#[derive(Debug, Error)]
pub enum LockError {
    #[error("malformed lockfile: {message}")]
    Malformed {
        message: String,
        /// Byte range of the offending input, when the parser reports one
        span: Option<Range<usize>>,
    },

    #[error("failed to read lockfile `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LockError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            LockError::Malformed { message, .. } => {
                Diagnostic::error(format!("{} could not be parsed", POETRY_LOCK))
                    .with_context(message.clone())
                    .with_suggestion(suggestions::RUN_LOCK_NO_UPDATE)
            }
            LockError::Io { path, source } => Diagnostic::error(self.to_string())
                .with_location(path.clone())
                .with_context(source.to_string()),
        }
    }
}

/// Which on-disk format to expect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockFormat {
    /// Detect from content: a leading `{` means legacy JSON
    #[default]
    Auto,
    /// `[[package]]` array of tables
    Toml,
    /// `_meta` / `default` / `develop` JSON document
    LegacyJson,
}

impl LockFormat {
    fn detect(text: &str) -> LockFormat {
        if text.trim_start().starts_with('{') {
            LockFormat::LegacyJson
        } else {
            LockFormat::Toml
        }
    }
}

/// Result of reading a lockfile.
#[derive(Debug, Clone)]
pub enum LockOutcome {
    /// No lockfile on disk
    Missing,
    /// The lockfile parsed but holds no package data
    Empty,
    /// The lockfile parsed with at least one package
    Parsed(LockFile),
}

impl LockOutcome {
    /// Collapse to the "data or nothing" view.
    pub fn into_lockfile(self) -> Option<LockFile> {
        match self {
            LockOutcome::Parsed(lock) => Some(lock),
            LockOutcome::Missing | LockOutcome::Empty => None,
        }
    }

    /// Borrow the parsed lockfile, if any.
    pub fn lockfile(&self) -> Option<&LockFile> {
        match self {
            LockOutcome::Parsed(lock) => Some(lock),
            LockOutcome::Missing | LockOutcome::Empty => None,
        }
    }
}

/// A locked package entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    pub name: String,
    /// Absent only for legacy entries such as editable path installs
    pub version: Option<String>,
    pub hashes: Vec<String>,
    pub markers: Option<String>,
    pub extras: BTreeMap<String, Vec<String>>,
    pub editable: bool,
    pub category: Option<String>,
    pub source: Option<String>,
}

impl LockedPackage {
    /// Convert to a package, if the entry carries a version.
    pub fn to_package(&self) -> Option<Package> {
        let version = self.version.as_deref()?;
        let package = Package::new(self.name.as_str(), version).ok()?;
        Some(match self.source {
            Some(ref source) => package.with_source(source.as_str()),
            None => package,
        })
    }

    fn to_requirement(&self) -> Option<Requirement> {
        match self.version.as_deref() {
            Some(version) => Requirement::pinned(self.name.as_str(), version).ok(),
            None => Requirement::new(self.name.as_str()).ok(),
        }
    }
}

/// A parsed lockfile snapshot. Never mutated after parsing.
#[derive(Debug, Clone)]
pub struct LockFile {
    format: LockFormat,
    packages: BTreeMap<String, LockedPackage>,
    dev_packages: BTreeMap<String, LockedPackage>,
    sources: Vec<String>,
}

impl LockFile {
    /// Which format this snapshot was read from.
    pub fn format(&self) -> LockFormat {
        self.format
    }

    /// Locked packages keyed by name.
    pub fn packages(&self) -> &BTreeMap<String, LockedPackage> {
        &self.packages
    }

    /// Development packages keyed by name (legacy format only).
    pub fn dev_packages(&self) -> &BTreeMap<String, LockedPackage> {
        &self.dev_packages
    }

    /// Look up a locked package by name, ignoring case and separators.
    pub fn get(&self, name: &str) -> Option<&LockedPackage> {
        let wanted = PackageName::new(name);
        self.packages
            .values()
            .chain(self.dev_packages.values())
            .find(|p| PackageName::new(&p.name) == wanted)
    }

    /// Index URLs named by the lockfile, or the default index.
    pub fn sources(&self) -> Vec<String> {
        if self.sources.is_empty() {
            vec![DEFAULT_SOURCE_URL.to_string()]
        } else {
            self.sources.clone()
        }
    }

    /// Locked packages as plain packages.
    pub fn to_packages(&self) -> Vec<Package> {
        self.packages
            .values()
            .filter_map(LockedPackage::to_package)
            .collect()
    }

    /// Requirements derived from the main package set.
    ///
    /// Legacy entries that are editable or carry markers are left out; marker
    /// evaluation is not attempted.
    pub fn requirements(&self) -> Vec<Requirement> {
        self.derive_requirements(&self.packages)
    }

    /// Requirements derived from the development package set.
    pub fn dev_requirements(&self) -> Vec<Requirement> {
        self.derive_requirements(&self.dev_packages)
    }

    fn derive_requirements(&self, packages: &BTreeMap<String, LockedPackage>) -> Vec<Requirement> {
        packages
            .values()
            .filter(|pkg| {
                self.format != LockFormat::LegacyJson || (!pkg.editable && pkg.markers.is_none())
            })
            .filter_map(LockedPackage::to_requirement)
            .collect()
    }
}

/// Parse lockfile content, collapsing "empty" and "malformed" into `None`.
pub fn parse_lock(content: &[u8], format: LockFormat) -> Option<LockFile> {
    match parse_lock_outcome(content, format) {
        Ok(outcome) => outcome.into_lockfile(),
        Err(e) => {
            tracing::debug!("ignoring lockfile: {}", e);
            None
        }
    }
}

/// Parse lockfile content into a tagged outcome.
pub fn parse_lock_outcome(content: &[u8], format: LockFormat) -> Result<LockOutcome, LockError> {
    let text = std::str::from_utf8(content).map_err(|e| LockError::Malformed {
        message: format!("lockfile is not valid UTF-8: {}", e),
        span: Some(e.valid_up_to()..e.valid_up_to() + 1),
    })?;

    let format = match format {
        LockFormat::Auto => LockFormat::detect(text),
        explicit => explicit,
    };

    let lock = match format {
        LockFormat::LegacyJson => parse_legacy(text)?,
        _ => parse_toml(text)?,
    };

    if lock.packages.is_empty() && lock.dev_packages.is_empty() {
        Ok(LockOutcome::Empty)
    } else {
        Ok(LockOutcome::Parsed(lock))
    }
}

/// Read and parse a lockfile from disk.
pub fn load_lock(path: &Path) -> Result<LockOutcome, LockError> {
    match std::fs::read(path) {
        Ok(bytes) => parse_lock_outcome(&bytes, LockFormat::Auto),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LockOutcome::Missing),
        Err(source) => Err(LockError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// -----------------------------------------------------------------------------
// Native TOML format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawTomlLock {
    #[serde(default)]
    package: Vec<RawTomlPackage>,
}

#[derive(Debug, Deserialize)]
struct RawTomlPackage {
    name: String,
    version: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    hashes: Vec<String>,
    #[serde(default)]
    markers: Option<toml::Value>,
    #[serde(default)]
    extras: Option<toml::Value>,
    #[serde(default)]
    source: Option<RawTomlSource>,
}

#[derive(Debug, Deserialize)]
struct RawTomlSource {
    #[serde(default)]
    url: Option<String>,
}

fn parse_toml(text: &str) -> Result<LockFile, LockError> {
    let raw: RawTomlLock = toml::from_str(text).map_err(|e| LockError::Malformed {
        message: e.message().to_string(),
        span: e.span(),
    })?;

    let mut packages = BTreeMap::new();
    for entry in raw.package {
        if entry.name.trim().is_empty() || entry.version.trim().is_empty() {
            return Err(malformed("package entry with empty name or version"));
        }

        let locked = LockedPackage {
            name: entry.name.clone(),
            version: Some(entry.version),
            hashes: entry.hashes,
            markers: entry.markers.as_ref().and_then(markers_to_string),
            extras: entry.extras.as_ref().map(extras_to_map).unwrap_or_default(),
            editable: false,
            category: entry.category,
            source: entry.source.and_then(|s| s.url),
        };
        packages.insert(entry.name, locked);
    }

    Ok(LockFile {
        format: LockFormat::Toml,
        packages,
        dev_packages: BTreeMap::new(),
        sources: Vec::new(),
    })
}

/// Markers may be a single string or an array of strings.
fn markers_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        toml::Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|v| v.as_str().map(|s| format!("({})", s)))
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" and "))
            }
        }
        _ => None,
    }
}

/// Extras may be a table of lists or an array of such tables.
fn extras_to_map(value: &toml::Value) -> BTreeMap<String, Vec<String>> {
    fn merge(table: &toml::Table, out: &mut BTreeMap<String, Vec<String>>) {
        for (extra, deps) in table {
            let deps = deps
                .as_array()
                .map(|a| a.iter().filter_map(|d| d.as_str().map(String::from)).collect())
                .unwrap_or_default();
            out.insert(extra.clone(), deps);
        }
    }

    let mut out = BTreeMap::new();
    match value {
        toml::Value::Table(table) => merge(table, &mut out),
        toml::Value::Array(items) => {
            for table in items.iter().filter_map(|i| i.as_table()) {
                merge(table, &mut out);
            }
        }
        _ => {}
    }
    out
}

// -----------------------------------------------------------------------------
// Legacy JSON format
// -----------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawLegacyLock {
    #[serde(rename = "_meta", default)]
    meta: Option<RawLegacyMeta>,
    #[serde(default)]
    default: BTreeMap<String, RawLegacyPackage>,
    #[serde(default)]
    develop: BTreeMap<String, RawLegacyPackage>,
}

#[derive(Debug, Deserialize)]
struct RawLegacyMeta {
    #[serde(default)]
    sources: Vec<RawLegacySource>,
}

#[derive(Debug, Deserialize)]
struct RawLegacySource {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLegacyPackage {
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    editable: Option<bool>,
    #[serde(default)]
    hashes: Vec<String>,
    #[serde(default)]
    markers: Option<String>,
}

fn parse_legacy(text: &str) -> Result<LockFile, LockError> {
    let raw: RawLegacyLock = serde_json::from_str(text).map_err(|e| LockError::Malformed {
        message: e.to_string(),
        span: byte_offset(text, e.line(), e.column()).map(|o| o..o + 1),
    })?;

    let convert = |entries: BTreeMap<String, RawLegacyPackage>| {
        let mut out = BTreeMap::new();
        for (name, entry) in entries {
            if name.trim().is_empty() {
                return Err(malformed("package entry with empty name"));
            }
            let version = entry
                .version
                .map(|v| v.trim().trim_start_matches("==").to_string())
                .filter(|v| !v.is_empty());
            out.insert(
                name.clone(),
                LockedPackage {
                    name,
                    version,
                    hashes: entry.hashes,
                    markers: entry.markers,
                    extras: BTreeMap::new(),
                    editable: entry.editable.unwrap_or(false),
                    category: None,
                    source: None,
                },
            );
        }
        Ok(out)
    };

    let sources = raw
        .meta
        .map(|m| m.sources.into_iter().filter_map(|s| s.url).collect())
        .unwrap_or_default();

    Ok(LockFile {
        format: LockFormat::LegacyJson,
        packages: convert(raw.default)?,
        dev_packages: convert(raw.develop)?,
        sources,
    })
}

fn malformed(message: &str) -> LockError {
    LockError::Malformed {
        message: message.to_string(),
        span: None,
    }
}

/// Convert a 1-based line/column pair to a byte offset.
fn byte_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    if line == 0 {
        return None;
    }
    let mut offset = 0;
    for (index, content) in text.split_inclusive('\n').enumerate() {
        if index + 1 == line {
            return Some((offset + column.saturating_sub(1)).min(text.len().saturating_sub(1)));
        }
        offset += content.len();
    }
    None
}

// -----------------------------------------------------------------------------
// Cache
// -----------------------------------------------------------------------------

/// Cache of lockfile snapshots keyed by path and modification stamp.
#[derive(Debug, Default)]
pub struct LockCache {
    entries: Mutex<HashMap<PathBuf, (ModificationStamp, Arc<LockOutcome>)>>,
}

impl LockCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        LockCache::default()
    }

    /// Load the lockfile at `path`, reusing the cached snapshot while the
    /// file's stamp is unchanged.
    pub fn load(&self, path: &Path) -> Result<Arc<LockOutcome>, LockError> {
        let stamp = match ModificationStamp::of(path) {
            Ok(stamp) => stamp,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Arc::new(LockOutcome::Missing));
            }
            Err(source) => {
                return Err(LockError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if let Ok(entries) = self.entries.lock() {
            if let Some((cached_stamp, outcome)) = entries.get(path) {
                if *cached_stamp == stamp {
                    tracing::debug!("lockfile cache hit for {}", path.display());
                    return Ok(Arc::clone(outcome));
                }
            }
        }

        let outcome = match load_lock(path) {
            Ok(outcome) => outcome,
            Err(LockError::Malformed { message, .. }) => {
                tracing::warn!("{} is malformed: {}", path.display(), message);
                LockOutcome::Empty
            }
            Err(e) => return Err(e),
        };

        let outcome = Arc::new(outcome);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(path.to_path_buf(), (stamp, Arc::clone(&outcome)));
        }
        Ok(outcome)
    }

    /// Drop every cached snapshot.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const TOML_LOCK: &str = r#"
[[package]]
name = "attrs"
version = "19.3.0"
description = "Classes Without Boilerplate"
category = "main"
optional = false
python-versions = ">=2.7, !=3.0.*"

[package.extras]
docs = ["sphinx", "zope.interface"]

[[package]]
name = "colorama"
version = "0.4.3"
category = "dev"
optional = false
markers = "sys_platform == \"win32\""

[[package]]
name = "six"
version = "1.15.0"
hashes = ["sha256:abc", "sha256:def"]

[metadata]
content-hash = "deadbeef"
python-versions = "^3.8"
"#;

    const LEGACY_LOCK: &str = r#"{
    "_meta": {
        "sources": [{"name": "pypi", "url": "https://pypi.org/simple", "verify_ssl": true}]
    },
    "default": {
        "requests": {"version": "==2.24.0", "hashes": ["sha256:1"]},
        "mypkg": {"editable": true, "path": ".", "version": "==0.1.0"},
        "pywin32": {"version": "==228", "markers": "sys_platform == 'win32'"}
    },
    "develop": {
        "pytest": {"version": "==6.0.1"}
    }
}"#;

    #[test]
    fn test_parse_toml_lock() {
        let lock = parse_lock(TOML_LOCK.as_bytes(), LockFormat::Auto).unwrap();

        assert_eq!(lock.format(), LockFormat::Toml);
        assert_eq!(lock.packages().len(), 3);
        assert_eq!(lock.packages()["six"].version.as_deref(), Some("1.15.0"));
        assert_eq!(lock.packages()["six"].hashes.len(), 2);
        assert_eq!(
            lock.packages()["attrs"].extras["docs"],
            vec!["sphinx".to_string(), "zope.interface".to_string()]
        );
        assert!(lock.packages()["colorama"].markers.is_some());
        assert_eq!(lock.sources(), vec![DEFAULT_SOURCE_URL.to_string()]);
    }

    #[test]
    fn test_toml_requirements_are_pinned() {
        let lock = parse_lock(TOML_LOCK.as_bytes(), LockFormat::Toml).unwrap();
        let reqs: Vec<String> = lock.requirements().iter().map(|r| r.to_string()).collect();

        assert_eq!(reqs, vec!["attrs==19.3.0", "colorama==0.4.3", "six==1.15.0"]);
    }

    #[test]
    fn test_n_package_tables_give_n_packages() {
        let mut text = String::new();
        for i in 0..25 {
            text.push_str(&format!("[[package]]\nname = \"pkg{i}\"\nversion = \"1.{i}\"\n\n"));
        }

        let lock = parse_lock(text.as_bytes(), LockFormat::Toml).unwrap();
        assert_eq!(lock.packages().len(), 25);
        for i in 0..25 {
            let pkg = &lock.packages()[&format!("pkg{i}")];
            assert_eq!(pkg.version.as_deref(), Some(format!("1.{i}").as_str()));
        }
    }

    #[test]
    fn test_toml_markers_as_array() {
        let text = "[[package]]\nname = \"a\"\nversion = \"1\"\nmarkers = [\"os_name == 'nt'\", \"python_version < '3.8'\"]\n";
        let lock = parse_lock(text.as_bytes(), LockFormat::Toml).unwrap();

        assert_eq!(
            lock.packages()["a"].markers.as_deref(),
            Some("(os_name == 'nt') and (python_version < '3.8')")
        );
    }

    #[test]
    fn test_parse_legacy_lock() {
        let lock = parse_lock(LEGACY_LOCK.as_bytes(), LockFormat::Auto).unwrap();

        assert_eq!(lock.format(), LockFormat::LegacyJson);
        assert_eq!(lock.packages().len(), 3);
        assert_eq!(lock.dev_packages().len(), 1);
        assert_eq!(lock.packages()["requests"].version.as_deref(), Some("2.24.0"));
        assert!(lock.packages()["mypkg"].editable);
        assert_eq!(lock.sources(), vec!["https://pypi.org/simple".to_string()]);
    }

    #[test]
    fn test_legacy_requirements_skip_editable_and_marked() {
        let lock = parse_lock(LEGACY_LOCK.as_bytes(), LockFormat::LegacyJson).unwrap();
        let reqs: Vec<String> = lock.requirements().iter().map(|r| r.to_string()).collect();

        assert_eq!(reqs, vec!["requests==2.24.0"]);
        assert_eq!(lock.dev_requirements().len(), 1);
    }

    #[test]
    fn test_legacy_single_editable_entry_yields_no_requirements() {
        let text = r#"{"default": {"local": {"editable": true, "version": "==1.0"}}}"#;
        let lock = parse_lock(text.as_bytes(), LockFormat::Auto).unwrap();

        assert_eq!(lock.packages().len(), 1);
        assert!(lock.requirements().is_empty());
    }

    #[test]
    fn test_empty_and_malformed_collapse_to_none() {
        assert!(parse_lock(b"", LockFormat::Auto).is_none());
        assert!(parse_lock(b"[metadata]\ncontent-hash = \"x\"\n", LockFormat::Toml).is_none());
        assert!(parse_lock(b"[[package]]\nname = 42\n", LockFormat::Toml).is_none());
        assert!(parse_lock(b"{\"default\": [1, 2]}", LockFormat::Auto).is_none());
        assert!(parse_lock(b"[[package\n", LockFormat::Toml).is_none());
    }

    #[test]
    fn test_outcome_distinguishes_empty_from_malformed() {
        let empty = parse_lock_outcome(b"[metadata]\n", LockFormat::Toml).unwrap();
        assert!(matches!(empty, LockOutcome::Empty));

        let broken = parse_lock_outcome(b"[[package]]\nname = 42\n", LockFormat::Toml);
        assert!(matches!(broken, Err(LockError::Malformed { .. })));
    }

    #[test]
    fn test_malformed_json_reports_span() {
        let text = "{\n  \"default\": {\n    \"a\": 12\n  }\n}";
        let err = parse_lock_outcome(text.as_bytes(), LockFormat::LegacyJson).unwrap_err();

        match err {
            LockError::Malformed { span, .. } => assert!(span.is_some()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_missing_lock() {
        let tmp = TempDir::new().unwrap();
        let outcome = load_lock(&tmp.path().join(POETRY_LOCK)).unwrap();
        assert!(matches!(outcome, LockOutcome::Missing));
    }

    #[test]
    fn test_cache_reuses_until_stamp_changes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(POETRY_LOCK);
        std::fs::write(&path, "[[package]]\nname = \"a\"\nversion = \"1.0\"\n").unwrap();

        let cache = LockCache::new();
        let first = cache.load(&path).unwrap();
        let second = cache.load(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        std::fs::write(
            &path,
            "[[package]]\nname = \"a\"\nversion = \"1.0\"\n\n[[package]]\nname = \"b\"\nversion = \"2.0\"\n",
        )
        .unwrap();
        let third = cache.load(&path).unwrap();
        assert_eq!(third.lockfile().unwrap().packages().len(), 2);
    }

    #[test]
    fn test_get_normalizes_names() {
        let lock = parse_lock(TOML_LOCK.as_bytes(), LockFormat::Toml).unwrap();
        assert!(lock.get("Six").is_some());
        assert!(lock.get("missing").is_none());
    }
}
