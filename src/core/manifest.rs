//! pyproject.toml recognition and the `[tool.poetry]` model.
//!
//! A project is a Poetry project when its `pyproject.toml` contains a
//! `tool.poetry` table. Manifests are edited interactively and are often
//! transiently invalid, so recognition never fails: anything unparseable is
//! simply "not a Poetry manifest".

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::requirement::Requirement;
use crate::util::fs::ModificationStamp;

/// Manifest file name.
pub const PY_PROJECT_TOML: &str = "pyproject.toml";

/// Check if manifest content declares a `[tool.poetry]` table.
pub fn is_poetry_manifest(content: &[u8]) -> bool {
    let Ok(text) = std::str::from_utf8(content) else {
        return false;
    };

    match toml::from_str::<toml::Table>(text) {
        Ok(table) => table
            .get("tool")
            .and_then(|tool| tool.get("poetry"))
            .is_some_and(|poetry| poetry.is_table()),
        Err(e) => {
            tracing::debug!("manifest is not valid TOML: {}", e.message());
            false
        }
    }
}

/// Read a manifest's modification stamp and whether it is a Poetry manifest.
///
/// Missing or unreadable files report `(missing stamp, false)`.
pub fn manifest_fingerprint(path: &Path) -> (ModificationStamp, bool) {
    let stamp = match ModificationStamp::of(path) {
        Ok(stamp) => stamp,
        Err(_) => return (ModificationStamp::missing(), false),
    };

    let is_poetry = std::fs::read(path)
        .map(|bytes| is_poetry_manifest(&bytes))
        .unwrap_or(false);

    (stamp, is_poetry)
}

/// Cache of manifest recognition results keyed by (identity, stamp).
///
/// An entry is reused only while the file's stamp is unchanged.
#[derive(Debug, Default)]
pub struct ManifestCache {
    entries: Mutex<HashMap<String, (ModificationStamp, bool)>>,
}

impl ManifestCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        ManifestCache::default()
    }

    /// Check whether the manifest at `path` is a Poetry manifest.
    ///
    /// `identity` distinguishes logical owners of the same file (for example
    /// two projects sharing a directory); the path is appended to it.
    pub fn is_poetry(&self, identity: &str, path: &Path) -> bool {
        let key = format!("{}{}", identity, path.display());
        let current = ModificationStamp::of(path).unwrap_or_else(|_| ModificationStamp::missing());

        if let Ok(entries) = self.entries.lock() {
            if let Some((stamp, is_poetry)) = entries.get(&key) {
                if *stamp == current {
                    tracing::debug!("manifest cache hit for {}", path.display());
                    return *is_poetry;
                }
            }
        }

        let (stamp, is_poetry) = manifest_fingerprint(path);
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, (stamp, is_poetry));
        }
        is_poetry
    }

    /// Find the Poetry manifest in `dir`, if it has one.
    pub fn find_in(&self, dir: &Path) -> Option<PathBuf> {
        let candidate = dir.join(PY_PROJECT_TOML);
        if candidate.is_file() && self.is_poetry("", &candidate) {
            Some(candidate)
        } else {
            None
        }
    }

    /// Drop every cached entry.
    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Dependency specification as it appears under `[tool.poetry.dependencies]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple constraint string: `foo = "^1.0"`
    Simple(String),

    /// Detailed specification
    Detailed(DetailedDependencySpec),

    /// Multiple constraints selected by markers
    Multiple(Vec<DetailedDependencySpec>),
}

/// Detailed dependency specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetailedDependencySpec {
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default)]
    pub extras: Vec<String>,

    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub markers: Option<String>,

    #[serde(default)]
    pub python: Option<String>,

    #[serde(default)]
    pub git: Option<String>,

    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default)]
    pub url: Option<String>,
}

/// A dependency group: `[tool.poetry.group.<name>.dependencies]`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyGroup {
    #[serde(default)]
    pub optional: bool,

    #[serde(default)]
    pub dependencies: BTreeMap<String, DependencySpec>,
}

/// A script entry point: `name = "module:function"` or a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScriptSpec {
    Reference(String),
    Detailed {
        #[serde(alias = "callable")]
        reference: String,
        #[serde(default, rename = "type")]
        kind: Option<String>,
    },
}

impl ScriptSpec {
    /// The `module:function` reference.
    pub fn reference(&self) -> &str {
        match self {
            ScriptSpec::Reference(r) => r,
            ScriptSpec::Detailed { reference, .. } => reference,
        }
    }
}

/// The `[tool.poetry]` table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PoetrySection {
    pub name: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub dependencies: BTreeMap<String, DependencySpec>,
    #[serde(rename = "dev-dependencies")]
    pub dev_dependencies: BTreeMap<String, DependencySpec>,
    pub group: BTreeMap<String, DependencyGroup>,
    pub scripts: BTreeMap<String, ScriptSpec>,
    pub extras: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawPyProject {
    #[serde(default)]
    tool: Option<RawTool>,
}

#[derive(Debug, Deserialize)]
struct RawTool {
    #[serde(default)]
    poetry: Option<PoetrySection>,
}

/// A parsed Poetry manifest.
#[derive(Debug, Clone)]
pub struct PoetryManifest {
    /// Path to pyproject.toml
    pub path: PathBuf,

    /// The `[tool.poetry]` section
    pub poetry: PoetrySection,
}

impl PoetryManifest {
    /// Load a manifest from disk. Returns `None` when it has no `[tool.poetry]`.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;

        Self::parse(&content, path)
    }

    /// Parse manifest content.
    pub fn parse(content: &str, path: &Path) -> Result<Option<Self>> {
        let raw: RawPyProject = toml::from_str(content)
            .with_context(|| format!("failed to parse {}", path.display()))?;

        Ok(raw.tool.and_then(|t| t.poetry).map(|poetry| PoetryManifest {
            path: path.to_path_buf(),
            poetry,
        }))
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("."))
    }

    /// Requirements declared by the manifest.
    ///
    /// The `python` entry constrains the interpreter, not a package, and is
    /// skipped. Dev dependencies and group dependencies are included when
    /// `include_dev` is set.
    pub fn declared_requirements(&self, include_dev: bool) -> Vec<Requirement> {
        let mut requirements = Vec::new();
        collect_requirements(&self.poetry.dependencies, &mut requirements);

        if include_dev {
            collect_requirements(&self.poetry.dev_dependencies, &mut requirements);
            for group in self.poetry.group.values() {
                collect_requirements(&group.dependencies, &mut requirements);
            }
        }

        requirements
    }

    /// Script names in declaration order.
    pub fn script_names(&self) -> Vec<&str> {
        self.poetry.scripts.keys().map(String::as_str).collect()
    }

    /// Check if an extra is declared.
    pub fn has_extra(&self, name: &str) -> bool {
        self.poetry.extras.contains_key(name)
    }
}

fn collect_requirements(deps: &BTreeMap<String, DependencySpec>, out: &mut Vec<Requirement>) {
    for (name, spec) in deps {
        if name.eq_ignore_ascii_case("python") {
            continue;
        }
        let Ok(base) = Requirement::new(name.as_str()) else {
            continue;
        };

        match spec {
            DependencySpec::Simple(constraint) => out.push(base.with_constraint(constraint.as_str())),
            DependencySpec::Detailed(detail) => out.push(detailed_requirement(base, detail)),
            DependencySpec::Multiple(details) => {
                for detail in details {
                    out.push(detailed_requirement(base.clone(), detail));
                }
            }
        }
    }
}

fn detailed_requirement(base: Requirement, detail: &DetailedDependencySpec) -> Requirement {
    let mut req = base.with_extras(detail.extras.iter().cloned());
    if let Some(ref version) = detail.version {
        req = req.with_constraint(version.as_str());
    }
    if let Some(ref markers) = detail.markers {
        req = req.with_markers(markers.as_str());
    }
    req
}
