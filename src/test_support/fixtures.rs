//! Test fixtures for Poetry projects on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::core::lockfile::POETRY_LOCK;
use crate::core::manifest::PY_PROJECT_TOML;

/// Native TOML lockfile with two packages.
pub const TOML_LOCK: &str = r#"[[package]]
name = "attrs"
version = "19.3.0"
description = "Classes Without Boilerplate"
category = "main"
optional = false

[[package]]
name = "six"
version = "1.15.0"
category = "dev"
optional = false

[metadata]
lock-version = "1.1"
python-versions = "^3.8"
content-hash = "0123456789abcdef"
"#;

/// Legacy JSON lockfile with one editable default entry.
pub const LEGACY_LOCK: &str = r#"{
    "_meta": {"sources": [{"url": "https://example.com/simple"}]},
    "default": {
        "mylib": {"version": "==0.1.0", "editable": true},
        "requests": {"version": "==2.24.0", "hashes": ["sha256:abc"]}
    },
    "develop": {
        "pytest": {"version": "==6.0.1"}
    }
}
"#;

/// Fixture for a Poetry project directory.
#[derive(Debug, Clone)]
pub struct ProjectFixture {
    /// Project name.
    pub name: String,
    /// `[tool.poetry.dependencies]` entries (name -> constraint).
    pub dependencies: BTreeMap<String, String>,
    /// `[tool.poetry.scripts]` entries (name -> reference).
    pub scripts: BTreeMap<String, String>,
    /// poetry.lock content, if any.
    pub lock: Option<String>,
    /// Package metadata directories to create (e.g. `foo-1.0.dist-info`).
    pub metadata_dirs: Vec<String>,
}

impl ProjectFixture {
    /// Create a project with no dependencies.
    pub fn poetry(name: impl Into<String>) -> Self {
        ProjectFixture {
            name: name.into(),
            dependencies: BTreeMap::new(),
            scripts: BTreeMap::new(),
            lock: None,
            metadata_dirs: Vec::new(),
        }
    }

    /// Add a dependency.
    pub fn with_dependency(mut self, name: &str, constraint: &str) -> Self {
        self.dependencies.insert(name.to_string(), constraint.to_string());
        self
    }

    /// Add a console script.
    pub fn with_script(mut self, name: &str, reference: &str) -> Self {
        self.scripts.insert(name.to_string(), reference.to_string());
        self
    }

    /// Set poetry.lock content.
    pub fn with_lock(mut self, content: &str) -> Self {
        self.lock = Some(content.to_string());
        self
    }

    /// Add a package metadata directory.
    pub fn with_metadata_dir(mut self, dir: &str) -> Self {
        self.metadata_dirs.push(dir.to_string());
        self
    }

    /// Render pyproject.toml.
    pub fn manifest(&self) -> String {
        let mut out = format!(
            "[tool.poetry]\nname = \"{}\"\nversion = \"0.1.0\"\ndescription = \"\"\n\n[tool.poetry.dependencies]\npython = \"^3.8\"\n",
            self.name
        );
        for (name, constraint) in &self.dependencies {
            out.push_str(&format!("{} = \"{}\"\n", name, constraint));
        }
        if !self.scripts.is_empty() {
            out.push_str("\n[tool.poetry.scripts]\n");
            for (name, reference) in &self.scripts {
                out.push_str(&format!("{} = \"{}\"\n", name, reference));
            }
        }
        out
    }

    /// Write the project into `dir` and return the manifest path.
    pub fn write(&self, dir: &Path) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let manifest = dir.join(PY_PROJECT_TOML);
        std::fs::write(&manifest, self.manifest()).unwrap();

        if let Some(lock) = &self.lock {
            std::fs::write(dir.join(POETRY_LOCK), lock).unwrap();
        }
        for metadata in &self.metadata_dirs {
            std::fs::create_dir_all(dir.join(metadata)).unwrap();
        }
        manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::lockfile::{parse_lock, LockFormat};
    use crate::core::manifest::{is_poetry_manifest, PoetryManifest};
    use tempfile::TempDir;

    #[test]
    fn test_fixture_manifest_is_poetry() {
        let fixture = ProjectFixture::poetry("demo")
            .with_dependency("requests", "^2.24")
            .with_script("serve", "demo:main");
        assert!(is_poetry_manifest(fixture.manifest().as_bytes()));

        let tmp = TempDir::new().unwrap();
        let path = fixture.write(tmp.path());
        let manifest = PoetryManifest::load(&path).unwrap().unwrap();
        assert_eq!(manifest.script_names(), vec!["serve"]);
        assert_eq!(manifest.declared_requirements(false).len(), 1);
    }

    #[test]
    fn test_fixture_locks_parse() {
        assert_eq!(
            parse_lock(TOML_LOCK.as_bytes(), LockFormat::Auto).unwrap().packages().len(),
            2
        );
        assert!(parse_lock(LEGACY_LOCK.as_bytes(), LockFormat::Auto).is_some());
    }
}
