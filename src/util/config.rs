//! Configuration file support for Stanza.
//!
//! Stanza supports two configuration file locations:
//! - Global: `~/.stanza/config.toml` - User-wide defaults
//! - Project: `.stanza/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. `STANZA_HOME`
//! relocates the global directory.
//!
//! ```toml
//! [poetry]
//! path = "/opt/poetry/bin/poetry"
//! timeout = 30
//! trim-output = true
//!
//! [drift]
//! ignore = ["setuptools"]
//! source-roots = [".", "src"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use toml_edit::{value, DocumentMut, Item, Table};

use crate::util::fs;
use crate::util::process::DEFAULT_TIMEOUT;

/// Environment variable overriding the global config directory.
pub const STANZA_HOME_ENV: &str = "STANZA_HOME";

/// Stanza configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Poetry executable settings
    pub poetry: PoetryConfig,

    /// Drift detection settings
    pub drift: DriftConfig,
}

/// Poetry executable settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PoetryConfig {
    /// User-overridden path to the poetry executable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Timeout in seconds for best-effort queries (default 30)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Trim a single trailing newline from captured output (default true)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trim_output: Option<bool>,
}

/// Drift detection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DriftConfig {
    /// Requirement names never reported as unsatisfied
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore: Vec<String>,

    /// Directories scanned for `*.egg-info` / `*.dist-info` metadata
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub source_roots: Vec<PathBuf>,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;

        if config.poetry.timeout == Some(0) {
            tracing::warn!(
                "ignoring `timeout = 0` in {}, using {}s",
                path.display(),
                DEFAULT_TIMEOUT.as_secs()
            );
            config.poetry.timeout = None;
        }
        Ok(config)
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents =
            toml::to_string_pretty(self).with_context(|| "failed to serialize config")?;
        fs::write_string(path, &contents)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.poetry.path.is_some() {
            self.poetry.path = other.poetry.path;
        }
        if other.poetry.timeout.is_some() {
            self.poetry.timeout = other.poetry.timeout;
        }
        if other.poetry.trim_output.is_some() {
            self.poetry.trim_output = other.poetry.trim_output;
        }

        for name in other.drift.ignore {
            if !self.drift.ignore.contains(&name) {
                self.drift.ignore.push(name);
            }
        }
        if !other.drift.source_roots.is_empty() {
            self.drift.source_roots = other.drift.source_roots;
        }
    }

    /// Timeout for best-effort queries.
    pub fn timeout(&self) -> Duration {
        self.poetry
            .timeout
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT)
    }

    /// Whether captured output loses its trailing newline.
    pub fn trim_output(&self) -> bool {
        self.poetry.trim_output.unwrap_or(true)
    }

    /// Directories scanned for local package metadata, relative to the project.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        if self.drift.source_roots.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            self.drift.source_roots.clone()
        }
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.stanza/config.toml)
/// 2. Global config (~/.stanza/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        config.merge(Config::load_or_default(global_path));
    }

    config.merge(Config::load_or_default(project_path));

    config
}

/// Persist the poetry executable override, keeping the rest of the file intact.
pub fn set_poetry_path(config_path: &Path, poetry: &Path) -> Result<()> {
    let content = if config_path.exists() {
        fs::read_to_string(config_path)?
    } else {
        String::new()
    };
    let mut doc: DocumentMut = content
        .parse()
        .with_context(|| format!("failed to parse config file: {}", config_path.display()))?;

    if !doc.contains_key("poetry") {
        doc["poetry"] = Item::Table(Table::new());
    }
    doc["poetry"]["path"] = value(poetry.display().to_string());

    fs::write_string(config_path, &doc.to_string())
}

/// Get the global stanza config directory (`$STANZA_HOME` or `~/.stanza`).
pub fn global_config_dir() -> Option<PathBuf> {
    if let Some(home) = std::env::var_os(STANZA_HOME_ENV).filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(home));
    }
    directories::BaseDirs::new().map(|b| b.home_dir().join(".stanza"))
}

/// Get the global config path.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.stanza/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(".stanza").join("config.toml")
}
