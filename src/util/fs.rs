//! Filesystem utilities.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};

/// Modification stamp of a file: mtime plus length.
///
/// The length guards against filesystems with coarse mtime resolution where
/// two quick edits share a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModificationStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl ModificationStamp {
    /// Read the stamp of a file.
    pub fn of(path: &Path) -> io::Result<Self> {
        let metadata = fs::metadata(path)?;
        Ok(ModificationStamp {
            modified: metadata.modified().ok(),
            len: metadata.len(),
        })
    }

    /// Stamp used for files that do not exist.
    pub fn missing() -> Self {
        ModificationStamp {
            modified: None,
            len: 0,
        }
    }

    /// Get the modification time, if the platform reports one.
    pub fn modified(&self) -> Option<SystemTime> {
        self.modified
    }

    /// Check if this stamp is newer than another.
    ///
    /// Unknown times compare as newer so callers err on the side of refreshing.
    pub fn is_newer_than(&self, other: &ModificationStamp) -> bool {
        match (self.modified, other.modified) {
            (Some(a), Some(b)) => a > b,
            _ => true,
        }
    }
}

/// Read a file to string, with nice error messages.
pub fn read_to_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read file: {}", path.display()))
}

/// Ensure a directory exists, creating it if necessary.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("failed to create directory: {}", path.display()))?;
    }
    Ok(())
}

/// Write a string to a file, creating parent directories if needed.
pub fn write_string(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write file: {}", path.display()))
}

/// Canonicalize a path, but don't fail if it doesn't exist yet.
/// Returns the path as-is if canonicalization fails.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Check if a path is an executable regular file.
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(windows)]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
