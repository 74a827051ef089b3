//! Parsers for `poetry env` / `poetry config` / `poetry --version` output
//! and virtualenv path helpers.

use std::path::{Path, PathBuf};

use pep440_rs::Version;
use serde::Serialize;

use crate::core::version::parse_version_lenient;

const ACTIVATED_SUFFIX: &str = "(Activated)";

/// One row of `poetry env list --full-path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvEntry {
    pub path: PathBuf,
    pub activated: bool,
}

/// Parse `env list --full-path` output.
pub fn parse_env_list(text: &str) -> Vec<EnvEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match line.strip_suffix(ACTIVATED_SUFFIX) {
            Some(path) => EnvEntry {
                path: PathBuf::from(path.trim_end()),
                activated: true,
            },
            None => EnvEntry {
                path: PathBuf::from(line),
                activated: false,
            },
        })
        .collect()
}

/// Parse `poetry --version`.
///
/// Accepts `Poetry version 1.0.10` and `Poetry (version 1.2.0)`.
pub fn parse_poetry_version(text: &str) -> Option<Version> {
    let mut tokens = text.split_whitespace();
    while let Some(token) = tokens.next() {
        if token.trim_start_matches('(') == "version" {
            return tokens.next().and_then(parse_version_lenient);
        }
    }
    None
}

/// Parse `poetry config virtualenvs.in-project`; `null` means unset.
pub fn parse_in_project(text: &str) -> Option<bool> {
    match text.trim() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// Directory holding console scripts inside a virtualenv.
pub fn env_bin_dir(env: &Path) -> PathBuf {
    if cfg!(windows) {
        env.join("Scripts")
    } else {
        env.join("bin")
    }
}

/// Python interpreter inside a virtualenv.
pub fn env_python(env: &Path) -> PathBuf {
    if cfg!(windows) {
        env_bin_dir(env).join("python.exe")
    } else {
        env_bin_dir(env).join("python")
    }
}

/// Path of a console script installed into a virtualenv.
pub fn script_path(env: &Path, script: &str) -> PathBuf {
    if cfg!(windows) {
        env_bin_dir(env).join(format!("{}.exe", script))
    } else {
        env_bin_dir(env).join(script)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_parse_env_list() {
        let text = "/home/me/.cache/pypoetry/virtualenvs/demo-AbCd-py3.7\n\
                    /home/me/.cache/pypoetry/virtualenvs/demo-AbCd-py3.8 (Activated)\n\n";
        let envs = parse_env_list(text);

        assert_eq!(envs.len(), 2);
        assert!(!envs[0].activated);
        assert!(envs[1].activated);
        assert_eq!(
            envs[1].path,
            PathBuf::from("/home/me/.cache/pypoetry/virtualenvs/demo-AbCd-py3.8")
        );
    }

    #[test]
    fn test_parse_poetry_version_formats() {
        let expected = Version::from_str("1.0.10").unwrap();
        assert_eq!(parse_poetry_version("Poetry version 1.0.10"), Some(expected));

        let expected = Version::from_str("1.2.0").unwrap();
        assert_eq!(parse_poetry_version("Poetry (version 1.2.0)\n"), Some(expected));

        assert_eq!(parse_poetry_version("command not found"), None);
        assert_eq!(parse_poetry_version(""), None);
    }

    #[test]
    fn test_parse_in_project() {
        assert_eq!(parse_in_project("true\n"), Some(true));
        assert_eq!(parse_in_project("false"), Some(false));
        assert_eq!(parse_in_project("null"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_script_path() {
        assert_eq!(
            script_path(Path::new("/venv"), "serve"),
            PathBuf::from("/venv/bin/serve")
        );
        assert_eq!(env_python(Path::new("/venv")), PathBuf::from("/venv/bin/python"));
    }
}
