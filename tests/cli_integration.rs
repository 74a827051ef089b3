//! CLI integration tests for stanza.
//!
//! Poetry is replaced by a shell script that answers the handful of
//! commands stanza issues, so these run without a Python toolchain.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

const MANIFEST: &str = r#"[tool.poetry]
name = "demo"
version = "0.1.0"
description = ""

[tool.poetry.dependencies]
python = "^3.8"
attrs = "^19.3"
requests = "^2.24"

[tool.poetry.dev-dependencies]
pytest = "^6.0"

[tool.poetry.scripts]
serve = "demo:main"

[tool.poetry.extras]
http = ["requests"]
"#;

const LOCK: &str = r#"[[package]]
name = "attrs"
version = "19.3.0"
description = "Classes Without Boilerplate"
category = "main"
optional = false

[[package]]
name = "requests"
version = "2.24.0"
category = "main"
optional = false

[[package]]
name = "pytest"
version = "6.0.1"
category = "dev"
optional = false

[metadata]
lock-version = "1.1"
python-versions = "^3.8"
content-hash = "0123456789abcdef"
"#;

fn stanza(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("stanza").unwrap();
    cmd.env("STANZA_HOME", home.join(".stanza"))
        .env("HOME", home)
        .env_remove("STANZA_POETRY");
    cmd
}

/// A Poetry project with manifest and lockfile.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("pyproject.toml"), MANIFEST).unwrap();
    fs::write(tmp.path().join("poetry.lock"), LOCK).unwrap();
    tmp
}

/// Write a fake poetry executable answering from a `case` on its arguments.
#[cfg(unix)]
fn fake_poetry(dir: &Path, cases: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let bin = dir.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let path = bin.join("poetry");
    let script = format!(
        "#!/bin/sh\ncase \"$*\" in\n{}\n  *) exit 0 ;;\nesac\n",
        cases
    );
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ============================================================================
// stanza lockfile / manifest
// ============================================================================

#[test]
fn test_lockfile_lists_main_packages() {
    let tmp = project();

    stanza(tmp.path())
        .arg("lockfile")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("attrs 19.3.0"))
        .stdout(predicate::str::contains("requests 2.24.0"))
        .stdout(predicate::str::contains("pytest").not());
}

#[test]
fn test_lockfile_dev_includes_develop_packages() {
    let tmp = project();

    stanza(tmp.path())
        .args(["lockfile", "--dev"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("pytest 6.0.1"));
}

#[test]
fn test_lockfile_requirements_from_legacy_json() {
    let tmp = project();
    fs::write(
        tmp.path().join("poetry.lock"),
        r#"{"default": {"mylib": {"version": "==0.1.0", "editable": true},
             "requests": {"version": "==2.24.0"}}, "develop": {}}"#,
    )
    .unwrap();

    stanza(tmp.path())
        .args(["lockfile", "--requirements"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("requests==2.24.0"))
        .stdout(predicate::str::contains("mylib").not());
}

#[test]
fn test_lockfile_json_output() {
    let tmp = project();

    let output = stanza(tmp.path())
        .args(["--json", "lockfile"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let event: serde_json::Value =
        serde_json::from_slice(output.stdout.split(|b| *b == b'\n').next().unwrap()).unwrap();
    assert_eq!(event["reason"], "lockfile");
    assert_eq!(event["packages"].as_array().unwrap().len(), 2);
}

#[test]
fn test_lockfile_missing_fails() {
    let tmp = project();
    fs::remove_file(tmp.path().join("poetry.lock")).unwrap();

    stanza(tmp.path())
        .arg("lockfile")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("poetry lock"));
}

#[test]
fn test_lockfile_validate_reports_syntax_error() {
    let tmp = project();
    fs::write(tmp.path().join("poetry.lock"), "[[package]\nname = \"x\"\n").unwrap();

    stanza(tmp.path())
        .args(["lockfile", "--validate"])
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("malformed"));
}

#[test]
fn test_manifest_summary() {
    let tmp = project();

    stanza(tmp.path())
        .arg("manifest")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("demo 0.1.0"))
        .stdout(predicate::str::contains("dev-dependencies:"))
        .stdout(predicate::str::contains("serve = demo:main"))
        .stdout(predicate::str::contains("http = [requests]"));
}

#[test]
fn test_manifest_found_from_subdirectory() {
    let tmp = project();
    let nested = tmp.path().join("demo").join("sub");
    fs::create_dir_all(&nested).unwrap();

    stanza(tmp.path())
        .arg("manifest")
        .current_dir(&nested)
        .assert()
        .success()
        .stdout(predicate::str::contains("demo 0.1.0"));
}

#[test]
fn test_outside_project_fails() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("pyproject.toml"), "[project]\nname = \"pep621\"\n").unwrap();

    stanza(tmp.path())
        .arg("manifest")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find a Poetry"));
}

// ============================================================================
// stanza locate / version
// ============================================================================

#[test]
fn test_locate_without_poetry_fails() {
    let tmp = TempDir::new().unwrap();

    stanza(tmp.path())
        .arg("locate")
        .env("PATH", "")
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Poetry executable not found"));
}

#[cfg(unix)]
#[test]
fn test_locate_prefers_override() {
    let tmp = project();
    let poetry = fake_poetry(tmp.path(), "");

    stanza(tmp.path())
        .args(["--poetry", poetry.to_str().unwrap(), "locate"])
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(poetry.to_str().unwrap()));
}

#[cfg(unix)]
#[test]
fn test_locate_reads_global_config() {
    let tmp = project();
    let poetry = fake_poetry(tmp.path(), "");

    stanza(tmp.path())
        .args(["config", "set-path", poetry.to_str().unwrap()])
        .current_dir(tmp.path())
        .assert()
        .success();
    assert!(tmp.path().join(".stanza").join("config.toml").exists());

    stanza(tmp.path())
        .arg("locate")
        .env("PATH", "")
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(poetry.to_str().unwrap()));
}

#[cfg(unix)]
#[test]
fn test_version_reports_poetry() {
    let tmp = project();
    let poetry = fake_poetry(tmp.path(), "  --version) echo 'Poetry (version 1.2.0)' ;;");

    stanza(tmp.path())
        .arg("version")
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("poetry 1.2.0"));
}

// ============================================================================
// stanza check / outdated
// ============================================================================

#[cfg(unix)]
#[test]
fn test_check_reports_drift() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'install --dry-run') printf 'Package operations: 1 install\\n\\n  - Installing requests (2.24.0)\\n' ;;",
    );

    stanza(tmp.path())
        .arg("check")
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("requests"))
        .stderr(predicate::str::contains("not satisfied"));
}

#[cfg(unix)]
#[test]
fn test_check_strict_fails_on_drift() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'install --dry-run') printf '  - Installing requests (2.24.0)\\n' ;;",
    );

    stanza(tmp.path())
        .args(["check", "--strict"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .failure();
}

#[cfg(unix)]
#[test]
fn test_check_ignore_silences_drift() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'install --dry-run') printf '  - Installing requests (2.24.0)\\n' ;;",
    );

    stanza(tmp.path())
        .args(["check", "--strict", "--ignore", "requests"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("not satisfied").not());
}

#[cfg(unix)]
#[test]
fn test_check_strict_accepts_marker_alternatives() {
    let tmp = project();
    let manifest = MANIFEST.replace(
        "attrs = \"^19.3\"\n",
        "attrs = [\n    { version = \"^19.3\", markers = \"python_version >= '3.8'\" },\n    { version = \"^18.0\", markers = \"python_version < '3.8'\" },\n]\n",
    );
    fs::write(tmp.path().join("pyproject.toml"), manifest).unwrap();
    let poetry = fake_poetry(tmp.path(), "");

    stanza(tmp.path())
        .args(["check", "--strict"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("not satisfied").not());
}

#[cfg(unix)]
#[test]
fn test_check_satisfied() {
    let tmp = project();
    let poetry = fake_poetry(tmp.path(), "");

    stanza(tmp.path())
        .arg("check")
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("requirement(s) satisfied"));
}

#[cfg(unix)]
#[test]
fn test_outdated_table() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'show --outdated') printf 'attrs    19.3.0 20.1.0 Classes Without Boilerplate\\n' ;;",
    );

    stanza(tmp.path())
        .arg("outdated")
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("attrs  19.3.0 -> 20.1.0"));
}

#[cfg(unix)]
#[test]
fn test_poetry_failure_is_reported() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'show --outdated') echo 'network unreachable' >&2; exit 1 ;;",
    );

    stanza(tmp.path())
        .arg("outdated")
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("network unreachable"));
}

// ============================================================================
// stanza env / script
// ============================================================================

#[cfg(unix)]
#[test]
fn test_env_list_marks_activated() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'env list --full-path') printf '/envs/demo-py3.7\\n/envs/demo-py3.8 (Activated)\\n' ;;",
    );

    stanza(tmp.path())
        .args(["env", "list"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("/envs/demo-py3.8 (Activated)"));
}

#[cfg(unix)]
#[test]
fn test_env_check_interpreter() {
    let tmp = project();
    let poetry = fake_poetry(
        tmp.path(),
        "  'env info -p') echo /envs/demo-py3.8 ;;",
    );

    stanza(tmp.path())
        .args(["env", "check", "/envs/demo-py3.8/bin/python"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("belongs to the project environment"));
}

#[cfg(unix)]
#[test]
fn test_script_not_declared() {
    let tmp = project();
    let env = tmp.path().join("venv");
    let poetry = fake_poetry(
        tmp.path(),
        &format!("  'env info -p') echo {} ;;", env.display()),
    );

    stanza(tmp.path())
        .args(["script", "missing"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("serve"));
}

#[cfg(unix)]
#[test]
fn test_script_runs_from_environment() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = project();
    let env = tmp.path().join("venv");
    let bin = env.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let script = bin.join("serve");
    fs::write(&script, "#!/bin/sh\necho serving \"$@\"\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

    let poetry = fake_poetry(
        tmp.path(),
        &format!("  'env info -p') echo {} ;;", env.display()),
    );

    stanza(tmp.path())
        .args(["script", "serve", "--port", "8000"])
        .env("STANZA_POETRY", &poetry)
        .current_dir(tmp.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("serving --port 8000"));
}

// ============================================================================
// stanza completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    stanza(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stanza"));
}

#[test]
fn test_help_lists_commands() {
    let tmp = TempDir::new().unwrap();

    stanza(tmp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("lockfile"));
}
