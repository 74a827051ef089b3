//! Test utilities and mocks for stanza unit tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use stanza::test_support::MockRunner;
//!
//! let runner = MockRunner::new()
//!     .with_output(&["--version"], "Poetry (version 1.8.3)")
//!     .with_failure(&["lock"], 1);
//! ```

pub mod fixtures;

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use crate::util::process::{ProcessError, Runner};

pub use fixtures::*;

/// Mock process output.
#[derive(Debug, Clone)]
pub struct MockProcessOutput {
    /// Exit status code (0 = success).
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
    /// Report the call as cancelled instead of finishing.
    pub cancelled: bool,
}

impl MockProcessOutput {
    /// Create a successful output with the given stdout.
    pub fn success(stdout: impl Into<String>) -> Self {
        MockProcessOutput {
            status: 0,
            stdout: stdout.into(),
            stderr: String::new(),
            cancelled: false,
        }
    }

    /// Create a failure output with the given stderr and status code.
    pub fn failure(status: i32, stderr: impl Into<String>) -> Self {
        MockProcessOutput {
            status,
            stdout: String::new(),
            stderr: stderr.into(),
            cancelled: false,
        }
    }

    /// Create an output for a call the user cancelled.
    pub fn cancelled() -> Self {
        MockProcessOutput {
            cancelled: true,
            ..MockProcessOutput::default()
        }
    }
}

impl Default for MockProcessOutput {
    fn default() -> Self {
        MockProcessOutput::success("")
    }
}

/// Pattern for matching poetry argument vectors.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on the joined arguments.
    Exact(String),
    /// Match if the joined arguments start with prefix.
    StartsWith(String),
    /// Match anything.
    Any,
}

impl CommandPattern {
    /// Check if this pattern matches the given joined arguments.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::StartsWith(s) => cmd.starts_with(s.as_str()),
            CommandPattern::Any => true,
        }
    }
}

/// Scripted [`Runner`] that records every call.
///
/// The first matching expectation wins; unmatched calls succeed with empty
/// output.
#[derive(Debug, Default)]
pub struct MockRunner {
    expectations: Vec<(CommandPattern, MockProcessOutput)>,
    calls: Mutex<Vec<Vec<String>>>,
    timeouts: Mutex<Vec<Option<Duration>>>,
}

impl MockRunner {
    /// Create a runner with no expectations.
    pub fn new() -> Self {
        MockRunner::default()
    }

    /// Return `stdout` for exactly these arguments.
    pub fn with_output(self, args: &[&str], stdout: &str) -> Self {
        self.with_pattern(
            CommandPattern::Exact(args.join(" ")),
            MockProcessOutput::success(stdout),
        )
    }

    /// Fail with `status` for exactly these arguments.
    pub fn with_failure(self, args: &[&str], status: i32) -> Self {
        self.with_pattern(
            CommandPattern::Exact(args.join(" ")),
            MockProcessOutput::failure(status, "mock failure"),
        )
    }

    /// Report cancellation for exactly these arguments.
    pub fn with_cancelled(self, args: &[&str]) -> Self {
        self.with_pattern(
            CommandPattern::Exact(args.join(" ")),
            MockProcessOutput::cancelled(),
        )
    }

    /// Add a custom expectation.
    pub fn with_pattern(mut self, pattern: CommandPattern, output: MockProcessOutput) -> Self {
        self.expectations.push((pattern, output));
        self
    }

    /// Argument vectors of every call, in order.
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }

    /// Timeouts passed with every call, in order.
    pub fn timeouts(&self) -> Vec<Option<Duration>> {
        self.timeouts.lock().unwrap().clone()
    }

    /// Number of calls with exactly these arguments.
    pub fn count(&self, args: &[&str]) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.iter().map(String::as_str).eq(args.iter().copied()))
            .count()
    }
}

impl Runner for MockRunner {
    fn run(
        &self,
        _project: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, ProcessError> {
        let joined = args.join(" ");
        self.calls
            .lock()
            .unwrap()
            .push(args.iter().map(|a| a.to_string()).collect());
        self.timeouts.lock().unwrap().push(timeout);

        let output = self
            .expectations
            .iter()
            .find(|(pattern, _)| pattern.matches(&joined))
            .map(|(_, output)| output.clone())
            .unwrap_or_default();

        if output.cancelled {
            return Err(ProcessError::Cancelled {
                command: format!("poetry {}", joined),
            });
        }
        if output.status != 0 {
            return Err(ProcessError::NonZeroExit {
                command: format!("poetry {}", joined),
                exit_code: Some(output.status),
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_runner_scripts_and_records() {
        let runner = MockRunner::new()
            .with_output(&["--version"], "Poetry (version 1.8.3)")
            .with_failure(&["lock"], 2)
            .with_pattern(
                CommandPattern::StartsWith("env".into()),
                MockProcessOutput::success("/envs/x"),
            );

        let dir = Path::new("/p");
        assert_eq!(runner.run(dir, &["--version"], None).unwrap(), "Poetry (version 1.8.3)");
        assert_eq!(runner.run(dir, &["env", "info", "-p"], None).unwrap(), "/envs/x");
        assert_eq!(runner.run(dir, &["update"], None).unwrap(), "");
        assert!(matches!(
            runner.run(dir, &["lock"], None),
            Err(ProcessError::NonZeroExit { exit_code: Some(2), .. })
        ));

        assert_eq!(runner.calls().len(), 4);
        assert_eq!(runner.count(&["lock"]), 1);
    }

    #[test]
    fn test_mock_runner_cancellation() {
        let runner = MockRunner::new().with_cancelled(&["install"]);
        let err = runner.run(Path::new("/p"), &["install"], None).unwrap_err();
        assert!(err.is_cancelled());
    }
}
