//! Subprocess execution utilities.
//!
//! [`ProcessBuilder`] spawns a program and collects its output, optionally
//! under a timeout and a cooperative cancellation token. On Unix the child
//! leads its own process group so that cancellation kills everything it
//! spawned. [`PoetryRunner`] layers executable lookup and the exit-code
//! policy on top, behind the [`Runner`] trait.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use thiserror::Error;

use crate::util::diagnostic::{suggestions, Diagnostic, Severity};
use crate::util::fs::is_executable;

/// Wall-clock limit for best-effort queries.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Error running a subprocess.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("poetry executable not found")]
    ExecutableNotFound,

    #[error("`{command}` was cancelled")]
    Cancelled { command: String },

    #[error("`{command}` failed with {}", describe_exit(*exit_code))]
    NonZeroExit {
        command: String,
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("`{command}` timed out after {}s", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },

    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl ProcessError {
    /// Check whether this error is a user-initiated abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProcessError::Cancelled { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ProcessError::ExecutableNotFound => Diagnostic::error("Poetry executable not found")
                .with_context("searched the configured path, PATH and ~/.poetry/bin")
                .with_suggestion(suggestions::CONFIGURE_PATH)
                .with_suggestion(suggestions::INSTALL_POETRY),

            ProcessError::Cancelled { command } => {
                Diagnostic::new(Severity::Note, format!("`{}` was cancelled", command))
            }

            ProcessError::NonZeroExit {
                command,
                exit_code,
                stdout,
                stderr,
            } => {
                let mut diag = Diagnostic::error(format!(
                    "`{}` failed with {}",
                    command,
                    describe_exit(*exit_code)
                ));
                let detail = if stderr.trim().is_empty() { stdout } else { stderr };
                for line in detail.lines().filter(|l| !l.trim().is_empty()) {
                    diag = diag.with_context(line.trim_end());
                }
                diag
            }

            ProcessError::TimedOut { command, timeout } => Diagnostic::error(format!(
                "`{}` did not finish within {}s",
                command,
                timeout.as_secs()
            ))
            .with_suggestion("Raise `timeout` under `[poetry]` in .stanza/config.toml"),

            ProcessError::Spawn { command, source } => {
                Diagnostic::error(format!("failed to run `{}`", command))
                    .with_context(source.to_string())
                    .with_suggestion(suggestions::CONFIGURE_PATH)
            }
        }
    }
}

/// Cooperative cancellation signal shared between a caller and a runner.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        CancellationToken::default()
    }

    /// Signal cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// How captured standard output is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputTrim {
    /// Remove a single trailing newline
    #[default]
    TrailingNewline,
    /// Return output byte for byte
    Verbatim,
}

impl OutputTrim {
    /// Pick the mode from the `trim-output` setting.
    pub fn from_flag(trim: bool) -> Self {
        if trim {
            OutputTrim::TrailingNewline
        } else {
            OutputTrim::Verbatim
        }
    }

    /// Apply the trimming mode.
    pub fn apply(self, mut output: String) -> String {
        if self == OutputTrim::TrailingNewline && output.ends_with('\n') {
            output.pop();
            if output.ends_with('\r') {
                output.pop();
            }
        }
        output
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code (None if killed by signal)
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    /// Check if the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Builder for subprocess execution.
#[derive(Debug, Clone)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    /// Get the program path.
    pub fn get_program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }

    /// Execute and collect output, with no timeout or cancellation.
    pub fn exec(&self) -> Result<ProcessOutput, ProcessError> {
        self.exec_with(None, None)
    }

    /// Execute and collect output.
    ///
    /// The child is killed, together with anything it spawned, when `cancel`
    /// fires or `timeout` elapses.
    pub fn exec_with(
        &self,
        cancel: Option<&CancellationToken>,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, ProcessError> {
        let command = self.display_command();
        let mut cmd = self.build_command();
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!("running `{}`", command);
        let mut child = cmd.spawn().map_err(|source| ProcessError::Spawn {
            command: command.clone(),
            source,
        })?;

        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let start = Instant::now();
        let deadline = timeout.map(|limit| start + limit);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    kill_tree(&mut child);
                    return Err(ProcessError::Spawn { command, source });
                }
            }

            if cancel.is_some_and(CancellationToken::is_cancelled) {
                tracing::debug!("cancelling `{}`", command);
                kill_tree(&mut child);
                return Err(ProcessError::Cancelled { command });
            }

            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    tracing::warn!("`{}` timed out after {:?}", command, limit);
                    kill_tree(&mut child);
                    return Err(ProcessError::TimedOut {
                        command,
                        timeout: limit,
                    });
                }
            }

            thread::sleep(POLL_INTERVAL);
        };

        // Background children may still hold the pipes open.
        kill_leftovers(&child);

        let output = ProcessOutput {
            exit_code: status.code(),
            stdout: drain(&stdout, deadline),
            stderr: drain(&stderr, deadline),
        };
        tracing::debug!("`{}` exited with {:?}", command, output.exit_code);
        Ok(output)
    }

    /// Execute with inherited stdio and return the exit status.
    pub fn status(&self) -> anyhow::Result<ExitStatus> {
        let mut cmd = self.build_command();
        let status = cmd
            .status()
            .with_context(|| format!("failed to execute `{}`", self.program.display()))?;
        Ok(status)
    }

    /// Display the command for error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

fn spawn_reader<R: Read + Send + 'static>(pipe: Option<R>) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Wait for a reader, giving up at `deadline`.
fn drain(reader: &Receiver<String>, deadline: Option<Instant>) -> String {
    let result = match deadline {
        Some(deadline) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            reader.recv_timeout(remaining.max(POLL_INTERVAL))
        }
        None => reader.recv().map_err(|_| RecvTimeoutError::Disconnected),
    };
    match result {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!("output reader gave up: {:?}", e);
            String::new()
        }
    }
}

#[cfg(unix)]
fn signal_group(child: &Child) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pgid) = i32::try_from(child.id()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        tracing::trace!("killpg {}: {}", pgid, e);
    }
}

#[cfg(unix)]
fn kill_tree(child: &mut Child) {
    signal_group(child);
    let _ = child.wait();
}

/// Kill whatever the exited child left running in its process group.
#[cfg(unix)]
fn kill_leftovers(child: &Child) {
    signal_group(child);
}

#[cfg(not(unix))]
fn kill_leftovers(_child: &Child) {}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Platform-specific names of the poetry executable, in lookup order.
pub fn poetry_executable_names() -> &'static [&'static str] {
    if cfg!(windows) {
        &["poetry.exe", "poetry.bat", "poetry"]
    } else {
        &["poetry"]
    }
}

/// Locate the poetry executable.
///
/// Order: the configured path if it is an executable file, then `PATH`, then
/// `<home>/.poetry/bin`. Never fails; absence is `None`.
pub fn locate_poetry(configured: Option<&Path>) -> Option<PathBuf> {
    let search_path = std::env::var_os("PATH");
    let home = directories::BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    locate_poetry_in(configured, search_path.as_deref(), home.as_deref())
}

/// Locate the poetry executable against an explicit search path and home.
pub fn locate_poetry_in(
    configured: Option<&Path>,
    search_path: Option<&std::ffi::OsStr>,
    home: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = configured {
        if is_executable(path) {
            return Some(path.to_path_buf());
        }
        tracing::debug!(
            "configured poetry path {} is not an executable file",
            path.display()
        );
    }

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    for name in poetry_executable_names() {
        if let Ok(found) = which::which_in(name, search_path, &cwd) {
            return Some(found);
        }
    }

    let bin_dir = home?.join(".poetry").join("bin");
    poetry_executable_names()
        .iter()
        .map(|name| bin_dir.join(name))
        .find(|candidate| is_executable(candidate))
}

/// Runs poetry commands in a project directory.
pub trait Runner: Send + Sync {
    /// Run poetry with `args` in `project` and return its standard output.
    fn run(
        &self,
        project: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, ProcessError>;

    /// Time limit applied by [`Runner::run_or_default`].
    fn query_timeout(&self) -> Duration {
        DEFAULT_TIMEOUT
    }

    /// Best-effort query: bounded wait, `default` on any failure.
    fn run_or_default(&self, project: &Path, args: &[&str], default: &str) -> String {
        match self.run(project, args, Some(self.query_timeout())) {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("`poetry {}` fell back to default: {}", args.join(" "), e);
                default.to_string()
            }
        }
    }
}

/// [`Runner`] backed by a real poetry executable.
#[derive(Debug, Clone)]
pub struct PoetryRunner {
    executable: Option<PathBuf>,
    trim: OutputTrim,
    query_timeout: Duration,
    cancel: CancellationToken,
}

impl PoetryRunner {
    /// Create a runner for the given executable (`None` when not found).
    pub fn new(executable: Option<PathBuf>) -> Self {
        PoetryRunner {
            executable,
            trim: OutputTrim::default(),
            query_timeout: DEFAULT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Set the output trimming mode.
    pub fn with_trim(mut self, trim: OutputTrim) -> Self {
        self.trim = trim;
        self
    }

    /// Set the limit for best-effort queries.
    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// Share a cancellation token with the caller.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Get the executable this runner invokes.
    pub fn executable(&self) -> Option<&Path> {
        self.executable.as_deref()
    }

    /// Get the cancellation token.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl Runner for PoetryRunner {
    fn run(
        &self,
        project: &Path,
        args: &[&str],
        timeout: Option<Duration>,
    ) -> Result<String, ProcessError> {
        let executable = self
            .executable
            .as_ref()
            .ok_or(ProcessError::ExecutableNotFound)?;

        let builder = ProcessBuilder::new(executable)
            .args(args.iter().copied())
            .cwd(project);
        let output = builder.exec_with(Some(&self.cancel), timeout)?;

        if !output.success() {
            return Err(ProcessError::NonZeroExit {
                command: builder.display_command(),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            });
        }

        Ok(self.trim.apply(output.stdout))
    }

    fn query_timeout(&self) -> Duration {
        self.query_timeout
    }
}
