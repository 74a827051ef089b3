//! Centralized shell output.
//!
//! Commands report through a [`Shell`]: right-aligned status lines, a
//! spinner while poetry runs, and a JSON mode that replaces all human output
//! with one JSON document per line on stdout.

use std::fmt::Display;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::util::diagnostic::{Diagnostic, Severity};

/// Shell output mode. Human and Json are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellMode {
    /// Human-readable output with optional colors and spinners.
    Human {
        verbosity: Verbosity,
        color: ColorChoice,
    },
    /// Machine-readable JSON output only.
    Json,
}

impl Default for ShellMode {
    fn default() -> Self {
        ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Auto,
        }
    }
}

/// Output verbosity level (Human mode only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// --quiet: errors only
    Quiet,
    #[default]
    Normal,
    /// --verbose: no spinners, poetry output echoed
    Verbose,
}

/// Color output mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

/// Semantic status of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Added,
    Created,
    Finished,
    Installed,
    Locked,
    Removed,
    Updated,

    Adding,
    Checking,
    Installing,
    Locking,
    Removing,
    Running,
    Updating,

    Info,
    Warning,
    Error,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Status::Added => "Added",
            Status::Created => "Created",
            Status::Finished => "Finished",
            Status::Installed => "Installed",
            Status::Locked => "Locked",
            Status::Removed => "Removed",
            Status::Updated => "Updated",
            Status::Adding => "Adding",
            Status::Checking => "Checking",
            Status::Installing => "Installing",
            Status::Locking => "Locking",
            Status::Removing => "Removing",
            Status::Running => "Running",
            Status::Updating => "Updating",
            Status::Info => "Info",
            Status::Warning => "Warning",
            Status::Error => "error",
        }
    }

    /// ANSI SGR code: green when done, cyan while working.
    fn sgr(self) -> &'static str {
        match self {
            Status::Adding
            | Status::Checking
            | Status::Installing
            | Status::Locking
            | Status::Removing
            | Status::Running
            | Status::Updating => "1;36",
            Status::Info => "1;34",
            Status::Warning => "1;33",
            Status::Error => "1;31",
            _ => "1;32",
        }
    }
}

const STATUS_WIDTH: usize = 12;

/// Central shell for all CLI output.
#[derive(Debug)]
pub struct Shell {
    mode: ShellMode,
    use_color: bool,
}

impl Shell {
    /// Create a new shell with the given mode.
    pub fn new(mode: ShellMode) -> Self {
        let use_color = match &mode {
            ShellMode::Json => false,
            ShellMode::Human { color, .. } => match color {
                ColorChoice::Auto => io::stderr().is_terminal(),
                ColorChoice::Always => true,
                ColorChoice::Never => false,
            },
        };

        Shell { mode, use_color }
    }

    /// Create a shell from CLI flags. JSON takes precedence over quiet/verbose.
    pub fn from_flags(quiet: bool, verbose: bool, no_color: bool, json: bool) -> Self {
        let mode = if json {
            ShellMode::Json
        } else {
            let verbosity = if quiet {
                Verbosity::Quiet
            } else if verbose {
                Verbosity::Verbose
            } else {
                Verbosity::Normal
            };
            let color = if no_color {
                ColorChoice::Never
            } else {
                ColorChoice::Auto
            };
            ShellMode::Human { verbosity, color }
        };

        Shell::new(mode)
    }

    pub fn is_quiet(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Quiet,
                ..
            }
        )
    }

    pub fn is_verbose(&self) -> bool {
        matches!(
            self.mode,
            ShellMode::Human {
                verbosity: Verbosity::Verbose,
                ..
            }
        )
    }

    pub fn is_json(&self) -> bool {
        matches!(self.mode, ShellMode::Json)
    }

    pub fn use_color(&self) -> bool {
        self.use_color
    }

    /// Print a status line to stderr: `{status:>12} {message}`.
    ///
    /// Quiet mode keeps only errors; JSON mode drops everything.
    pub fn status(&self, status: Status, msg: impl Display) {
        if self.is_json() || (self.is_quiet() && status != Status::Error) {
            return;
        }
        eprintln!("{} {}", self.format_status(status), msg);
    }

    /// Print an info message.
    pub fn note(&self, msg: impl Display) {
        self.status(Status::Info, msg);
    }

    /// Print a warning message.
    pub fn warn(&self, msg: impl Display) {
        self.status(Status::Warning, msg);
    }

    /// Print an error message, as a JSON event in JSON mode.
    pub fn error(&self, msg: impl Display) {
        if self.is_json() {
            self.json_event(&serde_json::json!({
                "reason": "error",
                "message": msg.to_string(),
            }));
        } else {
            self.status(Status::Error, msg);
        }
    }

    /// Report a diagnostic.
    pub fn diagnostic(&self, diagnostic: &Diagnostic) {
        if self.is_json() {
            self.json_event(&serde_json::json!({
                "reason": "diagnostic",
                "severity": diagnostic.severity.to_string(),
                "message": diagnostic.message,
                "location": diagnostic.location.as_ref().map(|p| p.display().to_string()),
                "context": diagnostic.context,
                "suggestions": diagnostic.suggestions,
            }));
            return;
        }
        if self.is_quiet() && diagnostic.severity != Severity::Error {
            return;
        }
        eprint!("{}", diagnostic.format(self.use_color));
    }

    /// Print a JSON event to stdout. Ignored in human mode.
    pub fn json_event(&self, event: &serde_json::Value) {
        if !self.is_json() {
            return;
        }
        println!("{}", event);
        let _ = io::stdout().flush();
    }

    /// Print command output: `human` in human mode, `json` in JSON mode.
    ///
    /// Command output goes to stdout and survives `--quiet`.
    pub fn output(&self, human: impl Display, json: &serde_json::Value) {
        if self.is_json() {
            self.json_event(json);
        } else {
            println!("{}", human);
        }
    }

    fn format_status(&self, status: Status) -> String {
        let padded = format!("{:>width$}", status.label(), width = STATUS_WIDTH);
        if self.use_color {
            format!("\x1b[{}m{}\x1b[0m", status.sgr(), padded)
        } else {
            padded
        }
    }

    /// Start a timed span for a long-running poetry command.
    pub fn span(self: &Arc<Self>, status: Status, msg: impl Display) -> Span {
        Span::new(Arc::clone(self), status, msg.to_string())
    }
}

impl Default for Shell {
    fn default() -> Self {
        Shell::new(ShellMode::default())
    }
}

/// A timed span around a poetry invocation.
///
/// Normal mode shows a spinner on a terminal; verbose mode prints the start
/// line immediately instead. Dropping an unfinished span prints nothing.
pub struct Span {
    shell: Arc<Shell>,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Span {
    fn new(shell: Arc<Shell>, status: Status, message: String) -> Self {
        let interactive = !shell.is_quiet()
            && !shell.is_verbose()
            && !shell.is_json()
            && io::stderr().is_terminal();

        let spinner = if interactive {
            let pb = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {prefix:>12.cyan.bold} {msg}")
            {
                pb.set_style(style);
            }
            pb.set_prefix(status.label());
            pb.set_message(message);
            pb.enable_steady_tick(Duration::from_millis(100));
            Some(pb)
        } else {
            shell.status(status, &message);
            None
        };

        Span {
            shell,
            start: Instant::now(),
            spinner,
        }
    }

    /// Finish with `status` and `msg`, followed by the elapsed time.
    pub fn finish(mut self, status: Status, msg: impl Display) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        let elapsed = format_duration(self.start.elapsed());
        self.shell.status(status, format!("{} in {}", msg, elapsed));
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
    }
}

/// Format a duration in a human-readable way.
fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{:.2}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain() -> Shell {
        Shell::new(ShellMode::Human {
            verbosity: Verbosity::Normal,
            color: ColorChoice::Never,
        })
    }

    #[test]
    fn test_shell_modes() {
        let shell = plain();
        assert!(!shell.is_quiet());
        assert!(!shell.is_verbose());
        assert!(!shell.is_json());
        assert!(!shell.use_color());

        assert!(Shell::new(ShellMode::Json).is_json());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(500)), "0.50s");
        assert_eq!(format_duration(Duration::from_secs(2)), "2.00s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn test_status_is_right_aligned() {
        let formatted = plain().format_status(Status::Locking);
        assert_eq!(formatted, "     Locking");
        assert_eq!(formatted.len(), STATUS_WIDTH);
    }

    #[test]
    fn test_from_flags() {
        assert!(Shell::from_flags(true, false, true, false).is_quiet());
        assert!(Shell::from_flags(false, true, true, false).is_verbose());

        let shell = Shell::from_flags(true, true, false, true);
        assert!(shell.is_json());
        assert!(!shell.is_quiet());
    }
}
