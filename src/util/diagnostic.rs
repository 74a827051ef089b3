//! User-facing diagnostic messages.
//!
//! Every diagnostic carries the root cause plus suggested fixes, mirroring
//! the quick fixes an editor would offer.

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use miette::{Diagnostic as MietteDiagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when requirements are not satisfied.
    pub const RUN_INSTALL: &str = "Run `poetry install` (or `stanza install`)";

    /// Suggestion when the lockfile is missing.
    pub const RUN_LOCK: &str = "Run `poetry lock` (or `stanza lock`)";

    /// Suggestion when the lockfile is out of date.
    pub const RUN_LOCK_NO_UPDATE: &str =
        "Run `poetry lock --no-update` to refresh the lock without upgrading";

    /// Suggestion when the lockfile is out of date and upgrades are wanted.
    pub const RUN_UPDATE: &str = "Run `poetry update` (or `stanza update`)";

    /// Suggestion when the poetry executable cannot be found.
    pub const CONFIGURE_PATH: &str =
        "Set the executable with `stanza config set-path <PATH>` or `--poetry <PATH>`";

    /// Suggestion when poetry is not installed at all.
    pub const INSTALL_POETRY: &str = "Install Poetry: https://python-poetry.org/docs/#installation";

    /// Suggestion when no manifest file is found.
    pub const NO_MANIFEST: &str = "Run `stanza env setup` to create a Poetry project here";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Severity {
    #[default]
    Error,
    Warning,
    Note,
    Help,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Note => "note",
            Severity::Help => "help",
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            Severity::Error => "1;31",
            Severity::Warning => "1;33",
            Severity::Note => "1;36",
            Severity::Help => "1;32",
        }
    }

    /// Label, wrapped in its ANSI color when `color` is set.
    fn label(self, color: bool) -> String {
        if color {
            format!("\x1b[{}m{}\x1b[0m", self.ansi(), self.as_str())
        } else {
            self.as_str().to_string()
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (file path)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a diagnostic with the given severity.
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic::new(Severity::Warning, message)
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a file location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    ///
    /// ```text
    /// error: message
    ///   --> location
    ///   → context
    ///
    /// help: consider:
    ///   1. suggestion
    /// ```
    pub fn format(&self, color: bool) -> String {
        let mut out = String::new();
        let _ = self.render(&mut out, color);
        out
    }

    fn render(&self, out: &mut impl fmt::Write, color: bool) -> fmt::Result {
        writeln!(out, "{}: {}", self.severity.label(color), self.message)?;
        if let Some(path) = &self.location {
            writeln!(out, "  --> {}", path.display())?;
        }
        for line in &self.context {
            writeln!(out, "  → {}", line)?;
        }

        if self.suggestions.is_empty() {
            return Ok(());
        }
        writeln!(out)?;
        writeln!(out, "{}: consider:", Severity::Help.label(color))?;
        for (n, suggestion) in self.suggestions.iter().enumerate() {
            writeln!(out, "  {}. {}", n + 1, suggestion)?;
        }
        Ok(())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false)
    }
}

/// Syntax error in a lockfile, rendered with the offending source span.
#[derive(Debug, Error, MietteDiagnostic)]
#[error("`{file}` could not be parsed")]
#[diagnostic(
    code(stanza::lockfile::syntax),
    help("Regenerate the file with `poetry lock --no-update`")
)]
pub struct LockSyntaxError {
    pub file: String,
    #[source_code]
    pub src: NamedSource<String>,
    #[label("{message}")]
    pub span: Option<SourceSpan>,
    pub message: String,
}

impl LockSyntaxError {
    /// Build from the file name, its content and the parser's report.
    pub fn new(
        file: impl Into<String>,
        content: impl Into<String>,
        message: impl Into<String>,
        span: Option<Range<usize>>,
    ) -> Self {
        let file = file.into();
        LockSyntaxError {
            src: NamedSource::new(file.clone(), content.into()),
            span: span.map(SourceSpan::from),
            message: message.into(),
            file,
        }
    }
}
