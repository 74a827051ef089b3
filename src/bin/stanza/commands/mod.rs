//! Command implementations

pub mod add;
pub mod check;
pub mod completions;
pub mod config;
pub mod env;
pub mod install;
pub mod locate;
pub mod lock;
pub mod lockfile;
pub mod manifest;
pub mod outdated;
pub mod remove;
pub mod run;
pub mod script;
pub mod update;
pub mod version;

use std::fmt::Display;
use std::sync::Arc;

use anyhow::Result;

use stanza::util::process::ProcessError;
use stanza::util::shell::{Shell, Status};

/// Run a poetry action inside a span, finishing with `done` on success.
pub(crate) fn with_span<T>(
    shell: &Arc<Shell>,
    status: Status,
    done: Status,
    msg: impl Display,
    action: impl FnOnce() -> Result<T, ProcessError>,
) -> Result<T> {
    let span = shell.span(status, &msg);
    let value = action()?;
    span.finish(done, msg);
    Ok(value)
}

/// Echo captured poetry output in verbose mode.
pub(crate) fn echo(shell: &Shell, output: &str) {
    if shell.is_verbose() && !output.trim().is_empty() {
        eprintln!("{}", output.trim_end());
    }
}
