//! `stanza outdated` command

use anyhow::Result;
use serde_json::json;

use super::with_span;
use crate::GlobalOptions;
use stanza::ops::poetry;
use stanza::util::shell::Status;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let root = ctx.project_root()?;
    let runner = ctx.runner();

    let entries = with_span(shell, Status::Checking, Status::Finished, "for newer releases", || {
        poetry::show_outdated(runner.as_ref(), root)
    })?;

    if shell.is_json() {
        shell.json_event(&json!({
            "reason": "outdated",
            "packages": entries.values().collect::<Vec<_>>(),
        }));
        return Ok(());
    }

    if entries.is_empty() {
        shell.note("all packages are up to date");
        return Ok(());
    }

    let width = entries.keys().map(String::len).max().unwrap_or(0);
    for entry in entries.values() {
        println!(
            "{:<width$}  {} -> {}",
            entry.name,
            entry.current_version,
            entry.latest_version,
            width = width
        );
    }

    Ok(())
}
