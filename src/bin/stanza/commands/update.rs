//! `stanza update` command

use anyhow::Result;

use super::{echo, with_span};
use crate::GlobalOptions;
use stanza::util::shell::Status;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let manager = ctx.package_manager(ctx.project_root()?);

    let output = with_span(shell, Status::Updating, Status::Updated, "dependencies", || {
        manager.update()
    })?;
    echo(shell, &output);

    let pending = manager.requirements();
    if !pending.is_empty() {
        shell.warn(format!("{} package(s) still pending installation", pending.len()));
    }

    Ok(())
}
