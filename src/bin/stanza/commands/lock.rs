//! `stanza lock` command

use anyhow::Result;

use super::{echo, with_span};
use crate::cli::LockArgs;
use crate::GlobalOptions;
use stanza::core::lockfile::POETRY_LOCK;
use stanza::util::shell::Status;

pub fn execute(args: LockArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let manager = ctx.package_manager(ctx.project_root()?);

    let output = with_span(shell, Status::Locking, Status::Locked, POETRY_LOCK, || {
        manager.lock(args.no_update)
    })?;
    echo(shell, &output);

    Ok(())
}
