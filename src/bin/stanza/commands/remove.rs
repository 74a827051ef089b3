//! `stanza remove` command

use anyhow::Result;

use super::{echo, with_span};
use crate::cli::PackagesArgs;
use crate::GlobalOptions;
use stanza::util::shell::Status;

pub fn execute(args: PackagesArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let manager = ctx.package_manager(ctx.project_root()?);

    let names = args.names.join(", ");
    let output = with_span(shell, Status::Removing, Status::Removed, &names, || {
        manager.remove(&args.names)
    })?;
    echo(shell, &output);

    Ok(())
}
