//! `stanza run` command
//!
//! Runs `poetry run` with inherited stdio so interactive programs work.

use anyhow::Result;

use crate::cli::RunArgs;
use crate::GlobalOptions;
use stanza::util::process::{ProcessBuilder, ProcessError};

pub fn execute(args: RunArgs, opts: &GlobalOptions) -> Result<()> {
    let ctx = opts.context()?;
    let poetry = ctx
        .poetry_executable()
        .ok_or(ProcessError::ExecutableNotFound)?;

    let status = ProcessBuilder::new(poetry)
        .arg("run")
        .args(args.args)
        .cwd(ctx.work_dir())
        .status()?;

    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
