//! `stanza locate` command

use anyhow::Result;
use serde_json::json;

use crate::GlobalOptions;
use stanza::util::process::ProcessError;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let ctx = opts.context()?;

    let path = ctx
        .poetry_executable()
        .ok_or(ProcessError::ExecutableNotFound)?;
    opts.shell
        .output(path.display(), &json!({ "path": path }));

    Ok(())
}
