//! `stanza version` command

use anyhow::Result;
use serde_json::json;

use crate::GlobalOptions;
use stanza::ops::poetry;
use stanza::util::process::ProcessError;

pub fn execute(opts: &GlobalOptions) -> Result<()> {
    let ctx = opts.context()?;
    if ctx.poetry_executable().is_none() {
        return Err(ProcessError::ExecutableNotFound.into());
    }

    let version = poetry::version(ctx.runner().as_ref(), ctx.work_dir());
    let poetry = version
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "unknown".to_string());

    opts.shell.output(
        format!("stanza {}\npoetry {}", env!("CARGO_PKG_VERSION"), poetry),
        &json!({
            "reason": "version",
            "stanza": env!("CARGO_PKG_VERSION"),
            "poetry": version.map(|v| v.to_string()),
        }),
    );

    Ok(())
}
