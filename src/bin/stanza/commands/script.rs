//! `stanza script` command

use anyhow::Result;

use crate::cli::ScriptArgs;
use crate::GlobalOptions;
use stanza::core::manifest::PoetryManifest;
use stanza::ops::poetry::{env_info_path, resolve_script};
use stanza::util::context::ProjectError;
use stanza::util::process::ProcessBuilder;
use stanza::util::shell::Status;

pub fn execute(args: ScriptArgs, opts: &GlobalOptions) -> Result<()> {
    let ctx = opts.context()?;
    let root = ctx.project_root()?;
    let manifest = PoetryManifest::load(&ctx.manifest_path()?)?.ok_or_else(|| {
        ProjectError::NotFound {
            dir: root.to_path_buf(),
        }
    })?;

    let env = env_info_path(ctx.runner().as_ref(), root)?;
    let script = resolve_script(&manifest, &env, &args.name)?;

    opts.shell.status(Status::Running, script.display());
    let status = ProcessBuilder::new(&script)
        .args(args.args)
        .cwd(root)
        .status()?;

    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
