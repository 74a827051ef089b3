//! `stanza install` command

use anyhow::Result;

use super::{echo, with_span};
use crate::cli::InstallArgs;
use crate::GlobalOptions;
use stanza::core::manifest::PoetryManifest;
use stanza::ops::poetry::InstallOptions;
use stanza::util::shell::Status;

pub fn execute(args: InstallArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let root = ctx.project_root()?;

    if !args.extras.is_empty() {
        if let Some(manifest) = PoetryManifest::load(&ctx.manifest_path()?)? {
            for extra in args.extras.iter().filter(|e| !manifest.has_extra(e)) {
                shell.warn(format!("extra `{}` is not declared in [tool.poetry.extras]", extra));
            }
        }
    }

    let manager = ctx.package_manager(root);
    let output = with_span(shell, Status::Installing, Status::Installed, "dependencies", || {
        match args.extras.as_slice() {
            [extra] if !args.no_root => manager.install_extras(extra),
            _ => manager.install(&InstallOptions {
                no_root: args.no_root,
                extras: args.extras.clone(),
            }),
        }
    })?;
    echo(shell, &output);

    let pending = manager.requirements();
    if !pending.is_empty() {
        shell.warn(format!("{} package(s) still pending installation", pending.len()));
    }

    Ok(())
}
