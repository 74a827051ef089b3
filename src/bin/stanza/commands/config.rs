//! `stanza config` commands

use anyhow::{Context, Result};
use serde_json::json;

use crate::cli::{ConfigArgs, ConfigCommands};
use crate::GlobalOptions;
use stanza::util::config::{global_config_path, set_poetry_path};
use stanza::util::fs::is_executable;
use stanza::util::shell::Status;

pub fn execute(args: ConfigArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;

    match args.command {
        ConfigCommands::Show => {
            let ctx = opts.context()?;
            let human = toml::to_string_pretty(ctx.config()).context("failed to render config")?;
            let value = serde_json::to_value(ctx.config()).context("failed to render config")?;
            shell.output(human.trim_end(), &json!({ "reason": "config", "config": value }));
        }

        ConfigCommands::SetPath { path } => {
            let config_path =
                global_config_path().context("could not determine the home directory")?;
            if !is_executable(&path) {
                shell.warn(format!("{} is not an executable file", path.display()));
            }
            set_poetry_path(&config_path, &path)?;
            shell.status(
                Status::Updated,
                format!("poetry path in {}", config_path.display()),
            );
        }
    }

    Ok(())
}
