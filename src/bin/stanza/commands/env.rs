//! `stanza env` commands

use anyhow::Result;
use serde_json::json;

use super::{echo, with_span};
use crate::cli::{EnvArgs, EnvCommands};
use crate::GlobalOptions;
use stanza::ops::env::env_python;
use stanza::ops::environment::is_poetry_environment;
use stanza::ops::poetry;
use stanza::util::shell::Status;

pub fn execute(args: EnvArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let runner = ctx.runner();
    let dir = ctx.work_dir();

    match args.command {
        EnvCommands::List => {
            let envs = poetry::env_list(runner.as_ref(), dir);
            let human = envs
                .iter()
                .map(|e| {
                    if e.activated {
                        format!("{} (Activated)", e.path.display())
                    } else {
                        e.path.display().to_string()
                    }
                })
                .collect::<Vec<_>>()
                .join("\n");
            shell.output(human, &json!({ "reason": "env-list", "environments": envs }));
        }

        EnvCommands::Info => {
            let env = poetry::env_info_path(runner.as_ref(), dir)?;
            let python = env_python(&env);
            shell.output(
                format!("path:   {}\npython: {}", env.display(), python.display()),
                &json!({ "reason": "env-info", "path": env, "python": python }),
            );
        }

        EnvCommands::Use { python } => {
            let output = with_span(shell, Status::Updating, Status::Updated, &python, || {
                poetry::env_use(runner.as_ref(), dir, &python)
            })?;
            echo(shell, &output);
        }

        EnvCommands::InProject => {
            let value = poetry::in_project(runner.as_ref(), dir);
            let human = match value {
                Some(v) => v.to_string(),
                None => "unset".to_string(),
            };
            shell.output(human, &json!({ "reason": "env-in-project", "in-project": value }));
        }

        EnvCommands::Check { interpreter } => {
            let project = ctx.project_root()?;
            let valid = is_poetry_environment(
                runner.as_ref(),
                ctx.environments(),
                Some(project),
                Some(&interpreter),
            );
            let human = if valid {
                format!("{} belongs to the project environment", interpreter.display())
            } else {
                format!("{} is not the project environment", interpreter.display())
            };
            shell.output(
                human,
                &json!({ "reason": "env-check", "interpreter": interpreter, "valid": valid }),
            );
        }

        EnvCommands::Setup { python, install } => {
            let env = with_span(shell, Status::Installing, Status::Created, "environment", || {
                poetry::setup_environment(runner.as_ref(), dir, python.as_deref(), install)
            })?;
            shell.output(env.display(), &json!({ "reason": "env-setup", "path": env }));
        }
    }

    Ok(())
}
