//! `stanza lockfile` command

use anyhow::{bail, Result};
use serde_json::json;

use crate::cli::LockfileArgs;
use crate::GlobalOptions;
use stanza::core::lockfile::{load_lock, LockError, LockFile, LockOutcome, POETRY_LOCK};
use stanza::ops::poetry::{lock_diagnostic, LockStatus};
use stanza::util::diagnostic::LockSyntaxError;
use stanza::util::fs;

pub fn execute(args: LockfileArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let path = ctx.lock_path()?;

    if args.validate {
        if let Err(LockError::Malformed { message, span }) = load_lock(&path) {
            let content = fs::read_to_string(&path)?;
            let report = miette::Report::new(LockSyntaxError::new(
                path.display().to_string(),
                content,
                message,
                span,
            ));
            eprintln!("{:?}", report);
            bail!("{} is malformed", POETRY_LOCK);
        }
    }

    let outcome = ctx.locks().load(&path)?;
    let lock = match &*outcome {
        LockOutcome::Missing => {
            if let Some(diag) = lock_diagnostic(LockStatus::NotFound, ctx.project_root()?) {
                shell.diagnostic(&diag);
            }
            bail!("no {} in {}", POETRY_LOCK, ctx.project_root()?.display());
        }
        LockOutcome::Empty => {
            shell.warn(format!("{} has no package data", POETRY_LOCK));
            shell.json_event(&json!({ "reason": "lockfile", "packages": [] }));
            return Ok(());
        }
        LockOutcome::Parsed(lock) => lock,
    };

    if args.requirements {
        print_requirements(shell, lock, args.dev);
    } else {
        print_packages(shell, lock, args.dev);
    }

    Ok(())
}

fn print_requirements(shell: &stanza::util::Shell, lock: &LockFile, dev: bool) {
    let mut requirements = lock.requirements();
    if dev {
        requirements.extend(lock.dev_requirements());
    }

    let lines: Vec<String> = requirements.iter().map(ToString::to_string).collect();
    shell.output(
        lines.join("\n"),
        &json!({ "reason": "lockfile", "requirements": lines }),
    );
}

fn print_packages(shell: &stanza::util::Shell, lock: &LockFile, dev: bool) {
    let mut packages: Vec<_> = lock.packages().values().collect();
    if dev {
        packages.extend(lock.dev_packages().values());
    }

    let human = packages
        .iter()
        .map(|p| format!("{} {}", p.name, p.version.as_deref().unwrap_or("(unversioned)")))
        .collect::<Vec<_>>()
        .join("\n");
    let json_packages: Vec<_> = packages
        .iter()
        .map(|p| {
            json!({
                "name": p.name,
                "version": p.version,
                "category": p.category,
                "markers": p.markers,
                "editable": p.editable,
                "hashes": p.hashes.len(),
            })
        })
        .collect();

    shell.output(
        human,
        &json!({
            "reason": "lockfile",
            "sources": lock.sources(),
            "packages": json_packages,
        }),
    );
}
