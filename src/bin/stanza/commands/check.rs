//! `stanza check` command
//!
//! Compares the manifest's declared requirements against what the
//! environment has installed.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde_json::json;

use crate::cli::CheckArgs;
use crate::GlobalOptions;
use stanza::core::manifest::PoetryManifest;
use stanza::ops::drift::{
    collect_local_packages, drift_diagnostic, find_unsatisfied_with, installed_from_lock,
    IgnoreList,
};
use stanza::ops::poetry::{lock_diagnostic, lock_status};
use stanza::util::context::ProjectError;
use stanza::util::diagnostic::Severity;
use stanza::util::shell::Status;

pub fn execute(args: CheckArgs, opts: &GlobalOptions) -> Result<()> {
    let shell = &opts.shell;
    let ctx = opts.context()?;
    let root = ctx.project_root()?.to_path_buf();

    let manifest = PoetryManifest::load(&ctx.manifest_path()?)?
        .ok_or_else(|| ProjectError::NotFound { dir: root.clone() })?;
    let requirements = manifest.declared_requirements(args.dev);

    let status = lock_status(&root);
    if let Some(diag) = lock_diagnostic(status, &root) {
        shell.diagnostic(&diag);
    }

    shell.status(
        Status::Checking,
        format!("{} declared requirement(s)", requirements.len()),
    );

    let manager = ctx.package_manager(&root);
    let mut installed = manager.refresh_quietly()?;
    let lock = ctx
        .locks()
        .load(&ctx.lock_path()?)
        .context("failed to load poetry.lock")?;
    if let Some(lock) = lock.lockfile() {
        for package in installed_from_lock(lock, &manager.requirements()) {
            if !installed.iter().any(|p| p.same_identity(&package)) {
                installed.push(package);
            }
        }
    }

    let roots: Vec<PathBuf> = ctx
        .config()
        .source_roots()
        .iter()
        .map(|r| root.join(r))
        .collect();
    let local = collect_local_packages(&roots);
    tracing::debug!(
        "{} installed, {} local package(s)",
        installed.len(),
        local.len()
    );

    let mut policy = IgnoreList::new(ctx.config().drift.ignore.iter().chain(&args.ignore));
    if args.strict {
        policy = policy.with_severity(Severity::Error);
    }
    let unsatisfied = find_unsatisfied_with(&requirements, &installed, &local, &policy);

    shell.json_event(&json!({
        "reason": "check",
        "lock": status.as_str(),
        "requirements": requirements.len(),
        "unsatisfied": unsatisfied.iter().map(ToString::to_string).collect::<Vec<_>>(),
    }));

    match drift_diagnostic(&unsatisfied, &policy) {
        Some(diag) => {
            shell.diagnostic(&diag);
            if args.strict {
                bail!("{} requirement(s) not satisfied", unsatisfied.len());
            }
        }
        None => shell.status(
            Status::Finished,
            format!("all {} requirement(s) satisfied", requirements.len()),
        ),
    }

    Ok(())
}
