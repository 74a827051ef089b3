//! Stanza CLI - a companion toolkit for Poetry projects

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use stanza::core::lockfile::LockError;
use stanza::ops::poetry::ScriptError;
use stanza::util::context::ProjectError;
use stanza::util::process::{CancellationToken, ProcessError};
use stanza::util::shell::Shell;
use stanza::util::GlobalContext;

/// Exit code for a run interrupted by the user.
const EXIT_CANCELLED: i32 = 130;

/// Options shared by every command.
pub struct GlobalOptions {
    pub shell: Arc<Shell>,
    pub poetry: Option<PathBuf>,
    pub verbose: bool,
    pub cancel: CancellationToken,
}

impl GlobalOptions {
    /// Build the context for the current directory.
    pub fn context(&self) -> Result<GlobalContext> {
        let mut ctx = GlobalContext::new()?.with_cancellation(self.cancel.clone());
        ctx.set_poetry_override(self.poetry.clone());
        ctx.set_verbose(self.verbose);
        ctx.set_color(self.shell.use_color());
        Ok(ctx)
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("stanza=debug")
    } else if cli.quiet {
        EnvFilter::new("stanza=error")
    } else {
        EnvFilter::new("stanza=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let opts = GlobalOptions {
        shell: Arc::new(Shell::from_flags(cli.quiet, cli.verbose, cli.no_color, cli.json)),
        poetry: cli.poetry,
        verbose: cli.verbose,
        cancel: CancellationToken::new(),
    };

    let token = opts.cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || token.cancel()) {
        tracing::debug!("could not install interrupt handler: {}", e);
    }

    if let Err(e) = run(cli.command, &opts) {
        std::process::exit(report(&e, &opts.shell));
    }
}

fn run(command: Commands, opts: &GlobalOptions) -> Result<()> {
    match command {
        Commands::Locate => commands::locate::execute(opts),
        Commands::Check(args) => commands::check::execute(args, opts),
        Commands::Outdated => commands::outdated::execute(opts),
        Commands::Lockfile(args) => commands::lockfile::execute(args, opts),
        Commands::Manifest => commands::manifest::execute(opts),
        Commands::Install(args) => commands::install::execute(args, opts),
        Commands::Add(args) => commands::add::execute(args, opts),
        Commands::Remove(args) => commands::remove::execute(args, opts),
        Commands::Lock(args) => commands::lock::execute(args, opts),
        Commands::Update => commands::update::execute(opts),
        Commands::Run(args) => commands::run::execute(args, opts),
        Commands::Script(args) => commands::script::execute(args, opts),
        Commands::Env(args) => commands::env::execute(args, opts),
        Commands::Version => commands::version::execute(opts),
        Commands::Config(args) => commands::config::execute(args, opts),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}

/// Print an error and pick the exit code.
fn report(err: &anyhow::Error, shell: &Shell) -> i32 {
    if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<ProcessError>()) {
        if e.is_cancelled() {
            return EXIT_CANCELLED;
        }
        shell.diagnostic(&e.to_diagnostic());
        return 1;
    }
    if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<ProjectError>()) {
        shell.diagnostic(&e.to_diagnostic());
        return 1;
    }
    if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<ScriptError>()) {
        shell.diagnostic(&e.to_diagnostic());
        return 1;
    }
    if let Some(e) = err.chain().find_map(|c| c.downcast_ref::<LockError>()) {
        shell.diagnostic(&e.to_diagnostic());
        return 1;
    }

    if shell.is_json() {
        shell.error(format!("{:#}", err));
    } else {
        eprintln!("error: {:#}", err);
    }
    1
}
