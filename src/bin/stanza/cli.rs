//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Stanza - a companion toolkit for Poetry projects
#[derive(Parser)]
#[command(name = "stanza")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print errors only
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit machine-readable JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the poetry executable
    #[arg(long, global = true, env = "STANZA_POETRY", value_name = "PATH")]
    pub poetry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show which poetry executable would be used
    Locate,

    /// Report declared requirements the environment does not satisfy
    Check(CheckArgs),

    /// List packages with newer releases
    Outdated,

    /// Show the packages locked in poetry.lock
    Lockfile(LockfileArgs),

    /// Show the [tool.poetry] section of pyproject.toml
    Manifest,

    /// Install the project's dependencies
    Install(InstallArgs),

    /// Add dependencies to the project
    Add(PackagesArgs),

    /// Remove dependencies from the project
    Remove(PackagesArgs),

    /// Lock dependencies
    Lock(LockArgs),

    /// Update dependencies to their latest allowed versions
    Update,

    /// Run a command inside the project's environment
    Run(RunArgs),

    /// Run a script declared in [tool.poetry.scripts]
    Script(ScriptArgs),

    /// Inspect and manage the project's virtualenv
    Env(EnvArgs),

    /// Show the poetry version
    Version,

    /// Show or edit stanza configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct CheckArgs {
    /// Requirement names to skip (repeatable)
    #[arg(long, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Include dev and group dependencies
    #[arg(long)]
    pub dev: bool,

    /// Fail when requirements are unsatisfied
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args)]
pub struct LockfileArgs {
    /// Print derived requirements instead of packages
    #[arg(long)]
    pub requirements: bool,

    /// Include development packages (legacy lockfiles)
    #[arg(long)]
    pub dev: bool,

    /// Fail with a source-annotated error if the lockfile is malformed
    #[arg(long)]
    pub validate: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    /// Do not install the project itself
    #[arg(long)]
    pub no_root: bool,

    /// Extras to install (repeatable)
    #[arg(short = 'E', long = "extras", value_name = "NAME")]
    pub extras: Vec<String>,
}

#[derive(Args)]
pub struct PackagesArgs {
    /// Package names or requirement strings
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,
}

#[derive(Args)]
pub struct LockArgs {
    /// Keep locked versions, only refresh the lockfile
    #[arg(long)]
    pub no_update: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Command and arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct ScriptArgs {
    /// Script name
    pub name: String,

    /// Arguments passed to the script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

#[derive(Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommands,
}

#[derive(Subcommand)]
pub enum EnvCommands {
    /// List the project's virtualenvs
    List,

    /// Show the active virtualenv
    Info,

    /// Select the interpreter for the virtualenv
    Use {
        /// Python executable or version
        python: String,
    },

    /// Show whether virtualenvs are created inside the project
    InProject,

    /// Check whether an interpreter belongs to the project's virtualenv
    Check {
        /// Interpreter path
        interpreter: PathBuf,
    },

    /// Create the project's virtualenv, initializing the project if needed
    Setup {
        /// Python executable or version
        #[arg(long)]
        python: Option<String>,

        /// Install dependencies after creating the environment
        #[arg(long)]
        install: bool,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the merged configuration
    Show,

    /// Persist the poetry executable path in the global config
    SetPath {
        /// Path to the poetry executable
        path: PathBuf,
    },
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Target shell
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}
