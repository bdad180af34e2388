//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Kiln application class engine CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Config file path (default: kiln.toml)
    #[arg(short = 'C', long, default_value = "kiln.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// Enable verbose output for debugging
    #[arg(short = 'V', long, global = true)]
    pub verbose: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the application, reloading classes as sources change
    #[command(visible_alias = "r")]
    Run {
        #[command(flatten)]
        args: RunArgs,
    },

    /// Compile every source once and report diagnostics
    #[command(visible_alias = "c")]
    Check,

    /// Compile and enhance the whole application into the artifact store
    #[command(visible_alias = "p")]
    Precompile,

    /// Remove the bytecode cache and the artifact store
    Clean,
}

/// Run command arguments
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Serve the precompiled store: no compiler, no watcher
    #[arg(long)]
    pub prod: bool,

    /// Invoke CLASS.METHOD once after start, print the result and exit
    #[arg(long, value_name = "CLASS.METHOD")]
    pub call: Option<String>,

    /// Enable file watching for auto-reload (defaults to the config value)
    #[arg(short, long, action = clap::ArgAction::Set, num_args = 0..=1, default_missing_value = "true", require_equals = false)]
    pub watch: Option<bool>,
}

#[allow(unused)]
impl Cli {
    pub const fn is_run(&self) -> bool {
        matches!(self.command, Commands::Run { .. })
    }
    pub const fn is_check(&self) -> bool {
        matches!(self.command, Commands::Check)
    }
    pub const fn is_precompile(&self) -> bool {
        matches!(self.command, Commands::Precompile)
    }
    pub const fn is_clean(&self) -> bool {
        matches!(self.command, Commands::Clean)
    }
}
