//! Kiln - live class reloading for unit applications.

#![allow(dead_code)]

mod bytecode;
mod cache;
mod cli;
mod compiler;
mod config;
mod core;
mod define;
mod enhance;
mod freshness;
mod index;
mod logger;
mod reload;
mod resolve;
mod runtime;
mod utils;
mod watch;

use anyhow::Result;
use clap::{ColorChoice, Parser};
use cli::{Cli, Commands};
use config::AppConfig;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    core::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }

    logger::set_verbose(cli.verbose);

    let config = AppConfig::load(&cli.config)?;

    match &cli.command {
        Commands::Run { args } => cli::run::run(config, args),
        Commands::Check => cli::check::check(config),
        Commands::Precompile => cli::precompile::precompile(&config),
        Commands::Clean => cli::clean::clean(&config),
    }
}
