//! bundlesync CLI - Command-line interface
//!
//! Synchronizes content bundles from a local mirror, validates the cache
//! and inspects manifests, flags and catalog files.

mod commands;
mod error;
mod runner;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use console::style;

use commands::cache::CacheAction;
use commands::catalog::CatalogAction;
use commands::config::ConfigCommands;
use commands::flags::FlagsAction;
use commands::manifest::ManifestAction;
use commands::sync::SyncArgs;
use error::CliError;
use runner::CliRunner;

#[derive(Debug, Parser)]
#[command(name = "bundlesync")]
#[command(version, about = "Resumable delivery and validation of content bundles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (default: ~/.config/bundlesync/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Reconcile catalogs, download missing content and validate it
    Sync {
        /// Mirror directory holding catalog and bundle files
        #[arg(long)]
        mirror: Option<PathBuf>,

        /// Profile name, overriding the manifest and config file
        #[arg(long)]
        profile: Option<String>,

        /// Probe this host:port for connectivity while downloading
        #[arg(long)]
        probe: Option<String>,

        /// Do not monitor connectivity
        #[arg(long)]
        no_monitor: bool,
    },

    /// Validate the local cache against the manifest
    Validate,

    /// Inspect the checksum manifest
    #[command(subcommand)]
    Manifest(ManifestAction),

    /// Show or reset download completion flags
    #[command(subcommand)]
    Flags(FlagsAction),

    /// Manage local catalog files
    #[command(subcommand)]
    Catalog(CatalogAction),

    /// Manage the content cache
    #[command(subcommand)]
    Cache(CacheAction),

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    // Config commands must work even when the file is malformed
    if let Commands::Config(command) = cli.command {
        return commands::config::run(command, cli.config);
    }

    let runner = CliRunner::new(cli.config, cli.verbose)?;

    match cli.command {
        Commands::Sync {
            mirror,
            profile,
            probe,
            no_monitor,
        } => {
            runner.log_startup("sync");
            commands::sync::run(
                &runner,
                SyncArgs {
                    mirror,
                    profile,
                    probe,
                    no_monitor,
                },
            )
        }
        Commands::Validate => {
            runner.log_startup("validate");
            commands::validate::run(&runner)
        }
        Commands::Manifest(action) => commands::manifest::run(&runner, action),
        Commands::Flags(action) => commands::flags::run(&runner, action),
        Commands::Catalog(action) => commands::catalog::run(&runner, action),
        Commands::Cache(action) => commands::cache::run(&runner, action),
        Commands::Config(_) => Ok(()),
    }
}
