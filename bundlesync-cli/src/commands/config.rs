//! Configuration management CLI commands.
//!
//! Provides `config get`, `config set`, `config list`, `config path` and
//! `config init` for viewing and editing the INI file from the command line.

use std::path::PathBuf;

use bundlesync::config::{config_file_path, ConfigFile, ConfigKey};
use clap::Subcommand;

use crate::error::CliError;
use crate::runner::load_config_file;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Get a configuration value
    Get {
        /// Configuration key in format section.key (e.g., download.skip)
        key: String,
    },

    /// Set a configuration value
    Set {
        /// Configuration key in format section.key (e.g., download.skip)
        key: String,

        /// Value to set; empty clears optional keys
        value: String,
    },

    /// List all configuration settings
    List,

    /// Show the configuration file path
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Run a config subcommand against `path`, or the default location.
pub fn run(command: ConfigCommands, path: Option<PathBuf>) -> Result<(), CliError> {
    let explicit = path.is_some();
    let path = path.unwrap_or_else(config_file_path);

    match command {
        ConfigCommands::Get { key } => {
            let config_key = parse_key(&key)?;
            let config = load_config_file(&path, explicit)?;
            let value = config_key.get(&config);

            if value.is_empty() {
                println!("(not set)");
            } else {
                println!("{}", value);
            }
        }
        ConfigCommands::Set { key, value } => {
            let config_key = parse_key(&key)?;
            let mut config = load_config_file(&path, false)?;
            config_key.set(&mut config, &value)?;
            config.save_to(&path)?;

            println!("Set {} = {}", config_key, value);
        }
        ConfigCommands::List => {
            let config = load_config_file(&path, explicit)?;
            print_settings(&config);
        }
        ConfigCommands::Path => println!("{}", path.display()),
        ConfigCommands::Init { force } => {
            if path.exists() && !force {
                return Err(CliError::Config(format!(
                    "{} already exists, use --force to overwrite",
                    path.display()
                )));
            }
            ConfigFile::default().save_to(&path)?;
            println!("Wrote default configuration to {}", path.display());
        }
    }

    Ok(())
}

fn parse_key(key: &str) -> Result<ConfigKey, CliError> {
    key.parse().map_err(|_| {
        CliError::Config(format!(
            "Unknown configuration key '{}'. Use 'bundlesync config list' to see available keys.",
            key
        ))
    })
}

fn print_settings(config: &ConfigFile) {
    println!("Configuration Settings");
    println!("======================");
    println!();

    let mut current_section = "";

    for key in ConfigKey::all() {
        let section = key.section();

        if section != current_section {
            if !current_section.is_empty() {
                println!();
            }
            println!("[{}]", section);
            current_section = section;
        }

        let value = key.get(config);
        if value.is_empty() {
            println!("  {} = (not set)", key.key_name());
        } else {
            println!("  {} = {}", key.key_name(), value);
        }
    }
}
