//! Manifest inspection commands.

use std::path::PathBuf;

use bundlesync::cache::derive_file_id;
use bundlesync::manifest::ChecksumManifest;
use clap::Subcommand;
use console::style;

use super::common::format_checksum;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Manifest subcommands.
#[derive(Debug, Subcommand)]
pub enum ManifestAction {
    /// Show the profile and every entry
    Show,

    /// List the cache folder id derived from each bundle entry
    Ids,

    /// Compare entries against built files in a directory
    Diff {
        /// Directory holding files named like the manifest keys
        dir: PathBuf,
    },
}

/// Run a manifest subcommand.
pub fn run(runner: &CliRunner, action: ManifestAction) -> Result<(), CliError> {
    let manifest = ChecksumManifest::load(&runner.config().manifest_path)?;

    match action {
        ManifestAction::Show => {
            println!("Manifest: {}", manifest.source().display());
            match manifest.profile() {
                Some(profile) => println!("Profile:  {} ({})", profile.name, profile.id),
                None => println!("Profile:  (not set)"),
            }
            println!();
            for entry in manifest.entries() {
                println!("  {}  {}", format_checksum(entry.checksum), entry.key);
            }
            println!();
            println!("{} entries", manifest.len());
        }
        ManifestAction::Ids => {
            for entry in manifest.bundle_entries() {
                match derive_file_id(&entry.key) {
                    Some(id) => println!("  {:<24} {}", id, entry.key),
                    None => println!("  {:<24} {}", "(none)", entry.key),
                }
            }
        }
        ManifestAction::Diff { dir } => {
            let diff = manifest.diff_directory(&dir)?;
            for mismatch in &diff.mismatched {
                println!(
                    "  {} {}  expected {}, found {}",
                    style("changed").yellow(),
                    mismatch.key,
                    format_checksum(mismatch.expected),
                    format_checksum(mismatch.actual)
                );
            }
            for key in &diff.missing {
                println!("  {} {}", style("missing").red(), key);
            }
            println!();
            println!("{}", diff);
            if !diff.is_clean() {
                return Err(CliError::Invalid(format!(
                    "{} does not match the manifest",
                    dir.display()
                )));
            }
        }
    }

    Ok(())
}
