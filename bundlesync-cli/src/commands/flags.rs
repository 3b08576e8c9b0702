//! Download completion flag commands.

use bundlesync::catalog::{FlagStore, JsonFlagStore};
use clap::Subcommand;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Flag subcommands.
#[derive(Debug, Subcommand)]
pub enum FlagsAction {
    /// Show the recorded state of every profile
    Show,

    /// Forget that a profile completed its initial download
    Clear {
        /// Profile name
        profile: String,
    },
}

/// Run a flags subcommand.
pub fn run(runner: &CliRunner, action: FlagsAction) -> Result<(), CliError> {
    let store = JsonFlagStore::new(&runner.config().flags_path);

    match action {
        FlagsAction::Show => {
            let records = store.records()?;
            if records.is_empty() {
                println!("No flags recorded in {}", store.path().display());
                return Ok(());
            }
            for (profile, record) in records {
                let at = record
                    .completed_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("  {:<20} completed={:<5} at {}", profile, record.completed, at);
            }
        }
        FlagsAction::Clear { profile } => {
            store.clear(&profile)?;
            println!("Cleared initial download flag for {}", profile);
        }
    }

    Ok(())
}
