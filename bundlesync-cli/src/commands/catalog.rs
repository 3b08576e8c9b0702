//! Local catalog file commands.

use bundlesync::cache::CatalogFiles;
use bundlesync::manifest::ChecksumManifest;
use clap::Subcommand;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Catalog subcommands.
#[derive(Debug, Subcommand)]
pub enum CatalogAction {
    /// Delete all but the newest catalog hash and json files
    Prune,

    /// Show the newest catalog files and check them against the manifest
    Status,
}

/// Run a catalog subcommand.
pub fn run(runner: &CliRunner, action: CatalogAction) -> Result<(), CliError> {
    let config = runner.config();
    let dir = config
        .catalog_dir
        .as_ref()
        .ok_or_else(|| CliError::Config("paths.catalog_dir is not set".to_string()))?;
    let files = CatalogFiles::new(dir);

    match action {
        CatalogAction::Prune => {
            let removed = files.prune_previous()?;
            for path in &removed {
                println!("  removed {}", path.display());
            }
            println!("Pruned {} catalog files", removed.len());
        }
        CatalogAction::Status => {
            let show = |label: &str, path: Option<std::path::PathBuf>| match path {
                Some(path) => println!("{:<6} {}", label, path.display()),
                None => println!("{:<6} (none)", label),
            };
            show("hash:", files.newest_hash()?);
            show("json:", files.newest_json()?);

            let manifest = ChecksumManifest::load(&config.manifest_path)?;
            let outcome = files.validate(&manifest);
            println!();
            println!("Catalog check: {}", outcome);
            if let Some(failure) = outcome.failure() {
                return Err(CliError::Invalid(failure.to_string()));
            }
        }
    }

    Ok(())
}
