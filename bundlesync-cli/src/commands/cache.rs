//! Cache management CLI commands.

use bundlesync::cache::{derive_file_ids, LocalCacheInspector};
use bundlesync::manifest::ChecksumManifest;
use clap::Subcommand;

use super::common::format_size;
use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Delete all cached content; the next sync downloads everything again
    Purge,
    /// Show the cache folder for each file id in the manifest
    Folders,
}

/// Run a cache subcommand.
pub fn run(runner: &CliRunner, action: CacheAction) -> Result<(), CliError> {
    let config = runner.config();
    let inspector = LocalCacheInspector::new(&config.cache_dir);

    match action {
        CacheAction::Purge => {
            println!("Purging cache at: {}", config.cache_dir.display());
            let result = inspector.purge()?;
            println!(
                "Deleted {} files, freed {}",
                result.files_deleted,
                format_size(result.bytes_freed)
            );
            Ok(())
        }
        CacheAction::Folders => {
            let manifest = ChecksumManifest::load(&config.manifest_path)?;
            let ids = derive_file_ids(manifest.entries());
            let folders = inspector.find_folders(&ids)?;

            for id in &ids {
                match folders.iter().find(|folder| &folder.file_id == id) {
                    Some(folder) => {
                        let payload = inspector.payload_dir(&folder.path)?;
                        println!("  {}  {}", id, payload.display());
                    }
                    None => println!("  {}  (missing)", id),
                }
            }
            println!();
            println!("{} of {} folders present", folders.len(), ids.len());
            Ok(())
        }
    }
}
