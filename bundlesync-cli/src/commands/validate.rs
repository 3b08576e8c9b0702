//! Validate command - check the local cache against the manifest.

use bundlesync::validation::{IntegrityValidator, ValidationOutcome};
use console::style;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Run the validate command.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    let config = runner.config();

    let mut validator = IntegrityValidator::new(&config.manifest_path, &config.cache_dir)
        .with_min_payload_files(config.min_payload_files);
    if let Some(dir) = &config.catalog_dir {
        validator = validator.with_catalog_dir(dir);
    }

    println!("Manifest: {}", config.manifest_path.display());
    println!("Cache:    {}", config.cache_dir.display());
    println!();

    match validator.validate() {
        ValidationOutcome::Valid => {
            println!("{}", style("Content valid").green().bold());
            Ok(())
        }
        ValidationOutcome::Skipped(reason) => {
            println!("{} ({})", style("Validation skipped").yellow(), reason);
            Ok(())
        }
        ValidationOutcome::Invalid(failure) => Err(CliError::Invalid(failure.to_string())),
    }
}
