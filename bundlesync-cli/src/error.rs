//! CLI error type.

use bundlesync::SyncError;
use thiserror::Error;

/// Errors surfaced to the user by the `bundlesync` binary.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid or missing configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An engine operation failed.
    #[error(transparent)]
    Sync(SyncError),

    /// The local content set failed validation.
    #[error("Content invalid: {0}")]
    Invalid(String),

    /// The async runtime could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl From<SyncError> for CliError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Config(msg) => CliError::Config(msg),
            other => CliError::Sync(other),
        }
    }
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Sync(e) if e.is_configuration() => 2,
            CliError::Invalid(_) => 3,
            _ => 1,
        }
    }
}
