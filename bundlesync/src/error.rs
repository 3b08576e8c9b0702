//! Error types for bundle synchronization.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::TransportError;

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur while reconciling, downloading or validating content.
///
/// Per-key download failures never surface through this type; they are
/// absorbed by the scheduler and reported through the pass outcome.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Failed to read a file or directory.
    #[error("failed to read {}: {source}", .path.display())]
    ReadFailed { path: PathBuf, source: io::Error },

    /// Failed to write a file or directory.
    #[error("failed to write {}: {source}", .path.display())]
    WriteFailed { path: PathBuf, source: io::Error },

    /// Failed to create a directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDirFailed { path: PathBuf, source: io::Error },

    /// The manifest asset does not exist.
    #[error("manifest not found: {}", .0.display())]
    ManifestMissing(PathBuf),

    /// The manifest asset exists but could not be parsed.
    #[error("failed to parse manifest {}: {reason}", .path.display())]
    ManifestParse { path: PathBuf, reason: String },

    /// The manifest asset contains no entries.
    #[error("manifest {} contains no entries", .0.display())]
    ManifestEmpty(PathBuf),

    /// No profile selection is available from configuration or the manifest.
    #[error("profile data not found, rebuild the content manifest with a profile")]
    ProfileMissing,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The persisted flag store could not be read or written.
    #[error("flag store {} failed: {reason}", .path.display())]
    FlagStore { path: PathBuf, reason: String },

    /// The catalog collaborator failed outside of a per-key download.
    #[error("catalog service error: {0}")]
    Transport(#[from] TransportError),

    /// Download passes kept failing after all retries.
    #[error("download pass failed after {attempts} attempts ({failed} keys outstanding)")]
    PassFailed { attempts: usize, failed: usize },

    /// Validation kept failing after all full re-downloads.
    #[error("content validation failed after {attempts} full re-downloads")]
    ValidationExhausted { attempts: usize },

    /// A blocking task panicked or was aborted.
    #[error("background task failed: {0}")]
    Task(String),
}

impl SyncError {
    /// Whether this error is a configuration problem that retrying cannot fix.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::ProfileMissing
                | SyncError::Config(_)
                | SyncError::ManifestParse { .. }
        )
    }
}
