use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Why the local content set was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationFailure {
    /// The manifest lists catalog files but none are on disk.
    #[error("no catalog file matching {pattern}")]
    CatalogMissing { pattern: String },

    /// A catalog file's checksum differs from the manifest.
    #[error("catalog {} checksum {actual:#010x}, expected {expected:#010x}", .file.display())]
    CatalogMismatch {
        file: PathBuf,
        expected: u32,
        actual: u32,
    },

    /// Fewer (or more) cache folders than expected file ids.
    #[error("expected {expected} cache folders, found {found}")]
    FolderCountMismatch { expected: usize, found: usize },

    /// A cache folder has no manifest entry.
    #[error("no manifest entry for cache folder {file_id}")]
    NoManifestEntry { file_id: String },

    /// A payload directory holds too few files.
    #[error("{} holds {found} files, at least {required} required", .folder.display())]
    TooFewFiles {
        folder: PathBuf,
        found: usize,
        required: usize,
    },

    /// A payload directory has no primary payload file.
    #[error("{} has no primary payload file", .folder.display())]
    NoPrimaryPayload { folder: PathBuf },

    /// A primary payload file's checksum differs from the manifest.
    #[error("{file_id}: {} checksum {actual:#010x}, expected {expected:#010x}", .file.display())]
    ChecksumMismatch {
        file_id: String,
        file: PathBuf,
        expected: u32,
        actual: u32,
    },

    /// The cache could not be read.
    #[error("cache read failed: {0}")]
    Io(String),
}

/// Result of validating the local content set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// Every check passed.
    Valid,
    /// Validation was not possible; the content is assumed valid.
    Skipped(String),
    /// A check failed.
    Invalid(ValidationFailure),
}

impl ValidationOutcome {
    /// Whether initialization may proceed.
    pub fn is_valid(&self) -> bool {
        !matches!(self, ValidationOutcome::Invalid(_))
    }

    /// The failure, when invalid.
    pub fn failure(&self) -> Option<&ValidationFailure> {
        match self {
            ValidationOutcome::Invalid(failure) => Some(failure),
            _ => None,
        }
    }
}

impl fmt::Display for ValidationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationOutcome::Valid => write!(f, "valid"),
            ValidationOutcome::Skipped(reason) => write!(f, "skipped ({})", reason),
            ValidationOutcome::Invalid(failure) => write!(f, "invalid: {}", failure),
        }
    }
}
