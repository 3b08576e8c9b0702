//! Local catalog file housekeeping.
//!
//! Every catalog update writes a new `catalog_<version>.hash` and
//! `catalog_<version>.json` pair into the catalog directory. Only the newest
//! of each is live.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info, warn};

use crate::cache::checksum_of;
use crate::error::{SyncError, SyncResult};
use crate::manifest::ChecksumManifest;
use crate::validation::{ValidationFailure, ValidationOutcome};

const HASH_PATTERN: &str = "catalog*.hash";
const JSON_PATTERN: &str = "catalog*.json";

/// The catalog directory of the content cache.
#[derive(Debug, Clone)]
pub struct CatalogFiles {
    dir: PathBuf,
}

impl CatalogFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the catalog files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Newest `catalog*.hash` file, if any.
    pub fn newest_hash(&self) -> SyncResult<Option<PathBuf>> {
        Ok(self.by_age(HASH_PATTERN)?.into_iter().next())
    }

    /// Newest `catalog*.json` file, if any.
    pub fn newest_json(&self) -> SyncResult<Option<PathBuf>> {
        Ok(self.by_age(JSON_PATTERN)?.into_iter().next())
    }

    /// Delete all but the newest hash file and the newest json file.
    ///
    /// Returns the deleted paths.
    pub fn prune_previous(&self) -> SyncResult<Vec<PathBuf>> {
        let mut deleted = Vec::new();
        if !self.dir.is_dir() {
            return Ok(deleted);
        }

        for pattern in [HASH_PATTERN, JSON_PATTERN] {
            for stale in self.by_age(pattern)?.into_iter().skip(1) {
                fs::remove_file(&stale).map_err(|e| SyncError::WriteFailed {
                    path: stale.clone(),
                    source: e,
                })?;
                debug!(path = %stale.display(), "Deleted previous catalog file");
                deleted.push(stale);
            }
        }

        if !deleted.is_empty() {
            info!(count = deleted.len(), "Pruned previous catalog files");
        }
        Ok(deleted)
    }

    /// Compare the live catalog files against the manifest's catalog entries.
    ///
    /// A manifest without catalog entries skips this check.
    pub fn validate(&self, manifest: &ChecksumManifest) -> ValidationOutcome {
        let expected: Vec<_> = manifest.catalog_entries().collect();
        if expected.is_empty() {
            return ValidationOutcome::Skipped("manifest lists no catalog files".to_string());
        }

        for entry in expected {
            let (pattern, newest) = if entry.key.contains(".hash") {
                (HASH_PATTERN, self.newest_hash())
            } else {
                (JSON_PATTERN, self.newest_json())
            };

            let path = match newest {
                Ok(Some(path)) => path,
                Ok(None) => {
                    warn!(pattern, dir = %self.dir.display(), "Catalog file missing");
                    return ValidationOutcome::Invalid(ValidationFailure::CatalogMissing {
                        pattern: pattern.to_string(),
                    });
                }
                Err(e) => return ValidationOutcome::Invalid(ValidationFailure::Io(e.to_string())),
            };

            let actual = match checksum_of(&path) {
                Ok(crc) => crc,
                Err(e) => return ValidationOutcome::Invalid(ValidationFailure::Io(e.to_string())),
            };

            if actual != entry.checksum {
                warn!(
                    file = %path.display(),
                    expected = entry.checksum,
                    actual,
                    "Catalog checksum mismatch"
                );
                return ValidationOutcome::Invalid(ValidationFailure::CatalogMismatch {
                    file: path,
                    expected: entry.checksum,
                    actual,
                });
            }
        }

        ValidationOutcome::Valid
    }

    /// Files matching `pattern`, newest first. Ties are broken by name.
    fn by_age(&self, pattern: &str) -> SyncResult<Vec<PathBuf>> {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&self.dir.to_string_lossy()),
            pattern
        );
        let paths = glob::glob(&full).map_err(|e| SyncError::Config(e.to_string()))?;

        let mut files: Vec<(SystemTime, PathBuf)> = paths
            .filter_map(Result::ok)
            .filter(|p| p.is_file())
            .map(|p| {
                let modified = fs::metadata(&p)
                    .and_then(|m| m.modified())
                    .unwrap_or(SystemTime::UNIX_EPOCH);
                (modified, p)
            })
            .collect();

        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
        Ok(files.into_iter().map(|(_, p)| p).collect())
    }
}
