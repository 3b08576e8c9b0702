//! Whole-cache integrity check against the checksum manifest.

use std::path::PathBuf;

use tracing::{debug, error, info, warn};

use super::report::{ValidationFailure, ValidationOutcome};
use crate::cache::{
    checksum_of, derive_file_id, derive_file_ids, CatalogFiles, LocalCacheInspector,
};
use crate::error::SyncError;
use crate::manifest::ChecksumManifest;

/// Default minimum number of files in a payload directory.
pub const DEFAULT_MIN_PAYLOAD_FILES: usize = 2;

/// Substring marking a primary payload file.
const PRIMARY_PAYLOAD_MARKER: &str = "data";

/// Decides pass/fail for the whole local content set.
///
/// Checks run in order and stop at the first anomaly:
///
/// 1. live catalog files against the manifest's catalog entries
/// 2. one cache folder per expected file id, exact count
/// 3. per folder, minimum file count and the primary payload checksum
///
/// All work is synchronous filesystem I/O; run it on the blocking pool.
#[derive(Debug, Clone)]
pub struct IntegrityValidator {
    manifest_path: PathBuf,
    inspector: LocalCacheInspector,
    catalog_files: Option<CatalogFiles>,
    min_payload_files: usize,
}

impl IntegrityValidator {
    pub fn new(manifest_path: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            inspector: LocalCacheInspector::new(cache_dir),
            catalog_files: None,
            min_payload_files: DEFAULT_MIN_PAYLOAD_FILES,
        }
    }

    /// Also check catalog files in `dir`.
    pub fn with_catalog_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.catalog_files = Some(CatalogFiles::new(dir));
        self
    }

    /// Require at least `min` files per version directory.
    pub fn with_min_payload_files(mut self, min: usize) -> Self {
        self.min_payload_files = min;
        self
    }

    /// Load the manifest and validate the cache against it.
    ///
    /// A missing, empty or unreadable manifest skips validation.
    pub fn validate(&self) -> ValidationOutcome {
        let manifest = match ChecksumManifest::load(&self.manifest_path) {
            Ok(manifest) => manifest,
            Err(e @ SyncError::ManifestMissing(_)) | Err(e @ SyncError::ManifestEmpty(_)) => {
                warn!(error = %e, "Skipping content validation");
                return ValidationOutcome::Skipped(e.to_string());
            }
            Err(e) => {
                error!(error = %e, "Manifest unusable, skipping content validation");
                return ValidationOutcome::Skipped(e.to_string());
            }
        };

        self.validate_manifest(&manifest)
    }

    /// Validate the cache against an already loaded manifest.
    pub fn validate_manifest(&self, manifest: &ChecksumManifest) -> ValidationOutcome {
        if let Some(catalog_files) = &self.catalog_files {
            let outcome = catalog_files.validate(manifest);
            if !outcome.is_valid() {
                return outcome;
            }
        }

        let file_ids = derive_file_ids(manifest.entries());
        if file_ids.is_empty() {
            return ValidationOutcome::Skipped("manifest lists no bundles".to_string());
        }

        let folders = match self.inspector.find_folders(&file_ids) {
            Ok(folders) => folders,
            Err(e) => return ValidationOutcome::Invalid(ValidationFailure::Io(e.to_string())),
        };

        if folders.len() != file_ids.len() {
            warn!(
                expected = file_ids.len(),
                found = folders.len(),
                "Cache folder count mismatch"
            );
            return ValidationOutcome::Invalid(ValidationFailure::FolderCountMismatch {
                expected: file_ids.len(),
                found: folders.len(),
            });
        }

        for folder in &folders {
            let Some(entry) = manifest.bundle_entries().find(|e| {
                derive_file_id(&e.key).as_deref() == Some(folder.file_id.as_str())
            }) else {
                return ValidationOutcome::Invalid(ValidationFailure::NoManifestEntry {
                    file_id: folder.file_id.clone(),
                });
            };

            if let Err(failure) = self.check_folder(&folder.file_id, &folder.path, entry.checksum) {
                warn!(folder = %folder.path.display(), reason = %failure, "Cache folder invalid");
                return ValidationOutcome::Invalid(failure);
            }
            debug!(file_id = %folder.file_id, "Cache folder valid");
        }

        info!(folders = folders.len(), "Content validation passed");
        ValidationOutcome::Valid
    }

    fn check_folder(
        &self,
        file_id: &str,
        folder: &std::path::Path,
        expected: u32,
    ) -> Result<(), ValidationFailure> {
        let io = |e: SyncError| ValidationFailure::Io(e.to_string());

        let payload_dir = self.inspector.payload_dir(folder).map_err(io)?;
        let files = self.inspector.payload_files(&payload_dir).map_err(io)?;

        if files.len() < self.min_payload_files {
            return Err(ValidationFailure::TooFewFiles {
                folder: payload_dir,
                found: files.len(),
                required: self.min_payload_files,
            });
        }

        let primaries: Vec<_> = files
            .iter()
            .filter(|path| {
                path.file_name()
                    .map(|n| n.to_string_lossy().contains(PRIMARY_PAYLOAD_MARKER))
                    .unwrap_or(false)
            })
            .collect();

        if primaries.is_empty() {
            return Err(ValidationFailure::NoPrimaryPayload {
                folder: payload_dir,
            });
        }

        for path in primaries {
            let actual = checksum_of(path).map_err(io)?;
            if actual != expected {
                return Err(ValidationFailure::ChecksumMismatch {
                    file_id: file_id.to_string(),
                    file: path.clone(),
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::checksum_bytes;
    use crate::manifest::{ManifestAsset, ManifestEntry};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, entries: Vec<ManifestEntry>) -> PathBuf {
        let path = dir.join("manifest.json");
        ManifestAsset {
            profile: None,
            entries,
        }
        .write(&path)
        .unwrap();
        path
    }

    fn write_bundle(cache: &Path, file_id: &str, data: &[u8]) -> PathBuf {
        let dir = cache.join(file_id).join("v1");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__data"), data).unwrap();
        fs::write(dir.join("__info"), b"info").unwrap();
        dir.join("__data")
    }

    #[test]
    fn test_matching_bundle_validates() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        write_bundle(&cache, "abc123", b"payload");
        let manifest = write_manifest(
            temp.path(),
            vec![ManifestEntry::new("group_abc123.bundle", checksum_bytes(b"payload"))],
        );

        let validator = IntegrityValidator::new(&manifest, &cache);
        assert_eq!(validator.validate(), ValidationOutcome::Valid);
    }

    #[test]
    fn test_flipped_byte_fails() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let data = write_bundle(&cache, "abc123", b"payload");
        let manifest = write_manifest(
            temp.path(),
            vec![ManifestEntry::new("group_abc123.bundle", checksum_bytes(b"payload"))],
        );
        fs::write(&data, b"paxload").unwrap();

        let outcome = IntegrityValidator::new(&manifest, &cache).validate();
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid(ValidationFailure::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_missing_manifest_skips() {
        let temp = TempDir::new().unwrap();
        let outcome =
            IntegrityValidator::new(temp.path().join("absent.json"), temp.path()).validate();
        assert!(matches!(outcome, ValidationOutcome::Skipped(_)));
        assert!(outcome.is_valid());
    }

    #[test]
    fn test_too_few_files() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let dir = cache.join("abc123");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__data"), b"payload").unwrap();
        let manifest = write_manifest(
            temp.path(),
            vec![ManifestEntry::new("group_abc123.bundle", checksum_bytes(b"payload"))],
        );

        let outcome = IntegrityValidator::new(&manifest, &cache).validate();
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid(ValidationFailure::TooFewFiles { found: 1, .. })
        ));

        let relaxed = IntegrityValidator::new(&manifest, &cache).with_min_payload_files(1);
        assert_eq!(relaxed.validate(), ValidationOutcome::Valid);
    }

    #[test]
    fn test_no_primary_payload() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let dir = cache.join("abc123");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("__info"), b"a").unwrap();
        fs::write(dir.join("__lock"), b"b").unwrap();
        let manifest =
            write_manifest(temp.path(), vec![ManifestEntry::new("group_abc123.bundle", 1)]);

        assert!(matches!(
            IntegrityValidator::new(&manifest, &cache).validate(),
            ValidationOutcome::Invalid(ValidationFailure::NoPrimaryPayload { .. })
        ));
    }

    #[test]
    fn test_catalog_check_runs_first() {
        let temp = TempDir::new().unwrap();
        let cache = temp.path().join("cache");
        let catalogs = temp.path().join("catalogs");
        fs::create_dir_all(&catalogs).unwrap();
        write_bundle(&cache, "abc123", b"payload");
        fs::write(catalogs.join("catalog_1.hash"), b"changed").unwrap();
        let manifest = write_manifest(
            temp.path(),
            vec![
                ManifestEntry::new("catalog_1.hash", checksum_bytes(b"original")),
                ManifestEntry::new("group_abc123.bundle", checksum_bytes(b"payload")),
            ],
        );

        let outcome = IntegrityValidator::new(&manifest, &cache)
            .with_catalog_dir(&catalogs)
            .validate();
        assert!(matches!(
            outcome,
            ValidationOutcome::Invalid(ValidationFailure::CatalogMismatch { .. })
        ));
    }
}
