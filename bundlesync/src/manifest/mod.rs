//! Checksum manifest loading and lookup.
//!
//! The manifest is produced by the content build and persisted as a JSON
//! asset next to the application data:
//!
//! ```json
//! {
//!   "profile": { "name": "Deployment", "id": "abc" },
//!   "entries": [ { "key": "group_abc123.bundle", "checksum": 3735928559 } ]
//! }
//! ```
//!
//! It is replaced wholesale on every build and never mutated at runtime.

mod diff;
mod types;

pub use diff::{ManifestDiff, Mismatch};
pub use types::{ManifestEntry, ProfileKind, ProfileSelection};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::checksum_of;
use crate::error::{SyncError, SyncResult};

/// The persisted manifest asset: an optional profile plus the entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAsset {
    /// Profile recorded by the build, if any.
    #[serde(default)]
    pub profile: Option<ProfileSelection>,
    /// Checksum entries, one per built file.
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl ManifestAsset {
    /// Read a manifest asset from disk.
    ///
    /// Unlike [`ChecksumManifest::load`], an asset with no entries is not an
    /// error here so the profile can still be read from it.
    pub fn read(path: &Path) -> SyncResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                SyncError::ManifestMissing(path.to_path_buf())
            } else {
                SyncError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;

        serde_json::from_str(&content).map_err(|e| SyncError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Serialize the asset to disk as pretty-printed JSON.
    pub fn write(&self, path: &Path) -> SyncResult<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| SyncError::ManifestParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        fs::write(path, json).map_err(|e| SyncError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// In-memory table of manifest entries for one content build.
#[derive(Debug, Clone)]
pub struct ChecksumManifest {
    source: PathBuf,
    profile: Option<ProfileSelection>,
    entries: Vec<ManifestEntry>,
}

impl ChecksumManifest {
    /// Load the manifest asset at `path`.
    ///
    /// # Errors
    ///
    /// * [`SyncError::ManifestMissing`] if the file does not exist
    /// * [`SyncError::ManifestParse`] if the JSON is malformed
    /// * [`SyncError::ManifestEmpty`] if the asset holds no entries
    pub fn load(path: &Path) -> SyncResult<Self> {
        let asset = ManifestAsset::read(path)?;
        if asset.entries.is_empty() {
            return Err(SyncError::ManifestEmpty(path.to_path_buf()));
        }

        debug!(
            path = %path.display(),
            entries = asset.entries.len(),
            "Loaded checksum manifest"
        );

        Ok(Self {
            source: path.to_path_buf(),
            profile: asset.profile,
            entries: asset.entries,
        })
    }

    /// Build a manifest directly from entries.
    pub fn from_entries(entries: Vec<ManifestEntry>) -> Self {
        Self {
            source: PathBuf::new(),
            profile: None,
            entries,
        }
    }

    /// Attach a profile selection.
    pub fn with_profile(mut self, profile: ProfileSelection) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Path the manifest was loaded from (empty for in-memory manifests).
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Profile recorded in the asset.
    pub fn profile(&self) -> Option<&ProfileSelection> {
        self.profile.as_ref()
    }

    /// All entries in build order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the manifest has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry matching `predicate`.
    pub fn find<P>(&self, predicate: P) -> Option<&ManifestEntry>
    where
        P: Fn(&ManifestEntry) -> bool,
    {
        self.entries.iter().find(|entry| predicate(entry))
    }

    /// First entry whose key contains `fragment`.
    pub fn find_by_fragment(&self, fragment: &str) -> Option<&ManifestEntry> {
        self.find(|entry| entry.key.contains(fragment))
    }

    /// Entries describing catalog files (`.hash` / `.json`).
    pub fn catalog_entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| e.is_catalog_file())
    }

    /// Entries describing bundles.
    pub fn bundle_entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter().filter(|e| !e.is_catalog_file())
    }

    /// Compare every entry against a file of the same name in `dir`.
    pub fn diff_directory(&self, dir: &Path) -> SyncResult<ManifestDiff> {
        let mut diff = ManifestDiff::default();

        for entry in &self.entries {
            let path = dir.join(&entry.key);
            if !path.is_file() {
                diff.missing.push(entry.key.clone());
                continue;
            }

            let actual = checksum_of(&path)?;
            if actual == entry.checksum {
                diff.matched.push(entry.key.clone());
            } else {
                diff.mismatched.push(Mismatch {
                    key: entry.key.clone(),
                    expected: entry.checksum,
                    actual,
                });
            }
        }

        Ok(diff)
    }
}
