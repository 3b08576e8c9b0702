//! Manifest data types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// File extensions that mark a manifest entry as a catalog file rather than
/// a bundle.
const CATALOG_EXTENSIONS: [&str; 2] = [".hash", ".json"];

/// A single `{key, checksum}` pair produced by the content build.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Bundle or catalog file name as produced by the build.
    pub key: String,
    /// CRC-32C of the file contents.
    pub checksum: u32,
}

impl ManifestEntry {
    /// Create a new manifest entry.
    pub fn new(key: impl Into<String>, checksum: u32) -> Self {
        Self {
            key: key.into(),
            checksum,
        }
    }

    /// Whether this entry describes a catalog file (`.hash` or `.json`).
    pub fn is_catalog_file(&self) -> bool {
        CATALOG_EXTENSIONS.iter().any(|ext| self.key.contains(ext))
    }
}

impl fmt::Display for ManifestEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#010x})", self.key, self.checksum)
    }
}

/// Well-known profile names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileKind {
    /// Content is served from remote storage and must be downloaded.
    Deployment,
    /// Content is served by the local editor; nothing is downloaded.
    EditorHosted,
    /// Any other named profile. Treated like `Deployment`.
    Custom,
}

/// Identifies which profile governs load paths for this build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSelection {
    /// Human readable profile name, also used to scope persisted flags.
    pub name: String,
    /// Opaque profile identifier assigned by the build tool.
    #[serde(default)]
    pub id: String,
}

impl ProfileSelection {
    /// Create a new profile selection.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }

    /// Classify the profile by name.
    pub fn kind(&self) -> ProfileKind {
        match self.name.as_str() {
            "Deployment" => ProfileKind::Deployment,
            "EditorHosted" => ProfileKind::EditorHosted,
            _ => ProfileKind::Custom,
        }
    }

    /// Whether downloads are required for this profile.
    pub fn requires_download(&self) -> bool {
        self.kind() != ProfileKind::EditorHosted
    }
}
