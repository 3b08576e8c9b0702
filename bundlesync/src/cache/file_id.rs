//! Mapping from manifest entry keys to on-disk cache folder names.
//!
//! The content cache stores every bundle in a folder named by an opaque
//! identifier. Built bundle names encode that identifier:
//!
//! ```text
//! key                                          folder
//! -------------------------------------------  -------------------------------
//! group_assets_all_abc123.bundle               abc123
//! defaultlocalgroup_unitybuiltinshaders_ff.b   defaultlocalgroup_unitybuiltinshaders
//! defaultlocalgroup_monoscripts_ee.bundle      defaultlocalgroup_monoscripts
//! ```

use std::collections::HashSet;

use crate::manifest::ManifestEntry;

/// Marker in the key of the built-in shaders bundle.
pub const BUILTIN_SHADERS_MARKER: &str = "unitybuiltinshaders";

/// Marker in the key of the mono scripts bundle.
pub const MONO_SCRIPTS_MARKER: &str = "monoscripts";

/// Minimum underscore segments for the shader/script shapes to apply.
const MIN_SPECIAL_SEGMENTS: usize = 3;

/// Recognized bundle key shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleShape {
    BuiltinShaders,
    MonoScripts,
    General,
}

impl BundleShape {
    /// Classify a key.
    pub fn of(key: &str) -> Self {
        let segments = key.split('_').count();
        if segments >= MIN_SPECIAL_SEGMENTS {
            if key.contains(BUILTIN_SHADERS_MARKER) {
                return BundleShape::BuiltinShaders;
            }
            if key.contains(MONO_SCRIPTS_MARKER) {
                return BundleShape::MonoScripts;
            }
        }
        BundleShape::General
    }
}

/// Derive the cache folder identifier for a single bundle key.
///
/// Returns `None` when the key yields an empty identifier.
pub fn derive_file_id(key: &str) -> Option<String> {
    let first = key.split('_').next().unwrap_or_default();

    let id = match BundleShape::of(key) {
        BundleShape::BuiltinShaders => format!("{}_{}", first, BUILTIN_SHADERS_MARKER),
        BundleShape::MonoScripts => format!("{}_{}", first, MONO_SCRIPTS_MARKER),
        BundleShape::General => {
            let last = key.rsplit('_').next().unwrap_or(key);
            last.split('.').next().unwrap_or_default().to_string()
        }
    };

    if id.is_empty() {
        None
    } else {
        Some(id)
    }
}

/// Derive folder identifiers for every bundle entry.
///
/// Catalog entries are skipped. Identifiers are deduplicated preserving
/// first-seen order.
pub fn derive_file_ids<'a, I>(entries: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a ManifestEntry>,
{
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| !entry.is_catalog_file())
        .filter_map(|entry| derive_file_id(&entry.key))
        .filter(|id| seen.insert(id.clone()))
        .collect()
}
