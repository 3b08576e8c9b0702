//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bundlesync::cache::{checksum_bytes, checksum_of};
use bundlesync::catalog::{
    BoxFuture, CatalogService, ContentKey, MirrorCatalog, ResourceLocator, TransportError,
};
use bundlesync::manifest::{ManifestAsset, ManifestEntry, ProfileSelection};
use parking_lot::Mutex;
use tempfile::TempDir;

pub fn keys(values: &[&str]) -> Vec<ContentKey> {
    values.iter().map(|k| ContentKey::from(*k)).collect()
}

/// Catalog service with scripted answers and call counters.
#[derive(Default)]
pub struct ScriptedCatalog {
    pub updates: Mutex<Vec<String>>,
    pub loaded: Mutex<Vec<ResourceLocator>>,
    pub updated: Mutex<Vec<ResourceLocator>>,
    /// Remaining failures per key before downloads succeed.
    pub failures: Mutex<HashMap<String, usize>>,
    pub sizes: Mutex<HashMap<String, i64>>,
    /// Keys whose next download never finishes.
    pub stalled: Mutex<HashSet<String>>,
    /// How long `check_for_updates` takes.
    pub check_delay: Mutex<Option<Duration>>,
    pub downloads: Mutex<Vec<String>>,
    pub released: Mutex<Vec<String>>,
    pub check_calls: AtomicUsize,
    pub size_calls: AtomicUsize,
    pub download_calls: AtomicUsize,
}

impl ScriptedCatalog {
    pub fn with_loaded(locators: Vec<ResourceLocator>) -> Self {
        let catalog = Self::default();
        *catalog.loaded.lock() = locators;
        catalog
    }

    pub fn fail_times(&self, key: &str, times: usize) {
        self.failures.lock().insert(key.to_string(), times);
    }

    pub fn set_size(&self, key: &str, size: i64) {
        self.sizes.lock().insert(key.to_string(), size);
    }

    pub fn stall_once(&self, key: &str) {
        self.stalled.lock().insert(key.to_string());
    }

    pub fn downloads(&self) -> Vec<String> {
        self.downloads.lock().clone()
    }

    pub fn network_calls(&self) -> usize {
        self.size_calls.load(Ordering::SeqCst) + self.download_calls.load(Ordering::SeqCst)
    }
}

impl CatalogService for ScriptedCatalog {
    fn check_for_updates(&self) -> BoxFuture<'_, Result<Vec<String>, TransportError>> {
        self.check_calls.fetch_add(1, Ordering::SeqCst);
        let updates = std::mem::take(&mut *self.updates.lock());
        let delay = *self.check_delay.lock();
        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok(updates)
        })
    }

    fn update_catalogs(
        &self,
        _catalog_ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ResourceLocator>, TransportError>> {
        let updated = self.updated.lock().clone();
        Box::pin(async move { Ok(updated) })
    }

    fn loaded_locators(&self) -> Vec<ResourceLocator> {
        self.loaded.lock().clone()
    }

    fn download_size(&self, key: &ContentKey) -> BoxFuture<'_, Result<i64, TransportError>> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        let size = self.sizes.lock().get(key.as_str()).copied().unwrap_or(1);
        Box::pin(async move { Ok(size) })
    }

    fn clear_dependency_cache(
        &self,
        _key: &ContentKey,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(async { Ok(()) })
    }

    fn download_dependencies(&self, key: &ContentKey) -> BoxFuture<'_, Result<(), TransportError>> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        let key = key.to_string();
        if self.stalled.lock().remove(&key) {
            return Box::pin(std::future::pending());
        }
        let fail = {
            let mut failures = self.failures.lock();
            match failures.get_mut(&key) {
                Some(remaining) if *remaining > 0 => {
                    *remaining -= 1;
                    true
                }
                _ => false,
            }
        };
        if !fail {
            self.downloads.lock().push(key.clone());
        }
        Box::pin(async move {
            if fail {
                Err(TransportError::Failed {
                    key,
                    reason: "scripted failure".to_string(),
                })
            } else {
                Ok(())
            }
        })
    }

    fn release(&self, key: &ContentKey) {
        self.released.lock().push(key.to_string());
    }

    fn load_content_catalog(
        &self,
        location: &str,
    ) -> BoxFuture<'_, Result<ResourceLocator, TransportError>> {
        let locator = ResourceLocator::new(location, keys(&["extra/a"]));
        self.loaded.lock().push(locator.clone());
        Box::pin(async move { Ok(locator) })
    }
}

/// A mirror directory plus a data directory with a matching manifest.
pub struct MirrorFixture {
    pub temp: TempDir,
    pub mirror: PathBuf,
    pub data_dir: PathBuf,
}

pub const BUNDLES: &[(&str, &[u8])] = &[
    ("group_abc123.bundle", b"bundle-abc-contents"),
    ("group_def456.bundle", b"bundle-def-contents"),
    ("shaders_unitybuiltinshaders_77.bundle", b"shader-contents"),
];

impl MirrorFixture {
    /// Publish version `v1` and write a manifest for `profile`.
    pub fn new(profile: &str) -> Self {
        let temp = TempDir::new().unwrap();
        let mirror = temp.path().join("mirror");
        let data_dir = temp.path().join("data");
        fs::create_dir_all(&mirror).unwrap();
        fs::create_dir_all(&data_dir).unwrap();

        for (name, bytes) in BUNDLES {
            fs::write(mirror.join(name), bytes).unwrap();
        }

        let mut dependencies = BTreeMap::new();
        dependencies.insert(
            "scene/main".to_string(),
            vec![
                "group_abc123.bundle".to_string(),
                "shaders_unitybuiltinshaders_77.bundle".to_string(),
            ],
        );
        dependencies.insert("scene/extra".to_string(), vec!["group_def456.bundle".to_string()]);

        let (json, hash) = MirrorCatalog {
            version: "v1".to_string(),
            locators: vec![ResourceLocator::new("main", keys(&["scene/main", "scene/extra"]))],
            dependencies,
        }
        .publish(&mirror)
        .unwrap();

        let mut entries = vec![
            ManifestEntry::new(file_name(&json), checksum_of(&json).unwrap()),
            ManifestEntry::new(file_name(&hash), checksum_of(&hash).unwrap()),
        ];
        for (name, bytes) in BUNDLES {
            entries.push(ManifestEntry::new(*name, checksum_bytes(bytes)));
        }

        ManifestAsset {
            profile: Some(ProfileSelection::new(profile, "p1")),
            entries,
        }
        .write(&data_dir.join("content_manifest.json"))
        .unwrap();

        Self {
            temp,
            mirror,
            data_dir,
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }

    pub fn catalog_dir(&self) -> PathBuf {
        self.data_dir.join("catalogs")
    }

    /// Every cached primary payload file.
    pub fn cached_payloads(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_named(&self.cache_dir(), "__data", &mut found);
        found.sort();
        found
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().to_string()
}

fn collect_named(dir: &Path, name: &str, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_named(&path, name, found);
        } else if entry.file_name() == name {
            found.push(path);
        }
    }
}
