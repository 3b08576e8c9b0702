//! A [`CatalogService`] backed by a local directory mirror.
//!
//! The mirror holds what remote storage would serve:
//!
//! ```text
//! mirror/
//! ├── catalog_2024.05.01.json   locators + key -> bundle dependencies
//! ├── catalog_2024.05.01.hash   content hash of the json
//! ├── group_assets_abc123.bundle
//! └── group_assets_def456.bundle
//! ```
//!
//! Downloaded bundles land in the content cache as
//! `<cache>/<file_id>/<version>/__data` with an `__info` file next to it.
//! The version directory is the bundle's CRC-32C, so unchanged bundles are
//! never fetched twice across catalog updates.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use super::{BoxFuture, CatalogService, ContentKey, ResourceLocator, TransportError};
use crate::cache::{checksum_bytes, checksum_of, derive_file_id, CatalogFiles};
use crate::error::{SyncError, SyncResult};

const DATA_FILE: &str = "__data";
const INFO_FILE: &str = "__info";
const PARTIAL_FILE: &str = "__partial";

/// On-disk catalog format served by the mirror.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MirrorCatalog {
    pub version: String,
    #[serde(default)]
    pub locators: Vec<ResourceLocator>,
    /// Bundle file names each key depends on, relative to the catalog.
    #[serde(default)]
    pub dependencies: BTreeMap<String, Vec<String>>,
}

impl MirrorCatalog {
    /// Read and parse a catalog json file.
    pub fn read(path: &Path) -> Result<Self, TransportError> {
        let content = fs::read_to_string(path)
            .map_err(|e| TransportError::Catalog(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| TransportError::Catalog(format!("{}: {}", path.display(), e)))
    }

    /// Write `catalog_<version>.json` and its `.hash` into `dir`.
    pub fn publish(&self, dir: &Path) -> SyncResult<(PathBuf, PathBuf)> {
        fs::create_dir_all(dir).map_err(|e| SyncError::CreateDirFailed {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let json_path = dir.join(format!("catalog_{}.json", self.version));
        let hash_path = dir.join(format!("catalog_{}.hash", self.version));
        let json =
            serde_json::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;

        fs::write(&json_path, &json).map_err(|e| SyncError::WriteFailed {
            path: json_path.clone(),
            source: e,
        })?;
        fs::write(&hash_path, format!("{:08x}", checksum_bytes(json.as_bytes()))).map_err(
            |e| SyncError::WriteFailed {
                path: hash_path.clone(),
                source: e,
            },
        )?;

        Ok((json_path, hash_path))
    }
}

#[derive(Debug, Clone)]
struct LoadedCatalog {
    id: String,
    /// Directory bundle paths are resolved against.
    root: PathBuf,
    catalog: MirrorCatalog,
}

impl LoadedCatalog {
    fn load(json: &Path, root: &Path) -> Result<Self, TransportError> {
        Ok(Self {
            id: catalog_id(json),
            root: root.to_path_buf(),
            catalog: MirrorCatalog::read(json)?,
        })
    }
}

#[derive(Debug, Clone)]
struct BundleSource {
    path: PathBuf,
    file_id: String,
}

/// Local-directory catalog service.
pub struct DirectoryCatalog {
    mirror: PathBuf,
    cache_dir: PathBuf,
    catalog_files: CatalogFiles,
    /// Index 0 is the main catalog; later entries were loaded at runtime.
    loaded: Arc<RwLock<Vec<LoadedCatalog>>>,
}

impl DirectoryCatalog {
    /// Open the mirror, loading the newest local catalog if one was
    /// previously fetched, else the mirror's own catalog.
    pub fn open(
        mirror: impl Into<PathBuf>,
        cache_dir: impl Into<PathBuf>,
        catalog_dir: impl Into<PathBuf>,
    ) -> SyncResult<Self> {
        let mirror = mirror.into();
        let catalog_files = CatalogFiles::new(catalog_dir);

        let json = match catalog_files.newest_json()? {
            Some(local) => local,
            None => CatalogFiles::new(&mirror).newest_json()?.ok_or_else(|| {
                TransportError::Unavailable(format!(
                    "no catalog found in mirror {}",
                    mirror.display()
                ))
            })?,
        };
        let main = LoadedCatalog::load(&json, &mirror)?;

        info!(
            mirror = %mirror.display(),
            catalog = %main.id,
            locators = main.catalog.locators.len(),
            "Opened directory catalog"
        );

        Ok(Self {
            mirror,
            cache_dir: cache_dir.into(),
            catalog_files,
            loaded: Arc::new(RwLock::new(vec![main])),
        })
    }

    /// Mirror directory this catalog reads from.
    pub fn mirror(&self) -> &Path {
        &self.mirror
    }

    fn newest_in(
        files: &CatalogFiles,
    ) -> Result<(Option<PathBuf>, Option<PathBuf>), TransportError> {
        let hash = files
            .newest_hash()
            .map_err(|e| TransportError::Catalog(e.to_string()))?;
        let json = files
            .newest_json()
            .map_err(|e| TransportError::Catalog(e.to_string()))?;
        Ok((hash, json))
    }

    fn resolve(&self, key: &ContentKey) -> Result<Vec<BundleSource>, TransportError> {
        let loaded = self.loaded.read();
        let mut known = false;
        let mut sources = Vec::new();

        for entry in loaded.iter() {
            if entry.catalog.locators.iter().any(|l| l.keys.contains(key)) {
                known = true;
            }
            if let Some(files) = entry.catalog.dependencies.get(key.as_str()) {
                known = true;
                for file in files {
                    if let Some(file_id) = derive_file_id(file) {
                        sources.push(BundleSource {
                            path: entry.root.join(file),
                            file_id,
                        });
                    }
                }
            }
        }

        if known {
            Ok(sources)
        } else {
            Err(TransportError::UnknownKey(key.to_string()))
        }
    }
}

fn catalog_id(json: &Path) -> String {
    json.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn read_hash(path: &Path) -> Result<String, TransportError> {
    fs::read_to_string(path)
        .map(|s| s.trim().to_string())
        .map_err(|e| TransportError::Catalog(format!("{}: {}", path.display(), e)))
}

fn bundle_version(source: &BundleSource, key: &ContentKey) -> Result<String, TransportError> {
    checksum_of(&source.path)
        .map(|crc| format!("{:08x}", crc))
        .map_err(|e| TransportError::Failed {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

fn remaining_bytes(
    cache_dir: &Path,
    sources: &[BundleSource],
    key: &ContentKey,
) -> Result<i64, TransportError> {
    let mut total = 0i64;
    for source in sources {
        let version = bundle_version(source, key)?;
        let target = cache_dir.join(&source.file_id).join(&version).join(DATA_FILE);
        if target.is_file() {
            continue;
        }
        let size = fs::metadata(&source.path)
            .map_err(|e| TransportError::Failed {
                key: key.to_string(),
                reason: e.to_string(),
            })?
            .len();
        total += size as i64;
    }
    Ok(total)
}

fn clear_stale_versions(
    cache_dir: &Path,
    sources: &[BundleSource],
    key: &ContentKey,
) -> Result<usize, TransportError> {
    let mut removed = 0;
    for source in sources {
        let version = bundle_version(source, key)?;
        let folder = cache_dir.join(&source.file_id);
        let Ok(entries) = fs::read_dir(&folder) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() && entry.file_name().to_string_lossy() != version {
                fs::remove_dir_all(&path).map_err(|e| TransportError::Failed {
                    key: key.to_string(),
                    reason: e.to_string(),
                })?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

fn copy_bundle(
    cache_dir: &Path,
    source: &BundleSource,
    key: &ContentKey,
) -> Result<bool, TransportError> {
    let failed = |reason: String| TransportError::Failed {
        key: key.to_string(),
        reason,
    };

    let version = bundle_version(source, key)?;
    let dir = cache_dir.join(&source.file_id).join(&version);
    if dir.join(DATA_FILE).is_file() {
        return Ok(false);
    }

    fs::create_dir_all(&dir).map_err(|e| failed(e.to_string()))?;
    let partial = dir.join(PARTIAL_FILE);
    let size = fs::copy(&source.path, &partial).map_err(|e| failed(e.to_string()))?;

    let info = format!(
        "source: {}\nversion: {}\nsize: {}\n",
        source.path.display(),
        version,
        size
    );
    fs::write(dir.join(INFO_FILE), info).map_err(|e| failed(e.to_string()))?;
    fs::rename(&partial, dir.join(DATA_FILE)).map_err(|e| failed(e.to_string()))?;
    Ok(true)
}

async fn blocking<T, F>(key: &ContentKey, f: F) -> Result<T, TransportError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, TransportError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TransportError::Failed {
            key: key.to_string(),
            reason: e.to_string(),
        })?
}

impl CatalogService for DirectoryCatalog {
    fn check_for_updates(&self) -> BoxFuture<'_, Result<Vec<String>, TransportError>> {
        Box::pin(async move {
            if !self.mirror.is_dir() {
                return Err(TransportError::Unavailable(format!(
                    "mirror {} is not reachable",
                    self.mirror.display()
                )));
            }

            let (remote_hash, remote_json) = Self::newest_in(&CatalogFiles::new(&self.mirror))?;
            let (Some(remote_hash), Some(remote_json)) = (remote_hash, remote_json) else {
                return Err(TransportError::Catalog(format!(
                    "mirror {} has no catalog pair",
                    self.mirror.display()
                )));
            };

            let (local_hash, _) = Self::newest_in(&self.catalog_files)?;
            let changed = match local_hash {
                Some(local) => read_hash(&local)? != read_hash(&remote_hash)?,
                None => true,
            };

            if changed {
                let id = catalog_id(&remote_json);
                debug!(catalog = %id, "Catalog update available");
                Ok(vec![id])
            } else {
                Ok(Vec::new())
            }
        })
    }

    fn update_catalogs(
        &self,
        catalog_ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ResourceLocator>, TransportError>> {
        Box::pin(async move {
            let (remote_hash, remote_json) = Self::newest_in(&CatalogFiles::new(&self.mirror))?;
            let (Some(remote_hash), Some(remote_json)) = (remote_hash, remote_json) else {
                return Err(TransportError::Unavailable(format!(
                    "mirror {} has no catalog pair",
                    self.mirror.display()
                )));
            };

            let id = catalog_id(&remote_json);
            if !catalog_ids.is_empty() && !catalog_ids.contains(&id) {
                debug!(
                    requested = ?catalog_ids,
                    available = %id,
                    "Requested catalogs not in mirror"
                );
                return Ok(Vec::new());
            }

            let dir = self.catalog_files.dir().to_path_buf();
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| TransportError::Catalog(format!("{}: {}", dir.display(), e)))?;

            for source in [&remote_json, &remote_hash] {
                let Some(name) = source.file_name() else {
                    continue;
                };
                let target = dir.join(name);
                tokio::fs::copy(source, &target)
                    .await
                    .map_err(|e| TransportError::Catalog(format!("{}: {}", target.display(), e)))?;
            }

            let updated = LoadedCatalog::load(&dir.join(format!("{}.json", id)), &self.mirror)?;
            let locators = updated.catalog.locators.clone();
            {
                let mut loaded = self.loaded.write();
                if loaded.is_empty() {
                    loaded.push(updated);
                } else {
                    loaded[0] = updated;
                }
            }

            info!(catalog = %id, locators = locators.len(), "Updated catalog from mirror");
            Ok(locators)
        })
    }

    fn loaded_locators(&self) -> Vec<ResourceLocator> {
        self.loaded
            .read()
            .iter()
            .flat_map(|entry| entry.catalog.locators.iter().cloned())
            .collect()
    }

    fn download_size(&self, key: &ContentKey) -> BoxFuture<'_, Result<i64, TransportError>> {
        let key = key.clone();
        Box::pin(async move {
            let sources = self.resolve(&key)?;
            let cache_dir = self.cache_dir.clone();
            let k = key.clone();
            blocking(&key, move || remaining_bytes(&cache_dir, &sources, &k)).await
        })
    }

    fn clear_dependency_cache(
        &self,
        key: &ContentKey,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        let key = key.clone();
        Box::pin(async move {
            let sources = self.resolve(&key)?;
            let cache_dir = self.cache_dir.clone();
            let k = key.clone();
            let removed =
                blocking(&key, move || clear_stale_versions(&cache_dir, &sources, &k)).await?;
            if removed > 0 {
                debug!(key = %key, removed, "Cleared stale bundle versions");
            }
            Ok(())
        })
    }

    fn download_dependencies(
        &self,
        key: &ContentKey,
    ) -> BoxFuture<'_, Result<(), TransportError>> {
        let key = key.clone();
        Box::pin(async move {
            let sources = self.resolve(&key)?;
            let cache_dir = self.cache_dir.clone();
            let k = key.clone();
            let copied = blocking(&key, move || {
                let mut copied = 0usize;
                for source in &sources {
                    if copy_bundle(&cache_dir, source, &k)? {
                        copied += 1;
                    }
                }
                Ok(copied)
            })
            .await?;
            trace!(key = %key, copied, "Downloaded dependencies");
            Ok(())
        })
    }

    fn release(&self, key: &ContentKey) {
        trace!(key = %key, "Released key");
    }

    fn load_content_catalog(
        &self,
        location: &str,
    ) -> BoxFuture<'_, Result<ResourceLocator, TransportError>> {
        let path = PathBuf::from(location);
        Box::pin(async move {
            let root = path
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.mirror.clone());
            let catalog = LoadedCatalog::load(&path, &root)?;

            let mut seen = HashSet::new();
            let keys = catalog
                .catalog
                .locators
                .iter()
                .flat_map(|l| l.keys.iter())
                .filter(|k| seen.insert((*k).clone()))
                .cloned()
                .collect();
            let locator = ResourceLocator::new(catalog.id.clone(), keys);

            {
                let mut loaded = self.loaded.write();
                // Reloading a runtime catalog replaces it; the main catalog stays at 0
                if let Some(pos) = loaded.iter().skip(1).position(|e| e.id == catalog.id) {
                    loaded.remove(pos + 1);
                }
                loaded.push(catalog);
            }

            info!(catalog = %locator.id, keys = locator.keys.len(), "Loaded content catalog");
            Ok(locator)
        })
    }
}
