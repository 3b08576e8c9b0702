//! Read-only inspection of the local content cache, plus purge.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, info};

use crate::error::{SyncError, SyncResult};

/// A cache directory whose name matched an expected file id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheFolder {
    /// The file id the directory name matched.
    pub file_id: String,
    /// Full path to the directory.
    pub path: PathBuf,
}

/// Totals from a cache purge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgeResult {
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

/// Walks the content cache rooted at a single directory.
#[derive(Debug, Clone)]
pub struct LocalCacheInspector {
    cache_root: PathBuf,
}

impl LocalCacheInspector {
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
        }
    }

    /// Root directory of the content cache.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }

    /// Recursively find directories whose name equals one of `file_ids`.
    ///
    /// Each directory is reported at most once. A missing cache root yields
    /// an empty list.
    pub fn find_folders(&self, file_ids: &[String]) -> SyncResult<Vec<CacheFolder>> {
        let mut folders = Vec::new();
        if !self.cache_root.is_dir() {
            debug!(root = %self.cache_root.display(), "Cache root does not exist");
            return Ok(folders);
        }

        let wanted: HashSet<&str> = file_ids.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        collect_matching_dirs(&self.cache_root, &wanted, &mut seen, &mut folders)?;

        debug!(
            expected = file_ids.len(),
            found = folders.len(),
            "Scanned cache for content folders"
        );
        Ok(folders)
    }

    /// Directory that holds a folder's payload files.
    ///
    /// Cached bundles are normally stored one level down in a version
    /// directory; the most recently modified one wins. Folders without
    /// sub-directories hold their payload directly.
    pub fn payload_dir(&self, folder: &Path) -> SyncResult<PathBuf> {
        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in read_dir(folder)? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let modified = fs::metadata(&path)
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);

            let replace = match &newest {
                None => true,
                Some((time, current)) => {
                    modified > *time || (modified == *time && path < *current)
                }
            };
            if replace {
                newest = Some((modified, path));
            }
        }

        Ok(newest.map(|(_, path)| path).unwrap_or_else(|| folder.to_path_buf()))
    }

    /// Regular files directly inside `dir`, sorted by name.
    pub fn payload_files(&self, dir: &Path) -> SyncResult<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = read_dir(dir)?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();
        Ok(files)
    }

    /// Delete everything under the cache root, keeping the root itself.
    pub fn purge(&self) -> SyncResult<PurgeResult> {
        let mut result = PurgeResult::default();
        if !self.cache_root.is_dir() {
            return Ok(result);
        }

        for entry in read_dir(&self.cache_root)? {
            let path = entry.path();
            if path.is_dir() {
                tally(&path, &mut result)?;
                fs::remove_dir_all(&path).map_err(|e| SyncError::WriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            } else {
                result.files_deleted += 1;
                result.bytes_freed += entry.metadata().map(|m| m.len()).unwrap_or(0);
                fs::remove_file(&path).map_err(|e| SyncError::WriteFailed {
                    path: path.clone(),
                    source: e,
                })?;
            }
        }

        info!(
            root = %self.cache_root.display(),
            files = result.files_deleted,
            bytes = result.bytes_freed,
            "Purged content cache"
        );
        Ok(result)
    }
}

fn read_dir(dir: &Path) -> SyncResult<Vec<fs::DirEntry>> {
    let entries = fs::read_dir(dir).map_err(|e| SyncError::ReadFailed {
        path: dir.to_path_buf(),
        source: e,
    })?;

    entries
        .map(|entry| {
            entry.map_err(|e| SyncError::ReadFailed {
                path: dir.to_path_buf(),
                source: e,
            })
        })
        .collect()
}

fn collect_matching_dirs(
    dir: &Path,
    wanted: &HashSet<&str>,
    seen: &mut HashSet<PathBuf>,
    out: &mut Vec<CacheFolder>,
) -> SyncResult<()> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if wanted.contains(name.as_str()) && seen.insert(path.clone()) {
            out.push(CacheFolder {
                file_id: name,
                path: path.clone(),
            });
        }

        collect_matching_dirs(&path, wanted, seen, out)?;
    }
    Ok(())
}

fn tally(dir: &Path, result: &mut PurgeResult) -> SyncResult<()> {
    for entry in read_dir(dir)? {
        let path = entry.path();
        if path.is_dir() {
            tally(&path, result)?;
        } else {
            result.files_deleted += 1;
            result.bytes_freed += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    Ok(())
}
