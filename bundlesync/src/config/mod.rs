//! Runtime configuration.
//!
//! [`SyncConfig`] is what the engine consumes. [`ConfigFile`] is the
//! persisted INI form edited by operators; it converts into a `SyncConfig`.

mod file;
mod keys;

pub use file::{
    config_file_path, ConfigFile, ConnectivitySettings, DownloadSettings, LoggingSettings,
    PathSettings, ProfileSettings, ValidationSettings,
};
pub use keys::ConfigKey;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::ColdStartPolicy;
use crate::connectivity::DEFAULT_MONITOR_INTERVAL;
use crate::download::{default_always_download_markers, SkipList};
use crate::logging::LoggingConfig;
use crate::manifest::ProfileSelection;
use crate::validation::DEFAULT_MIN_PAYLOAD_FILES;

/// Default number of full re-downloads after validation failures.
pub const DEFAULT_MAX_FULL_REDOWNLOADS: usize = 3;

/// Default number of retried passes when no monitor drives resumption.
pub const DEFAULT_MAX_PASS_RETRIES: usize = 3;

/// Default delay between retried passes.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Default application data directory.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bundlesync")
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Persisted manifest asset.
    pub manifest_path: PathBuf,
    /// Root of the content cache.
    pub cache_dir: PathBuf,
    /// Local catalog directory; catalog pruning and checks are off when `None`.
    pub catalog_dir: Option<PathBuf>,
    /// Persisted flag store.
    pub flags_path: PathBuf,
    /// Keys never downloaded.
    pub skip_list: SkipList,
    /// Key substrings whose size hints are not trusted.
    pub always_download: Vec<String>,
    pub min_payload_files: usize,
    /// Sampling interval of the connectivity monitor.
    pub monitor_interval: Duration,
    /// Purge the cache when the catalog reports an update.
    pub purge_on_update: bool,
    pub cold_start_policy: ColdStartPolicy,
    pub max_full_redownloads: usize,
    pub max_pass_retries: usize,
    pub retry_delay: Duration,
    /// Use this profile instead of the one recorded in the manifest.
    pub profile_override: Option<ProfileSelection>,
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(default_data_dir())
    }
}

impl SyncConfig {
    /// Configuration with every path under `data_dir`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            manifest_path: data_dir.join("content_manifest.json"),
            cache_dir: data_dir.join("cache"),
            catalog_dir: Some(data_dir.join("catalogs")),
            flags_path: data_dir.join("flags.json"),
            skip_list: SkipList::default(),
            always_download: default_always_download_markers(),
            min_payload_files: DEFAULT_MIN_PAYLOAD_FILES,
            monitor_interval: DEFAULT_MONITOR_INTERVAL,
            purge_on_update: true,
            cold_start_policy: ColdStartPolicy::default(),
            max_full_redownloads: DEFAULT_MAX_FULL_REDOWNLOADS,
            max_pass_retries: DEFAULT_MAX_PASS_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            profile_override: None,
            logging: LoggingConfig::default(),
        }
    }

    /// Set the checksum manifest location.
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    /// Set the content cache root.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    /// Set the local catalog directory; `None` disables catalog checks.
    pub fn with_catalog_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.catalog_dir = dir;
        self
    }

    /// Set the completion flag file.
    pub fn with_flags_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.flags_path = path.into();
        self
    }

    /// Keys matching these patterns are never downloaded.
    pub fn with_skip_list(mut self, skip_list: SkipList) -> Self {
        self.skip_list = skip_list;
        self
    }

    /// Set markers for bundles whose size hints are not trusted.
    pub fn with_always_download(mut self, markers: Vec<String>) -> Self {
        self.always_download = markers;
        self
    }

    /// Set the minimum file count per cached version directory.
    pub fn with_min_payload_files(mut self, min: usize) -> Self {
        self.min_payload_files = min;
        self
    }

    /// Set the connectivity sampling interval.
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Purge the cache when a catalog update is applied.
    pub fn with_purge_on_update(mut self, purge: bool) -> Self {
        self.purge_on_update = purge;
        self
    }

    /// Set what a first launch without an update downloads.
    pub fn with_cold_start_policy(mut self, policy: ColdStartPolicy) -> Self {
        self.cold_start_policy = policy;
        self
    }

    /// Set how many full re-downloads a validation failure may trigger.
    pub fn with_max_full_redownloads(mut self, max: usize) -> Self {
        self.max_full_redownloads = max;
        self
    }

    /// Set failed-pass retries and the delay between them.
    pub fn with_retry(mut self, max_pass_retries: usize, retry_delay: Duration) -> Self {
        self.max_pass_retries = max_pass_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Use `profile` instead of the one in the manifest.
    pub fn with_profile_override(mut self, profile: ProfileSelection) -> Self {
        self.profile_override = Some(profile);
        self
    }

    /// Set logging options.
    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_data_dir() {
        let config = SyncConfig::new("/data/app");
        assert_eq!(
            config.manifest_path,
            PathBuf::from("/data/app/content_manifest.json")
        );
        assert_eq!(config.cache_dir, PathBuf::from("/data/app/cache"));
        assert_eq!(config.catalog_dir, Some(PathBuf::from("/data/app/catalogs")));
        assert_eq!(config.flags_path, PathBuf::from("/data/app/flags.json"));
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::new("/tmp");
        assert_eq!(config.min_payload_files, 2);
        assert_eq!(config.monitor_interval, Duration::from_secs(5));
        assert_eq!(config.max_full_redownloads, 3);
        assert_eq!(config.cold_start_policy, ColdStartPolicy::DownloadLoaded);
        assert!(config.purge_on_update);
        assert!(config.profile_override.is_none());
        assert_eq!(
            config.always_download,
            vec!["unitybuiltinshaders", "monoscripts"]
        );
    }

    #[test]
    fn test_builder_chain() {
        let config = SyncConfig::new("/tmp")
            .with_cache_dir("/cache")
            .with_catalog_dir(None)
            .with_skip_list(SkipList::new(["debug_"]))
            .with_cold_start_policy(ColdStartPolicy::Skip)
            .with_retry(5, Duration::from_millis(10))
            .with_profile_override(ProfileSelection::new("Staging", "s1"));

        assert_eq!(config.cache_dir, PathBuf::from("/cache"));
        assert!(config.catalog_dir.is_none());
        assert_eq!(config.skip_list.patterns(), &["debug_".to_string()]);
        assert_eq!(config.cold_start_policy, ColdStartPolicy::Skip);
        assert_eq!(config.max_pass_retries, 5);
        assert_eq!(config.profile_override.unwrap().name, "Staging");
    }
}
