//! Addressable configuration keys in `section.key` form.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFile;
use crate::catalog::ColdStartPolicy;
use crate::error::{SyncError, SyncResult};

/// Every key the configuration file understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    PathsDataDir,
    PathsManifest,
    PathsCacheDir,
    PathsCatalogDir,
    PathsFlags,
    PathsMirror,

    DownloadSkip,
    DownloadAlwaysDownload,
    DownloadPurgeOnUpdate,
    DownloadColdStart,
    DownloadMaxPassRetries,
    DownloadRetryDelaySecs,

    ConnectivityEnabled,
    ConnectivityIntervalSecs,
    ConnectivityProbeAddress,

    ValidationMinPayloadFiles,
    ValidationMaxFullRedownloads,

    LoggingDirectory,
    LoggingFilter,
    LoggingFilePrefix,

    ProfileName,
    ProfileId,
}

const ALL_KEYS: &[ConfigKey] = &[
    ConfigKey::PathsDataDir,
    ConfigKey::PathsManifest,
    ConfigKey::PathsCacheDir,
    ConfigKey::PathsCatalogDir,
    ConfigKey::PathsFlags,
    ConfigKey::PathsMirror,
    ConfigKey::DownloadSkip,
    ConfigKey::DownloadAlwaysDownload,
    ConfigKey::DownloadPurgeOnUpdate,
    ConfigKey::DownloadColdStart,
    ConfigKey::DownloadMaxPassRetries,
    ConfigKey::DownloadRetryDelaySecs,
    ConfigKey::ConnectivityEnabled,
    ConfigKey::ConnectivityIntervalSecs,
    ConfigKey::ConnectivityProbeAddress,
    ConfigKey::ValidationMinPayloadFiles,
    ConfigKey::ValidationMaxFullRedownloads,
    ConfigKey::LoggingDirectory,
    ConfigKey::LoggingFilter,
    ConfigKey::LoggingFilePrefix,
    ConfigKey::ProfileName,
    ConfigKey::ProfileId,
];

impl ConfigKey {
    /// All keys, grouped by section.
    pub fn all() -> &'static [ConfigKey] {
        ALL_KEYS
    }

    /// INI section the key lives in.
    pub fn section(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            PathsDataDir | PathsManifest | PathsCacheDir | PathsCatalogDir | PathsFlags
            | PathsMirror => "paths",
            DownloadSkip
            | DownloadAlwaysDownload
            | DownloadPurgeOnUpdate
            | DownloadColdStart
            | DownloadMaxPassRetries
            | DownloadRetryDelaySecs => "download",
            ConnectivityEnabled | ConnectivityIntervalSecs | ConnectivityProbeAddress => {
                "connectivity"
            }
            ValidationMinPayloadFiles | ValidationMaxFullRedownloads => "validation",
            LoggingDirectory | LoggingFilter | LoggingFilePrefix => "logging",
            ProfileName | ProfileId => "profile",
        }
    }

    /// Key name within its section.
    pub fn key_name(&self) -> &'static str {
        use ConfigKey::*;
        match self {
            PathsDataDir => "data_dir",
            PathsManifest => "manifest",
            PathsCacheDir => "cache_dir",
            PathsCatalogDir => "catalog_dir",
            PathsFlags => "flags",
            PathsMirror => "mirror",
            DownloadSkip => "skip",
            DownloadAlwaysDownload => "always_download",
            DownloadPurgeOnUpdate => "purge_on_update",
            DownloadColdStart => "cold_start",
            DownloadMaxPassRetries => "max_pass_retries",
            DownloadRetryDelaySecs => "retry_delay_secs",
            ConnectivityEnabled => "enabled",
            ConnectivityIntervalSecs => "interval_secs",
            ConnectivityProbeAddress => "probe_address",
            ValidationMinPayloadFiles => "min_payload_files",
            ValidationMaxFullRedownloads => "max_full_redownloads",
            LoggingDirectory => "directory",
            LoggingFilter => "filter",
            LoggingFilePrefix => "file_prefix",
            ProfileName => "name",
            ProfileId => "id",
        }
    }

    /// Full `section.key` name.
    pub fn name(&self) -> String {
        format!("{}.{}", self.section(), self.key_name())
    }

    /// Current value as it would be written to the file; empty when unset.
    pub fn get(&self, config: &ConfigFile) -> String {
        use ConfigKey::*;
        match self {
            PathsDataDir => path_string(&config.paths.data_dir),
            PathsManifest => path_string(&config.paths.manifest),
            PathsCacheDir => path_string(&config.paths.cache_dir),
            PathsCatalogDir => path_string(&config.paths.catalog_dir),
            PathsFlags => path_string(&config.paths.flags),
            PathsMirror => path_string(&config.paths.mirror),
            DownloadSkip => config.download.skip.join(","),
            DownloadAlwaysDownload => config
                .download
                .always_download
                .as_ref()
                .map(|markers| markers.join(","))
                .unwrap_or_default(),
            DownloadPurgeOnUpdate => config.download.purge_on_update.to_string(),
            DownloadColdStart => config.download.cold_start.as_str().to_string(),
            DownloadMaxPassRetries => config.download.max_pass_retries.to_string(),
            DownloadRetryDelaySecs => config.download.retry_delay_secs.to_string(),
            ConnectivityEnabled => config.connectivity.enabled.to_string(),
            ConnectivityIntervalSecs => config.connectivity.interval_secs.to_string(),
            ConnectivityProbeAddress => {
                config.connectivity.probe_address.clone().unwrap_or_default()
            }
            ValidationMinPayloadFiles => config.validation.min_payload_files.to_string(),
            ValidationMaxFullRedownloads => config.validation.max_full_redownloads.to_string(),
            LoggingDirectory => path_string(&config.logging.directory),
            LoggingFilter => config.logging.filter.clone(),
            LoggingFilePrefix => config.logging.file_prefix.clone(),
            ProfileName => config.profile.name.clone().unwrap_or_default(),
            ProfileId => config.profile.id.clone().unwrap_or_default(),
        }
    }

    /// Parse `value` and store it. An empty value clears optional keys.
    pub fn set(&self, config: &mut ConfigFile, value: &str) -> SyncResult<()> {
        use ConfigKey::*;
        let value = value.trim();
        match self {
            PathsDataDir => config.paths.data_dir = optional_path(value),
            PathsManifest => config.paths.manifest = optional_path(value),
            PathsCacheDir => config.paths.cache_dir = optional_path(value),
            PathsCatalogDir => config.paths.catalog_dir = optional_path(value),
            PathsFlags => config.paths.flags = optional_path(value),
            PathsMirror => config.paths.mirror = optional_path(value),
            DownloadSkip => config.download.skip = split_list(value),
            DownloadAlwaysDownload => {
                config.download.always_download = if value.is_empty() {
                    None
                } else {
                    Some(split_list(value))
                }
            }
            DownloadPurgeOnUpdate => config.download.purge_on_update = self.parse_bool(value)?,
            DownloadColdStart => {
                config.download.cold_start = ColdStartPolicy::parse(value).ok_or_else(|| {
                    self.invalid(value, "expected 'download_loaded' or 'skip'")
                })?
            }
            DownloadMaxPassRetries => config.download.max_pass_retries = self.parse_num(value)?,
            DownloadRetryDelaySecs => config.download.retry_delay_secs = self.parse_num(value)?,
            ConnectivityEnabled => config.connectivity.enabled = self.parse_bool(value)?,
            ConnectivityIntervalSecs => {
                let secs: u64 = self.parse_num(value)?;
                if secs == 0 {
                    return Err(self.invalid(value, "interval must be at least 1 second"));
                }
                config.connectivity.interval_secs = secs;
            }
            ConnectivityProbeAddress => config.connectivity.probe_address = optional(value),
            ValidationMinPayloadFiles => {
                config.validation.min_payload_files = self.parse_num(value)?
            }
            ValidationMaxFullRedownloads => {
                config.validation.max_full_redownloads = self.parse_num(value)?
            }
            LoggingDirectory => config.logging.directory = optional_path(value),
            LoggingFilter => {
                if value.is_empty() {
                    return Err(self.invalid(value, "filter must not be empty"));
                }
                config.logging.filter = value.to_string();
            }
            LoggingFilePrefix => {
                if value.is_empty() {
                    return Err(self.invalid(value, "file prefix must not be empty"));
                }
                config.logging.file_prefix = value.to_string();
            }
            ProfileName => config.profile.name = optional(value),
            ProfileId => config.profile.id = optional(value),
        }
        Ok(())
    }

    fn parse_bool(&self, value: &str) -> SyncResult<bool> {
        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(self.invalid(value, "expected true or false")),
        }
    }

    fn parse_num<T: FromStr>(&self, value: &str) -> SyncResult<T> {
        value
            .parse()
            .map_err(|_| self.invalid(value, "expected a non-negative integer"))
    }

    fn invalid(&self, value: &str, reason: &str) -> SyncError {
        SyncError::Config(format!("invalid value '{}' for {}: {}", value, self.name(), reason))
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.section(), self.key_name())
    }
}

impl FromStr for ConfigKey {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ALL_KEYS
            .iter()
            .copied()
            .find(|key| key.name() == wanted)
            .ok_or_else(|| SyncError::Config(format!("unknown configuration key '{}'", s)))
    }
}

fn path_string(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}

fn optional(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}

fn optional_path(value: &str) -> Option<PathBuf> {
    optional(value).map(PathBuf::from)
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
