//! INI configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use tracing::{debug, warn};

use super::keys::ConfigKey;
use super::{
    default_data_dir, SyncConfig, DEFAULT_MAX_FULL_REDOWNLOADS, DEFAULT_MAX_PASS_RETRIES,
    DEFAULT_RETRY_DELAY,
};
use crate::catalog::ColdStartPolicy;
use crate::connectivity::DEFAULT_MONITOR_INTERVAL;
use crate::download::SkipList;
use crate::error::{SyncError, SyncResult};
use crate::logging::{LoggingConfig, DEFAULT_LOG_FILE_PREFIX, DEFAULT_LOG_FILTER};
use crate::manifest::ProfileSelection;
use crate::validation::DEFAULT_MIN_PAYLOAD_FILES;

/// Location of the user configuration file.
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bundlesync")
        .join("config.ini")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSettings {
    pub data_dir: Option<PathBuf>,
    pub manifest: Option<PathBuf>,
    pub cache_dir: Option<PathBuf>,
    pub catalog_dir: Option<PathBuf>,
    pub flags: Option<PathBuf>,
    /// Mirror directory served by the directory catalog.
    pub mirror: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub skip: Vec<String>,
    /// `None` keeps the built-in markers.
    pub always_download: Option<Vec<String>>,
    pub purge_on_update: bool,
    pub cold_start: ColdStartPolicy,
    pub max_pass_retries: usize,
    pub retry_delay_secs: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            skip: Vec::new(),
            always_download: None,
            purge_on_update: true,
            cold_start: ColdStartPolicy::default(),
            max_pass_retries: DEFAULT_MAX_PASS_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySettings {
    pub enabled: bool,
    pub interval_secs: u64,
    /// `host:port` probed over TCP.
    pub probe_address: Option<String>,
}

impl Default for ConnectivitySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: DEFAULT_MONITOR_INTERVAL.as_secs(),
            probe_address: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSettings {
    pub min_payload_files: usize,
    pub max_full_redownloads: usize,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            min_payload_files: DEFAULT_MIN_PAYLOAD_FILES,
            max_full_redownloads: DEFAULT_MAX_FULL_REDOWNLOADS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: Option<PathBuf>,
    pub filter: String,
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: None,
            filter: DEFAULT_LOG_FILTER.to_string(),
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileSettings {
    pub name: Option<String>,
    pub id: Option<String>,
}

/// Persisted configuration, one struct per INI section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub paths: PathSettings,
    pub download: DownloadSettings,
    pub connectivity: ConnectivitySettings,
    pub validation: ValidationSettings,
    pub logging: LoggingSettings,
    pub profile: ProfileSettings,
}

impl ConfigFile {
    /// Load from [`config_file_path`]. A missing file yields defaults.
    pub fn load() -> SyncResult<Self> {
        let path = config_file_path();
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from `path`. Unknown keys are logged and ignored.
    pub fn load_from(path: &Path) -> SyncResult<Self> {
        let ini = Ini::load_from_file(path)
            .map_err(|e| SyncError::Config(format!("{}: {}", path.display(), e)))?;

        let mut config = Self::default();
        for (section, properties) in ini.iter() {
            let Some(section) = section else {
                if !properties.is_empty() {
                    warn!(path = %path.display(), "Ignoring keys outside any section");
                }
                continue;
            };
            for (key, value) in properties.iter() {
                match format!("{}.{}", section, key).parse::<ConfigKey>() {
                    Ok(config_key) => config_key.set(&mut config, value)?,
                    Err(_) => warn!(section, key, "Ignoring unknown config key"),
                }
            }
        }

        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Save to [`config_file_path`].
    pub fn save(&self) -> SyncResult<()> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, writing only keys with a value.
    pub fn save_to(&self, path: &Path) -> SyncResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SyncError::CreateDirFailed {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut ini = Ini::new();
        for key in ConfigKey::all() {
            let value = key.get(self);
            if !value.is_empty() {
                ini.with_section(Some(key.section()))
                    .set(key.key_name(), value);
            }
        }

        ini.write_to_file(path).map_err(|e| SyncError::WriteFailed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Resolve into the engine configuration.
    ///
    /// Paths not set explicitly derive from `paths.data_dir`. A profile
    /// override needs `profile.name`; `profile.id` defaults to empty.
    pub fn to_sync_config(&self) -> SyncConfig {
        let data_dir = self.paths.data_dir.clone().unwrap_or_else(default_data_dir);
        let mut config = SyncConfig::new(&data_dir);

        if let Some(manifest) = &self.paths.manifest {
            config.manifest_path = manifest.clone();
        }
        if let Some(cache_dir) = &self.paths.cache_dir {
            config.cache_dir = cache_dir.clone();
        }
        if let Some(catalog_dir) = &self.paths.catalog_dir {
            config.catalog_dir = Some(catalog_dir.clone());
        }
        if let Some(flags) = &self.paths.flags {
            config.flags_path = flags.clone();
        }

        config.skip_list = SkipList::new(self.download.skip.iter().cloned());
        if let Some(markers) = &self.download.always_download {
            config.always_download = markers.clone();
        }
        config.purge_on_update = self.download.purge_on_update;
        config.cold_start_policy = self.download.cold_start;
        config.max_pass_retries = self.download.max_pass_retries;
        config.retry_delay = Duration::from_secs(self.download.retry_delay_secs);

        config.monitor_interval = Duration::from_secs(self.connectivity.interval_secs);

        config.min_payload_files = self.validation.min_payload_files;
        config.max_full_redownloads = self.validation.max_full_redownloads;

        config.logging = LoggingConfig {
            directory: self.logging.directory.clone(),
            filter: self.logging.filter.clone(),
            file_prefix: self.logging.file_prefix.clone(),
        };

        if let Some(name) = &self.profile.name {
            config.profile_override = Some(ProfileSelection::new(
                name.clone(),
                self.profile.id.clone().unwrap_or_default(),
            ));
        }

        config
    }
}
