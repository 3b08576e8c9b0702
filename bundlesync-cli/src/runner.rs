//! Shared setup for commands: configuration, logging and the async runtime.

use std::future::Future;
use std::path::{Path, PathBuf};

use bundlesync::config::{config_file_path, ConfigFile, SyncConfig};
use bundlesync::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Loads configuration once and owns the logging guard for a command run.
pub struct CliRunner {
    config_path: PathBuf,
    config_file: ConfigFile,
    config: SyncConfig,
    _logging: Option<LoggingGuard>,
}

impl CliRunner {
    /// Load configuration from `config_path` (or the default location) and
    /// install logging.
    pub fn new(config_path: Option<PathBuf>, verbose: bool) -> Result<Self, CliError> {
        let mut runner = Self::without_logging(config_path)?;
        if verbose {
            runner.config.logging.filter = "bundlesync=debug,info".to_string();
        }
        runner._logging = Some(init_logging(&runner.config.logging)?);
        Ok(runner)
    }

    /// Load configuration without touching the global subscriber.
    pub fn without_logging(config_path: Option<PathBuf>) -> Result<Self, CliError> {
        let explicit = config_path.is_some();
        let config_path = config_path.unwrap_or_else(config_file_path);
        let config_file = load_config_file(&config_path, explicit)?;
        let config = config_file.to_sync_config();

        Ok(Self {
            config_path,
            config_file,
            config,
            _logging: None,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_file(&self) -> &ConfigFile {
        &self.config_file
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            config = %self.config_path.display(),
            "bundlesync starting"
        );
    }

    /// Run `future` to completion on a multi-threaded runtime.
    pub fn block_on<F: Future>(&self, future: F) -> Result<F::Output, CliError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(|e| CliError::Runtime(e.to_string()))?;
        Ok(runtime.block_on(future))
    }
}

/// Load the file at `path`. A missing default file yields defaults; a
/// missing explicitly requested file is an error.
pub fn load_config_file(path: &Path, explicit: bool) -> Result<ConfigFile, CliError> {
    if path.exists() {
        Ok(ConfigFile::load_from(path)?)
    } else if explicit {
        Err(CliError::Config(format!(
            "config file {} does not exist",
            path.display()
        )))
    } else {
        Ok(ConfigFile::default())
    }
}
