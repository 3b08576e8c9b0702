//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a directory is configured, to a daily
//! rolling file through a non-blocking writer. `RUST_LOG` overrides the
//! configured filter.

use std::fs;
use std::path::PathBuf;

use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{SyncError, SyncResult};

/// Default filter directive.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Default rolling file prefix.
pub const DEFAULT_LOG_FILE_PREFIX: &str = "bundlesync.log";

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory for rolling log files; stderr only when `None`.
    pub directory: Option<PathBuf>,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// File name prefix for rolling log files.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            filter: DEFAULT_LOG_FILTER.to_string(),
            file_prefix: DEFAULT_LOG_FILE_PREFIX.to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Default filter directive when `RUST_LOG` is unset.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Keeps the file writer flushing until dropped.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Build the filter, preferring `env` (the `RUST_LOG` value) when set.
pub fn build_filter(configured: &str, env: Option<&str>) -> SyncResult<EnvFilter> {
    let directives = env.filter(|v| !v.trim().is_empty()).unwrap_or(configured);
    EnvFilter::try_new(directives)
        .map_err(|e| SyncError::Config(format!("invalid log filter '{}': {}", directives, e)))
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns [`SyncError::Config`] for an invalid filter or when a subscriber
/// is already installed.
pub fn init_logging(config: &LoggingConfig) -> SyncResult<LoggingGuard> {
    let env = std::env::var("RUST_LOG").ok();
    let filter = build_filter(&config.filter, env.as_deref())?;

    let timer = OffsetTime::local_rfc_3339()
        .unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_target(false);

    let (file_layer, file_guard) = match &config.directory {
        Some(dir) => {
            fs::create_dir_all(dir).map_err(|e| SyncError::CreateDirFailed {
                path: dir.clone(),
                source: e,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| SyncError::Config(format!("logging already initialized: {}", e)))?;

    Ok(LoggingGuard { _file: file_guard })
}
