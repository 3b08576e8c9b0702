//! The download state machine.
//!
//! ```text
//!   begin() / resume()       run_pass()
//!   ──────────────────► Idle ──────────► Running ──┬──► Completed
//!                        ▲                         ├──► Failed
//!                        └──────── resume() ◄──────┴──► Cancelled
//! ```
//!
//! A pass walks the pending keys strictly in order. Per-key failures are
//! absorbed into the session and reported through [`PassOutcome`]; nothing
//! a single key does can abort the pass except cancellation.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::guard::KeyOperationGuard;
use super::progress::ProgressTracker;
use super::skip::SkipList;
use super::state::DownloadSession;
use crate::cache::{BUILTIN_SHADERS_MARKER, MONO_SCRIPTS_MARKER};
use crate::catalog::{CatalogService, ContentKey, TransportError};
use crate::connectivity::SharedEnvironment;
use crate::events::{SyncObserver, SyncSignal};

/// Lifecycle of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SchedulerState::Idle => "idle",
            SchedulerState::Running => "running",
            SchedulerState::Completed => "completed",
            SchedulerState::Failed => "failed",
            SchedulerState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Result of one pass over the pending keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Every key is downloaded.
    Completed,
    /// The pass ran to the end but some keys failed and remain pending.
    Failed { failed_keys: Vec<ContentKey> },
    /// The pass stopped early; remaining keys stay pending.
    Cancelled,
}

/// Default markers whose size hints are never trusted.
pub fn default_always_download_markers() -> Vec<String> {
    vec![
        BUILTIN_SHADERS_MARKER.to_string(),
        MONO_SCRIPTS_MARKER.to_string(),
    ]
}

enum KeyResult {
    Downloaded,
    AlreadyCached,
    Failed(TransportError),
    Cancelled,
}

/// Drives per-key downloads through the catalog service.
pub struct DownloadScheduler {
    service: Arc<dyn CatalogService>,
    observer: Arc<dyn SyncObserver>,
    environment: SharedEnvironment,
    skip_list: SkipList,
    always_download: Vec<String>,
    state: SchedulerState,
    session: DownloadSession,
    progress: ProgressTracker,
}

impl DownloadScheduler {
    /// Create an idle scheduler with the default always-download markers.
    pub fn new(
        service: Arc<dyn CatalogService>,
        observer: Arc<dyn SyncObserver>,
        environment: SharedEnvironment,
    ) -> Self {
        Self {
            service,
            observer,
            environment,
            skip_list: SkipList::default(),
            always_download: default_always_download_markers(),
            state: SchedulerState::Idle,
            session: DownloadSession::new(Vec::new()),
            progress: ProgressTracker::new(),
        }
    }

    /// Keys matching these patterns are marked downloaded without transport.
    pub fn with_skip_list(mut self, skip_list: SkipList) -> Self {
        self.skip_list = skip_list;
        self
    }

    /// Replace the markers whose size hints are never trusted.
    pub fn with_always_download(mut self, markers: Vec<String>) -> Self {
        self.always_download = markers;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// The active download session.
    pub fn session(&self) -> &DownloadSession {
        &self.session
    }

    /// Replace the session with a fresh one over `keys`.
    pub fn begin(&mut self, keys: Vec<ContentKey>) {
        self.session = DownloadSession::new(keys);
        self.progress.reset();
        self.state = SchedulerState::Idle;

        info!(total = self.session.total(), "Download session started");
        self.observer.notify(SyncSignal::DownloadStarted {
            total_keys: self.session.total(),
        });
    }

    /// Prepare another pass over the keys not yet downloaded.
    ///
    /// Returns the number of keys left.
    pub fn resume(&mut self) -> usize {
        self.session.resume();
        self.state = SchedulerState::Idle;
        let remaining = self.session.pending().len();
        debug!(remaining, "Download session resumed");
        remaining
    }

    /// Run one pass over the pending keys.
    pub async fn run_pass(&mut self, cancel: &CancellationToken) -> PassOutcome {
        self.state = SchedulerState::Running;
        let keys = self.session.pending().to_vec();

        for key in keys {
            if cancel.is_cancelled() || self.environment.is_interrupted() {
                return self.finish_cancelled();
            }

            if let Some(pattern) = self.skip_list.matching(&key) {
                debug!(key = %key, pattern, "Skipping key on override list");
                self.mark_downloaded(&key);
                continue;
            }

            match self.process_key(&key, cancel).await {
                KeyResult::Downloaded => {
                    trace!(key = %key, "Key downloaded");
                    self.mark_downloaded(&key);
                }
                KeyResult::AlreadyCached => {
                    trace!(key = %key, "Key already cached");
                    self.mark_downloaded(&key);
                }
                KeyResult::Failed(e) => {
                    warn!(key = %key, error = %e, "Key download failed");
                    self.session.record_failure(&key);
                }
                KeyResult::Cancelled => return self.finish_cancelled(),
            }
        }

        if self.session.has_error() {
            let failed_keys = self.session.failed().to_vec();
            warn!(
                failed = failed_keys.len(),
                remaining = self.session.pending().len(),
                "Download pass finished with failures"
            );
            self.state = SchedulerState::Failed;
            PassOutcome::Failed { failed_keys }
        } else {
            info!(
                downloaded = self.session.num_downloaded(),
                total = self.session.total(),
                "Download pass completed"
            );
            self.state = SchedulerState::Completed;
            PassOutcome::Completed
        }
    }

    fn finish_cancelled(&mut self) -> PassOutcome {
        info!(
            remaining = self.session.pending().len(),
            disconnected = self.environment.is_disconnected(),
            paused = self.environment.is_paused(),
            "Download pass cancelled"
        );
        self.state = SchedulerState::Cancelled;
        PassOutcome::Cancelled
    }

    fn mark_downloaded(&mut self, key: &ContentKey) {
        if let Some(pct) = self.session.record_success(key) {
            if let Some(reported) = self.progress.update(pct) {
                self.observer.notify(SyncSignal::PercentageChanged(reported));
            }
        }
    }

    fn always_downloads(&self, key: &ContentKey) -> bool {
        self.always_download
            .iter()
            .any(|marker| key.as_str().contains(marker.as_str()))
    }

    async fn process_key(&self, key: &ContentKey, cancel: &CancellationToken) -> KeyResult {
        let service = self.service.as_ref();
        let _guard = KeyOperationGuard::new(service, key);

        let size = tokio::select! {
            biased;
            _ = cancel.cancelled() => return KeyResult::Cancelled,
            size = service.download_size(key) => size,
        };

        match size {
            Ok(size) if size <= 0 && !self.always_downloads(key) => {
                return KeyResult::AlreadyCached;
            }
            Ok(size) => trace!(key = %key, size, "Download size"),
            Err(e) => warn!(key = %key, error = %e, "Size query failed, downloading anyway"),
        }

        let cleared = tokio::select! {
            biased;
            _ = cancel.cancelled() => return KeyResult::Cancelled,
            result = service.clear_dependency_cache(key) => result,
        };
        if let Err(e) = cleared {
            debug!(key = %key, error = %e, "Failed to clear dependency cache");
        }

        let downloaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => return KeyResult::Cancelled,
            result = service.download_dependencies(key) => result,
        };

        match downloaded {
            Ok(()) => KeyResult::Downloaded,
            Err(e) => KeyResult::Failed(e),
        }
    }
}
