//! Initialization sequencing.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::context::SyncContext;
use crate::cache::{CatalogFiles, LocalCacheInspector, PurgeResult};
use crate::catalog::{
    union_keys, CatalogReconciler, CatalogUpdate, KeySource, RemoteCheckResult, ResourceLocator,
};
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::download::{DownloadScheduler, PassOutcome};
use crate::error::{SyncError, SyncResult};
use crate::events::SyncSignal;
use crate::manifest::{ManifestAsset, ProfileSelection};
use crate::validation::{IntegrityValidator, ValidationOutcome};

/// Summary of a completed initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct InitReport {
    pub profile: ProfileSelection,
    /// Where the downloaded key set came from.
    pub source: KeySource,
    /// Keys marked downloaded in the last session.
    pub downloaded: usize,
    /// Full re-downloads triggered by validation failures.
    pub full_redownloads: usize,
    pub validation: ValidationOutcome,
}

/// How initialization ended without error.
#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    /// Content is present and validated.
    Initialized(InitReport),
    /// The profile serves content from the host; nothing was downloaded.
    EditorHosted(ProfileSelection),
    /// Shutdown was requested; pending keys are resumed on the next run.
    Cancelled,
}

/// Connectivity events, or nothing when no monitor runs.
struct MonitorEvents {
    rx: Option<mpsc::Receiver<ConnectivityEvent>>,
}

impl MonitorEvents {
    /// Next event. Never resolves once the monitor is gone.
    async fn next(&mut self) -> ConnectivityEvent {
        loop {
            let event = match self.rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => std::future::pending().await,
            };
            match event {
                Some(event) => return event,
                None => {
                    debug!("Connectivity monitor channel closed");
                    self.rx = None;
                }
            }
        }
    }
}

struct RunningMonitor {
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl RunningMonitor {
    async fn stop(self) {
        self.shutdown.cancel();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "Connectivity monitor task failed");
        }
    }
}

/// Owns the [`SyncContext`] and runs initialization.
///
/// Initialization runs these steps:
///
/// 1. resolve the profile; a host-served profile stops here
/// 2. prune old catalog files, then check for and apply catalog updates
/// 3. reconcile the key set and run passes until the session completes
/// 4. validate; on failure purge and re-download everything, bounded
/// 5. record completion in the flag store and signal `Initialized`
///
/// The connectivity monitor runs from step 2 until initialization ends.
pub struct ContentCoordinator {
    ctx: SyncContext,
}

impl ContentCoordinator {
    /// Create a coordinator owning `ctx`.
    pub fn new(ctx: SyncContext) -> Self {
        Self { ctx }
    }

    /// The context initialization runs against.
    pub fn context(&self) -> &SyncContext {
        &self.ctx
    }

    /// Bring local content up to date and validate it.
    ///
    /// Returns [`InitOutcome::Cancelled`] when `shutdown` fires. Errors are
    /// configuration problems, catalog update failures, or exhausted retries.
    pub async fn initialize(&self, shutdown: &CancellationToken) -> SyncResult<InitOutcome> {
        let profile = match self.resolve_profile() {
            Ok(profile) => profile,
            Err(e) => {
                error!(error = %e, "Cannot initialize content");
                return Err(e);
            }
        };

        if !profile.requires_download() {
            info!(profile = %profile.name, "Content served by host, skipping download");
            self.ctx.observer.notify(SyncSignal::Initialized);
            return Ok(InitOutcome::EditorHosted(profile));
        }

        info!(profile = %profile.name, "Initializing content");
        self.prune_catalogs().await;

        let (monitor, mut events) = self.start_monitor(shutdown);
        let result = self.run(profile, &mut events, shutdown).await;
        drop(events);
        if let Some(monitor) = monitor {
            monitor.stop().await;
        }
        result
    }

    /// Swap in an alternate catalog at runtime.
    pub async fn load_custom_catalog(&self, location: &str) -> SyncResult<ResourceLocator> {
        let locator = self.ctx.catalog.load_content_catalog(location).await?;
        info!(location, locator = %locator.id, keys = locator.keys.len(), "Custom catalog loaded");
        self.ctx.observer.notify(SyncSignal::CustomCatalogLoaded {
            locator_id: locator.id.clone(),
        });
        Ok(locator)
    }

    /// Profile from the configuration override, else from the manifest asset.
    pub fn resolve_profile(&self) -> SyncResult<ProfileSelection> {
        if let Some(profile) = &self.ctx.config.profile_override {
            return Ok(profile.clone());
        }

        match ManifestAsset::read(&self.ctx.config.manifest_path) {
            Ok(asset) => asset.profile.ok_or(SyncError::ProfileMissing),
            Err(SyncError::ManifestMissing(_)) => Err(SyncError::ProfileMissing),
            Err(e) => Err(e),
        }
    }

    async fn run(
        &self,
        profile: ProfileSelection,
        events: &mut MonitorEvents,
        shutdown: &CancellationToken,
    ) -> SyncResult<InitOutcome> {
        let update = match self.check_remote(&profile, shutdown).await? {
            Some(update) => update,
            None => return Ok(InitOutcome::Cancelled),
        };

        let check = RemoteCheckResult {
            update,
            loaded: self.ctx.catalog.loaded_locators(),
            initial_download_completed: self.download_completed(&profile),
        };
        let reconciliation = CatalogReconciler::new(self.ctx.config.cold_start_policy)
            .reconcile(&check);
        info!(
            keys = reconciliation.keys.len(),
            source = ?reconciliation.source,
            "Catalog reconciled"
        );

        if reconciliation.source == KeySource::Skipped {
            info!("Cold start download skipped by policy");
            self.ctx.observer.notify(SyncSignal::Initialized);
            return Ok(InitOutcome::Initialized(InitReport {
                profile,
                source: reconciliation.source,
                downloaded: 0,
                full_redownloads: 0,
                validation: ValidationOutcome::Skipped("cold start skipped".to_string()),
            }));
        }

        let mut scheduler = DownloadScheduler::new(
            self.ctx.catalog.clone(),
            self.ctx.observer.clone(),
            self.ctx.environment.clone(),
        )
        .with_skip_list(self.ctx.config.skip_list.clone())
        .with_always_download(self.ctx.config.always_download.clone());

        if !reconciliation.is_empty() {
            scheduler.begin(reconciliation.keys.clone());
            if !self.drive(&mut scheduler, events, shutdown).await? {
                return Ok(InitOutcome::Cancelled);
            }
        }

        let mut full_redownloads = 0;
        let validation = loop {
            let outcome = self.validate().await?;
            let Some(failure) = outcome.failure().cloned() else {
                break outcome;
            };

            warn!(reason = %failure, "Content validation failed");
            self.ctx.observer.notify(SyncSignal::ValidationFailed(failure));

            if full_redownloads >= self.ctx.config.max_full_redownloads {
                error!(attempts = full_redownloads, "Giving up on content validation");
                return Err(SyncError::ValidationExhausted {
                    attempts: full_redownloads,
                });
            }
            full_redownloads += 1;

            let purged = self.purge_cache().await?;
            info!(
                attempt = full_redownloads,
                files_deleted = purged.files_deleted,
                bytes_freed = purged.bytes_freed,
                "Starting full re-download"
            );

            scheduler.begin(union_keys(&self.ctx.catalog.loaded_locators()));
            if !self.drive(&mut scheduler, events, shutdown).await? {
                return Ok(InitOutcome::Cancelled);
            }
        };

        self.ctx.flags.mark_initial_download_completed(&profile.name)?;
        info!(profile = %profile.name, validation = %validation, "Content initialized");
        self.ctx.observer.notify(SyncSignal::Initialized);

        Ok(InitOutcome::Initialized(InitReport {
            profile,
            source: reconciliation.source,
            downloaded: scheduler.session().num_downloaded(),
            full_redownloads,
            validation,
        }))
    }

    /// Completion flag for `profile`. An unreadable store counts as unset.
    fn download_completed(&self, profile: &ProfileSelection) -> bool {
        match self.ctx.flags.initial_download_completed(&profile.name) {
            Ok(completed) => completed,
            Err(e) => {
                warn!(
                    profile = %profile.name,
                    error = %e,
                    "Flag store unreadable, treating as cold start"
                );
                false
            }
        }
    }

    /// Check and apply catalog updates. `None` when shutdown fired first.
    ///
    /// An applied update clears the completion flag so an interrupted
    /// download is picked up again on the next run.
    async fn check_remote(
        &self,
        profile: &ProfileSelection,
        shutdown: &CancellationToken,
    ) -> SyncResult<Option<CatalogUpdate>> {
        let catalog = self.ctx.catalog.as_ref();

        let checked = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(None),
            checked = catalog.check_for_updates() => checked,
        };

        let ids = match checked {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Catalog update check failed, using loaded catalogs");
                return Ok(Some(CatalogUpdate::UpToDate));
            }
        };

        if ids.is_empty() {
            debug!("Catalogs up to date");
            return Ok(Some(CatalogUpdate::UpToDate));
        }

        info!(catalogs = ?ids, "Catalog update available");
        let locators = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(None),
            locators = catalog.update_catalogs(ids) => locators?,
        };

        if let Err(e) = self.ctx.flags.clear(&profile.name) {
            warn!(profile = %profile.name, error = %e, "Failed to clear completion flag");
        }

        if self.ctx.config.purge_on_update {
            let purged = self.purge_cache().await?;
            info!(
                files_deleted = purged.files_deleted,
                bytes_freed = purged.bytes_freed,
                "Cache purged for catalog update"
            );
        }
        self.ctx.observer.notify(SyncSignal::UpdateAvailable);

        Ok(Some(CatalogUpdate::Updated(locators)))
    }

    /// Run passes until the session completes.
    ///
    /// Returns `false` when shutdown fired. Interruption events cancel the
    /// running pass; the next pass starts once the environment recovers.
    async fn drive(
        &self,
        scheduler: &mut DownloadScheduler,
        events: &mut MonitorEvents,
        shutdown: &CancellationToken,
    ) -> SyncResult<bool> {
        let mut failed_passes = 0;

        loop {
            let pass_token = shutdown.child_token();
            let outcome = {
                let pass = scheduler.run_pass(&pass_token);
                tokio::pin!(pass);
                loop {
                    tokio::select! {
                        outcome = &mut pass => break outcome,
                        event = events.next() => {
                            if event.is_interruption() {
                                info!(event = ?event, "Interrupting download pass");
                                pass_token.cancel();
                            }
                        }
                    }
                }
            };

            match outcome {
                PassOutcome::Completed => return Ok(true),
                PassOutcome::Cancelled => {
                    if shutdown.is_cancelled() || !self.wait_for_environment(events, shutdown).await
                    {
                        return Ok(false);
                    }
                }
                PassOutcome::Failed { failed_keys } => {
                    failed_passes += 1;
                    if failed_passes > self.ctx.config.max_pass_retries {
                        error!(
                            attempts = failed_passes,
                            failed = failed_keys.len(),
                            "Download passes exhausted"
                        );
                        return Err(SyncError::PassFailed {
                            attempts: failed_passes,
                            failed: failed_keys.len(),
                        });
                    }

                    debug!(
                        attempt = failed_passes,
                        delay_ms = self.ctx.config.retry_delay.as_millis() as u64,
                        "Retrying failed keys"
                    );
                    tokio::select! {
                        biased;
                        _ = shutdown.cancelled() => return Ok(false),
                        event = events.next() => debug!(event = ?event, "Retrying early"),
                        _ = tokio::time::sleep(self.ctx.config.retry_delay) => {}
                    }
                }
            }

            let remaining = scheduler.resume();
            debug!(remaining, "Resuming download session");
        }
    }

    /// Wait until neither disconnected nor paused. `false` on shutdown.
    async fn wait_for_environment(
        &self,
        events: &mut MonitorEvents,
        shutdown: &CancellationToken,
    ) -> bool {
        while self.ctx.environment.is_interrupted() {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return false,
                event = events.next() => debug!(event = ?event, "Environment event while waiting"),
                _ = tokio::time::sleep(self.ctx.config.retry_delay) => {}
            }
        }
        !shutdown.is_cancelled()
    }

    fn start_monitor(
        &self,
        shutdown: &CancellationToken,
    ) -> (Option<RunningMonitor>, MonitorEvents) {
        let Some(probe) = self.ctx.probe.clone() else {
            return (None, MonitorEvents { rx: None });
        };

        let token = shutdown.child_token();
        let (handle, rx) = ConnectivityMonitor::new(probe, self.ctx.environment.clone())
            .with_interval(self.ctx.config.monitor_interval)
            .spawn(token.clone());

        (
            Some(RunningMonitor {
                handle,
                shutdown: token,
            }),
            MonitorEvents { rx: Some(rx) },
        )
    }

    async fn prune_catalogs(&self) {
        let Some(dir) = self.ctx.config.catalog_dir.clone() else {
            return;
        };
        match blocking(move || CatalogFiles::new(dir).prune_previous()).await {
            Ok(Ok(removed)) if !removed.is_empty() => {
                info!(removed = removed.len(), "Pruned previous catalog files")
            }
            Ok(Ok(_)) => {}
            Ok(Err(e)) | Err(e) => warn!(error = %e, "Failed to prune catalog files"),
        }
    }

    async fn purge_cache(&self) -> SyncResult<PurgeResult> {
        let cache_dir = self.ctx.config.cache_dir.clone();
        blocking(move || LocalCacheInspector::new(cache_dir).purge()).await?
    }

    async fn validate(&self) -> SyncResult<ValidationOutcome> {
        let validator = self.validator();
        blocking(move || validator.validate()).await
    }

    fn validator(&self) -> IntegrityValidator {
        let config = &self.ctx.config;
        let validator = IntegrityValidator::new(&config.manifest_path, &config.cache_dir)
            .with_min_payload_files(config.min_payload_files);
        match &config.catalog_dir {
            Some(dir) => validator.with_catalog_dir(PathBuf::from(dir)),
            None => validator,
        }
    }
}

async fn blocking<T, F>(f: F) -> SyncResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Task(e.to_string()))
}
