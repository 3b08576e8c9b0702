use std::sync::Arc;

use crate::catalog::{CatalogService, FlagStore};
use crate::config::SyncConfig;
use crate::connectivity::{EnvironmentProbe, SharedEnvironment};
use crate::events::{NoopObserver, SyncObserver};

/// Everything initialization needs, passed explicitly.
///
/// Built once by the host and handed to [`ContentCoordinator`], which owns
/// it for the lifetime of the application.
///
/// [`ContentCoordinator`]: super::ContentCoordinator
pub struct SyncContext {
    pub config: SyncConfig,
    pub catalog: Arc<dyn CatalogService>,
    pub flags: Arc<dyn FlagStore>,
    pub observer: Arc<dyn SyncObserver>,
    pub environment: SharedEnvironment,
    /// Probe for the connectivity monitor; no monitor runs when `None`.
    pub probe: Option<Arc<dyn EnvironmentProbe>>,
}

impl SyncContext {
    /// Create a context with no observer, no probe and fresh environment flags.
    pub fn new(
        config: SyncConfig,
        catalog: Arc<dyn CatalogService>,
        flags: Arc<dyn FlagStore>,
    ) -> Self {
        Self {
            config,
            catalog,
            flags,
            observer: Arc::new(NoopObserver),
            environment: SharedEnvironment::new(),
            probe: None,
        }
    }

    /// Receive signals emitted during initialization.
    pub fn with_observer(mut self, observer: Arc<dyn SyncObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Run the connectivity monitor with `probe` while initializing.
    pub fn with_probe(mut self, probe: Arc<dyn EnvironmentProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Share environment flags with the host.
    pub fn with_environment(mut self, environment: SharedEnvironment) -> Self {
        self.environment = environment;
        self
    }
}
