//! Decides which content keys must be present locally.

use std::collections::HashSet;

use super::{ContentKey, ResourceLocator};

/// What the remote catalog check reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogUpdate {
    /// Catalogs changed; these are the locators after updating.
    Updated(Vec<ResourceLocator>),
    /// Nothing changed remotely.
    UpToDate,
}

/// Behavior when no update is reported and no prior download completed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ColdStartPolicy {
    /// Download every key of the currently loaded locators.
    #[default]
    DownloadLoaded,
    /// Do nothing until the catalog reports an update.
    Skip,
}

impl ColdStartPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColdStartPolicy::DownloadLoaded => "download_loaded",
            ColdStartPolicy::Skip => "skip",
        }
    }

    /// Parse the configuration file spelling.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "download_loaded" | "download-loaded" => Some(ColdStartPolicy::DownloadLoaded),
            "skip" => Some(ColdStartPolicy::Skip),
            _ => None,
        }
    }
}

/// Inputs gathered from the catalog service and the flag store.
#[derive(Debug, Clone)]
pub struct RemoteCheckResult {
    pub update: CatalogUpdate,
    pub loaded: Vec<ResourceLocator>,
    pub initial_download_completed: bool,
}

/// Where a reconciled key set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// Keys of locators the update returned.
    Update,
    /// Keys of already loaded locators on a first run.
    ColdStart,
    /// A previous run completed and nothing changed.
    AlreadyComplete,
    /// Cold start with [`ColdStartPolicy::Skip`].
    Skipped,
}

/// The authoritative key set for the next download pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    pub keys: Vec<ContentKey>,
    pub source: KeySource,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Produces the key set for a pass from a remote check.
#[derive(Debug, Clone, Copy, Default)]
pub struct CatalogReconciler {
    policy: ColdStartPolicy,
}

impl CatalogReconciler {
    pub fn new(policy: ColdStartPolicy) -> Self {
        Self { policy }
    }

    /// Policy applied when no update and no completion flag exist.
    pub fn policy(&self) -> ColdStartPolicy {
        self.policy
    }

    /// Decide which keys the next session downloads.
    pub fn reconcile(&self, check: &RemoteCheckResult) -> Reconciliation {
        match &check.update {
            CatalogUpdate::Updated(locators) => Reconciliation {
                keys: union_keys(locators),
                source: KeySource::Update,
            },
            CatalogUpdate::UpToDate if check.initial_download_completed => Reconciliation {
                keys: Vec::new(),
                source: KeySource::AlreadyComplete,
            },
            CatalogUpdate::UpToDate => match self.policy {
                ColdStartPolicy::DownloadLoaded => Reconciliation {
                    keys: union_keys(&check.loaded),
                    source: KeySource::ColdStart,
                },
                ColdStartPolicy::Skip => Reconciliation {
                    keys: Vec::new(),
                    source: KeySource::Skipped,
                },
            },
        }
    }
}

/// Keys of all locators, deduplicated, in first-seen order.
pub fn union_keys(locators: &[ResourceLocator]) -> Vec<ContentKey> {
    let mut seen = HashSet::new();
    locators
        .iter()
        .flat_map(|locator| locator.keys.iter())
        .filter(|key| seen.insert((*key).clone()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn locator(id: &str, keys: &[&str]) -> ResourceLocator {
        ResourceLocator::new(id, keys.iter().map(|k| ContentKey::from(*k)).collect())
    }

    fn keys(values: &[&str]) -> Vec<ContentKey> {
        values.iter().map(|k| ContentKey::from(*k)).collect()
    }

    #[test]
    fn test_update_unions_locators() {
        let check = RemoteCheckResult {
            update: CatalogUpdate::Updated(vec![
                locator("a", &["k1", "k2"]),
                locator("b", &["k2", "k3"]),
            ]),
            loaded: vec![locator("old", &["x"])],
            initial_download_completed: true,
        };

        let result = CatalogReconciler::default().reconcile(&check);
        assert_eq!(result.keys, keys(&["k1", "k2", "k3"]));
        assert_eq!(result.source, KeySource::Update);
    }

    #[test]
    fn test_up_to_date_with_flag_is_empty() {
        let check = RemoteCheckResult {
            update: CatalogUpdate::UpToDate,
            loaded: vec![locator("a", &["k1"])],
            initial_download_completed: true,
        };

        let result = CatalogReconciler::default().reconcile(&check);
        assert!(result.is_empty());
        assert_eq!(result.source, KeySource::AlreadyComplete);
    }

    #[test]
    fn test_cold_start_downloads_loaded() {
        let check = RemoteCheckResult {
            update: CatalogUpdate::UpToDate,
            loaded: vec![locator("a", &["k1", "k1"]), locator("b", &["k2"])],
            initial_download_completed: false,
        };

        let result = CatalogReconciler::new(ColdStartPolicy::DownloadLoaded).reconcile(&check);
        assert_eq!(result.keys, keys(&["k1", "k2"]));
        assert_eq!(result.source, KeySource::ColdStart);
    }

    #[test]
    fn test_cold_start_skip_policy() {
        let check = RemoteCheckResult {
            update: CatalogUpdate::UpToDate,
            loaded: vec![locator("a", &["k1"])],
            initial_download_completed: false,
        };

        let result = CatalogReconciler::new(ColdStartPolicy::Skip).reconcile(&check);
        assert!(result.is_empty());
        assert_eq!(result.source, KeySource::Skipped);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            ColdStartPolicy::parse("download_loaded"),
            Some(ColdStartPolicy::DownloadLoaded)
        );
        assert_eq!(ColdStartPolicy::parse(" Skip "), Some(ColdStartPolicy::Skip));
        assert_eq!(ColdStartPolicy::parse("sometimes"), None);
        assert_eq!(ColdStartPolicy::default().as_str(), "download_loaded");
    }
}
