//! The catalog collaborator seam.
//!
//! Everything that touches remote storage goes through [`CatalogService`].
//! The engine never fetches bytes itself; it only decides which keys to ask
//! for and in what order.
//!
//! # Dyn Compatibility
//!
//! Async methods return [`BoxFuture`] so the service can be held as
//! `Arc<dyn CatalogService>` inside the sync context.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors reported by the catalog collaborator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The remote side could not be reached.
    #[error("catalog service unavailable: {0}")]
    Unavailable(String),

    /// The key is not known to any loaded catalog.
    #[error("unknown content key: {0}")]
    UnknownKey(String),

    /// An operation on a specific key failed.
    #[error("operation on {key} failed: {reason}")]
    Failed { key: String, reason: String },

    /// A catalog could not be read or parsed.
    #[error("catalog error: {0}")]
    Catalog(String),
}

/// Opaque handle for a downloadable unit. Equality is by string value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentKey(String);

impl ContentKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContentKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for ContentKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

impl AsRef<str> for ContentKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The keys served by one loaded catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocator {
    pub id: String,
    #[serde(default)]
    pub keys: Vec<ContentKey>,
}

impl ResourceLocator {
    pub fn new(id: impl Into<String>, keys: Vec<ContentKey>) -> Self {
        Self {
            id: id.into(),
            keys,
        }
    }
}

/// Download-capable collaborator that owns the remote catalog and storage.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the coordinator shares one
/// instance between the scheduler and the host application.
pub trait CatalogService: Send + Sync {
    /// Ask the remote side which catalogs have newer versions.
    ///
    /// Returns the ids of the catalogs that changed; empty when up to date.
    fn check_for_updates(&self) -> BoxFuture<'_, Result<Vec<String>, TransportError>>;

    /// Fetch the given catalogs and return the locators they now describe.
    fn update_catalogs(
        &self,
        catalog_ids: Vec<String>,
    ) -> BoxFuture<'_, Result<Vec<ResourceLocator>, TransportError>>;

    /// Locators of every catalog currently loaded.
    fn loaded_locators(&self) -> Vec<ResourceLocator>;

    /// Remaining bytes to download for a key.
    ///
    /// Zero or negative means the content is already cached.
    fn download_size(&self, key: &ContentKey) -> BoxFuture<'_, Result<i64, TransportError>>;

    /// Drop stale cached versions of the key's dependencies.
    fn clear_dependency_cache(&self, key: &ContentKey)
        -> BoxFuture<'_, Result<(), TransportError>>;

    /// Download every bundle the key depends on into the local cache.
    fn download_dependencies(&self, key: &ContentKey)
        -> BoxFuture<'_, Result<(), TransportError>>;

    /// Release any per-key handles held by the service.
    fn release(&self, key: &ContentKey);

    /// Load an additional catalog from `location` and add it to the loaded set.
    fn load_content_catalog(
        &self,
        location: &str,
    ) -> BoxFuture<'_, Result<ResourceLocator, TransportError>>;
}
