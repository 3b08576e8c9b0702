//! Remote catalog access, key reconciliation and persisted flags.
//!
//! # Architecture
//!
//! ```text
//! ContentCoordinator ── check / update ──► dyn CatalogService
//!        │                                        ▲
//!        │ RemoteCheckResult                      │ per-key downloads
//!        ▼                                        │
//! CatalogReconciler ─── Reconciliation ───► DownloadScheduler
//! ```

mod flags;
mod mirror;
mod reconciler;
mod service;

pub use flags::{FlagRecord, FlagStore, JsonFlagStore, MemoryFlagStore};
pub use mirror::{DirectoryCatalog, MirrorCatalog};
pub use reconciler::{
    union_keys, CatalogReconciler, CatalogUpdate, ColdStartPolicy, KeySource, Reconciliation,
    RemoteCheckResult,
};
pub use service::{BoxFuture, CatalogService, ContentKey, ResourceLocator, TransportError};
