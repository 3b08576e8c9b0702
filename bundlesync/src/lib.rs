//! bundlesync - resumable delivery and validation of remote content bundles
//!
//! The engine reconciles a remote catalog, a key-addressed local cache and a
//! checksum manifest produced at build time. Downloads survive connectivity
//! loss and suspension, resume without re-fetching finished keys, and end
//! with an integrity check that falls back to a full re-download.
//!
//! # Layout
//!
//! - [`manifest`]: the build-time checksum manifest
//! - [`cache`]: local cache inspection, file-id derivation, CRC32C
//! - [`catalog`]: the catalog collaborator, reconciliation and persisted flags
//! - [`download`]: the per-key download state machine
//! - [`connectivity`]: reachability and foreground sampling
//! - [`validation`]: whole-cache integrity checks
//! - [`coordinator`]: sequencing of the above during initialization
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bundlesync::catalog::{DirectoryCatalog, JsonFlagStore};
//! use bundlesync::config::SyncConfig;
//! use bundlesync::coordinator::{ContentCoordinator, SyncContext};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> bundlesync::SyncResult<()> {
//! let config = SyncConfig::new("/var/lib/app");
//! let catalog = DirectoryCatalog::open(
//!     "/srv/mirror",
//!     &config.cache_dir,
//!     "/var/lib/app/catalogs",
//! )?;
//! let flags = JsonFlagStore::new(&config.flags_path);
//!
//! let coordinator =
//!     ContentCoordinator::new(SyncContext::new(config, Arc::new(catalog), Arc::new(flags)));
//! coordinator.initialize(&CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod coordinator;
pub mod download;
pub mod error;
pub mod events;
pub mod logging;
pub mod manifest;
pub mod validation;

pub use error::{SyncError, SyncResult};
pub use events::{SyncObserver, SyncSignal};
