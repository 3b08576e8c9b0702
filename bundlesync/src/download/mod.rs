//! Resumable, cancellable per-key downloads.
//!
//! - [`DownloadSession`] holds the pending/downloaded bookkeeping
//! - [`DownloadScheduler`] walks pending keys through the catalog service
//! - [`SkipList`] lets operators exclude keys without touching the catalog

mod guard;
mod progress;
mod scheduler;
mod skip;
mod state;

pub use guard::KeyOperationGuard;
pub use progress::ProgressTracker;
pub use scheduler::{
    default_always_download_markers, DownloadScheduler, PassOutcome, SchedulerState,
};
pub use skip::SkipList;
pub use state::DownloadSession;
