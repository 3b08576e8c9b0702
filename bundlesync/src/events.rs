//! Signals published to the host application.
//!
//! The engine reports progress through a narrow [`SyncObserver`] rather
//! than callbacks scattered across components. Observers must not block;
//! they are invoked inline from the download loop.

use std::fmt;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::validation::ValidationFailure;

/// A signal emitted during initialization.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncSignal {
    /// All content is present and validated.
    Initialized,
    /// The remote catalog changed and the cache was refreshed.
    UpdateAvailable,
    /// A download session started.
    DownloadStarted { total_keys: usize },
    /// Overall progress of the current session, 0 to 100.
    PercentageChanged(f32),
    /// Validation failed; a full re-download follows.
    ValidationFailed(ValidationFailure),
    /// A runtime catalog finished loading.
    CustomCatalogLoaded { locator_id: String },
}

impl fmt::Display for SyncSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSignal::Initialized => write!(f, "initialized"),
            SyncSignal::UpdateAvailable => write!(f, "update available"),
            SyncSignal::DownloadStarted { total_keys } => {
                write!(f, "download started ({} keys)", total_keys)
            }
            SyncSignal::PercentageChanged(pct) => write!(f, "progress {:.1}%", pct),
            SyncSignal::ValidationFailed(failure) => write!(f, "validation failed: {}", failure),
            SyncSignal::CustomCatalogLoaded { locator_id } => {
                write!(f, "catalog {} loaded", locator_id)
            }
        }
    }
}

/// Receives signals from the engine.
pub trait SyncObserver: Send + Sync {
    fn notify(&self, signal: SyncSignal);
}

/// Discards every signal.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn notify(&self, _signal: SyncSignal) {}
}

/// Forwards signals into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SyncSignal>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SyncSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SyncObserver for ChannelObserver {
    fn notify(&self, signal: SyncSignal) {
        // Receiver gone means nobody is listening any more
        let _ = self.tx.send(signal);
    }
}

/// Records every signal in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    signals: Mutex<Vec<SyncSignal>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the signals received so far.
    pub fn signals(&self) -> Vec<SyncSignal> {
        self.signals.lock().clone()
    }

    /// Progress values received so far.
    pub fn percentages(&self) -> Vec<f32> {
        self.signals
            .lock()
            .iter()
            .filter_map(|s| match s {
                SyncSignal::PercentageChanged(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded signals matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&SyncSignal) -> bool) -> usize {
        self.signals.lock().iter().filter(|s| predicate(s)).count()
    }
}

impl SyncObserver for RecordingObserver {
    fn notify(&self, signal: SyncSignal) {
        self.signals.lock().push(signal);
    }
}
