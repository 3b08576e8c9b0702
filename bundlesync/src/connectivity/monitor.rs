//! Timer-driven environment monitor.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::probe::{EnvironmentProbe, EnvironmentSample};

/// Default sampling interval.
pub const DEFAULT_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

/// Channel capacity for monitor events.
const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Edge-triggered environment change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Disconnected,
    Reconnected,
    Paused,
    Resumed,
}

impl ConnectivityEvent {
    /// Whether the event should stop an active pass.
    pub fn is_interruption(&self) -> bool {
        matches!(self, ConnectivityEvent::Disconnected | ConnectivityEvent::Paused)
    }
}

#[derive(Debug, Default)]
struct EnvironmentFlags {
    disconnected: AtomicBool,
    paused: AtomicBool,
}

/// Environment flags shared between the monitor and the scheduler.
///
/// Only the monitor (or the host, without a monitor) writes these.
#[derive(Debug, Clone, Default)]
pub struct SharedEnvironment {
    flags: Arc<EnvironmentFlags>,
}

impl SharedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the network is unreachable.
    pub fn is_disconnected(&self) -> bool {
        self.flags.disconnected.load(Ordering::SeqCst)
    }

    /// Check if the application is in the background.
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    /// Whether downloads must not run right now.
    pub fn is_interrupted(&self) -> bool {
        self.is_disconnected() || self.is_paused()
    }

    /// Set the disconnected flag.
    pub fn set_disconnected(&self, disconnected: bool) {
        self.flags.disconnected.store(disconnected, Ordering::SeqCst);
    }

    /// Set the paused flag.
    pub fn set_paused(&self, paused: bool) {
        self.flags.paused.store(paused, Ordering::SeqCst);
    }

    /// Overwrite both flags from a sample.
    pub fn apply(&self, sample: EnvironmentSample) {
        self.set_disconnected(!sample.reachable);
        self.set_paused(!sample.foreground);
    }
}

/// Turns a stream of samples into change events.
///
/// The first sample establishes the baseline and produces no events.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    last: Option<EnvironmentSample>,
}

impl EdgeDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a sample and return the events it causes.
    pub fn observe(&mut self, sample: EnvironmentSample) -> Vec<ConnectivityEvent> {
        let mut events = Vec::new();
        if let Some(last) = self.last {
            match (last.reachable, sample.reachable) {
                (true, false) => events.push(ConnectivityEvent::Disconnected),
                (false, true) => events.push(ConnectivityEvent::Reconnected),
                _ => {}
            }
            match (last.foreground, sample.foreground) {
                (true, false) => events.push(ConnectivityEvent::Paused),
                (false, true) => events.push(ConnectivityEvent::Resumed),
                _ => {}
            }
        }
        self.last = Some(sample);
        events
    }
}

/// Periodically samples a probe and publishes changes.
pub struct ConnectivityMonitor {
    probe: Arc<dyn EnvironmentProbe>,
    environment: SharedEnvironment,
    interval: Duration,
}

impl ConnectivityMonitor {
    pub fn new(probe: Arc<dyn EnvironmentProbe>, environment: SharedEnvironment) -> Self {
        Self {
            probe,
            environment,
            interval: DEFAULT_MONITOR_INTERVAL,
        }
    }

    /// Set the sampling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Flags the monitor keeps up to date.
    pub fn environment(&self) -> &SharedEnvironment {
        &self.environment
    }

    /// Start sampling on a background task.
    ///
    /// The task ends when `shutdown` is cancelled or the receiver is dropped.
    pub fn spawn(
        self,
        shutdown: CancellationToken,
    ) -> (JoinHandle<()>, mpsc::Receiver<ConnectivityEvent>) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let handle = tokio::spawn(self.run(tx, shutdown));
        (handle, rx)
    }

    async fn run(self, tx: mpsc::Sender<ConnectivityEvent>, shutdown: CancellationToken) {
        let mut detector = EdgeDetector::new();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(interval_ms = self.interval.as_millis() as u64, "Connectivity monitor started");

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => break,

                _ = ticker.tick() => {
                    let sample = self.probe.sample().await;
                    self.environment.apply(sample);

                    for event in detector.observe(sample) {
                        info!(event = ?event, "Environment changed");
                        // A full channel must not hold off shutdown
                        tokio::select! {
                            biased;
                            _ = shutdown.cancelled() => {
                                debug!("Connectivity monitor stopped while publishing");
                                return;
                            }
                            sent = tx.send(event) => {
                                if sent.is_err() {
                                    debug!("Connectivity receiver dropped");
                                    return;
                                }
                            }
                        }
                    }
                }
            }
        }

        debug!("Connectivity monitor stopped");
    }
}
