//! Network reachability and foreground monitoring.
//!
//! The monitor never touches scheduler state. It publishes edge-triggered
//! [`ConnectivityEvent`]s on a channel and keeps [`SharedEnvironment`] flags
//! current; the scheduler reads the flags before every key and the
//! coordinator reacts to the events.
//!
//! ```text
//!   probe ──sample──► ConnectivityMonitor ──event──► ContentCoordinator
//!                          │                               │ cancel / resume
//!                          ▼                               ▼
//!                   SharedEnvironment ◄──── read ──── DownloadScheduler
//! ```

mod monitor;
mod probe;

pub use monitor::{
    ConnectivityEvent, ConnectivityMonitor, EdgeDetector, SharedEnvironment,
    DEFAULT_MONITOR_INTERVAL,
};
pub use probe::{EnvironmentProbe, EnvironmentSample, SharedProbe, TcpProbe};
