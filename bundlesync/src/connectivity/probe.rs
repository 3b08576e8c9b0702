//! Sources of reachability and foreground samples.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tracing::trace;

use crate::catalog::BoxFuture;

/// One observation of the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentSample {
    /// The network is reachable.
    pub reachable: bool,
    /// The application is in the foreground and focused.
    pub foreground: bool,
}

impl EnvironmentSample {
    pub const ONLINE: Self = Self {
        reachable: true,
        foreground: true,
    };

    /// Offline or in the background.
    pub fn is_interrupted(&self) -> bool {
        !self.reachable || !self.foreground
    }
}

/// Produces environment samples on demand.
pub trait EnvironmentProbe: Send + Sync {
    fn sample(&self) -> BoxFuture<'_, EnvironmentSample>;
}

/// A probe whose values are set by the host application.
///
/// The host flips these from its own reachability and lifecycle callbacks.
#[derive(Debug, Clone)]
pub struct SharedProbe {
    reachable: Arc<AtomicBool>,
    foreground: Arc<AtomicBool>,
}

impl Default for SharedProbe {
    fn default() -> Self {
        Self {
            reachable: Arc::new(AtomicBool::new(true)),
            foreground: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl SharedProbe {
    /// Create a probe that starts online and in the foreground.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record network reachability.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Record whether the application is in the foreground.
    pub fn set_foreground(&self, foreground: bool) {
        self.foreground.store(foreground, Ordering::SeqCst);
    }

    /// The values the next sample will report.
    pub fn current(&self) -> EnvironmentSample {
        EnvironmentSample {
            reachable: self.reachable.load(Ordering::SeqCst),
            foreground: self.foreground.load(Ordering::SeqCst),
        }
    }
}

impl EnvironmentProbe for SharedProbe {
    fn sample(&self) -> BoxFuture<'_, EnvironmentSample> {
        let sample = self.current();
        Box::pin(async move { sample })
    }
}

/// Reachability by opening a TCP connection to a fixed address.
///
/// Foreground state always reads as true; headless hosts have no focus.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Default connect timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

    /// Probe `address` (`host:port`).
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Set the connect timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Address being probed.
    pub fn address(&self) -> &str {
        &self.address
    }
}

impl EnvironmentProbe for TcpProbe {
    fn sample(&self) -> BoxFuture<'_, EnvironmentSample> {
        Box::pin(async move {
            let reachable = matches!(
                tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await,
                Ok(Ok(_))
            );
            trace!(address = %self.address, reachable, "TCP reachability probe");
            EnvironmentSample {
                reachable,
                foreground: true,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_shared_probe_reflects_host_flags() {
        let probe = SharedProbe::new();
        assert_eq!(probe.sample().await, EnvironmentSample::ONLINE);

        probe.set_reachable(false);
        probe.set_foreground(false);
        let sample = probe.sample().await;
        assert!(!sample.reachable);
        assert!(!sample.foreground);
        assert!(sample.is_interrupted());
    }

    #[tokio::test]
    async fn test_tcp_probe_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        let probe = TcpProbe::new(address);
        assert!(probe.sample().await.reachable);
    }

    #[tokio::test]
    async fn test_tcp_probe_unreachable() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let probe = TcpProbe::new(address).with_timeout(Duration::from_millis(500));
        assert!(!probe.sample().await.reachable);
    }
}
