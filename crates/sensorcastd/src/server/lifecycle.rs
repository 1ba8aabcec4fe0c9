//! Coordinated shutdown.
//!
//! Order on shutdown:
//! 1. terminate every registered connection (registry refuses new ones)
//! 2. stop accepting and close the listener
//! 3. wait a bounded time for connection tasks to finish

use std::time::Duration;

use tokio::time::timeout;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::registry::{RegistryHandle, TerminationReport};

/// Drives the terminate and drain steps of a graceful shutdown.
#[derive(Clone)]
pub struct ShutdownCoordinator {
    registry: RegistryHandle,
    tracker: TaskTracker,
    drain_timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(registry: RegistryHandle, tracker: TaskTracker, drain_timeout: Duration) -> Self {
        Self {
            registry,
            tracker,
            drain_timeout,
        }
    }

    /// Hard-closes every open connection.
    ///
    /// Best-effort: connections already closing are skipped and a dead
    /// registry yields an empty report.
    pub async fn terminate_all(&self) -> TerminationReport {
        let report = self.registry.terminate_all().await;
        info!(
            terminated = report.terminated,
            already_closing = report.already_closing,
            "Terminated open connections"
        );
        report
    }

    /// Waits for tracked connection tasks, up to the drain timeout.
    ///
    /// Returns `true` if every task finished in time.
    pub async fn drain(&self) -> bool {
        self.tracker.close();
        match timeout(self.drain_timeout, self.tracker.wait()).await {
            Ok(()) => {
                info!("All connection tasks finished");
                true
            }
            Err(_) => {
                warn!(
                    remaining = self.tracker.len(),
                    timeout_ms = self.drain_timeout.as_millis() as u64,
                    "Drain timed out with connection tasks still running"
                );
                false
            }
        }
    }
}

/// Waits for SIGTERM or SIGINT (Ctrl+C elsewhere).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
