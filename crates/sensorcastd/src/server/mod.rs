//! WebSocket telemetry server.
//!
//! The server:
//! - Listens on a TCP socket and serves the axum router
//! - Spawns a ConnectionHandler for each `/ws` upgrade
//! - Registers every connection with the registry
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ TelemetryServer  │
//! │                  │
//! │   TcpListener    │
//! └───────┬──────────┘
//!         │ GET /ws (upgrade)
//!         ▼
//! ┌──────────────────┐     ┌─────────────────────┐
//! │ConnectionHandler │────▶│   RegistryHandle    │
//! │ (per connection) │     │                     │
//! │ scheduler        │     └──────────▲──────────┘
//! │ watchdog         │                │ terminate_all
//! └──────────────────┘     ┌──────────┴──────────┐
//!                          │ ShutdownCoordinator │
//!                          └─────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Connection failures are logged and never stop the server

mod connection;
mod lifecycle;
mod routes;
mod scheduler;
mod watchdog;

pub use connection::{ConnectionError, ConnectionHandler, ConnectionState};
pub use lifecycle::{wait_for_shutdown_signal, ShutdownCoordinator};
pub use routes::{build_router, AppState, SERVICE_NAME};
pub use scheduler::{EmissionScheduler, SchedulerState};
pub use watchdog::{LivenessWatchdog, WatchdogAction, WatchdogState};

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::ServerConfig;
use crate::registry::RegistryHandle;

/// WebSocket telemetry server.
pub struct TelemetryServer {
    config: Arc<ServerConfig>,

    /// Handle to the connection registry
    registry: RegistryHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Tracks connection tasks so shutdown can drain them
    tracker: TaskTracker,

    /// Connection counter for generating connection ids
    connection_counter: Arc<AtomicU64>,
}

impl TelemetryServer {
    /// Creates a new server.
    ///
    /// # Arguments
    ///
    /// * `config` - Listener address, negotiation defaults and limits
    /// * `registry` - Handle to the connection registry
    /// * `cancel_token` - Token for graceful shutdown
    pub fn new(
        config: ServerConfig,
        registry: RegistryHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            cancel_token,
            tracker: TaskTracker::new(),
            connection_counter: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Builds the router bound to this server's state.
    pub fn router(&self) -> Router {
        build_router(AppState {
            config: Arc::clone(&self.config),
            registry: self.registry.clone(),
            shutdown: self.cancel_token.clone(),
            tracker: self.tracker.clone(),
            connection_counter: Arc::clone(&self.connection_counter),
        })
    }

    /// Binds the configured address and serves until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let addr = self.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr,
                error: e.to_string(),
            })?;

        self.serve(listener).await
    }

    /// Serves on an already bound listener until the cancellation token fires.
    ///
    /// On cancellation every connection is terminated, the listener is
    /// closed and connection tasks are drained before this returns.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        if let Ok(local) = listener.local_addr() {
            info!(addr = %local, "Telemetry server listening");
        }

        let coordinator = ShutdownCoordinator::new(
            self.registry.clone(),
            self.tracker.clone(),
            self.config.drain_timeout,
        );
        let shutdown = {
            let coordinator = coordinator.clone();
            let cancel_token = self.cancel_token.clone();
            async move {
                cancel_token.cancelled().await;
                info!("Server shutdown requested");
                coordinator.terminate_all().await;
            }
        };

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(e.to_string()))?;

        coordinator.drain().await;
        info!("Server stopped");
        Ok(())
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: SocketAddr, error: String },

    #[error("Server error: {0}")]
    Serve(String),
}
