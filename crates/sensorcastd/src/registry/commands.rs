//! Registry actor commands, errors, and events.
//!
//! This module defines the message types for communicating with the `RegistryActor`:
//! - `RegistryCommand`: Commands sent to the actor
//! - `RegistryError`: Errors that can occur during registry operations
//! - `ConnectionEvent`: Events published by the registry for subscribers

use std::fmt;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use sensorcast_core::{ConnectionConfig, ConnectionId};

// ============================================================================
// Registry Entries
// ============================================================================

/// Everything the registry keeps about an open connection.
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub id: ConnectionId,

    /// Negotiated parameters (read-only copy; the connection task owns its own)
    pub config: ConnectionConfig,

    /// Peer address, when the transport exposes one
    pub remote: Option<SocketAddr>,

    pub connected_at: DateTime<Utc>,

    /// Cancelling this token hard-closes the connection
    pub terminate: CancellationToken,
}

impl ConnectionEntry {
    pub fn new(
        id: ConnectionId,
        config: ConnectionConfig,
        remote: Option<SocketAddr>,
        terminate: CancellationToken,
    ) -> Self {
        Self {
            id,
            config,
            remote,
            connected_at: Utc::now(),
            terminate,
        }
    }
}

/// Read-only snapshot of an entry, safe to hand out of the actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionView {
    pub id: ConnectionId,
    pub asset_id: String,
    pub interval_ms: u64,
    pub keys: Vec<String>,
    pub batch_count: u8,
    pub remote: Option<SocketAddr>,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionView {
    pub fn from_entry(entry: &ConnectionEntry) -> Self {
        Self {
            id: entry.id,
            asset_id: entry.config.asset_id.clone(),
            interval_ms: entry.config.interval_ms,
            keys: entry.config.channel_names(),
            batch_count: entry.config.batch_count,
            remote: entry.remote,
            connected_at: entry.connected_at,
        }
    }
}

// ============================================================================
// Registry Commands
// ============================================================================

/// Commands sent to the registry actor.
///
/// Each command that expects an answer carries a oneshot sender.
#[derive(Debug)]
pub enum RegistryCommand {
    /// Insert a newly accepted connection.
    ///
    /// # Errors
    /// - `RegistryError::RegistryFull` at capacity
    /// - `RegistryError::AlreadyRegistered` for a duplicate id
    /// - `RegistryError::ShuttingDown` once terminate-all has run
    Register {
        /// Entry to insert (boxed to keep the enum small)
        entry: Box<ConnectionEntry>,
        respond_to: oneshot::Sender<Result<(), RegistryError>>,
    },

    /// Remove a closed connection. Answers whether an entry was removed.
    Remove {
        id: ConnectionId,
        reason: CloseReason,
        respond_to: oneshot::Sender<bool>,
    },

    /// Look up a single connection.
    Get {
        id: ConnectionId,
        respond_to: oneshot::Sender<Option<ConnectionView>>,
    },

    /// Snapshot all open connections.
    List {
        respond_to: oneshot::Sender<Vec<ConnectionView>>,
    },

    /// Number of open connections.
    Count { respond_to: oneshot::Sender<usize> },

    /// Terminate every open connection and refuse new registrations.
    TerminateAll {
        respond_to: oneshot::Sender<TerminationReport>,
    },
}

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The registry has reached its connection cap.
    #[error("registry is full (max: {max} connections)")]
    RegistryFull {
        /// Maximum number of connections allowed
        max: usize,
    },

    /// A connection with this id is already registered.
    #[error("connection already registered: {0}")]
    AlreadyRegistered(ConnectionId),

    /// Shutdown has started; no new connections are accepted.
    #[error("registry is shutting down")]
    ShuttingDown,

    /// The response channel was closed before receiving a response.
    ///
    /// This typically indicates the actor was shut down.
    #[error("response channel closed")]
    ChannelClosed,
}

// ============================================================================
// Events
// ============================================================================

/// Why a connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The client sent a close frame or the stream ended.
    ClientClosed,

    /// Reading from the transport failed.
    TransportError,

    /// The client missed a full liveness probe cycle.
    LivenessTimeout,

    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClientClosed => write!(f, "closed by client"),
            Self::TransportError => write!(f, "transport error"),
            Self::LivenessTimeout => write!(f, "missed liveness probe"),
            Self::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Events published by the registry to subscribers.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A connection was registered.
    Opened {
        id: ConnectionId,
        /// Negotiated parameters (boxed for size optimization)
        config: Box<ConnectionConfig>,
    },

    /// A connection was removed from the registry.
    Closed { id: ConnectionId, reason: CloseReason },
}

/// Outcome of a terminate-all sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminationReport {
    /// Connections whose termination was triggered by this sweep
    pub terminated: usize,

    /// Connections closing on their own but not yet removed
    pub already_closing: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sensorcast_core::{Channel, EmissionMode};

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            asset_id: "asset-9".to_string(),
            interval_ms: 250,
            channels: vec![Channel::Speed, Channel::Current],
            batch_count: 3,
            mode: EmissionMode::Random,
        }
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::RegistryFull { max: 10 };
        assert_eq!(err.to_string(), "registry is full (max: 10 connections)");

        let err = RegistryError::AlreadyRegistered(ConnectionId::new(4));
        assert_eq!(err.to_string(), "connection already registered: conn-4");

        assert_eq!(
            RegistryError::ShuttingDown.to_string(),
            "registry is shutting down"
        );
        assert_eq!(
            RegistryError::ChannelClosed.to_string(),
            "response channel closed"
        );
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::ClientClosed.to_string(), "closed by client");
        assert_eq!(CloseReason::TransportError.to_string(), "transport error");
        assert_eq!(
            CloseReason::LivenessTimeout.to_string(),
            "missed liveness probe"
        );
        assert_eq!(CloseReason::Shutdown.to_string(), "server shutdown");
    }

    #[test]
    fn test_view_from_entry() {
        let entry = ConnectionEntry::new(
            ConnectionId::new(1),
            config(),
            Some("127.0.0.1:5000".parse().unwrap()),
            CancellationToken::new(),
        );
        let view = ConnectionView::from_entry(&entry);

        assert_eq!(view.id, ConnectionId::new(1));
        assert_eq!(view.asset_id, "asset-9");
        assert_eq!(view.interval_ms, 250);
        assert_eq!(view.keys, vec!["speed".to_string(), "current".to_string()]);
        assert_eq!(view.batch_count, 3);
        assert_eq!(view.connected_at, entry.connected_at);
    }

    #[tokio::test]
    async fn test_command_channel_closed_error() {
        let (tx, rx) = oneshot::channel::<Result<(), RegistryError>>();

        // Drop sender without sending
        drop(tx);

        assert!(rx.await.is_err());
    }
}
