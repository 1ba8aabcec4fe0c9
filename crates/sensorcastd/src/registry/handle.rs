//! Client interface for interacting with the RegistryActor.
//!
//! The `RegistryHandle` provides a cheap-to-clone interface for sending commands
//! to the registry actor and subscribing to connection events.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel errors are mapped to `RegistryError::ChannelClosed` or a neutral default

use tokio::sync::{broadcast, mpsc, oneshot};

use sensorcast_core::ConnectionId;

use super::commands::{
    CloseReason, ConnectionEntry, ConnectionEvent, ConnectionView, RegistryCommand, RegistryError,
    TerminationReport,
};

/// Handle for interacting with the registry actor.
///
/// Cheap to clone; every connection task holds one.
#[derive(Clone)]
pub struct RegistryHandle {
    /// Command sender to the actor
    sender: mpsc::Sender<RegistryCommand>,

    /// Event broadcaster for subscribing to updates
    event_sender: broadcast::Sender<ConnectionEvent>,
}

impl RegistryHandle {
    pub fn new(
        sender: mpsc::Sender<RegistryCommand>,
        event_sender: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    /// Register a newly accepted connection.
    ///
    /// # Errors
    ///
    /// - `RegistryError::RegistryFull` if the registry is at capacity
    /// - `RegistryError::AlreadyRegistered` if the id is taken
    /// - `RegistryError::ShuttingDown` after terminate-all
    /// - `RegistryError::ChannelClosed` if the actor has shut down
    pub async fn register(&self, entry: ConnectionEntry) -> Result<(), RegistryError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Register {
                entry: Box::new(entry),
                respond_to: tx,
            })
            .await
            .map_err(|_| RegistryError::ChannelClosed)?;

        rx.await.map_err(|_| RegistryError::ChannelClosed)?
    }

    /// Remove a closed connection.
    ///
    /// Returns `true` if this call removed the entry, `false` if it was
    /// already gone or the actor is unreachable.
    pub async fn remove(&self, id: ConnectionId, reason: CloseReason) -> bool {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Remove {
                id,
                reason,
                respond_to: tx,
            })
            .await
            .is_err()
        {
            return false;
        }

        rx.await.unwrap_or(false)
    }

    /// Get a single connection by id.
    pub async fn get(&self, id: ConnectionId) -> Option<ConnectionView> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(RegistryCommand::Get { id, respond_to: tx })
            .await
            .ok()?;

        rx.await.ok()?
    }

    /// All open connections, ordered by id.
    ///
    /// Returns an empty vector if communication with the actor fails.
    pub async fn list(&self) -> Vec<ConnectionView> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::List { respond_to: tx })
            .await
            .is_err()
        {
            return Vec::new();
        }

        rx.await.unwrap_or_default()
    }

    /// Number of open connections (0 if the actor is unreachable).
    pub async fn count(&self) -> usize {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::Count { respond_to: tx })
            .await
            .is_err()
        {
            return 0;
        }

        rx.await.unwrap_or(0)
    }

    /// Terminate every open connection and stop accepting registrations.
    ///
    /// Best-effort: an unreachable actor yields an empty report.
    pub async fn terminate_all(&self) -> TerminationReport {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(RegistryCommand::TerminateAll { respond_to: tx })
            .await
            .is_err()
        {
            return TerminationReport::default();
        }

        rx.await.unwrap_or_default()
    }

    /// Subscribe to connection lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.event_sender.subscribe()
    }

    /// Returns `true` while the actor's command channel is open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
