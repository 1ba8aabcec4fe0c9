//! Registry actor - owns the set of open connections and processes commands.
//!
//! # Panic-Free Guarantees
//!
//! This module follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures are ignored; the requester may have gone away

use std::collections::HashMap;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use sensorcast_core::ConnectionId;

use super::commands::{
    CloseReason, ConnectionEntry, ConnectionEvent, ConnectionView, RegistryCommand, RegistryError,
    TerminationReport,
};

/// The registry actor - owns all connection entries.
///
/// Commands are processed one at a time inside a single task, so inserts,
/// removals and the terminate-all sweep never interleave.
pub struct RegistryActor {
    /// Command receiver
    receiver: mpsc::Receiver<RegistryCommand>,

    /// Open connections by id
    connections: HashMap<ConnectionId, ConnectionEntry>,

    /// Registration cap
    max_connections: usize,

    /// Set by the first terminate-all; later registrations are refused
    shutting_down: bool,

    /// Event publisher for connection lifecycle events
    event_publisher: broadcast::Sender<ConnectionEvent>,
}

impl RegistryActor {
    pub fn new(
        receiver: mpsc::Receiver<RegistryCommand>,
        event_publisher: broadcast::Sender<ConnectionEvent>,
        max_connections: usize,
    ) -> Self {
        Self {
            receiver,
            connections: HashMap::new(),
            max_connections,
            shutting_down: false,
            event_publisher,
        }
    }

    /// Runs the actor event loop until every handle has been dropped.
    pub async fn run(mut self) {
        info!(max_connections = self.max_connections, "Registry actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(
            connections = self.connections.len(),
            "Registry actor stopped"
        );
    }

    fn handle_command(&mut self, cmd: RegistryCommand) {
        match cmd {
            RegistryCommand::Register { entry, respond_to } => {
                let result = self.handle_register(*entry);
                // Ignore send error - client may have dropped the receiver
                let _ = respond_to.send(result);
            }
            RegistryCommand::Remove {
                id,
                reason,
                respond_to,
            } => {
                let removed = self.handle_remove(id, reason);
                let _ = respond_to.send(removed);
            }
            RegistryCommand::Get { id, respond_to } => {
                let view = self.connections.get(&id).map(ConnectionView::from_entry);
                let _ = respond_to.send(view);
            }
            RegistryCommand::List { respond_to } => {
                let mut views: Vec<ConnectionView> = self
                    .connections
                    .values()
                    .map(ConnectionView::from_entry)
                    .collect();
                views.sort_by_key(|v| v.id);
                let _ = respond_to.send(views);
            }
            RegistryCommand::Count { respond_to } => {
                let _ = respond_to.send(self.connections.len());
            }
            RegistryCommand::TerminateAll { respond_to } => {
                let report = self.handle_terminate_all();
                let _ = respond_to.send(report);
            }
        }
    }

    fn handle_register(&mut self, entry: ConnectionEntry) -> Result<(), RegistryError> {
        if self.shutting_down {
            debug!(conn_id = %entry.id, "Refusing registration during shutdown");
            return Err(RegistryError::ShuttingDown);
        }

        if self.connections.len() >= self.max_connections {
            warn!(
                conn_id = %entry.id,
                current = self.connections.len(),
                max = self.max_connections,
                "Registry is full, rejecting connection"
            );
            return Err(RegistryError::RegistryFull {
                max: self.max_connections,
            });
        }

        if self.connections.contains_key(&entry.id) {
            return Err(RegistryError::AlreadyRegistered(entry.id));
        }

        let id = entry.id;
        let config = Box::new(entry.config.clone());
        self.connections.insert(id, entry);
        debug!(conn_id = %id, open = self.connections.len(), "Connection registered");

        // No subscribers is fine
        let _ = self.event_publisher.send(ConnectionEvent::Opened { id, config });
        Ok(())
    }

    fn handle_remove(&mut self, id: ConnectionId, reason: CloseReason) -> bool {
        if self.connections.remove(&id).is_none() {
            debug!(conn_id = %id, %reason, "Remove for unknown connection ignored");
            return false;
        }

        debug!(conn_id = %id, %reason, open = self.connections.len(), "Connection removed");
        let _ = self.event_publisher.send(ConnectionEvent::Closed { id, reason });
        true
    }

    /// Cancels every registered connection's terminate token.
    ///
    /// Entries are left in place: each connection task removes itself once
    /// it has stopped its timers. A connection cancels its own token when it
    /// starts closing, so those are counted and skipped.
    fn handle_terminate_all(&mut self) -> TerminationReport {
        self.shutting_down = true;

        let mut report = TerminationReport::default();
        for (id, entry) in &self.connections {
            if entry.terminate.is_cancelled() {
                report.already_closing += 1;
                continue;
            }
            entry.terminate.cancel();
            report.terminated += 1;
            debug!(conn_id = %id, "Termination requested");
        }

        info!(
            terminated = report.terminated,
            already_closing = report.already_closing,
            "Terminate-all sweep complete"
        );
        report
    }
}
