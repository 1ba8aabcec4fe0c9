//! Connection registry using the Actor pattern.
//!
//! The registry is the set of currently open connections. It exists for
//! coordinated shutdown and introspection only: every connection streams
//! independently, so nothing is fanned out through it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐     ┌─────────────────┐     ┌──────────────────┐
//! │ConnectionHandler │────▶│  RegistryActor  │────▶│ Broadcast Channel│
//! └──────────────────┘     └─────────────────┘     └──────────────────┘
//!         │                       │                         │
//!         │   RegistryCommand     │   ConnectionEvent       │
//!         │   (mpsc channel)      │   (broadcast)           │
//!         ▼                       ▼                         ▼
//!   Register/Remove        HashMap<ConnectionId,      Lifecycle logs,
//!                          ConnectionEntry>           tests
//! ```
//!
//! Because the actor is the only owner of the map, concurrent inserts and
//! removals are serialised and the terminate-all sweep iterates a map that
//! cannot change underneath it.

use tokio::sync::{broadcast, mpsc};

mod actor;
mod commands;
mod handle;

pub use actor::RegistryActor;
pub use commands::{
    CloseReason, ConnectionEntry, ConnectionEvent, ConnectionView, RegistryCommand, RegistryError,
    TerminationReport,
};
pub use handle::RegistryHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 256;
const EVENT_BUFFER: usize = 256;

/// Spawn the registry actor and return a handle for interaction.
///
/// The actor stops once every `RegistryHandle` clone has been dropped.
///
/// # Example
///
/// ```no_run
/// use sensorcastd::registry::spawn_registry;
///
/// #[tokio::main]
/// async fn main() {
///     let handle = spawn_registry(1024);
///     assert_eq!(handle.count().await, 0);
/// }
/// ```
pub fn spawn_registry(max_connections: usize) -> RegistryHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = RegistryActor::new(cmd_rx, event_tx.clone(), max_connections);
    tokio::spawn(actor.run());

    RegistryHandle::new(cmd_tx, event_tx)
}
