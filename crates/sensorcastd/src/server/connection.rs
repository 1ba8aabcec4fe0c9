//! Connection handler for individual WebSocket clients.
//!
//! Each accepted upgrade gets its own `ConnectionHandler` that:
//! - Sends the hello message with the negotiated parameters
//! - Emits telemetry on the scheduler's ticks
//! - Probes the peer on the watchdog's ticks and reaps it when silent
//! - Removes itself from the registry on every exit path
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - A timed-out write skips the rest of its tick; a transport error marks
//!   the connection unwritable instead of aborting

use std::fmt;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{Sink, SinkExt, Stream, StreamExt};
use rand::rngs::StdRng;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use sensorcast_core::{ConnectionConfig, ConnectionId, ReadingGenerator};
use sensorcast_protocol::ServerMessage;

use super::scheduler::EmissionScheduler;
use super::watchdog::{LivenessWatchdog, WatchdogAction};
use crate::registry::{CloseReason, RegistryHandle};

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Mutable per-connection state, owned by the connection task.
#[derive(Debug)]
pub struct ConnectionState {
    pub scheduler: EmissionScheduler,
    pub watchdog: LivenessWatchdog,

    /// Cleared after a transport error; later ticks are skipped
    pub writable: bool,

    /// Set once both timers have been stopped
    pub closed: bool,
}

impl ConnectionState {
    pub fn new(config: ConnectionConfig, keepalive: Duration) -> Self {
        Self {
            scheduler: EmissionScheduler::new(config),
            watchdog: LivenessWatchdog::new(keepalive),
            writable: true,
            closed: false,
        }
    }

    /// Stops both timers. Returns `true` only on the first call.
    pub fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.scheduler.stop();
        self.watchdog.stop();
        self.writable = false;
        self.closed = true;
        true
    }
}

/// Drives one WebSocket connection from hello to removal.
pub struct ConnectionHandler {
    id: ConnectionId,
    state: ConnectionState,
    generator: ReadingGenerator<StdRng>,
    registry: RegistryHandle,

    /// Cancelled by terminate-all, and by the handler itself once it starts
    /// closing
    terminate: CancellationToken,
}

impl ConnectionHandler {
    pub fn new(
        id: ConnectionId,
        state: ConnectionState,
        generator: ReadingGenerator<StdRng>,
        registry: RegistryHandle,
        terminate: CancellationToken,
    ) -> Self {
        Self {
            id,
            state,
            generator,
            registry,
            terminate,
        }
    }

    /// Runs the connection until it closes, then deregisters it.
    ///
    /// Returns why the connection ended.
    pub async fn run(self, socket: WebSocket) -> CloseReason {
        let (sink, stream) = socket.split();
        self.run_with(sink, stream).await
    }

    /// Same as [`run`](Self::run) over an already split transport.
    pub async fn run_with<Si, St, E>(mut self, mut sink: Si, mut stream: St) -> CloseReason
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        let reason = self.drive(&mut sink, &mut stream).await;

        self.terminate.cancel();
        self.state.close();

        if reason == CloseReason::ClientClosed {
            // Completes the close handshake the client started
            match timeout(WRITE_TIMEOUT, sink.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "Close reply failed"),
                Err(_) => debug!(conn_id = %self.id, "Close reply timed out"),
            }
        }
        // Liveness and shutdown terminations drop the socket without a handshake
        drop(sink);
        drop(stream);

        if !self.registry.remove(self.id, reason).await {
            debug!(conn_id = %self.id, "Connection was not registered at close");
        }
        info!(conn_id = %self.id, %reason, "Connection closed");
        reason
    }

    async fn drive<Si, St, E>(&mut self, sink: &mut Si, stream: &mut St) -> CloseReason
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
        St: Stream<Item = Result<Message, E>> + Unpin,
        E: fmt::Display,
    {
        if self.terminate.is_cancelled() {
            debug!(conn_id = %self.id, "Terminated before the first frame");
            return CloseReason::Shutdown;
        }

        info!(
            conn_id = %self.id,
            asset_id = %self.state.scheduler.config().asset_id,
            interval_ms = self.state.scheduler.config().interval_ms,
            "Connection opened"
        );

        if let Some(hello) = self.state.scheduler.start() {
            if let Err(e) = send_message(sink, &hello).await {
                debug!(conn_id = %self.id, error = %e, "Failed to send hello");
                self.record_write_failure(&e);
            }
        }
        self.state.watchdog.start();

        loop {
            tokio::select! {
                biased;

                _ = self.terminate.cancelled() => {
                    return CloseReason::Shutdown;
                }

                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Pong(_))) => {
                            trace!(conn_id = %self.id, "Pong received");
                            self.state.watchdog.acknowledge();
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return CloseReason::ClientClosed;
                        }
                        Some(Ok(_)) => {
                            // Inbound data is not part of the protocol
                        }
                        Some(Err(e)) => {
                            debug!(conn_id = %self.id, error = %e, "Read error");
                            return CloseReason::TransportError;
                        }
                    }
                }

                _ = self.state.scheduler.tick() => {
                    self.emit(sink).await;
                }

                _ = self.state.watchdog.tick() => {
                    match self.state.watchdog.on_tick() {
                        Some(WatchdogAction::Probe) => self.probe(sink).await,
                        Some(WatchdogAction::Terminate) => {
                            return CloseReason::LivenessTimeout;
                        }
                        None => {}
                    }
                }
            }
        }
    }

    /// Writes one tick's batch.
    ///
    /// Any failed write ends the tick. Only a transport error stops later
    /// ticks.
    async fn emit<Si>(&mut self, sink: &mut Si)
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
    {
        if !self.state.writable {
            trace!(conn_id = %self.id, "Transport unwritable, skipping tick");
            return;
        }

        for message in self.state.scheduler.emit(&mut self.generator) {
            if let Err(e) = send_message(sink, &ServerMessage::from(message)).await {
                warn!(conn_id = %self.id, error = %e, "Telemetry write failed, skipping tick");
                self.record_write_failure(&e);
                return;
            }
        }
    }

    fn record_write_failure(&mut self, error: &ConnectionError) {
        if error.is_terminal() {
            self.state.writable = false;
        }
    }

    async fn probe<Si>(&mut self, sink: &mut Si)
    where
        Si: Sink<Message> + Unpin,
        Si::Error: fmt::Display,
    {
        // A failed probe is reaped by the next watchdog tick
        match timeout(WRITE_TIMEOUT, sink.send(Message::Ping(Default::default()))).await {
            Ok(Ok(())) => trace!(conn_id = %self.id, "Ping sent"),
            Ok(Err(e)) => debug!(conn_id = %self.id, error = %e, "Ping failed"),
            Err(_) => debug!(conn_id = %self.id, "Ping timed out"),
        }
    }
}

async fn send_message<Si>(sink: &mut Si, message: &ServerMessage) -> Result<(), ConnectionError>
where
    Si: Sink<Message> + Unpin,
    Si::Error: fmt::Display,
{
    let json = message
        .to_json()
        .map_err(|e| ConnectionError::Serialize(e.to_string()))?;

    timeout(WRITE_TIMEOUT, sink.send(Message::Text(json.into())))
        .await
        .map_err(|_| ConnectionError::WriteTimeout)?
        .map_err(|e| ConnectionError::Transport(e.to_string()))
}

/// Errors that can occur while writing to a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Write timeout")]
    WriteTimeout,
}

impl ConnectionError {
    /// Returns true if the transport can no longer be written to.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
