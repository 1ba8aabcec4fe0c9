//! sensorcast daemon - WebSocket telemetry server
//!
//! This crate provides the networked half of sensorcast:
//! - `config` - server configuration and origin checks
//! - `registry` - connection registry actor used for shutdown and introspection
//! - `server` - axum server, per-connection scheduler and watchdog, lifecycle
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     sensorcastd                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ TelemetryServer │────▶│     RegistryActor           │    │
//! │  │ (axum, /ws)     │     │  (open connection owner)    │    │
//! │  └────────┬────────┘     └──────────────┬──────────────┘    │
//! │           │                             │                   │
//! │           │ upgrades                    │ events            │
//! │           ▼                             ▼                   │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐    │
//! │  │ConnectionHandler│     │   broadcast::Sender         │    │
//! │  │ scheduler +     │     │   (Opened / Closed)         │    │
//! │  │ watchdog        │     └─────────────────────────────┘    │
//! │  └─────────────────┘                                        │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod registry;
pub mod server;
