//! sensorcast protocol - wire messages for telemetry clients
//!
//! This crate provides the JSON shapes written to WebSocket clients
//! (the hello handshake and periodic telemetry) and the version document
//! served over HTTP.

pub mod message;
pub mod version;

pub use message::{ControlMessage, ServerMessage, TelemetryEntry, TelemetryMessage};
pub use version::{ProtocolVersion, VersionError, VersionInfo};
