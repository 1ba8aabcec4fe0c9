//! sensorcast core - shared domain types for the telemetry publisher
//!
//! This crate provides the pieces that do not touch the network:
//! - `channel` - the known telemetry channels with their ranges and units
//! - `generator` - synthetic reading generation with an injectable RNG
//! - `negotiate` - turning a connection's query string into a `ConnectionConfig`
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod channel;
pub mod error;
pub mod generator;
pub mod id;
pub mod negotiate;
pub mod reading;

// Re-exports for convenience
pub use channel::Channel;
pub use error::{DomainError, DomainResult};
pub use generator::{sample_value, unit_for, ReadingGenerator};
pub use id::ConnectionId;
pub use negotiate::{
    negotiate, ConnectionConfig, EmissionMode, NegotiationDefaults, DEFAULT_ASSET_ID,
    DEFAULT_INTERVAL_MS, MAX_BATCH, MAX_INTERVAL_MS, MIN_INTERVAL_MS,
};
pub use reading::{Reading, ValueKind};
