//! Protocol message types sent from the server to WebSocket clients.
//!
//! Field names are camelCase on the wire to match existing dashboard clients.

use sensorcast_core::{ConnectionConfig, Reading, ValueKind};
use serde::{Deserialize, Serialize};

/// Control messages. Always carry a `type` discriminator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ControlMessage {
    /// First message on every connection, echoing the negotiated parameters
    Hello {
        /// Emission interval in milliseconds
        interval: u64,
        /// Asset the stream is attributed to
        asset_id: String,
        /// Channel names the stream draws from
        keys: Vec<String>,
        /// Messages per tick
        count: u8,
    },
}

/// One reading as it appears inside a telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEntry {
    pub value: f64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ValueKind,
    pub unit: String,
    pub timestamp: i64,
}

impl From<Reading> for TelemetryEntry {
    fn from(reading: Reading) -> Self {
        Self {
            value: reading.value,
            name: reading.channel,
            kind: reading.kind,
            unit: reading.unit,
            timestamp: reading.timestamp,
        }
    }
}

/// Periodic telemetry message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryMessage {
    pub asset_id: String,
    pub telemetry: Vec<TelemetryEntry>,
    /// Channel of the first entry
    pub key_name: String,
}

impl TelemetryMessage {
    /// Builds a message from the readings of one draw.
    ///
    /// Returns `None` when there are no readings.
    pub fn from_readings(asset_id: &str, readings: Vec<Reading>) -> Option<Self> {
        let key_name = readings.first()?.channel.clone();
        Some(Self {
            asset_id: asset_id.to_string(),
            telemetry: readings.into_iter().map(TelemetryEntry::from).collect(),
            key_name,
        })
    }
}

/// Any message the server writes to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Control(ControlMessage),
    Telemetry(TelemetryMessage),
}

impl ServerMessage {
    /// Creates the hello message for a negotiated connection.
    pub fn hello(config: &ConnectionConfig) -> Self {
        Self::Control(ControlMessage::Hello {
            interval: config.interval_ms,
            asset_id: config.asset_id.clone(),
            keys: config.channel_names(),
            count: config.batch_count,
        })
    }

    /// Serializes the message to its JSON text frame.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl From<TelemetryMessage> for ServerMessage {
    fn from(msg: TelemetryMessage) -> Self {
        Self::Telemetry(msg)
    }
}
