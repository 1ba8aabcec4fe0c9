//! Per-connection parameter negotiation.
//!
//! A client describes what it wants in the `/ws` query string. Negotiation
//! turns that raw map into a [`ConnectionConfig`] and never fails: missing or
//! malformed values degrade to defaults, out-of-range values are clamped and
//! unknown channel names are dropped.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::channel::Channel;
use crate::error::DomainError;

/// Query parameter carrying the asset identifier.
pub const PARAM_ASSET_ID: &str = "assetId";
/// Query parameter carrying the emission interval in milliseconds.
pub const PARAM_INTERVAL: &str = "interval";
/// Query parameter carrying the comma-separated channel list.
pub const PARAM_KEYS: &str = "keys";
/// Query parameter carrying the number of messages per tick.
pub const PARAM_COUNT: &str = "count";
/// Query parameter selecting the emission mode.
pub const PARAM_MODE: &str = "mode";

/// Asset identifier used when the client does not supply one.
pub const DEFAULT_ASSET_ID: &str = "02i9K000005B4tcQAC";
/// Default emission interval.
pub const DEFAULT_INTERVAL_MS: u64 = 15_000;
/// Lowest emission interval a client can negotiate.
pub const MIN_INTERVAL_MS: u64 = 100;
/// Highest emission interval a client can negotiate (24 hours).
pub const MAX_INTERVAL_MS: u64 = 86_400_000;
/// Upper bound for messages emitted per tick.
pub const MAX_BATCH: u8 = 5;

/// How the readings of one message are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmissionMode {
    /// One reading per message, channel drawn uniformly from the set.
    #[default]
    Random,
    /// One reading per configured channel in every message.
    AllChannels,
}

impl FromStr for EmissionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "all" => Ok(Self::AllChannels),
            other => Err(DomainError::UnknownMode {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for EmissionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "random"),
            Self::AllChannels => write!(f, "all"),
        }
    }
}

/// Server-side defaults and bounds applied during negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationDefaults {
    pub asset_id: String,
    pub interval_ms: u64,
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub max_batch: u8,
}

impl Default for NegotiationDefaults {
    fn default() -> Self {
        Self {
            asset_id: DEFAULT_ASSET_ID.to_string(),
            interval_ms: DEFAULT_INTERVAL_MS,
            min_interval_ms: MIN_INTERVAL_MS,
            max_interval_ms: MAX_INTERVAL_MS,
            max_batch: MAX_BATCH,
        }
    }
}

/// Validated emission parameters for one connection.
///
/// Immutable once negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Opaque asset identifier stamped on every reading
    pub asset_id: String,

    /// Milliseconds between emission ticks, always within the negotiated bounds
    pub interval_ms: u64,

    /// Non-empty, de-duplicated channel set in request order
    pub channels: Vec<Channel>,

    /// Messages emitted per tick, in `[1, max_batch]`
    pub batch_count: u8,

    /// How each message's readings are chosen
    pub mode: EmissionMode,
}

impl ConnectionConfig {
    /// Emission period as a `Duration`.
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Wire names of the configured channels, in order.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.name().to_string()).collect()
    }
}

/// Builds a [`ConnectionConfig`] from raw request parameters.
///
/// Never fails. See the module docs for the degradation rules.
pub fn negotiate(raw: &HashMap<String, String>, defaults: &NegotiationDefaults) -> ConnectionConfig {
    let asset_id = raw
        .get(PARAM_ASSET_ID)
        .filter(|s| !s.is_empty())
        .cloned()
        .unwrap_or_else(|| defaults.asset_id.clone());

    let floor = defaults.min_interval_ms;
    let ceiling = defaults.max_interval_ms.max(floor);
    let interval_ms = raw
        .get(PARAM_INTERVAL)
        .and_then(|s| parse_number(s))
        .map_or(defaults.interval_ms as f64, f64::trunc)
        .clamp(floor as f64, ceiling as f64) as u64;

    let channels = raw
        .get(PARAM_KEYS)
        .map(|s| parse_channels(s))
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| Channel::ALL.to_vec());

    let max_batch = defaults.max_batch.max(1);
    let batch_count = raw
        .get(PARAM_COUNT)
        .and_then(|s| parse_number(s))
        .map_or(1.0, f64::trunc)
        .clamp(1.0, f64::from(max_batch)) as u8;

    let mode = raw
        .get(PARAM_MODE)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default();

    ConnectionConfig {
        asset_id,
        interval_ms,
        channels,
        batch_count,
        mode,
    }
}

/// Parses any finite number, integer or fractional.
fn parse_number(s: &str) -> Option<f64> {
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Splits a comma-separated channel list, keeping known names once each.
fn parse_channels(s: &str) -> Vec<Channel> {
    let mut channels = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        match name.parse::<Channel>() {
            Ok(channel) if !channels.contains(&channel) => channels.push(channel),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "Dropping requested channel"),
        }
    }
    channels
}
