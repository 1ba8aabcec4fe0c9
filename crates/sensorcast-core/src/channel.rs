//! Telemetry channels and their value ranges.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A named telemetry dimension with a fixed value range and display unit.
///
/// Declaration order is the canonical order used when a connection asks
/// for "all channels".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Humidity,
    Pressure,
    Vibration,
    Voltage,
    Current,
    Speed,
    Altitude,
}

impl Channel {
    /// Every known channel, in canonical order.
    pub const ALL: [Channel; 8] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Pressure,
        Channel::Vibration,
        Channel::Voltage,
        Channel::Current,
        Channel::Speed,
        Channel::Altitude,
    ];

    /// Wire name of the channel (e.g. "temperature").
    pub fn name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Pressure => "pressure",
            Self::Vibration => "vibration",
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Speed => "speed",
            Self::Altitude => "altitude",
        }
    }

    /// Display unit for values on this channel.
    pub fn unit(self) -> &'static str {
        match self {
            Self::Temperature => "°C",
            Self::Humidity => "%",
            Self::Pressure => "hPa",
            Self::Vibration => "mm/s",
            Self::Voltage => "V",
            Self::Current => "A",
            Self::Speed => "km/h",
            Self::Altitude => "m",
        }
    }

    /// Half-open range raw samples are drawn from.
    ///
    /// Emitted values are rounded to two decimals, so they may touch
    /// `range.end`.
    pub fn range(self) -> Range<f64> {
        match self {
            Self::Temperature => 20.0..35.0,
            Self::Humidity => 30.0..80.0,
            Self::Pressure => 950.0..1050.0,
            Self::Vibration => 0.0..10.0,
            Self::Voltage => 200.0..220.0,
            Self::Current => 1.0..11.0,
            Self::Speed => 50.0..150.0,
            Self::Altitude => 100.0..600.0,
        }
    }

    /// Looks up a channel by wire name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Channel {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DomainError::UnknownChannel {
            name: s.to_string(),
        })
    }
}
