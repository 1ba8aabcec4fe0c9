//! Reading value objects.

use serde::{Deserialize, Serialize};

/// Semantic type tag for a reading's value.
///
/// Serialised as the JavaScript `typeof` name clients already switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    #[default]
    Number,
}

/// A single timestamped sample on one channel.
///
/// Readings are created fresh for every emission and dropped once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Asset the reading is attributed to
    pub asset_id: String,

    /// Channel wire name (unknown names are passed through unchanged)
    pub channel: String,

    /// Sampled value
    pub value: f64,

    /// Semantic type of `value`
    pub kind: ValueKind,

    /// Display unit, empty for unknown channels
    pub unit: String,

    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
}
