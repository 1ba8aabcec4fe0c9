//! Type-safe identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique identifier for a client connection.
///
/// Assigned from a monotonically increasing counter when the connection is
/// accepted. Displays as `conn-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(n: u64) -> Self {
        Self(n)
    }

    /// Returns the connection number.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

impl From<u64> for ConnectionId {
    fn from(n: u64) -> Self {
        Self(n)
    }
}
