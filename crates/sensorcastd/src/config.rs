//! Server configuration.
//!
//! `ServerConfig` is assembled by the binary from command-line flags and
//! environment variables; everything below the HTTP layer only sees the
//! validated struct.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use sensorcast_core::{
    NegotiationDefaults, DEFAULT_ASSET_ID, DEFAULT_INTERVAL_MS, MAX_BATCH, MAX_INTERVAL_MS,
    MIN_INTERVAL_MS,
};

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default liveness probe period.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(15);

/// Default cap on simultaneously open connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// How long shutdown waits for connection tasks to finish.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration for [`crate::server::TelemetryServer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub bind_addr: SocketAddr,

    /// Defaults and bounds for per-connection negotiation
    pub negotiation: NegotiationDefaults,

    /// Period of the liveness probe, independent of the emission interval
    pub keepalive_interval: Duration,

    /// Origins allowed to open `/ws`; empty allows any origin
    pub allowed_origins: Vec<String>,

    /// Upgrades beyond this many open connections are refused
    pub max_connections: usize,

    /// Base seed for reproducible reading generation (None = OS entropy)
    pub seed: Option<u64>,

    /// Upper bound on waiting for connection tasks during shutdown
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            negotiation: NegotiationDefaults {
                asset_id: DEFAULT_ASSET_ID.to_string(),
                interval_ms: DEFAULT_INTERVAL_MS,
                min_interval_ms: MIN_INTERVAL_MS,
                max_interval_ms: MAX_INTERVAL_MS,
                max_batch: MAX_BATCH,
            },
            keepalive_interval: DEFAULT_KEEPALIVE,
            allowed_origins: Vec::new(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            seed: None,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Returns true if a request with this `Origin` header may connect.
    ///
    /// With no configured origins every request is allowed. Requests without
    /// an `Origin` header (non-browser clients) are allowed too.
    pub fn origin_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            _ if self.allowed_origins.is_empty() => true,
            None => true,
            Some(origin) => self
                .allowed_origins
                .iter()
                .any(|allowed| allowed.trim_end_matches('/') == origin.trim_end_matches('/')),
        }
    }
}

/// Splits a comma-separated origin list, dropping empty entries.
pub fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
