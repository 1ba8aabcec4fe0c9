//! sensorcast daemon - synthetic telemetry over WebSocket
//!
//! Runs the telemetry server in the foreground until SIGTERM or SIGINT.
//!
//! # Usage
//!
//! ```bash
//! # Listen on the default port (8080)
//! sensorcastd
//!
//! # Custom port and a faster default cadence
//! PORT=9000 sensorcastd --interval-ms 1000
//!
//! # Only accept browser connections from one dashboard
//! sensorcastd --allowed-origins https://dash.example.com
//!
//! # Enable debug logging
//! RUST_LOG=sensorcastd=debug sensorcastd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: terminate all connections, close the listener, exit 0

use std::net::{IpAddr, SocketAddr};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use sensorcast_core::{NegotiationDefaults, DEFAULT_ASSET_ID, MAX_BATCH, MAX_INTERVAL_MS};
use sensorcastd::config::{parse_origin_list, ServerConfig, DEFAULT_DRAIN_TIMEOUT};
use sensorcastd::registry::spawn_registry;
use sensorcastd::server::{wait_for_shutdown_signal, TelemetryServer};

/// sensorcast daemon - synthetic telemetry WebSocket publisher
#[derive(Parser, Debug)]
#[command(name = "sensorcastd", version, about)]
struct Args {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 8080)]
    port: u16,

    /// Emission interval used when a client does not ask for one (ms)
    #[arg(long, env = "INTERVAL_MS", default_value_t = 15_000)]
    interval_ms: u64,

    /// Smallest interval a client may negotiate (ms)
    #[arg(long, env = "MIN_INTERVAL_MS", default_value_t = 100)]
    min_interval_ms: u64,

    /// Liveness probe period (ms)
    #[arg(long, env = "KEEPALIVE_MS", default_value_t = 15_000)]
    keepalive_ms: u64,

    /// Asset id used when a client does not send one
    #[arg(long, env = "ASSET_ID", default_value = DEFAULT_ASSET_ID)]
    asset_id: String,

    /// Comma-separated origins allowed to connect (empty allows any)
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    allowed_origins: String,

    /// Maximum simultaneously open connections
    #[arg(long, env = "MAX_CONNECTIONS", default_value_t = 1024)]
    max_connections: usize,

    /// Seed for reproducible readings (each connection derives its own)
    #[arg(long, env = "SEED")]
    seed: Option<u64>,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let min_interval_ms = self.min_interval_ms.max(1);
        ServerConfig {
            bind_addr: SocketAddr::new(self.host, self.port),
            negotiation: NegotiationDefaults {
                asset_id: self.asset_id,
                interval_ms: self.interval_ms.clamp(min_interval_ms, MAX_INTERVAL_MS),
                min_interval_ms,
                max_interval_ms: MAX_INTERVAL_MS,
                max_batch: MAX_BATCH,
            },
            keepalive_interval: Duration::from_millis(self.keepalive_ms.max(1)),
            allowed_origins: parse_origin_list(&self.allowed_origins),
            max_connections: self.max_connections,
            seed: self.seed,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("sensorcastd=info".parse()?)
                .add_directive("sensorcast_core=info".parse()?),
        )
        .init();

    let config = Args::parse().into_config();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        addr = %config.bind_addr,
        default_interval_ms = config.negotiation.interval_ms,
        keepalive_ms = config.keepalive_interval.as_millis() as u64,
        "sensorcast daemon starting"
    );

    let cancel_token = CancellationToken::new();
    let registry = spawn_registry(config.max_connections);
    let server = TelemetryServer::new(config, registry, cancel_token.clone());

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Failed to install signal handlers");
        }
        signal_token.cancel();
    });

    server.run().await.context("Telemetry server failed")?;

    info!("sensorcast daemon stopped");
    Ok(())
}
