//! HTTP routes: the `/ws` upgrade plus health, version and introspection.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{debug, warn};

use sensorcast_core::{negotiate, ConnectionId, ReadingGenerator};
use sensorcast_protocol::VersionInfo;

use super::connection::{ConnectionHandler, ConnectionState};
use crate::config::ServerConfig;
use crate::registry::{CloseReason, ConnectionEntry, RegistryHandle};

/// Service name reported by `/version`.
pub const SERVICE_NAME: &str = "sensorcastd";

const USAGE: &str = "\
sensorcastd - synthetic telemetry over WebSocket

Connect to /ws with optional query parameters:
  assetId   asset the readings are attributed to
  interval  emission period in milliseconds (minimum 100)
  keys      comma-separated channels: temperature, humidity, pressure,
            vibration, voltage, current, speed, altitude
  count     messages per tick, 1 to 5
  mode      'all' to send every channel in each message

Example: /ws?interval=1000&keys=temperature,humidity&count=2

Other endpoints: /healthz, /version, /connections
";

/// Shared state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub registry: RegistryHandle,

    /// Cancelled when shutdown starts
    pub shutdown: CancellationToken,

    /// Tracks connection tasks for draining
    pub tracker: TaskTracker,

    /// Source of connection ids
    pub connection_counter: Arc<AtomicU64>,
}

/// Builds the router with all routes and the CORS layer.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/", get(usage_handler))
        .route("/ws", get(ws_handler))
        .route("/healthz", get(health_handler))
        .route("/version", get(version_handler))
        .route("/connections", get(list_connections_handler))
        .route("/connections/{id}", get(get_connection_handler))
        .with_state(state)
        .layer(cors)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

/// WebSocket upgrade handler.
///
/// Rejections happen before the upgrade: 403 for a foreign origin, 503 when
/// the registry is full or shutting down.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
    if !state.config.origin_allowed(origin) {
        warn!(%remote, origin = origin.unwrap_or_default(), "Rejected upgrade from foreign origin");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    if state.shutdown.is_cancelled() {
        return (StatusCode::SERVICE_UNAVAILABLE, "server is shutting down").into_response();
    }

    let config = negotiate(&params, &state.config.negotiation);
    let number = state.connection_counter.fetch_add(1, Ordering::Relaxed) + 1;
    let id = ConnectionId::new(number);
    let terminate = CancellationToken::new();

    let entry = ConnectionEntry::new(id, config.clone(), Some(remote), terminate.clone());
    if let Err(e) = state.registry.register(entry).await {
        warn!(conn_id = %id, %remote, error = %e, "Refusing connection");
        return (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response();
    }
    debug!(conn_id = %id, %remote, "Connection registered, upgrading");

    let generator = match state.config.seed {
        Some(seed) => ReadingGenerator::seeded(seed.wrapping_add(number)),
        None => ReadingGenerator::from_os_rng(),
    };
    let handler = ConnectionHandler::new(
        id,
        ConnectionState::new(config, state.config.keepalive_interval),
        generator,
        state.registry.clone(),
        terminate.clone(),
    );

    // Held until the connection task finishes so shutdown can drain it
    let task_token = state.tracker.token();
    let registry = state.registry.clone();

    ws.on_failed_upgrade(move |e| {
        debug!(conn_id = %id, error = %e, "Upgrade failed");
        terminate.cancel();
        tokio::spawn(async move {
            registry.remove(id, CloseReason::TransportError).await;
        });
    })
    .on_upgrade(move |socket| async move {
        handler.run(socket).await;
        drop(task_token);
    })
}

async fn usage_handler() -> &'static str {
    USAGE
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn version_handler() -> Json<VersionInfo> {
    Json(VersionInfo::new(SERVICE_NAME, env!("CARGO_PKG_VERSION")))
}

async fn list_connections_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list().await)
}

/// Accepts either `conn-<n>` or the bare number.
async fn get_connection_handler(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Response {
    let number = raw.strip_prefix("conn-").unwrap_or(&raw).parse::<u64>();
    let Ok(number) = number else {
        return (StatusCode::BAD_REQUEST, "invalid connection id").into_response();
    };

    match state.registry.get(ConnectionId::new(number)).await {
        Some(view) => Json(view).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
