//! Integration tests for the WebSocket telemetry server.
//!
//! These tests run a real TelemetryServer on an ephemeral port and talk to it
//! with tokio-tungstenite and reqwest: negotiation, the hello handshake,
//! telemetry shape, origin checks and the plain HTTP endpoints.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.
//! We test the panic-free behavior of production code through assertions.

use std::net::SocketAddr;
use std::time::Duration;

use futures::StreamExt;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use sensorcast_core::{Channel, DEFAULT_ASSET_ID};
use sensorcastd::config::ServerConfig;
use sensorcastd::registry::{spawn_registry, RegistryHandle};
use sensorcastd::server::TelemetryServer;

// ============================================================================
// Constants
// ============================================================================

/// Upper bound for any single read from the server
const READ_TIMEOUT: Duration = Duration::from_secs(3);

// ============================================================================
// Test Helpers
// ============================================================================

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: SocketAddr,
    registry: RegistryHandle,
    cancel_token: CancellationToken,
}

impl TestServer {
    async fn spawn() -> Self {
        Self::spawn_with(ServerConfig::default()).await
    }

    async fn spawn_with(config: ServerConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let registry = spawn_registry(config.max_connections);
        let cancel_token = CancellationToken::new();
        let server = TelemetryServer::new(config, registry.clone(), cancel_token.clone());

        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        Self {
            addr,
            registry,
            cancel_token,
        }
    }

    fn ws_url(&self, query: &str) -> String {
        format!("ws://{}/ws{}", self.addr, query)
    }

    fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    async fn connect(&self, query: &str) -> WsClient {
        let (ws, _response) = connect_async(self.ws_url(query)).await.expect("connect");
        ws
    }

    fn shutdown(self) {
        self.cancel_token.cancel();
    }
}

/// Reads the next text frame as JSON, skipping control frames.
async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = timeout(READ_TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("read error");
        match msg {
            Message::Text(_) => {
                return serde_json::from_str(msg.to_text().unwrap()).expect("valid JSON");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

// ============================================================================
// Negotiation and Emission
// ============================================================================

#[tokio::test]
async fn test_hello_then_batched_telemetry() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect("?interval=100&keys=temperature&count=2").await;

    let hello = next_json(&mut ws).await;
    assert_eq!(
        hello,
        json!({
            "type": "hello",
            "interval": 100,
            "assetId": DEFAULT_ASSET_ID,
            "keys": ["temperature"],
            "count": 2
        })
    );

    let mut arrivals = Vec::new();
    for _ in 0..6 {
        let msg = next_json(&mut ws).await;
        arrivals.push(Instant::now());
        assert_eq!(msg["assetId"], DEFAULT_ASSET_ID);
        assert_eq!(msg["keyName"], "temperature");

        let telemetry = msg["telemetry"].as_array().expect("telemetry array");
        assert_eq!(telemetry.len(), 1);
        let entry = &telemetry[0];
        assert_eq!(entry["name"], "temperature");
        assert_eq!(entry["unit"], "°C");
        assert_eq!(entry["type"], "number");
        assert!(entry["timestamp"].as_i64().unwrap() > 0);

        let value = entry["value"].as_f64().unwrap();
        assert!((20.0..=35.0).contains(&value), "value {value} out of range");
    }

    // Messages arrive two per tick, ticks about 100ms apart
    for pair in arrivals.chunks(2) {
        let spread = pair[1] - pair[0];
        assert!(spread < Duration::from_millis(40), "batch split across ticks: {spread:?}");
    }
    for ticks in arrivals.chunks(2).collect::<Vec<_>>().windows(2) {
        let gap = ticks[1][0] - ticks[0][0];
        assert!(gap > Duration::from_millis(60), "ticks too close: {gap:?}");
    }

    server.shutdown();
}

#[tokio::test]
async fn test_invalid_parameters_fall_back() {
    let server = TestServer::spawn().await;
    let mut ws = server
        .connect("?interval=5&keys=bogus,,nope&count=99&assetId=")
        .await;

    let hello = next_json(&mut ws).await;
    assert_eq!(hello["interval"], 100, "interval clamps to the floor");
    assert_eq!(hello["count"], 5, "count clamps to the maximum");
    assert_eq!(hello["assetId"], DEFAULT_ASSET_ID);

    let keys: Vec<&str> = hello["keys"]
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k.as_str().unwrap())
        .collect();
    let all: Vec<&str> = Channel::ALL.iter().map(|c| c.name()).collect();
    assert_eq!(keys, all);

    server.shutdown();
}

#[tokio::test]
async fn test_all_channels_mode() {
    let server = TestServer::spawn().await;
    let mut ws = server
        .connect("?interval=100&keys=voltage,current&mode=all&assetId=rig-7")
        .await;

    let hello = next_json(&mut ws).await;
    assert_eq!(hello["assetId"], "rig-7");

    let msg = next_json(&mut ws).await;
    assert_eq!(msg["assetId"], "rig-7");
    assert_eq!(msg["keyName"], "voltage");
    let names: Vec<&str> = msg["telemetry"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["voltage", "current"]);

    server.shutdown();
}

#[tokio::test]
async fn test_connections_are_independent() {
    let server = TestServer::spawn().await;
    let mut fast = server.connect("?interval=100&keys=speed").await;
    let mut other = server.connect("?interval=100&keys=altitude").await;

    assert_eq!(next_json(&mut fast).await["keys"], json!(["speed"]));
    assert_eq!(next_json(&mut other).await["keys"], json!(["altitude"]));

    assert_eq!(next_json(&mut fast).await["keyName"], "speed");
    assert_eq!(next_json(&mut other).await["keyName"], "altitude");

    server.shutdown();
}

#[tokio::test]
async fn test_seeded_server_still_in_range() {
    let server = TestServer::spawn_with(ServerConfig {
        seed: Some(1234),
        ..ServerConfig::default()
    })
    .await;
    let mut ws = server.connect("?interval=100&keys=pressure").await;
    next_json(&mut ws).await;

    let msg = next_json(&mut ws).await;
    let value = msg["telemetry"][0]["value"].as_f64().unwrap();
    assert!((950.0..=1050.0).contains(&value));
    assert_eq!(msg["telemetry"][0]["unit"], "hPa");

    server.shutdown();
}

// ============================================================================
// Admission
// ============================================================================

#[tokio::test]
async fn test_foreign_origin_rejected_before_upgrade() {
    let server = TestServer::spawn_with(ServerConfig {
        allowed_origins: vec!["https://dash.example.com".to_string()],
        ..ServerConfig::default()
    })
    .await;

    let mut request = server.ws_url("").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://evil.example.com"));

    match connect_async(request).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 403),
        Err(other) => panic!("expected HTTP 403, got {other:?}"),
        Ok(_) => panic!("foreign origin must not be upgraded"),
    }
    assert_eq!(server.registry.count().await, 0);

    let mut request = server.ws_url("").into_client_request().unwrap();
    request
        .headers_mut()
        .insert("Origin", HeaderValue::from_static("https://dash.example.com"));
    let (mut ws, _) = connect_async(request).await.expect("allowed origin");
    assert_eq!(next_json(&mut ws).await["type"], "hello");

    server.shutdown();
}

#[tokio::test]
async fn test_full_registry_returns_503() {
    let server = TestServer::spawn_with(ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    })
    .await;

    let mut first = server.connect("").await;
    next_json(&mut first).await;

    match connect_async(server.ws_url("")).await {
        Err(tungstenite::Error::Http(response)) => assert_eq!(response.status(), 503),
        Err(other) => panic!("expected HTTP 503, got {other:?}"),
        Ok(_) => panic!("registry is full"),
    }

    server.shutdown();
}

// ============================================================================
// HTTP Endpoints
// ============================================================================

#[tokio::test]
async fn test_healthz() {
    let server = TestServer::spawn().await;

    let response = reqwest::get(server.http_url("/healthz")).await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");

    server.shutdown();
}

#[tokio::test]
async fn test_version() {
    let server = TestServer::spawn().await;

    let body: Value = reqwest::get(server.http_url("/version"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["name"], "sensorcastd");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["protocol"], "1.0");

    server.shutdown();
}

#[tokio::test]
async fn test_usage_page() {
    let server = TestServer::spawn().await;

    let text = reqwest::get(server.http_url("/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(text.contains("/ws"));
    assert!(text.contains("interval"));

    server.shutdown();
}

#[tokio::test]
async fn test_connections_endpoint_lists_open_connections() {
    let server = TestServer::spawn().await;
    let mut ws = server.connect("?assetId=press-3&keys=vibration&count=3").await;
    next_json(&mut ws).await;

    let list: Value = reqwest::get(server.http_url("/connections"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["asset_id"], "press-3");
    assert_eq!(list[0]["keys"], json!(["vibration"]));
    assert_eq!(list[0]["batch_count"], 3);

    let id = list[0]["id"].as_u64().unwrap();
    let single = reqwest::get(server.http_url(&format!("/connections/conn-{id}")))
        .await
        .unwrap();
    assert_eq!(single.status(), 200);

    let missing = reqwest::get(server.http_url("/connections/999")).await.unwrap();
    assert_eq!(missing.status(), 404);

    let invalid = reqwest::get(server.http_url("/connections/abc")).await.unwrap();
    assert_eq!(invalid.status(), 400);

    server.shutdown();
}
