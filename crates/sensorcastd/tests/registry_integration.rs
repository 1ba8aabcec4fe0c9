//! Integration tests for the Registry Actor.
//!
//! These tests exercise `spawn_registry()` and the `RegistryHandle`
//! interface as a complete system.
//!
//! Tests CAN use `.unwrap()` and `.expect()` - this is allowed.

use std::time::Duration;

use sensorcast_core::{Channel, ConnectionConfig, ConnectionId, EmissionMode};
use sensorcastd::registry::{
    spawn_registry, CloseReason, ConnectionEntry, ConnectionEvent, RegistryError,
};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Test Helpers
// ============================================================================

/// Helper to create an entry with its own terminate token.
fn create_entry(n: u64) -> (ConnectionEntry, CancellationToken) {
    let token = CancellationToken::new();
    let entry = ConnectionEntry::new(
        ConnectionId::new(n),
        ConnectionConfig {
            asset_id: format!("asset-{n}"),
            interval_ms: 1_000,
            channels: vec![Channel::Temperature, Channel::Voltage],
            batch_count: 2,
            mode: EmissionMode::Random,
        },
        Some("127.0.0.1:40000".parse().unwrap()),
        token.clone(),
    );
    (entry, token)
}

// ============================================================================
// Basic Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_basic_lifecycle() {
    let handle = spawn_registry(8);

    let (entry, _token) = create_entry(1);
    handle.register(entry).await.expect("registration should succeed");

    let view = handle
        .get(ConnectionId::new(1))
        .await
        .expect("connection should be found");
    assert_eq!(view.asset_id, "asset-1");
    assert_eq!(view.interval_ms, 1_000);
    assert_eq!(view.keys, vec!["temperature", "voltage"]);
    assert_eq!(view.batch_count, 2);

    assert!(handle.remove(ConnectionId::new(1), CloseReason::ClientClosed).await);
    assert!(handle.get(ConnectionId::new(1)).await.is_none());
    assert!(handle.is_connected());
}

#[tokio::test]
async fn test_duplicate_registration_fails() {
    let handle = spawn_registry(8);

    handle.register(create_entry(5).0).await.unwrap();
    let result = handle.register(create_entry(5).0).await;

    assert_eq!(result, Err(RegistryError::AlreadyRegistered(ConnectionId::new(5))));
    assert_eq!(handle.count().await, 1);
}

#[tokio::test]
async fn test_double_remove_reports_once() {
    let handle = spawn_registry(8);
    handle.register(create_entry(1).0).await.unwrap();

    assert!(handle.remove(ConnectionId::new(1), CloseReason::TransportError).await);
    assert!(!handle.remove(ConnectionId::new(1), CloseReason::ClientClosed).await);
}

// ============================================================================
// Event Subscription Tests
// ============================================================================

#[tokio::test]
async fn test_events_for_open_and_close() {
    let handle = spawn_registry(8);
    let mut events = handle.subscribe();

    handle.register(create_entry(3).0).await.unwrap();
    handle
        .remove(ConnectionId::new(3), CloseReason::LivenessTimeout)
        .await;

    let opened = timeout(Duration::from_millis(100), events.recv())
        .await
        .expect("should receive event")
        .unwrap();
    assert!(matches!(opened, ConnectionEvent::Opened { id, .. } if id == ConnectionId::new(3)));

    let closed = timeout(Duration::from_millis(100), events.recv())
        .await
        .expect("should receive event")
        .unwrap();
    match closed {
        ConnectionEvent::Closed { id, reason } => {
            assert_eq!(id, ConnectionId::new(3));
            assert_eq!(reason, CloseReason::LivenessTimeout);
        }
        other => panic!("Expected Closed, got {other:?}"),
    }
}

// ============================================================================
// Capacity Tests
// ============================================================================

#[tokio::test]
async fn test_capacity_limit() {
    let handle = spawn_registry(3);

    for n in 0..3 {
        handle.register(create_entry(n).0).await.unwrap();
    }

    let result = handle.register(create_entry(99).0).await;
    assert_eq!(result, Err(RegistryError::RegistryFull { max: 3 }));
}

#[tokio::test]
async fn test_capacity_after_removal() {
    let handle = spawn_registry(2);
    handle.register(create_entry(1).0).await.unwrap();
    handle.register(create_entry(2).0).await.unwrap();

    handle.remove(ConnectionId::new(1), CloseReason::ClientClosed).await;
    assert!(handle.register(create_entry(3).0).await.is_ok());
}

// ============================================================================
// Terminate-All Tests
// ============================================================================

#[tokio::test]
async fn test_terminate_all_cancels_snapshot() {
    let handle = spawn_registry(16);
    let mut tokens = Vec::new();
    for n in 0..5 {
        let (entry, token) = create_entry(n);
        handle.register(entry).await.unwrap();
        tokens.push(token);
    }

    let report = handle.terminate_all().await;
    assert_eq!(report.terminated, 5);
    assert!(tokens.iter().all(CancellationToken::is_cancelled));

    // A second sweep finds everything already closing
    let again = handle.terminate_all().await;
    assert_eq!(again.terminated, 0);
    assert_eq!(again.already_closing, 5);

    assert_eq!(
        handle.register(create_entry(100).0).await,
        Err(RegistryError::ShuttingDown)
    );
}

// ============================================================================
// Concurrency Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_register_and_remove() {
    let handle = spawn_registry(256);

    let mut tasks = Vec::new();
    for n in 0..50 {
        let h = handle.clone();
        tasks.push(tokio::spawn(async move {
            h.register(create_entry(n).0).await.unwrap();
            if n % 2 == 0 {
                assert!(h.remove(ConnectionId::new(n), CloseReason::ClientClosed).await);
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(handle.count().await, 25);
    let ids: Vec<u64> = handle.list().await.iter().map(|v| v.id.get()).collect();
    assert!(ids.iter().all(|n| n % 2 == 1));
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "list is ordered by id");
}
