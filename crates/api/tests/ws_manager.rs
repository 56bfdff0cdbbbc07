//! Tests for `WsManager` connection bookkeeping, without HTTP upgrades.

use axum::extract::ws::Message;
use pagelock_api::ws::WsManager;
use pagelock_core::DocumentId;

fn doc(id: &str) -> DocumentId {
    DocumentId::from(id)
}

// ---------------------------------------------------------------------------
// Test: add/remove adjust the connection count
// ---------------------------------------------------------------------------

#[tokio::test]
async fn add_and_remove_track_connections() {
    let manager = WsManager::new();
    assert_eq!(manager.connection_count().await, 0);

    let _rx1 = manager.add("conn-1".to_string(), doc("landing")).await;
    let _rx2 = manager.add("conn-2".to_string(), doc("landing")).await;
    assert_eq!(manager.connection_count().await, 2);

    manager.remove("conn-1").await;
    manager.remove("nonexistent").await;
    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: connections are counted per document
// ---------------------------------------------------------------------------

#[tokio::test]
async fn count_for_document_filters_by_document() {
    let manager = WsManager::new();

    let _a = manager.add("conn-1".to_string(), doc("landing")).await;
    let _b = manager.add("conn-2".to_string(), doc("landing")).await;
    let _c = manager.add("conn-3".to_string(), doc("pricing")).await;

    assert_eq!(manager.count_for_document(&doc("landing")).await, 2);
    assert_eq!(manager.count_for_document(&doc("pricing")).await, 1);
    assert_eq!(manager.count_for_document(&doc("about")).await, 0);
}

// ---------------------------------------------------------------------------
// Test: re-adding an id replaces the previous registration
// ---------------------------------------------------------------------------

#[tokio::test]
async fn duplicate_id_replaces_previous_connection() {
    let manager = WsManager::new();

    let mut old = manager.add("conn-1".to_string(), doc("landing")).await;
    let mut new = manager.add("conn-1".to_string(), doc("pricing")).await;
    assert_eq!(manager.connection_count().await, 1);
    assert_eq!(manager.count_for_document(&doc("pricing")).await, 1);

    manager.ping_all().await;
    assert!(matches!(new.recv().await, Some(Message::Ping(_))));
    assert!(old.recv().await.is_none(), "replaced sender should be dropped");
}

// ---------------------------------------------------------------------------
// Test: ping_all reaches every connection and skips closed channels
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_skips_closed_channels() {
    let manager = WsManager::new();

    let closed = manager.add("conn-1".to_string(), doc("landing")).await;
    let mut open = manager.add("conn-2".to_string(), doc("landing")).await;
    drop(closed);

    manager.ping_all().await;

    let msg = open.recv().await.expect("open connection should be pinged");
    assert!(matches!(msg, Message::Ping(_)), "Expected Ping, got: {msg:?}");
}

// ---------------------------------------------------------------------------
// Test: shutdown_all sends Close and clears all connections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("conn-1".to_string(), doc("landing")).await;
    let mut rx2 = manager.add("conn-2".to_string(), doc("pricing")).await;

    manager.shutdown_all().await;
    assert_eq!(manager.connection_count().await, 0);

    for rx in [&mut rx1, &mut rx2] {
        let msg = rx.recv().await.expect("should receive Close");
        assert!(matches!(msg, Message::Close(None)), "Expected Close(None), got: {msg:?}");
        assert!(rx.recv().await.is_none(), "channel should be closed after shutdown");
    }
}
