//! End-to-end checks against a local WebSocket device

use chrono::Utc;
use diffmeter_rust_core::devices::{DeviceSource, DeviceStreamConfig, DeviceStreamListener};
use diffmeter_rust_core::{FingerprintConfig, SharedState, StateConfig};
use futures_util::SinkExt;
use meter_service_rust::DashboardMonitor;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Poll `cond` every 20ms for up to `limit`
async fn wait_for(limit: Duration, cond: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    cond()
}

#[tokio::test]
async fn test_device_stream_records_share_and_tracks_connection() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let (close_tx, close_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let frame = "\x1b[0;32mI (51234) asic_result: Ver: 20000000 Nonce: 1A2B3C4D diff 120000000 of 4096.\x1b[0m\n\
                     I (51240) asic_result: Ver: 20000000 Nonce: 0F0F0F0F diff 9000 of 4096.\n";
        ws.send(Message::Text(frame.into())).await.unwrap();
        let _ = close_rx.await;
        ws.close(None).await.ok();
    });

    let state = Arc::new(SharedState::new(StateConfig::default()));
    let config = DeviceStreamConfig {
        min_difficulty: 75_000_000.0,
        ..DeviceStreamConfig::default()
    };
    let device = DeviceStreamListener::new(
        DeviceSource::new(address.clone(), Some("Bench Bitaxe".to_string())),
        state.clone(),
        config,
    );
    let stats = device.stats();
    let handle = device.spawn();

    assert!(wait_for(Duration::from_secs(5), || state.recent_shares().len() == 1).await);
    assert!(state.is_connected(&address));
    assert_eq!(state.connected_count(), 1);

    let best = state.session_best().unwrap();
    assert_eq!(best.difficulty, 120_000_000.0);
    assert_eq!(best.source, address);
    assert_eq!(stats.shares_recorded(), 1);
    assert_eq!(stats.connects(), 1);

    close_tx.send(()).unwrap();
    server.await.unwrap();

    assert!(wait_for(Duration::from_secs(5), || !state.is_connected(&address)).await);
    assert_eq!(state.connected_count(), 0);
    assert_eq!(stats.disconnects(), 1);
    assert_eq!(stats.failed_connects(), 0);
    // History survives the disconnect
    assert_eq!(state.recent_shares().len(), 1);

    handle.abort();
}

#[tokio::test]
async fn test_monitor_sees_share_from_stream() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(
            "I (9120) asic_result: nonce=0x9a3c01f2 diff=520000000, ver=0x20000000".into(),
        ))
        .await
        .unwrap();
        // Hold the connection open until the test ends
        tokio::time::sleep(Duration::from_secs(10)).await;
    });

    let state = Arc::new(SharedState::default());
    let mut monitor = DashboardMonitor::new(
        state.clone(),
        FingerprintConfig {
            visible_shares: 6,
            configured_sources: 1,
        },
        Duration::from_millis(125),
        HashMap::from([(address.clone(), "Desk".to_string())]),
    );
    assert!(monitor.tick(Utc::now()).is_some());

    let handle = DeviceStreamListener::new(
        DeviceSource::new(address, None),
        state.clone(),
        DeviceStreamConfig::default(),
    )
    .spawn();

    assert!(wait_for(Duration::from_secs(5), || state.session_best().is_some()).await);

    let line = monitor.tick(Utc::now()).unwrap();
    assert!(line.contains("MINERS: 1/1"));
    assert!(line.contains("best 520 M (Desk)"));

    handle.abort();
    server.abort();
}
