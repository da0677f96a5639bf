//! Drives a fleet against local WebSocket units.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use holofleet_connection::{
    BroadcastOutcome, ConnectionPhase, FleetManager, JsonFileStore, MemoryStore, ReconnectConfig,
    RegistryError, SupervisorConfig, WsConnector,
};
use holofleet_protocol::DeviceCommand;

/// What the fake unit saw.
#[derive(Debug, PartialEq)]
enum Seen {
    Frame(String),
    Hangup,
}

/// Accepts connections and reports every text frame.
async fn spawn_unit() -> (u16, mpsc::UnboundedReceiver<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    return;
                };
                while let Some(Ok(msg)) = ws.next().await {
                    match msg {
                        Message::Text(text) => {
                            let _ = tx.send(Seen::Frame(text.as_str().to_owned()));
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
                let _ = tx.send(Seen::Hangup);
            });
        }
    });

    (port, rx)
}

fn fast_config() -> SupervisorConfig {
    SupervisorConfig {
        reconnect: ReconnectConfig {
            base: Duration::from_millis(100),
            max: Duration::from_millis(400),
            factor: 2,
        },
        heartbeat_interval: Duration::from_millis(100),
    }
}

async fn open_fleet() -> FleetManager {
    FleetManager::open(
        fast_config(),
        Arc::new(WsConnector::new().with_connect_timeout(Duration::from_secs(2))),
        Arc::new(MemoryStore::default()),
    )
    .await
    .unwrap()
}

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<Seen>) -> Seen {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("unit saw nothing")
        .expect("unit task ended")
}

#[tokio::test]
async fn connected_unit_receives_heartbeats() {
    let (port, mut seen) = spawn_unit().await;
    let fleet = open_fleet().await;
    fleet.add("holo1", "DEV1", "127.0.0.1", port).await.unwrap();

    for _ in 0..3 {
        assert_eq!(next_frame(&mut seen).await, Seen::Frame("PING DEV1".into()));
    }
    assert_eq!(fleet.wait_until_connected(Duration::from_secs(5)).await, 1);
    fleet.shutdown().await;
}

#[tokio::test]
async fn broadcast_reports_partial_success() {
    let (port, mut seen) = spawn_unit().await;
    let closed_port = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };

    let fleet = open_fleet().await;
    fleet.add("live", "DEV1", "127.0.0.1", port).await.unwrap();
    fleet.add("dark", "DEV2", "127.0.0.1", closed_port).await.unwrap();
    assert_eq!(next_frame(&mut seen).await, Seen::Frame("PING DEV1".into()));

    let outcome = fleet.send_to_all(DeviceCommand::model("http://x/cube.glb")).await;
    assert_eq!(outcome, BroadcastOutcome { success: 1, total: 2 });

    loop {
        match next_frame(&mut seen).await {
            Seen::Frame(f) if f == "DEV1 model http://x/cube.glb" => break,
            Seen::Frame(f) => assert_eq!(f, "PING DEV1"),
            Seen::Hangup => panic!("unit hung up"),
        }
    }

    let dark = fleet.state("dark").await.unwrap();
    assert_ne!(dark.phase, ConnectionPhase::Connected);
    fleet.shutdown().await;
}

#[tokio::test]
async fn removed_unit_hears_nothing_more() {
    let (port, mut seen) = spawn_unit().await;
    let fleet = open_fleet().await;
    fleet.add("holo1", "DEV1", "127.0.0.1", port).await.unwrap();
    assert_eq!(next_frame(&mut seen).await, Seen::Frame("PING DEV1".into()));

    fleet.remove("holo1").await.unwrap();

    // Drain whatever was in flight up to the hangup.
    loop {
        match next_frame(&mut seen).await {
            Seen::Hangup => break,
            Seen::Frame(f) => assert_eq!(f, "PING DEV1"),
        }
    }
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(seen.try_recv().is_err());
}

#[tokio::test]
async fn supervisor_reconnects_after_unit_restarts() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let fleet = open_fleet().await;
    let mut watch = {
        fleet.add("holo1", "DEV1", "127.0.0.1", port).await.unwrap();
        fleet.watch("holo1").await.unwrap()
    };

    // First connection: accept, then drop it.
    let (stream, _) = listener.accept().await.unwrap();
    let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    watch
        .wait_for(|s| s.phase == ConnectionPhase::Connected)
        .await
        .unwrap();
    drop(ws);
    watch
        .wait_for(|s| s.phase == ConnectionPhase::Backoff)
        .await
        .unwrap();

    // The supervisor comes back on its own.
    let (stream, _) = tokio::time::timeout(Duration::from_secs(5), listener.accept())
        .await
        .unwrap()
        .unwrap();
    let _ws = tokio_tungstenite::accept_async(stream).await.unwrap();
    tokio::time::timeout(
        Duration::from_secs(5),
        watch.wait_for(|s| s.phase == ConnectionPhase::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    fleet.shutdown().await;
}

#[tokio::test]
async fn fleet_survives_restart_through_json_store() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("fleet.json");

    {
        let fleet = FleetManager::open(
            fast_config(),
            Arc::new(WsConnector::new()),
            Arc::new(JsonFileStore::new(&path)),
        )
        .await
        .unwrap();
        fleet.add("holo1", "DEV1", "127.0.0.1", 9).await.unwrap();
        fleet.add_shortcut("Cube", "http://x/cube.glb", "spinning cube").await;
        fleet.shutdown().await;
    }

    let fleet = FleetManager::open(
        fast_config(),
        Arc::new(WsConnector::new()),
        Arc::new(JsonFileStore::new(&path)),
    )
    .await
    .unwrap();
    assert_eq!(fleet.get("holo1").await.unwrap().device_id, "DEV1");
    assert_eq!(
        fleet.shortcut("cube").await.unwrap().target_url,
        "http://x/cube.glb"
    );
    assert_eq!(
        fleet.add("holo1", "DEV9", "127.0.0.1", 9).await.unwrap_err(),
        RegistryError::DuplicateNickname("holo1".into())
    );
    fleet.shutdown().await;
}
