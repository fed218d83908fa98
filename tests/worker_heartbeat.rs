//! Heartbeat task against a live coordinator router

use minidfs::client::CoordinatorClient;
use minidfs::common::{CoordinatorConfig, WorkerState};
use minidfs::coordinator::http::{create_router, CoordState};
use minidfs::worker::{HeartbeatTask, Registration};
use minidfs::Coordinator;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::net::TcpListener;

async fn spawn_coordinator(dir: &TempDir) -> (Arc<Coordinator>, String) {
    let config = CoordinatorConfig {
        metadata_path: dir.path().join("files_metadata.json"),
        replication_factor: 1,
        ..Default::default()
    };
    let coordinator = Arc::new(Coordinator::from_config(&config).unwrap());
    let app = create_router(CoordState::new(coordinator.clone()));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (coordinator, url)
}

fn client(url: &str) -> CoordinatorClient {
    CoordinatorClient::new(url, Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_unknown_worker_is_reregistered_by_heartbeat() {
    let dir = TempDir::new().unwrap();
    let (coordinator, url) = spawn_coordinator(&dir).await;

    // Never registered: the first beat gets unknown_worker back
    let registration = Registration {
        worker_id: "late-worker".to_string(),
        host: "127.0.0.1".to_string(),
        port: 5055,
    };
    let handle =
        HeartbeatTask::new(client(&url), registration, Duration::from_millis(50)).start();

    let mut registered = false;
    for _ in 0..100 {
        if coordinator.registry().get("late-worker").is_some() {
            registered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(registered);

    let info = coordinator.registry().get("late-worker").unwrap();
    assert_eq!(info.address.port, 5055);
    assert_eq!(info.state, WorkerState::Active);
    assert!(coordinator.metrics().unknown_heartbeats.get() >= 1);

    handle.stop().await;
}

#[tokio::test]
async fn test_beats_stop_after_stop() {
    let dir = TempDir::new().unwrap();
    let (coordinator, url) = spawn_coordinator(&dir).await;
    coordinator.register("w1", "127.0.0.1", 5001).unwrap();

    let registration = Registration {
        worker_id: "w1".to_string(),
        host: "127.0.0.1".to_string(),
        port: 5001,
    };
    let handle =
        HeartbeatTask::new(client(&url), registration, Duration::from_millis(30)).start();

    for _ in 0..100 {
        if handle.beats_sent() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(handle.beats_sent() >= 3);
    assert!(handle.is_running());

    handle.stop().await;
    let after_stop = coordinator.metrics().heartbeats.get();
    assert!(after_stop >= 3);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(coordinator.metrics().heartbeats.get(), after_stop);
}

#[tokio::test]
async fn test_stop_cancels_request_to_hung_coordinator() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let registration = Registration {
        worker_id: "w1".to_string(),
        host: "127.0.0.1".to_string(),
        port: 5001,
    };
    let hung = CoordinatorClient::new(&url, Duration::from_secs(5)).unwrap();
    let handle = HeartbeatTask::new(hung, registration, Duration::from_millis(20)).start();

    // Let a heartbeat get stuck waiting on the coordinator
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handle.beats_sent(), 0);

    let started = Instant::now();
    handle.stop().await;
    assert!(started.elapsed() < Duration::from_secs(1));
}
