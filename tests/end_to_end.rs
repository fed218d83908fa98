//! End-to-end: in-process coordinator and workers over real sockets

use minidfs::client::{CoordinatorClient, DfsClient, WorkerClient};
use minidfs::common::{CoordinatorConfig, WorkerConfig, WorkerState};
use minidfs::{CoordinatorServer, Error, WorkerServer};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const BLOCK_SIZE: usize = 1024;

struct Running {
    url: String,
    stop: oneshot::Sender<()>,
    task: JoinHandle<minidfs::Result<()>>,
}

impl Running {
    async fn shutdown(self) {
        let _ = self.stop.send(());
        self.task.await.unwrap().unwrap();
    }
}

async fn start_coordinator(dir: &Path, replication_factor: usize) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let config = CoordinatorConfig {
        metadata_path: dir.join("metadata").join("files_metadata.json"),
        replication_factor,
        ..Default::default()
    };

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(CoordinatorServer::new(config).serve_with(listener, async {
        let _ = stopped.await;
    }));
    Running { url, stop, task }
}

async fn start_worker(dir: &Path, id: &str, coordinator_url: &str) -> Running {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let config = WorkerConfig {
        worker_id: id.to_string(),
        advertise_host: "127.0.0.1".to_string(),
        coordinator_url: coordinator_url.to_string(),
        data_dir: dir.join(id),
        heartbeat_interval_secs: 1,
        ..Default::default()
    };

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(WorkerServer::new(config).serve_with(listener, async {
        let _ = stopped.await;
    }));
    Running { url, stop, task }
}

async fn wait_for_active_workers(client: &CoordinatorClient, n: usize) {
    for _ in 0..100 {
        if let Ok(workers) = client.workers().await {
            if workers.iter().filter(|w| w.state == WorkerState::Active).count() >= n {
                return;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("{} workers never became active", n);
}

fn dfs_client(coordinator_url: &str) -> DfsClient {
    let timeout = Duration::from_secs(3);
    DfsClient::new(
        CoordinatorClient::new(coordinator_url, timeout).unwrap(),
        WorkerClient::new(timeout).unwrap(),
        BLOCK_SIZE,
    )
}

fn block_files(dir: &Path) -> usize {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("block"))
                .count()
        })
        .unwrap_or(0)
}

fn sample_content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 256) as u8).collect()
}

#[tokio::test]
async fn test_upload_download_list_delete() {
    let dir = TempDir::new().unwrap();
    let coord = start_coordinator(dir.path(), 2).await;
    let w1 = start_worker(dir.path(), "worker-1", &coord.url).await;
    let w2 = start_worker(dir.path(), "worker-2", &coord.url).await;

    let client = dfs_client(&coord.url);
    wait_for_active_workers(client.coordinator(), 2).await;

    let input = dir.path().join("report.bin");
    let content = sample_content(3 * BLOCK_SIZE + 100);
    tokio::fs::write(&input, &content).await.unwrap();

    let upload = client.upload(&input).await.unwrap();
    assert_eq!(upload.file_name, "report.bin");
    assert_eq!(upload.blocks, 4);
    assert_eq!(upload.replicas_written, 8);
    assert!(upload.degraded.is_none());
    assert_eq!(block_files(&dir.path().join("worker-1")), 4);
    assert_eq!(block_files(&dir.path().join("worker-2")), 4);

    assert_eq!(client.list().await.unwrap(), vec!["report.bin"]);

    let output = dir.path().join("restored.bin");
    let download = client.download("report.bin", &output).await.unwrap();
    assert_eq!(download.bytes, content.len() as u64);
    assert_eq!(tokio::fs::read(&output).await.unwrap(), content);

    let deleted = client.delete("report.bin").await.unwrap();
    assert_eq!(deleted.orphaned_replicas, 0);
    assert!(client.list().await.unwrap().is_empty());
    assert_eq!(block_files(&dir.path().join("worker-1")), 0);
    assert_eq!(block_files(&dir.path().join("worker-2")), 0);

    w1.shutdown().await;
    w2.shutdown().await;
    coord.shutdown().await;
}

#[tokio::test]
async fn test_download_falls_back_to_second_replica() {
    let dir = TempDir::new().unwrap();
    let coord = start_coordinator(dir.path(), 2).await;
    let w1 = start_worker(dir.path(), "worker-1", &coord.url).await;
    let w2 = start_worker(dir.path(), "worker-2", &coord.url).await;

    let client = dfs_client(&coord.url);
    wait_for_active_workers(client.coordinator(), 2).await;

    let input = dir.path().join("data.bin");
    let content = sample_content(2 * BLOCK_SIZE);
    tokio::fs::write(&input, &content).await.unwrap();
    client.upload(&input).await.unwrap();

    // First replica goes away
    w1.shutdown().await;

    let output = dir.path().join("out.bin");
    client.download("data.bin", &output).await.unwrap();
    assert_eq!(tokio::fs::read(&output).await.unwrap(), content);

    // With no replica left, the download fails and writes nothing
    w2.shutdown().await;
    let missing = dir.path().join("missing.bin");
    let err = client.download("data.bin", &missing).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(!missing.exists());

    coord.shutdown().await;
}

#[tokio::test]
async fn test_degraded_upload_with_single_worker() {
    let dir = TempDir::new().unwrap();
    let coord = start_coordinator(dir.path(), 3).await;
    let w1 = start_worker(dir.path(), "worker-1", &coord.url).await;

    let client = dfs_client(&coord.url);
    wait_for_active_workers(client.coordinator(), 1).await;

    let input = dir.path().join("small.txt");
    tokio::fs::write(&input, b"hello minidfs").await.unwrap();

    let upload = client.upload(&input).await.unwrap();
    assert_eq!(upload.blocks, 1);
    let degraded = upload.degraded.unwrap();
    assert_eq!((degraded.needed, degraded.available), (3, 1));

    w1.shutdown().await;
    coord.shutdown().await;
}

#[tokio::test]
async fn test_errors_surface_with_their_codes() {
    let dir = TempDir::new().unwrap();
    let coord = start_coordinator(dir.path(), 1).await;
    let client = dfs_client(&coord.url);

    let err = client
        .download("nope.txt", dir.path().join("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = client.delete("nope.txt").await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let empty = dir.path().join("empty.txt");
    tokio::fs::write(&empty, b"").await.unwrap();
    let err = client.upload(&empty).await.unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    let err = client
        .coordinator()
        .heartbeat("ghost")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownWorker(_)));

    coord.shutdown().await;
}

#[tokio::test]
async fn test_upload_fails_when_no_worker_is_reachable() {
    let dir = TempDir::new().unwrap();
    let coord = start_coordinator(dir.path(), 1).await;
    let client = dfs_client(&coord.url);

    // Registered, but nothing listens there
    client
        .coordinator()
        .register("phantom", "127.0.0.1", 9)
        .await
        .unwrap();

    let input = dir.path().join("f.bin");
    tokio::fs::write(&input, b"payload").await.unwrap();
    let err = client.upload(&input).await.unwrap_err();
    assert!(matches!(err, Error::Transport(_)));

    coord.shutdown().await;
}
