//! Recovery of coordinator metadata across restarts

use minidfs::common::CoordinatorConfig;
use minidfs::coordinator::metadata::{BlockDescriptor, MetadataStore};
use minidfs::coordinator::{AllocationRequest, Coordinator};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_snapshot_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.json");

    {
        let store = MetadataStore::load(&path).unwrap();
        store
            .commit_file(
                "a.txt",
                vec![
                    BlockDescriptor {
                        block_id: "b0".into(),
                        replica_addresses: vec!["http://h1:5001".into()],
                    },
                    BlockDescriptor {
                        block_id: "b1".into(),
                        replica_addresses: vec!["http://h2:5002".into()],
                    },
                ],
            )
            .unwrap();
    }

    // Simulate crash (drop store) and reopen
    let store = MetadataStore::load(&path).unwrap();
    let ids: Vec<_> = store
        .get_file("a.txt")
        .into_iter()
        .map(|b| b.block_id)
        .collect();
    assert_eq!(ids, vec!["b0", "b1"]);
}

#[test]
fn test_snapshot_is_plain_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.json");
    let coord = Coordinator::from_config(&CoordinatorConfig {
        metadata_path: path.clone(),
        replication_factor: 1,
        ..Default::default()
    })
    .unwrap();
    coord.register("w1", "h1", 5001).unwrap();
    coord
        .allocate("a.txt", AllocationRequest::Blocks { block_count: 2 })
        .unwrap();

    let raw: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let blocks = raw["a.txt"].as_array().unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["replica_addresses"][0], "http://h1:5001");
    assert!(blocks[0]["block_id"].is_string());
}

#[test]
fn test_corrupt_snapshot_starts_empty_and_is_rewritten() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("meta.json");
    fs::write(&path, b"\x00\x01 garbage").unwrap();

    let coord = Coordinator::from_config(&CoordinatorConfig {
        metadata_path: path.clone(),
        replication_factor: 1,
        ..Default::default()
    })
    .unwrap();
    assert!(coord.list_files().is_empty());

    coord
        .allocate("fresh.txt", AllocationRequest::Blocks { block_count: 1 })
        .unwrap();
    assert_eq!(
        MetadataStore::load(&path).unwrap().list_files(),
        vec!["fresh.txt"]
    );
}

#[test]
fn test_legacy_snapshot_loads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("files_metadata.json");
    fs::write(
        &path,
        r#"{
            "report.pdf": [
                {"block_id": "0f6c", "datanodes": ["http://127.0.0.1:5001", "http://127.0.0.1:5002"]},
                {"block_id": "9a1e", "datanodes": ["http://127.0.0.1:5001"]}
            ]
        }"#,
    )
    .unwrap();

    let store = MetadataStore::load(&path).unwrap();
    let blocks = store.get_file("report.pdf");
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].replica_addresses.len(), 2);

    // Rewritten under the current field name
    store.persist().unwrap();
    let raw = fs::read_to_string(&path).unwrap();
    assert!(raw.contains("replica_addresses"));
    assert!(!raw.contains("datanodes"));
}
