//! Worker liveness: timeouts, recovery and re-registration

use minidfs::common::WorkerState;
use minidfs::coordinator::registry::{WorkerAddress, WorkerRegistry};
use minidfs::Error;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(30);

#[test]
fn test_registered_worker_is_active() {
    let registry = WorkerRegistry::new(TIMEOUT);
    registry.register_at("w1", WorkerAddress::new("h1", 5001), 1_000);

    let active = registry.active_workers_at(1_000);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].worker_id, "w1");
}

#[test]
fn test_silent_worker_drops_out_and_heartbeat_brings_it_back() {
    let registry = WorkerRegistry::new(TIMEOUT);
    registry.register_at("w1", WorkerAddress::new("h1", 5001), 0);
    registry.register_at("w2", WorkerAddress::new("h2", 5002), 0);

    for t in (5_000..=60_000).step_by(5_000) {
        registry.heartbeat_at("w2", t).unwrap();
    }

    let ids: Vec<_> = registry
        .active_workers_at(60_000)
        .into_iter()
        .map(|w| w.worker_id)
        .collect();
    assert_eq!(ids, vec!["w2"]);
    assert_eq!(registry.get("w1").unwrap().state, WorkerState::Inactive);

    registry.heartbeat_at("w1", 61_000).unwrap();
    let ids: Vec<_> = registry
        .active_workers_at(61_000)
        .into_iter()
        .map(|w| w.worker_id)
        .collect();
    // Recovery keeps the original registration order
    assert_eq!(ids, vec!["w1", "w2"]);
}

#[test]
fn test_inactive_worker_stays_listed() {
    let registry = WorkerRegistry::new(TIMEOUT);
    registry.register_at("w1", WorkerAddress::new("h1", 5001), 0);

    let all = registry.workers_at(100_000);
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].state, WorkerState::Inactive);
    assert!(registry.active_workers_at(100_000).is_empty());
}

#[test]
fn test_heartbeat_from_stranger_is_rejected() {
    let registry = WorkerRegistry::new(TIMEOUT);
    assert!(matches!(
        registry.heartbeat_at("ghost", 0),
        Err(Error::UnknownWorker(_))
    ));
    assert!(registry.is_empty());
}

#[test]
fn test_repeated_registration_is_idempotent() {
    let registry = WorkerRegistry::new(TIMEOUT);
    for t in 0..5 {
        registry.register_at("w1", WorkerAddress::new("h1", 5001), t);
    }
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.active_workers_at(5).len(), 1);
}
