//! Worker registry with heartbeat-driven liveness
//!
//! Liveness is pull-based: there is no background timer. Every read of the
//! active set first runs [`sweep`], which demotes workers whose last
//! heartbeat is older than the timeout. A demoted worker comes back only
//! through a fresh heartbeat or a re-registration.
//!
//! Liveness is advisory. It steers placement away from presumed-dead
//! workers but fences nothing: clients holding an older descriptor can
//! still reach a demoted worker directly.

use crate::common::{timestamp_now_millis, Error, Result, WorkerState};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Network location of a worker's block API
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerAddress {
    pub host: String,
    pub port: u16,
}

impl WorkerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL clients use for block transfers
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for WorkerAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// One registered worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerInfo {
    pub worker_id: String,
    pub address: WorkerAddress,
    pub state: WorkerState,
    /// Unix ms of the last registration or heartbeat
    pub last_heartbeat_ms: u64,
    /// First-registration order; fixes the placement iteration order
    #[serde(skip)]
    pub seq: u64,
}

/// Demote every worker whose last heartbeat is older than `timeout`.
///
/// Returns the ids demoted by this call, in no particular order. Workers
/// already inactive are left alone and not reported again.
pub fn sweep(
    workers: &mut HashMap<String, WorkerInfo>,
    now_ms: u64,
    timeout: Duration,
) -> Vec<String> {
    let timeout_ms = timeout.as_millis() as u64;
    let mut demoted = Vec::new();

    for (id, info) in workers.iter_mut() {
        let age_ms = now_ms.saturating_sub(info.last_heartbeat_ms);
        if info.state.is_active() && age_ms > timeout_ms {
            info.state = WorkerState::Inactive;
            demoted.push(id.clone());
        }
    }

    demoted
}

#[derive(Default)]
struct RegistryInner {
    workers: HashMap<String, WorkerInfo>,
    next_seq: u64,
}

/// In-memory (non-durable) registry of storage workers
pub struct WorkerRegistry {
    inner: Mutex<RegistryInner>,
    timeout: Duration,
}

impl WorkerRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Insert or overwrite a worker and mark it active.
    ///
    /// Returns `true` when the id was not known before.
    pub fn register(&self, worker_id: &str, address: WorkerAddress) -> bool {
        self.register_at(worker_id, address, timestamp_now_millis())
    }

    pub fn register_at(&self, worker_id: &str, address: WorkerAddress, now_ms: u64) -> bool {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;

        match inner.workers.get_mut(worker_id) {
            Some(existing) => {
                if existing.address != address {
                    tracing::info!(
                        "Worker {} re-registered at new address {} (was {})",
                        worker_id,
                        address,
                        existing.address
                    );
                }
                existing.address = address;
                existing.state = WorkerState::Active;
                existing.last_heartbeat_ms = now_ms;
                false
            }
            None => {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                tracing::info!("Worker {} registered at {}", worker_id, address);
                inner.workers.insert(
                    worker_id.to_string(),
                    WorkerInfo {
                        worker_id: worker_id.to_string(),
                        address,
                        state: WorkerState::Active,
                        last_heartbeat_ms: now_ms,
                        seq,
                    },
                );
                true
            }
        }
    }

    /// Refresh a known worker; unknown ids fail with `UnknownWorker`
    pub fn heartbeat(&self, worker_id: &str) -> Result<()> {
        self.heartbeat_at(worker_id, timestamp_now_millis())
    }

    pub fn heartbeat_at(&self, worker_id: &str, now_ms: u64) -> Result<()> {
        let mut inner = self.inner.lock();
        let info = inner
            .workers
            .get_mut(worker_id)
            .ok_or_else(|| Error::UnknownWorker(worker_id.to_string()))?;

        if !info.state.is_active() {
            tracing::info!("Worker {} is active again", worker_id);
        }
        info.state = WorkerState::Active;
        info.last_heartbeat_ms = now_ms;
        tracing::debug!("Heartbeat from worker {}", worker_id);
        Ok(())
    }

    /// Sweep, then return the active workers in registration order
    pub fn active_workers(&self) -> Vec<WorkerInfo> {
        self.active_workers_at(timestamp_now_millis())
    }

    pub fn active_workers_at(&self, now_ms: u64) -> Vec<WorkerInfo> {
        let mut inner = self.inner.lock();
        self.sweep_locked(&mut inner.workers, now_ms);

        let mut active: Vec<WorkerInfo> = inner
            .workers
            .values()
            .filter(|w| w.state.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|w| w.seq);
        active
    }

    /// Sweep, then return every worker (active or not) in registration order
    pub fn workers(&self) -> Vec<WorkerInfo> {
        self.workers_at(timestamp_now_millis())
    }

    pub fn workers_at(&self, now_ms: u64) -> Vec<WorkerInfo> {
        let mut inner = self.inner.lock();
        self.sweep_locked(&mut inner.workers, now_ms);

        let mut all: Vec<WorkerInfo> = inner.workers.values().cloned().collect();
        all.sort_by_key(|w| w.seq);
        all
    }

    pub fn get(&self, worker_id: &str) -> Option<WorkerInfo> {
        self.inner.lock().workers.get(worker_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sweep_locked(&self, workers: &mut HashMap<String, WorkerInfo>, now_ms: u64) {
        for id in sweep(workers, now_ms, self.timeout) {
            tracing::warn!(
                "Worker {} marked inactive: no heartbeat for over {:?}",
                id,
                self.timeout
            );
        }
    }
}
