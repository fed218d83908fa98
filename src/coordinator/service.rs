//! Coordinator core: registry + metadata + placement behind one API
//!
//! Everything here is synchronous and transport-agnostic; the HTTP layer in
//! [`super::http`] is a thin shell around it.

use crate::common::{
    timestamp_now_millis, validate_file_name, CoordinatorConfig, CoordinatorMetrics, Error,
    Result,
};
use crate::coordinator::metadata::{BlockDescriptor, MetadataStore, RemoveOutcome};
use crate::coordinator::placement::{Degraded, PlacementManager};
use crate::coordinator::registry::{WorkerAddress, WorkerInfo, WorkerRegistry};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// Upper bound on blocks per allocation
pub const MAX_BLOCKS_PER_FILE: u64 = 1 << 20;

/// The two accepted allocation shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocationRequest {
    /// Caller already split the file
    Blocks { block_count: u64 },
    /// Coordinator derives `ceil(file_size / block_size)`
    Sized { file_size: u64, block_size: u64 },
}

impl AllocationRequest {
    pub fn block_count(&self) -> Result<usize> {
        let count = match *self {
            AllocationRequest::Blocks { block_count } => {
                require_positive("num_blocks", block_count)?
            }
            AllocationRequest::Sized {
                file_size,
                block_size,
            } => {
                let file_size = require_positive("file_size", file_size)?;
                let block_size = require_positive("block_size", block_size)?;
                file_size.div_ceil(block_size)
            }
        };

        if count > MAX_BLOCKS_PER_FILE {
            return Err(Error::InvalidArgument(format!(
                "{} blocks requested, at most {} allowed",
                count, MAX_BLOCKS_PER_FILE
            )));
        }
        Ok(count as usize)
    }
}

fn require_positive(field: &str, value: u64) -> Result<u64> {
    if value == 0 {
        return Err(Error::InvalidArgument(format!(
            "{} must be a positive integer",
            field
        )));
    }
    Ok(value)
}

/// Successful allocation, possibly degraded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocation {
    pub file_name: String,
    pub blocks: Vec<BlockDescriptor>,
    pub replication_factor: usize,
    /// Present when fewer replicas than the replication factor were assigned
    pub degraded: Option<Degraded>,
}

impl Allocation {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Snapshot for the status endpoints
#[derive(Debug, Clone, Serialize)]
pub struct ClusterStatus {
    pub workers: Vec<WorkerInfo>,
    pub active_workers: usize,
    pub files: usize,
    pub replication_factor: usize,
    pub placement: &'static str,
    pub heartbeat_timeout_secs: u64,
}

/// Per-file-name mutual exclusion for allocations
#[derive(Default)]
struct NameLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl NameLocks {
    fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.lock().entry(name.to_string()).or_default().clone();

        let result = {
            let _guard = lock.lock();
            f()
        };

        // Only the table and this call hold the entry: nobody is waiting.
        let mut locks = self.locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(name);
        }
        result
    }
}

/// The single metadata authority of a cluster
pub struct Coordinator {
    registry: WorkerRegistry,
    metadata: MetadataStore,
    placement: PlacementManager,
    replication_factor: usize,
    name_locks: NameLocks,
    metrics: CoordinatorMetrics,
}

impl Coordinator {
    /// Assemble a coordinator from its parts.
    ///
    /// A replication factor of zero is rejected.
    pub fn new(
        registry: WorkerRegistry,
        metadata: MetadataStore,
        placement: PlacementManager,
        replication_factor: usize,
    ) -> Result<Self> {
        if replication_factor == 0 {
            return Err(Error::InvalidConfig(
                "replication_factor must be at least 1".into(),
            ));
        }
        Ok(Self {
            registry,
            metadata,
            placement,
            replication_factor,
            name_locks: NameLocks::default(),
            metrics: CoordinatorMetrics::new(),
        })
    }

    /// Load metadata and build every component from configuration
    pub fn from_config(config: &CoordinatorConfig) -> Result<Self> {
        config.validate()?;
        let metadata = MetadataStore::load(&config.metadata_path)?;
        Self::new(
            WorkerRegistry::new(config.heartbeat_timeout()),
            metadata,
            PlacementManager::from_kind(config.placement),
            config.replication_factor,
        )
    }

    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    pub fn registry(&self) -> &WorkerRegistry {
        &self.registry
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }

    // === Workers ===

    /// Register (or re-register) a worker
    pub fn register(&self, worker_id: &str, host: &str, port: u16) -> Result<()> {
        self.register_at(worker_id, host, port, timestamp_now_millis())
    }

    pub fn register_at(&self, worker_id: &str, host: &str, port: u16, now_ms: u64) -> Result<()> {
        if worker_id.trim().is_empty() {
            return Err(Error::MissingField("node_id".into()));
        }
        if host.trim().is_empty() {
            return Err(Error::MissingField("ip".into()));
        }
        if port == 0 {
            return Err(Error::MissingField("port".into()));
        }

        self.registry
            .register_at(worker_id, WorkerAddress::new(host, port), now_ms);
        self.metrics.registrations.inc();
        Ok(())
    }

    pub fn heartbeat(&self, worker_id: &str) -> Result<()> {
        self.heartbeat_at(worker_id, timestamp_now_millis())
    }

    pub fn heartbeat_at(&self, worker_id: &str, now_ms: u64) -> Result<()> {
        if worker_id.trim().is_empty() {
            return Err(Error::MissingField("node_id".into()));
        }

        match self.registry.heartbeat_at(worker_id, now_ms) {
            Ok(()) => {
                self.metrics.heartbeats.inc();
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Unknown worker {} tried to send heartbeat", worker_id);
                self.metrics.unknown_heartbeats.inc();
                Err(e)
            }
        }
    }

    pub fn active_workers(&self) -> Vec<WorkerInfo> {
        self.registry.active_workers()
    }

    // === Files ===

    /// Allocate blocks for `file_name`, replacing any previous record
    pub fn allocate(&self, file_name: &str, request: AllocationRequest) -> Result<Allocation> {
        self.allocate_at(file_name, request, timestamp_now_millis())
    }

    pub fn allocate_at(
        &self,
        file_name: &str,
        request: AllocationRequest,
        now_ms: u64,
    ) -> Result<Allocation> {
        validate_file_name(file_name)?;
        let block_count = request.block_count()?;
        let start = Instant::now();

        let placement = self.name_locks.with_lock(file_name, || {
            let active = self.registry.active_workers_at(now_ms);
            self.placement.assign(
                file_name,
                block_count,
                self.replication_factor,
                &active,
                &self.metadata,
            )
        });

        let placement = match placement {
            Ok(p) => p,
            Err(e) => {
                tracing::error!("Allocation for '{}' failed: {}", file_name, e);
                if matches!(e, Error::Persistence(_)) {
                    self.metrics.persistence_failures.inc();
                }
                return Err(e);
            }
        };

        if placement.replaced {
            // Overwrite, never merge: the old block list is dropped from metadata.
            tracing::warn!(
                "Allocation for '{}' replaced an existing file record",
                file_name
            );
        }
        if let Some(d) = placement.degraded {
            tracing::warn!(
                "Degraded allocation for '{}': {} of {} replicas available",
                file_name,
                d.available,
                d.needed
            );
            self.metrics.degraded_allocations.inc();
        }

        self.metrics.allocations.inc();
        self.metrics
            .blocks_allocated
            .add(placement.blocks.len() as u64);
        self.metrics.observe_allocation(start.elapsed());
        tracing::info!(
            "Allocated {} blocks for '{}' ({})",
            placement.blocks.len(),
            file_name,
            self.placement.strategy()
        );

        Ok(Allocation {
            file_name: file_name.to_string(),
            blocks: placement.blocks,
            replication_factor: self.replication_factor,
            degraded: placement.degraded,
        })
    }

    pub fn list_files(&self) -> Vec<String> {
        self.metadata.list_files()
    }

    /// Block sequence of a file; `NotFound` when unknown
    pub fn get_file_blocks(&self, file_name: &str) -> Result<Vec<BlockDescriptor>> {
        let blocks = self.metadata.get_file(file_name);
        if blocks.is_empty() {
            return Err(Error::NotFound(file_name.to_string()));
        }
        Ok(blocks)
    }

    /// Remove a file record and persist; `NotFound` when unknown
    pub fn remove_file(&self, file_name: &str) -> Result<()> {
        let outcome = self.metadata.commit_removal(file_name).inspect_err(|e| {
            if matches!(e, Error::Persistence(_)) {
                self.metrics.persistence_failures.inc();
            }
        })?;

        match outcome {
            RemoveOutcome::Removed => {
                self.metrics.files_removed.inc();
                Ok(())
            }
            RemoveOutcome::NotFound => Err(Error::NotFound(file_name.to_string())),
        }
    }

    // === Introspection ===

    pub fn status(&self) -> ClusterStatus {
        let workers = self.registry.workers();
        let active_workers = workers.iter().filter(|w| w.state.is_active()).count();
        ClusterStatus {
            active_workers,
            workers,
            files: self.metadata.len(),
            replication_factor: self.replication_factor,
            placement: self.placement.strategy(),
            heartbeat_timeout_secs: self.registry.timeout().as_secs(),
        }
    }

    /// Refresh gauges and return the metrics registry
    pub fn metrics(&self) -> &CoordinatorMetrics {
        let status = self.status();
        self.metrics.workers.set(status.workers.len() as u64);
        self.metrics.active_workers.set(status.active_workers as u64);
        self.metrics.files.set(status.files as u64);
        &self.metrics
    }
}
