//! Replica placement
//!
//! `PlacementManager` turns a block count and the current active set into
//! block descriptors. Which workers hold each block is decided by a
//! [`ReplicaSelector`], so alternative policies plug in without touching
//! the coordinator.

use crate::common::{PlacementKind, Result};
use crate::coordinator::metadata::{BlockDescriptor, MetadataStore};
use crate::coordinator::registry::WorkerInfo;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use uuid::Uuid;

/// Picks the replica set for one block
pub trait ReplicaSelector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ordered subset of `active` of length `min(n, active.len())`
    fn select(&self, active: &[WorkerInfo], n: usize) -> Vec<WorkerInfo>;
}

/// First `n` workers in the registry's fixed order
#[derive(Debug, Default)]
pub struct FirstN;

impl ReplicaSelector for FirstN {
    fn name(&self) -> &'static str {
        "first_n"
    }

    fn select(&self, active: &[WorkerInfo], n: usize) -> Vec<WorkerInfo> {
        active.iter().take(n).cloned().collect()
    }
}

/// Same window as `FirstN`, but the start offset rotates on every call
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl ReplicaSelector for RoundRobin {
    fn name(&self) -> &'static str {
        "round_robin"
    }

    fn select(&self, active: &[WorkerInfo], n: usize) -> Vec<WorkerInfo> {
        if active.is_empty() {
            return Vec::new();
        }
        let start = self.next.fetch_add(1, Ordering::Relaxed) % active.len();
        active
            .iter()
            .cycle()
            .skip(start)
            .take(n.min(active.len()))
            .cloned()
            .collect()
    }
}

/// Build the selector named by configuration
pub fn selector_for(kind: PlacementKind) -> Box<dyn ReplicaSelector> {
    match kind {
        PlacementKind::FirstN => Box::new(FirstN),
        PlacementKind::RoundRobin => Box::new(RoundRobin::default()),
    }
}

/// Set when fewer workers were active than the replication factor asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Degraded {
    pub needed: usize,
    pub available: usize,
}

/// Result of one placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    pub blocks: Vec<BlockDescriptor>,
    pub degraded: Option<Degraded>,
    /// Whether an existing record under the same name was overwritten
    pub replaced: bool,
}

impl Placement {
    pub fn is_degraded(&self) -> bool {
        self.degraded.is_some()
    }
}

/// Assigns replicas to blocks and records the result
pub struct PlacementManager {
    selector: Box<dyn ReplicaSelector>,
}

impl PlacementManager {
    pub fn new(selector: Box<dyn ReplicaSelector>) -> Self {
        Self { selector }
    }

    pub fn from_kind(kind: PlacementKind) -> Self {
        Self::new(selector_for(kind))
    }

    pub fn strategy(&self) -> &'static str {
        self.selector.name()
    }

    /// Descriptors for `block_count` fresh blocks, no side effects
    pub fn plan(
        &self,
        block_count: usize,
        replication_factor: usize,
        active: &[WorkerInfo],
    ) -> (Vec<BlockDescriptor>, Option<Degraded>) {
        let degraded = (active.len() < replication_factor).then_some(Degraded {
            needed: replication_factor,
            available: active.len(),
        });

        let blocks = (0..block_count)
            .map(|_| BlockDescriptor {
                block_id: Uuid::new_v4().to_string(),
                replica_addresses: self
                    .selector
                    .select(active, replication_factor)
                    .iter()
                    .map(|w| w.address.url())
                    .collect(),
            })
            .collect();

        (blocks, degraded)
    }

    /// Plan `block_count` blocks for `file_name` and commit them to `store`.
    ///
    /// The record is written only if the whole plan succeeds; a persistence
    /// failure is returned to the caller.
    pub fn assign(
        &self,
        file_name: &str,
        block_count: usize,
        replication_factor: usize,
        active: &[WorkerInfo],
        store: &MetadataStore,
    ) -> Result<Placement> {
        let (blocks, degraded) = self.plan(block_count, replication_factor, active);
        let replaced = store.commit_file(file_name, blocks.clone())?;
        Ok(Placement {
            blocks,
            degraded,
            replaced,
        })
    }
}

impl Default for PlacementManager {
    fn default() -> Self {
        Self::new(Box::new(FirstN))
    }
}
