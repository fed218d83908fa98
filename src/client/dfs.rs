//! Transfer driver: moves file bytes between local disk and workers
//!
//! The coordinator only hands out and stores block descriptors. Every byte
//! goes straight between this client and the workers.

use crate::client::coordinator_client::CoordinatorClient;
use crate::client::splitter::{merge_blocks, split_file};
use crate::client::worker_client::WorkerClient;
use crate::common::{ClientConfig, Error, Result};
use crate::coordinator::metadata::BlockDescriptor;
use crate::coordinator::placement::Degraded;
use crate::coordinator::registry::WorkerInfo;
use crate::coordinator::service::AllocationRequest;
use bytes::Bytes;
use futures_util::future::join_all;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReport {
    pub file_name: String,
    pub blocks: usize,
    pub bytes: u64,
    /// Successful block writes summed over all replicas
    pub replicas_written: usize,
    pub degraded: Option<Degraded>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub file_name: String,
    pub blocks: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteReport {
    pub message: String,
    /// Replica deletions that failed; the metadata is gone regardless
    pub orphaned_replicas: usize,
}

pub struct DfsClient {
    coordinator: CoordinatorClient,
    workers: WorkerClient,
    block_size: usize,
}

impl DfsClient {
    pub fn new(coordinator: CoordinatorClient, workers: WorkerClient, block_size: usize) -> Self {
        Self {
            coordinator,
            workers,
            block_size,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            CoordinatorClient::new(&config.coordinator_url, config.request_timeout())?,
            WorkerClient::new(config.request_timeout())?,
            config.block_size,
        ))
    }

    pub fn coordinator(&self) -> &CoordinatorClient {
        &self.coordinator
    }

    /// Split `path`, allocate, and push every block to each of its replicas.
    ///
    /// Fails if any block could not be written to at least one replica.
    pub async fn upload(&self, path: impl AsRef<Path>) -> Result<UploadReport> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::InvalidArgument(format!("not a file path: {}", path.display()))
            })?
            .to_string();

        let blocks = split_file(path, self.block_size).await?;
        if blocks.is_empty() {
            return Err(Error::InvalidArgument(format!(
                "'{}' is empty, nothing to upload",
                file_name
            )));
        }
        tracing::info!("Uploading '{}' in {} blocks", file_name, blocks.len());

        let allocation = self
            .coordinator
            .allocate(
                &file_name,
                AllocationRequest::Blocks {
                    block_count: blocks.len() as u64,
                },
            )
            .await?;

        if allocation.blocks.len() != blocks.len() {
            return Err(Error::Internal(format!(
                "coordinator allocated {} blocks, expected {}",
                allocation.blocks.len(),
                blocks.len()
            )));
        }
        if let Some(d) = allocation.degraded {
            tracing::warn!(
                "Degraded allocation for '{}': {} of {} replicas",
                file_name,
                d.available,
                d.needed
            );
        }

        let mut replicas_written = 0;
        for (data, descriptor) in blocks.iter().zip(&allocation.blocks) {
            let stored = self.store_replicas(descriptor, data.clone()).await;
            if stored == 0 {
                return Err(Error::Transport(format!(
                    "block {} of '{}' could not be stored on any replica",
                    descriptor.block_id, file_name
                )));
            }
            replicas_written += stored;
        }

        let bytes = blocks.iter().map(|b| b.len() as u64).sum();
        tracing::info!("✓ Uploaded '{}' ({} bytes)", file_name, bytes);

        Ok(UploadReport {
            file_name,
            blocks: blocks.len(),
            bytes,
            replicas_written,
            degraded: allocation.degraded,
        })
    }

    /// Write one block to all its replicas concurrently; returns the
    /// number that acknowledged.
    async fn store_replicas(&self, descriptor: &BlockDescriptor, data: Bytes) -> usize {
        let workers = &self.workers;
        let writes = descriptor.replica_addresses.iter().map(move |addr| {
            let data = data.clone();
            async move {
                let result = workers.store_block(addr, &descriptor.block_id, data).await;
                if let Err(ref e) = result {
                    tracing::warn!(
                        "Failed to store block {} on {}: {}",
                        descriptor.block_id,
                        addr,
                        e
                    );
                }
                result.is_ok()
            }
        });

        join_all(writes).await.into_iter().filter(|ok| *ok).count()
    }

    /// Fetch the block list and write the reassembled file to `output`.
    ///
    /// Each block is read from the first replica that answers. A block
    /// with no responsive replica fails the whole download and nothing is
    /// written.
    pub async fn download(
        &self,
        file_name: &str,
        output: impl AsRef<Path>,
    ) -> Result<DownloadReport> {
        let descriptors = self.coordinator.get_file_blocks(file_name).await?;

        let mut blocks = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            blocks.push(self.read_any_replica(descriptor).await?);
        }

        let bytes = merge_blocks(&blocks, output.as_ref()).await?;
        tracing::info!(
            "✓ Downloaded '{}' to {} ({} bytes)",
            file_name,
            output.as_ref().display(),
            bytes
        );

        Ok(DownloadReport {
            file_name: file_name.to_string(),
            blocks: blocks.len(),
            bytes,
        })
    }

    async fn read_any_replica(&self, descriptor: &BlockDescriptor) -> Result<Bytes> {
        for addr in &descriptor.replica_addresses {
            match self.workers.read_block(addr, &descriptor.block_id).await {
                Ok(data) => {
                    tracing::debug!("Fetched block {} from {}", descriptor.block_id, addr);
                    return Ok(data);
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to fetch block {} from {}: {}",
                        descriptor.block_id,
                        addr,
                        e
                    );
                }
            }
        }

        Err(Error::Transport(format!(
            "no replica of block {} is available ({} tried)",
            descriptor.block_id,
            descriptor.replica_addresses.len()
        )))
    }

    /// Remove the file record, then delete its blocks from the workers.
    ///
    /// Block deletion is best effort: failures are logged and counted, and
    /// the bytes stay on disk as orphans.
    pub async fn delete(&self, file_name: &str) -> Result<DeleteReport> {
        let descriptors = self.coordinator.get_file_blocks(file_name).await?;
        let message = self.coordinator.remove_file(file_name).await?;

        let workers = &self.workers;
        let deletions = descriptors.iter().flat_map(move |descriptor| {
            descriptor.replica_addresses.iter().map(move |addr| async move {
                let result = workers.delete_block(addr, &descriptor.block_id).await;
                if let Err(ref e) = result {
                    tracing::warn!(
                        "Failed to delete block {} on {}: {}",
                        descriptor.block_id,
                        addr,
                        e
                    );
                }
                result.is_ok()
            })
        });
        let orphaned_replicas = join_all(deletions)
            .await
            .into_iter()
            .filter(|ok| !ok)
            .count();

        tracing::info!("{}", message);
        Ok(DeleteReport {
            message,
            orphaned_replicas,
        })
    }

    pub async fn list(&self) -> Result<Vec<String>> {
        self.coordinator.list_files().await
    }

    pub async fn workers(&self) -> Result<Vec<WorkerInfo>> {
        self.coordinator.workers().await
    }
}
