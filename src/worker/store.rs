//! Local block store
//!
//! One file per block: `<data_dir>/<block_id>.block`. Writes go to a
//! uniquely named `.tmp` sibling and are renamed into place, so a reader
//! never sees a half-written block.

use crate::common::{validate_block_id, Result};
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const BLOCK_EXTENSION: &str = "block";

/// Block store statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub blocks: usize,
    pub bytes: u64,
}

pub struct BlockStore {
    data_dir: PathBuf,
}

impl BlockStore {
    /// Open or create the store directory
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&data_dir).await?;
        tracing::info!("Block storage initialized at {}", data_dir.display());
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn block_path(&self, block_id: &str) -> Result<PathBuf> {
        validate_block_id(block_id)?;
        Ok(self
            .data_dir
            .join(format!("{}.{}", block_id, BLOCK_EXTENSION)))
    }

    /// Write a block, replacing any previous content under the same id
    pub async fn save(&self, block_id: &str, data: &[u8]) -> Result<()> {
        let path = self.block_path(block_id)?;
        let tmp_path = self
            .data_dir
            .join(format!("{}.{}.tmp", block_id, Uuid::new_v4()));

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Block {} saved ({} bytes)", block_id, data.len());
        Ok(())
    }

    /// Read a block; `None` if it does not exist
    pub async fn read(&self, block_id: &str) -> Result<Option<Bytes>> {
        let path = self.block_path(block_id)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Block {} not found", block_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete a block; returns `false` if it was already gone
    pub async fn delete(&self, block_id: &str) -> Result<bool> {
        let path = self.block_path(block_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Block {} deleted", block_id);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("Block {} does not exist", block_id);
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        let mut entries = tokio::fs::read_dir(&self.data_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(BLOCK_EXTENSION) {
                stats.blocks += 1;
                stats.bytes += entry.metadata().await?.len();
            }
        }
        Ok(stats)
    }
}
