//! File splitting and merging
//!
//! Blocks are `block_size` bytes each except the last, which holds the
//! remainder. Merging writes blocks back in sequence order.

use crate::common::{Error, Result};
use bytes::Bytes;
use std::path::Path;
use tokio::io::AsyncWriteExt;

/// Cut `data` into blocks without copying
pub fn split_bytes(data: Bytes, block_size: usize) -> Result<Vec<Bytes>> {
    if block_size == 0 {
        return Err(Error::InvalidArgument("block_size must be positive".into()));
    }

    let mut blocks = Vec::with_capacity(data.len().div_ceil(block_size));
    let mut offset = 0;
    while offset < data.len() {
        let end = (offset + block_size).min(data.len());
        blocks.push(data.slice(offset..end));
        offset = end;
    }
    Ok(blocks)
}

/// Read `path` and split it; an empty file yields no blocks
pub async fn split_file(path: impl AsRef<Path>, block_size: usize) -> Result<Vec<Bytes>> {
    let path = path.as_ref();
    let data = Bytes::from(tokio::fs::read(path).await?);
    let blocks = split_bytes(data, block_size)?;
    tracing::debug!("Split '{}' into {} blocks", path.display(), blocks.len());
    Ok(blocks)
}

/// Write `blocks` to `output` in order, returning the byte count
pub async fn merge_blocks(blocks: &[Bytes], output: impl AsRef<Path>) -> Result<u64> {
    let output = output.as_ref();
    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let mut file = tokio::fs::File::create(output).await?;
    let mut written = 0u64;
    for block in blocks {
        file.write_all(block).await?;
        written += block.len() as u64;
    }
    file.flush().await?;
    file.sync_all().await?;

    tracing::debug!(
        "Merged {} blocks into '{}'",
        blocks.len(),
        output.display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_split_keeps_remainder_in_last_block() {
        let data = Bytes::from(vec![7u8; 2_500]);
        let blocks = split_bytes(data, 1_024).unwrap();
        let sizes: Vec<usize> = blocks.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![1_024, 1_024, 452]);
    }

    #[test]
    fn test_split_exact_multiple() {
        let blocks = split_bytes(Bytes::from(vec![1u8; 2_048]), 1_024).unwrap();
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.len() == 1_024));
    }

    #[test]
    fn test_split_empty_and_zero_block_size() {
        assert!(split_bytes(Bytes::new(), 16).unwrap().is_empty());
        assert!(matches!(
            split_bytes(Bytes::from_static(b"abc"), 0),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_split_then_merge_restores_file() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("input.bin");
        let output = dir.path().join("out").join("restored.bin");

        let content: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        tokio::fs::write(&input, &content).await.unwrap();

        let blocks = split_file(&input, 4_096).await.unwrap();
        assert_eq!(blocks.len(), 3);

        let written = merge_blocks(&blocks, &output).await.unwrap();
        assert_eq!(written, content.len() as u64);
        assert_eq!(tokio::fs::read(&output).await.unwrap(), content);
    }

    #[tokio::test]
    async fn test_split_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let err = split_file(dir.path().join("nope"), 16).await.unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
