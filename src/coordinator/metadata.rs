//! Metadata store: file name → ordered block descriptors
//!
//! The whole map lives in memory behind one lock and is rewritten in full
//! to a JSON snapshot on every mutation. There is no write-ahead log: a
//! crash between a mutation and its snapshot rewrite loses that mutation.
//!
//! Snapshot layout:
//!
//! ```json
//! {
//!   "a.txt": [
//!     { "block_id": "…", "replica_addresses": ["http://h1:5001", "http://h2:5002"] }
//!   ]
//! }
//! ```

use crate::common::{Error, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// One block of a file and where its replicas live
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub block_id: String,
    /// Worker base URLs in preferred-read order
    #[serde(alias = "datanodes")]
    pub replica_addresses: Vec<String>,
}

/// What `remove_file` found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

type FileMap = HashMap<String, Vec<BlockDescriptor>>;

/// Durable file → blocks mapping
pub struct MetadataStore {
    path: PathBuf,
    files: Mutex<FileMap>,
}

impl MetadataStore {
    /// Open the snapshot at `path`.
    ///
    /// A missing snapshot is created empty. A corrupt one is discarded and
    /// the store starts empty; nothing is recovered from it.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let files = if path.exists() {
            let raw = fs::read(&path)?;
            match serde_json::from_slice::<FileMap>(&raw) {
                Ok(files) => {
                    tracing::info!(
                        "Metadata loaded from {} ({} files)",
                        path.display(),
                        files.len()
                    );
                    files
                }
                Err(e) => {
                    tracing::warn!(
                        "Metadata snapshot {} is corrupted ({}), starting with empty metadata",
                        path.display(),
                        e
                    );
                    FileMap::new()
                }
            }
        } else {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let files = FileMap::new();
            write_snapshot(&path, &files)?;
            tracing::info!("Created empty metadata snapshot at {}", path.display());
            files
        };

        Ok(Self {
            path,
            files: Mutex::new(files),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Upsert a record, fully replacing any previous block list.
    ///
    /// In memory only; call [`persist`](Self::persist) before acknowledging.
    /// Returns `true` if a record was replaced.
    pub fn put_file(&self, file_name: &str, blocks: Vec<BlockDescriptor>) -> bool {
        self.files
            .lock()
            .insert(file_name.to_string(), blocks)
            .is_some()
    }

    /// Block sequence for `file_name`, empty if unknown
    pub fn get_file(&self, file_name: &str) -> Vec<BlockDescriptor> {
        self.files
            .lock()
            .get(file_name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.files.lock().contains_key(file_name)
    }

    /// All known file names, sorted
    pub fn list_files(&self) -> Vec<String> {
        let mut names: Vec<String> = self.files.lock().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop a record in memory; absence is reported, not an error
    pub fn remove_file(&self, file_name: &str) -> RemoveOutcome {
        match self.files.lock().remove(file_name) {
            Some(_) => {
                tracing::info!("File '{}' metadata removed", file_name);
                RemoveOutcome::Removed
            }
            None => {
                tracing::warn!("File '{}' not found in metadata", file_name);
                RemoveOutcome::NotFound
            }
        }
    }

    /// Rewrite the full snapshot
    pub fn persist(&self) -> Result<()> {
        let files = self.files.lock();
        write_snapshot(&self.path, &files)
    }

    /// `put_file` + `persist` inside one critical section.
    ///
    /// On a persistence failure the in-memory record stays in place and
    /// leads the snapshot until the next successful rewrite.
    pub fn commit_file(&self, file_name: &str, blocks: Vec<BlockDescriptor>) -> Result<bool> {
        let mut files = self.files.lock();
        let replaced = files.insert(file_name.to_string(), blocks).is_some();
        write_snapshot(&self.path, &files)?;
        Ok(replaced)
    }

    /// `remove_file` + `persist` inside one critical section.
    ///
    /// Nothing is written when the file was absent.
    pub fn commit_removal(&self, file_name: &str) -> Result<RemoveOutcome> {
        let mut files = self.files.lock();
        if files.remove(file_name).is_none() {
            tracing::warn!("File '{}' not found in metadata", file_name);
            return Ok(RemoveOutcome::NotFound);
        }
        write_snapshot(&self.path, &files)?;
        tracing::info!("File '{}' metadata removed", file_name);
        Ok(RemoveOutcome::Removed)
    }
}

/// Write `files` to a sibling temp file, fsync, then rename over `path`
fn write_snapshot(path: &Path, files: &FileMap) -> Result<()> {
    let tmp_path = path.with_extension("json.tmp");

    let write = || -> std::io::Result<()> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, files)?;
        writer.write_all(b"\n")?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        Error::Persistence(format!("{}: {}", path.display(), e))
    })?;

    tracing::debug!("Metadata saved ({} files)", files.len());
    Ok(())
}
