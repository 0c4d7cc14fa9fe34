// # File Snapshot Store
//
// File-based implementation of SnapshotStore with crash recovery.
//
// ## Purpose
//
// Keeps the last engine dump on disk so a restarted process can reload its
// zones, reservations and (for fat dumps) allocations.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates the envelope on open
// - Automatic backup: Keeps <path>.backup of the previous snapshot
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// A bincode envelope around the raw block:
//
// ```text
// SnapshotFile {
//     version:  "1.0",
//     saved_at: 2025-01-09T12:00:00Z,
//     block:    [u8]          // Ipam::dump output
// }
// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::traits::SnapshotStore;
use crate::Error;

/// Snapshot file format version
const SNAPSHOT_FILE_VERSION: &str = "1.0";

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotFile {
    version: String,
    saved_at: DateTime<Utc>,
    block: Vec<u8>,
}

/// File-based snapshot store with crash recovery
///
/// The current snapshot is cached in memory; every `save` is written through
/// to disk before it returns.
///
/// # Example
///
/// ```rust,no_run
/// use ipam_core::snapshot::FileSnapshotStore;
/// use ipam_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSnapshotStore::new("/var/lib/ipam/snapshot.bin").await?;
///     store.save(b"raw block").await?;
///     assert_eq!(store.load().await?, Some(b"raw block".to_vec()));
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileSnapshotStore {
    path: PathBuf,
    cached: Arc<RwLock<Option<Vec<u8>>>>,
}

impl FileSnapshotStore {
    /// Open or create a file snapshot store
    ///
    /// This will:
    /// 1. Create parent directories if needed
    /// 2. Try to load the existing snapshot file
    /// 3. If it is corrupted, try the backup
    /// 4. If both fail, start empty
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    Error::config(format!(
                        "Failed to create snapshot directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let cached = Self::load_with_recovery(&path).await?;

        Ok(Self {
            path,
            cached: Arc::new(RwLock::new(cached)),
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot, falling back to the backup when the main file is
    /// corrupted
    async fn load_with_recovery(path: &Path) -> Result<Option<Vec<u8>>, Error> {
        let err = match Self::load_file(path).await {
            Ok(block) => {
                tracing::debug!(
                    "Loaded snapshot from file: {} bytes",
                    block.as_ref().map_or(0, Vec::len)
                );
                return Ok(block);
            }
            Err(err @ Error::Serialization(_)) => err,
            Err(err) => return Err(err),
        };

        tracing::warn!(
            "Snapshot file appears corrupted: {}. Attempting recovery from backup.",
            err
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty snapshot.");
            return Ok(None);
        }

        match Self::load_file(&backup_path).await {
            Ok(block) => {
                tracing::info!("Recovered snapshot from backup");
                if let Err(restore_err) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!(
                        "Failed to restore snapshot file from backup: {}",
                        restore_err
                    );
                }
                Ok(block)
            }
            Err(backup_err) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty snapshot.",
                    backup_err
                );
                Ok(None)
            }
        }
    }

    /// Read and decode one snapshot file
    async fn load_file(path: &Path) -> Result<Option<Vec<u8>>, Error> {
        if !path.exists() {
            tracing::debug!("Snapshot file does not exist: {}", path.display());
            return Ok(None);
        }

        let raw = fs::read(path).await.map_err(|e| {
            Error::snapshot_store(format!(
                "Failed to read snapshot file {}: {}",
                path.display(),
                e
            ))
        })?;

        let file: SnapshotFile = bincode::deserialize(&raw)?;
        if file.version != SNAPSHOT_FILE_VERSION {
            tracing::warn!(
                "Snapshot file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                SNAPSHOT_FILE_VERSION,
                file.version
            );
        }
        tracing::debug!("Snapshot saved at {}", file.saved_at);

        Ok(Some(file.block))
    }

    /// Write the snapshot file atomically
    async fn write_file(&self, block: &[u8]) -> Result<(), Error> {
        let file = SnapshotFile {
            version: SNAPSHOT_FILE_VERSION.to_string(),
            saved_at: Utc::now(),
            block: block.to_vec(),
        };
        let raw = bincode::serialize(&file)?;

        let temp_path = self.temp_path();
        {
            let mut out = fs::File::create(&temp_path).await.map_err(|e| {
                Error::snapshot_store(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.write_all(&raw).await.map_err(|e| {
                Error::snapshot_store(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
            out.sync_all().await.map_err(|e| {
                Error::snapshot_store(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            Error::snapshot_store(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        tracing::trace!("Snapshot written to file: {}", self.path.display());
        Ok(())
    }

    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), Error> {
        fs::copy(backup_path, path).await.map_err(|e| {
            Error::snapshot_store(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored snapshot file from backup");
        Ok(())
    }

    /// `<path>.tmp`
    fn temp_path(&self) -> PathBuf {
        with_suffix(&self.path, ".tmp")
    }

    /// `<path>.backup`
    fn backup_path(path: &Path) -> PathBuf {
        with_suffix(path, ".backup")
    }
}

/// Append `suffix` to the full file name, keeping any existing extension
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn save(&self, raw: &[u8]) -> Result<(), Error> {
        let mut cached = self.cached.write().await;
        self.write_file(raw).await?;
        *cached = Some(raw.to_vec());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.cached.read().await.clone())
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut cached = self.cached.write().await;
        for path in [self.path.clone(), Self::backup_path(&self.path)] {
            if path.exists() {
                fs::remove_file(&path).await?;
            }
        }
        cached.take();
        Ok(())
    }
}
