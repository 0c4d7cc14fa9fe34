// # Memory Snapshot Store
//
// In-memory implementation of SnapshotStore.
//
// ## Purpose
//
// Hands a dump from one engine to another inside the same process: tests,
// hot standby copies, or staging a load before committing it elsewhere.
//
// ## Crash Behavior
//
// - The snapshot is lost on restart/crash
// - No recovery possible (state is in-memory only)

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::traits::SnapshotStore;
use crate::Error;

/// In-memory snapshot store
///
/// Clones share the same slot.
///
/// # Example
///
/// ```rust,no_run
/// use ipam_core::snapshot::MemorySnapshotStore;
/// use ipam_core::traits::SnapshotStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemorySnapshotStore::new();
///     store.save(b"raw block").await?;
///     assert_eq!(store.load().await?, Some(b"raw block".to_vec()));
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    inner: Arc<RwLock<Option<Vec<u8>>>>,
}

impl MemorySnapshotStore {
    /// Create an empty memory snapshot store
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot is held
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_none()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn save(&self, raw: &[u8]) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        *guard = Some(raw.to_vec());
        Ok(())
    }

    async fn load(&self) -> Result<Option<Vec<u8>>, Error> {
        Ok(self.inner.read().await.clone())
    }

    async fn clear(&self) -> Result<(), Error> {
        let mut guard = self.inner.write().await;
        guard.take();
        Ok(())
    }
}
