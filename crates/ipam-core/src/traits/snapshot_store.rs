// # Snapshot Store Trait
//
// Defines the interface for durable storage of engine dumps.
//
// ## Purpose
//
// The engine itself is purely in-memory. A snapshot store keeps the bytes
// produced by `Ipam::dump` so a later process can `Ipam::load` them.
//
// ## Implementations
//
// - Memory: `MemorySnapshotStore` (tests, ephemeral deployments)
// - File: `FileSnapshotStore` (atomic writes with backup recovery)
//
// ## Usage
//
// ```rust,ignore
// use ipam_core::{Ipam, IpamEngine, SnapshotStore};
//
// let raw = engine.dump(true).await?;
// store.save(&raw).await?;
//
// if let Some(raw) = store.load().await? {
//     other_engine.load(&raw).await?;
// }
// ```

use async_trait::async_trait;

use crate::Error;

/// Trait for snapshot store implementations
///
/// Implementations must be safe to call concurrently from multiple tasks.
/// A store holds at most one snapshot; `save` replaces it.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Replace the stored snapshot
    async fn save(&self, raw: &[u8]) -> Result<(), Error>;

    /// Fetch the stored snapshot, if any
    async fn load(&self) -> Result<Option<Vec<u8>>, Error>;

    /// Drop the stored snapshot
    async fn clear(&self) -> Result<(), Error>;
}
