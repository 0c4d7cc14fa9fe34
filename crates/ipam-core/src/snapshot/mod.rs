// # Snapshot Store Implementations
//
// Implementations of the SnapshotStore trait for different persistence
// strategies.

pub mod file;
pub mod memory;

pub use file::FileSnapshotStore;
pub use memory::MemorySnapshotStore;
