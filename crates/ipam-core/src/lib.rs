// # ipam-core
//
// IPv4/IPv6 address management with reference-counted allocation and
// bucketed persistence.
//
// ## Architecture Overview
//
// - **Address**: text <-> arbitrary-precision integer codec
// - **ZoneSpec**: zone literal (address, CIDR, range) -> numeric interval
// - **Zone**: buckets of used addresses plus reservations for one interval
// - **Ipam**: the capability trait callers program against
// - **IpamEngine**: the lock-protected implementation of `Ipam`
// - **Block / Bucket**: the storage model moved by dump/load
// - **SnapshotStore**: durable homes for dumps (memory, file)
//
// ## Design Principles
//
// 1. **Numeric Addresses**: Every bound, count and comparison is a big
//    integer; IPv6 spans never touch fixed-width arithmetic
// 2. **Bounded Records**: Used addresses are sharded into capacity-bounded
//    buckets so each serialized record stays small
// 3. **Incremental Persistence**: Thin dumps carry bucket keys only; buckets
//    move individually
// 4. **No Aliasing**: Label maps are copied at every boundary

pub mod address;
pub mod config;
pub mod engine;
pub mod error;
pub mod snapshot;
pub mod storage;
pub mod traits;
pub mod zone;

// Re-export core types for convenience
pub use address::{Address, IpVersion};
pub use config::{BucketConfig, IpamConfig};
pub use engine::IpamEngine;
pub use error::{Error, Result};
pub use snapshot::{FileSnapshotStore, MemorySnapshotStore};
pub use storage::{Block, Bucket, Descriptor, LabelMap, ZoneSnapshot};
pub use traits::{Ipam, SnapshotStore};
pub use zone::{AddressInterval, Zone, ZoneSpec};
