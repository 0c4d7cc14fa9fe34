//! Core traits for the IPAM engine
//!
//! - [`Ipam`]: the externally visible address management capability set
//! - [`SnapshotStore`]: durable storage for engine dumps

pub mod ipam;
pub mod snapshot_store;

pub use ipam::Ipam;
pub use snapshot_store::SnapshotStore;
