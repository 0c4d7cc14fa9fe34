//! Error types for the IPAM engine
//!
//! Every operation returns a single [`Error`] value; there is no partial
//! success and no retry inside the engine.

use thiserror::Error;

/// Result type alias for IPAM operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the IPAM engine
#[derive(Error, Debug)]
pub enum Error {
    /// Text is not an IPv4/IPv6 address or a recognized zone literal
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// CIDR literal whose address is not its own network address
    #[error("Invalid CIDR network: {0}")]
    InvalidNetwork(String),

    /// Dashed range with a bad bound, mixed families, or `low >= high`
    #[error("Invalid IP range: {0}")]
    InvalidRange(String),

    /// Zone interval intersects an existing zone
    #[error("Zone {literal} overlaps existing zone {existing}")]
    OverlappingRange {
        /// Literal of the rejected zone
        literal: String,
        /// Literal of the zone it collides with
        existing: String,
    },

    /// Zone literal already present
    #[error("Zone {0} already exists")]
    ZoneAlreadyExists(String),

    /// Zone literal unknown
    #[error("Zone {0} not found")]
    ZoneNotFound(String),

    /// Address is allocated
    #[error("Address {0} is in use")]
    AddressInUse(String),

    /// Address is reserved
    #[error("Address {0} is already reserved")]
    AddressReserved(String),

    /// Address has no used descriptor
    #[error("Address {0} is not allocated")]
    AddressNotAllocated(String),

    /// Address falls outside every zone
    #[error("Address {0} is not handled by any zone")]
    AddressNotHandled(String),

    /// No zone has a free address left
    #[error("No free address left to allocate")]
    PoolExhausted,

    /// Codec failure while encoding or decoding blocks and buckets
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Snapshot store errors
    #[error("Snapshot store error: {0}")]
    SnapshotStore(String),

    /// JSON configuration parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create an invalid format error
    pub fn invalid_format(msg: impl Into<String>) -> Self {
        Self::InvalidFormat(msg.into())
    }

    /// Create an invalid network error
    pub fn invalid_network(msg: impl Into<String>) -> Self {
        Self::InvalidNetwork(msg.into())
    }

    /// Create an invalid range error
    pub fn invalid_range(msg: impl Into<String>) -> Self {
        Self::InvalidRange(msg.into())
    }

    /// Create an overlapping range error
    pub fn overlapping(literal: impl Into<String>, existing: impl Into<String>) -> Self {
        Self::OverlappingRange {
            literal: literal.into(),
            existing: existing.into(),
        }
    }

    /// Create a "zone not found" error
    pub fn zone_not_found(literal: impl Into<String>) -> Self {
        Self::ZoneNotFound(literal.into())
    }

    /// Create an "address not handled" error
    pub fn not_handled(addr: impl Into<String>) -> Self {
        Self::AddressNotHandled(addr.into())
    }

    /// Create an "address not allocated" error
    pub fn not_allocated(addr: impl Into<String>) -> Self {
        Self::AddressNotAllocated(addr.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a snapshot store error
    pub fn snapshot_store(msg: impl Into<String>) -> Self {
        Self::SnapshotStore(msg.into())
    }
}
