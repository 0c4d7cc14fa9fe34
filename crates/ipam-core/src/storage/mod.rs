// # Storage Model
//
// The Block -> Zone -> Bucket hierarchy that dump/load moves across process
// boundaries.
//
// ## Layout
//
// ```text
// Block
// ├── labels
// └── zones[]
//     ├── literal            (interval is re-derived on load, never stored)
//     ├── labels
//     ├── reserved           { addr -> Descriptor }
//     └── buckets            { "<prefix>/<literal>/<n>" -> Option<Bucket> }
//                                                         └── used { addr -> Descriptor }
// ```
//
// A `None` bucket is a placeholder: the key exists but the addresses live
// elsewhere (a thin dump, or a per-bucket dump not yet merged back).

pub mod codec;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key/value labels; ordered so encoded output is deterministic
pub type LabelMap = BTreeMap<String, String>;

/// Per-address metadata for used and reserved addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Number of outstanding allocations; unused for reservations
    pub ref_count: u64,
    /// Address labels
    pub labels: LabelMap,
}

impl Descriptor {
    /// Descriptor for a first allocation
    pub fn allocated(labels: &LabelMap) -> Self {
        Self {
            ref_count: 1,
            labels: labels.clone(),
        }
    }

    /// Descriptor for a reservation
    pub fn reserved(labels: &LabelMap) -> Self {
        Self {
            ref_count: 0,
            labels: labels.clone(),
        }
    }
}

/// A capacity-bounded shard of a zone's used addresses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    /// Used addresses keyed by their canonical text form
    pub used: BTreeMap<String, Descriptor>,
}

impl Bucket {
    /// Number of used addresses in this bucket
    pub fn len(&self) -> usize {
        self.used.len()
    }

    /// Whether the bucket holds no address
    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}

/// Persisted form of one zone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    /// Canonical zone literal
    pub literal: String,
    /// Zone labels
    #[serde(default)]
    pub labels: LabelMap,
    /// Bucket key -> bucket data, or `None` for a placeholder
    #[serde(default)]
    pub buckets: BTreeMap<String, Option<Bucket>>,
    /// Reserved addresses
    #[serde(default)]
    pub reserved: BTreeMap<String, Descriptor>,
}

/// Persistence envelope for a whole instance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Instance labels
    pub labels: LabelMap,
    /// Every zone of the instance
    pub zones: Vec<ZoneSnapshot>,
}
