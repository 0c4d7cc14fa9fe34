// # Zones
//
// A zone is a named, non-overlapping contiguous range of addresses of one
// IP version. Its interval is fixed at creation; labels, buckets and
// reservations change over its life.
//
// - `builder`: literal -> interval
// - `overlap`: interval intersection checks
// - `alloc`: allocation, reservation and release inside one zone

pub mod alloc;
pub mod builder;
pub mod overlap;

pub use alloc::Release;
pub use builder::{AddressInterval, ZoneKind, ZoneSpec, canonical_literal};

use num_bigint::BigUint;
use std::collections::BTreeMap;

use crate::address::Address;
use crate::storage::{Bucket, Descriptor, LabelMap, ZoneSnapshot};

/// A live zone owned by the engine
#[derive(Debug, Clone)]
pub struct Zone {
    spec: ZoneSpec,
    /// Accepted for deferred materialization; no effect yet
    lazy: bool,
    labels: LabelMap,
    buckets: BTreeMap<String, Option<Bucket>>,
    reserved: BTreeMap<String, Descriptor>,
}

impl Zone {
    /// Create an empty zone
    pub fn new(spec: ZoneSpec, lazy: bool) -> Self {
        Self {
            spec,
            lazy,
            labels: LabelMap::new(),
            buckets: BTreeMap::new(),
            reserved: BTreeMap::new(),
        }
    }

    /// Rebuild a zone from its persisted form
    ///
    /// The interval comes from `spec`, which the caller derived from the
    /// snapshot's literal; nothing positional is trusted from the snapshot.
    pub fn from_snapshot(spec: ZoneSpec, snapshot: ZoneSnapshot) -> Self {
        Self {
            spec,
            lazy: false,
            labels: snapshot.labels,
            buckets: snapshot.buckets,
            reserved: snapshot.reserved,
        }
    }

    /// Persisted form of this zone
    ///
    /// A thin snapshot keeps every bucket key but drops its data.
    pub fn snapshot(&self, fat: bool) -> ZoneSnapshot {
        let buckets = if fat {
            self.buckets.clone()
        } else {
            self.buckets.keys().map(|key| (key.clone(), None)).collect()
        };
        ZoneSnapshot {
            literal: self.literal().to_string(),
            labels: self.labels.clone(),
            buckets,
            reserved: self.reserved.clone(),
        }
    }

    /// Canonical literal
    pub fn literal(&self) -> &str {
        self.spec.literal()
    }

    /// Allocatable interval
    pub fn interval(&self) -> &AddressInterval {
        self.spec.interval()
    }

    /// Whether the zone was added lazily
    pub fn is_lazy(&self) -> bool {
        self.lazy
    }

    /// Whether the zone's interval holds `addr`
    pub fn contains(&self, addr: &Address) -> bool {
        self.interval().contains(addr)
    }

    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    pub fn labels_mut(&mut self) -> &mut LabelMap {
        &mut self.labels
    }

    /// Buckets by key; `None` marks a placeholder
    pub fn buckets(&self) -> &BTreeMap<String, Option<Bucket>> {
        &self.buckets
    }

    pub(crate) fn buckets_mut(&mut self) -> &mut BTreeMap<String, Option<Bucket>> {
        &mut self.buckets
    }

    /// Reserved addresses
    pub fn reserved(&self) -> &BTreeMap<String, Descriptor> {
        &self.reserved
    }

    /// Used addresses across all loaded buckets
    pub fn used(&self) -> impl Iterator<Item = (&String, &Descriptor)> {
        self.buckets.values().flatten().flat_map(|bucket| bucket.used.iter())
    }

    /// Number of used addresses in loaded buckets
    pub fn used_count(&self) -> usize {
        self.buckets.values().flatten().map(Bucket::len).sum()
    }

    /// Addresses neither used nor reserved
    pub fn idle_count(&self) -> BigUint {
        let taken = BigUint::from(self.used_count()) + BigUint::from(self.reserved.len());
        let capacity = self.interval().len();
        if taken >= capacity {
            return BigUint::default();
        }
        capacity - taken
    }
}
