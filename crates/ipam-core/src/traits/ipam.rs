// # IPAM Trait
//
// The capability set exposed to callers: instance labels, zone management,
// address allocation, address labels, lookups and persistence.
//
// ## Zone literals
//
// 1. a single IPv4/IPv6 address (`192.168.0.1`, `FE80::12`)
// 2. a closed dashed range (`192.168.0.1-192.168.3.2`, `FE80::12-FE80::1:12`)
// 3. a CIDR network (`192.168.0.0/24`, `FE80::/64`)
//
// A CIDR zone never hands out its network or broadcast address; use a dashed
// range to cover those.
//
// ## Usage
//
// ```rust,ignore
// use ipam_core::{Ipam, IpamConfig, IpamEngine, LabelMap};
//
// let ipam = IpamEngine::new(IpamConfig::new("lab"))?;
// ipam.add_zone("192.168.1.0/24", false).await?;
// ipam.allocate_addr_specific("192.168.1.10", &LabelMap::new()).await?;
// let next = ipam.allocate_addr_next(&LabelMap::new()).await?;
// ipam.release_addr(&next.to_string()).await?;
// ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;

use crate::error::Result;
use crate::storage::LabelMap;

/// Address management for IPv4 and IPv6 with bucketed persistence
///
/// Every returned label map is a copy; callers never alias engine state.
///
/// # Thread Safety
///
/// Read-only methods may run concurrently; mutating methods are exclusive.
/// No method performs I/O.
#[async_trait]
pub trait Ipam: Send + Sync {
    /// Set an instance label
    async fn set_label(&self, key: &str, value: &str);

    /// Remove an instance label, returning its previous value
    async fn remove_label(&self, key: &str) -> Option<String>;

    /// All instance labels
    async fn labels(&self) -> LabelMap;

    /// Add a zone
    ///
    /// `lazy` is accepted for deferred materialization and currently has no
    /// effect. Fails on a malformed literal, a duplicate literal, or an
    /// interval overlapping an existing zone.
    async fn add_zone(&self, literal: &str, lazy: bool) -> Result<()>;

    /// Set a zone label
    async fn set_zone_label(&self, literal: &str, key: &str, value: &str) -> Result<()>;

    /// Remove a zone with its buckets and reservations
    ///
    /// Removing an unknown (well-formed) literal is a no-op.
    async fn remove_zone(&self, literal: &str) -> Result<()>;

    /// Remove a zone label, returning its previous value
    async fn remove_zone_label(&self, literal: &str, key: &str) -> Result<Option<String>>;

    /// Labels of a zone, `None` if the zone does not exist
    async fn zone_labels(&self, literal: &str) -> Option<LabelMap>;

    /// Addresses neither used nor reserved, across all zones, in decimal
    async fn idle_count(&self) -> String;

    /// Every used address
    async fn used_addrs(&self) -> Vec<String>;

    /// Every reserved address
    async fn reserved_addrs(&self) -> Vec<String>;

    /// Allocate a specific address
    ///
    /// Allocating a used address bumps its reference count and merges
    /// `labels` over its current labels.
    async fn allocate_addr_specific(&self, addr: &str, labels: &LabelMap) -> Result<()>;

    /// Allocate the lowest free address of the first zone that has one
    ///
    /// This is a linear scan of each zone's interval: expect it to slow down
    /// on a large, nearly full pool.
    async fn allocate_addr_next(&self, labels: &LabelMap) -> Result<IpAddr>;

    /// Reserve an address that is neither used nor reserved
    async fn reserve_addr(&self, addr: &str, labels: &LabelMap) -> Result<()>;

    /// Release an address
    ///
    /// Reservations are dropped at once; used addresses lose one reference
    /// and are freed at zero. Releasing an untracked address inside a zone
    /// is a no-op.
    async fn release_addr(&self, addr: &str) -> Result<()>;

    /// Set a label on a used address
    async fn set_addr_label(&self, addr: &str, key: &str, value: &str) -> Result<()>;

    /// Remove a label from a used address, returning its previous value
    async fn remove_addr_label(&self, addr: &str, key: &str) -> Result<Option<String>>;

    /// Labels of a used address
    async fn addr_labels(&self, addr: &str) -> Result<LabelMap>;

    /// Literal of the zone holding `addr`
    async fn find_literal(&self, addr: &str) -> Option<String>;

    /// Literals of every zone
    async fn literals(&self) -> Vec<String>;

    /// Encode every zone and the instance labels into a block
    ///
    /// A thin dump (`fat == false`) keeps bucket keys but not their
    /// addresses; fetch those with [`Ipam::dump_zone_addrs`].
    async fn dump(&self, fat: bool) -> Result<Vec<u8>>;

    /// Encode each bucket of a zone on its own, keyed by bucket identifier
    ///
    /// With `only_keys` every value is empty.
    async fn dump_zone_addrs(
        &self,
        literal: &str,
        only_keys: bool,
    ) -> Result<BTreeMap<String, Vec<u8>>>;

    /// Rebuild zones from a block, replacing zones of the same literal
    ///
    /// Any malformed zone aborts the whole load with nothing applied.
    async fn load(&self, raw: &[u8]) -> Result<()>;

    /// Merge buckets produced by [`Ipam::dump_zone_addrs`] into a zone
    ///
    /// Keys outside `<prefix>/<literal>/` are dropped, as are keys the zone
    /// does not already know unless `force` is set.
    ///
    /// An instance loaded from a thin dump can hand out addresses that still
    /// sit in a placeholder bucket. When that bucket arrives, such addresses
    /// are dropped from it and keep their local allocation; the same holds
    /// for reserved addresses and addresses outside the zone.
    async fn load_zone_addrs(
        &self,
        literal: &str,
        addrs: &BTreeMap<String, Vec<u8>>,
        force: bool,
    ) -> Result<()>;
}
