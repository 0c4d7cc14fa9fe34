//! IPAM engine
//!
//! [`IpamEngine`] is the single implementation of [`Ipam`]. It owns the zone
//! table and the instance labels behind one reader/writer lock:
//!
//! - read lock: label lookups, `literals`, `find_literal`, address queries,
//!   dumps
//! - write lock: zone add/remove, allocate/reserve/release, label writes,
//!   loads
//!
//! Nothing is awaited while the guard is held, so each operation is atomic
//! with respect to every other: reference counts and bucket creation or
//! deletion never interleave.
//!
//! ## Architecture
//!
//! ```text
//!   caller ──► IpamEngine ──► RwLock<IpamState>
//!                                 │
//!                    ┌────────────┴────────────┐
//!                    ▼                         ▼
//!              labels (LabelMap)     zones (literal -> Zone)
//!                                              │
//!                                  ┌───────────┼───────────┐
//!                                  ▼           ▼           ▼
//!                               interval    buckets     reserved
//! ```

mod persist;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, trace, warn};

use crate::address::Address;
use crate::config::{BucketConfig, IpamConfig};
use crate::error::{Error, Result};
use crate::storage::{codec, LabelMap};
use crate::traits::{Ipam, SnapshotStore};
use crate::zone::{canonical_literal, overlap, Release, Zone, ZoneSpec};

/// Lock-protected engine state
#[derive(Debug, Default)]
struct IpamState {
    labels: LabelMap,
    zones: BTreeMap<String, Zone>,
}

impl IpamState {
    /// Zone whose interval holds `addr`
    fn zone_of_mut(&mut self, addr: &Address) -> Option<&mut Zone> {
        self.zones.values_mut().find(|zone| zone.contains(addr))
    }

    /// Zone by caller-supplied literal
    fn zone(&self, literal: &str) -> Option<&Zone> {
        self.zones.get(&canonical_literal(literal))
    }

    fn zone_mut(&mut self, literal: &str) -> Option<&mut Zone> {
        self.zones.get_mut(&canonical_literal(literal))
    }
}

/// In-memory IPAM engine
///
/// Cloning is cheap and every clone shares the same state.
///
/// # Example
///
/// ```rust,no_run
/// use ipam_core::{Ipam, IpamConfig, IpamEngine, LabelMap};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let ipam = IpamEngine::new(IpamConfig::new("lab"))?;
///
///     ipam.add_zone("192.168.1.0/24", false).await?;
///     let addr = ipam.allocate_addr_next(&LabelMap::new()).await?;
///     assert_eq!(addr.to_string(), "192.168.1.1");
///     assert_eq!(ipam.idle_count().await, "253");
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct IpamEngine {
    /// Namespace for bucket identifiers
    prefix: String,

    /// Bucket capacity and size ceiling
    buckets: BucketConfig,

    inner: Arc<RwLock<IpamState>>,
}

impl IpamEngine {
    /// Create an engine from a validated configuration
    pub fn new(config: IpamConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            prefix: config.prefix,
            buckets: config.buckets,
            inner: Arc::new(RwLock::new(IpamState {
                labels: config.labels,
                zones: BTreeMap::new(),
            })),
        })
    }

    /// Bucket identifier namespace
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Bucket sizing in effect
    pub fn bucket_config(&self) -> &BucketConfig {
        &self.buckets
    }

    /// Number of zones
    pub async fn zone_count(&self) -> usize {
        self.inner.read().await.zones.len()
    }

    /// Write a dump of this engine to `store`
    ///
    /// The dump is taken under the read lock; the store is written after the
    /// lock is released.
    pub async fn persist_to(&self, store: &dyn SnapshotStore, fat: bool) -> Result<()> {
        let raw = self.dump(fat).await?;
        store.save(&raw).await?;
        debug!(bytes = raw.len(), fat, "persisted IPAM snapshot");
        Ok(())
    }

    /// Load the snapshot held by `store`, if any
    ///
    /// Returns whether a snapshot was found and applied.
    pub async fn restore_from(&self, store: &dyn SnapshotStore) -> Result<bool> {
        match store.load().await? {
            Some(raw) => {
                self.load(&raw).await?;
                Ok(true)
            }
            None => {
                debug!("no IPAM snapshot to restore");
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl Ipam for IpamEngine {
    async fn set_label(&self, key: &str, value: &str) {
        let mut state = self.inner.write().await;
        state.labels.insert(key.to_string(), value.to_string());
    }

    async fn remove_label(&self, key: &str) -> Option<String> {
        let mut state = self.inner.write().await;
        state.labels.remove(key)
    }

    async fn labels(&self) -> LabelMap {
        self.inner.read().await.labels.clone()
    }

    async fn add_zone(&self, literal: &str, lazy: bool) -> Result<()> {
        let spec = ZoneSpec::parse(literal)?;

        let mut state = self.inner.write().await;
        if state.zones.contains_key(spec.literal()) {
            return Err(Error::ZoneAlreadyExists(spec.literal().to_string()));
        }
        let existing = state
            .zones
            .iter()
            .map(|(literal, zone)| (literal.as_str(), zone.interval()));
        if let Some(existing) = overlap::find_overlap(spec.interval(), existing) {
            return Err(Error::overlapping(spec.literal(), existing));
        }

        debug!(zone = %spec.literal(), capacity = %spec.interval().len(), lazy, "adding zone");
        state
            .zones
            .insert(spec.literal().to_string(), Zone::new(spec, lazy));
        Ok(())
    }

    async fn set_zone_label(&self, literal: &str, key: &str, value: &str) -> Result<()> {
        let mut state = self.inner.write().await;
        let zone = state
            .zone_mut(literal)
            .ok_or_else(|| Error::zone_not_found(literal))?;
        zone.labels_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_zone(&self, literal: &str) -> Result<()> {
        let spec = ZoneSpec::parse(literal)?;

        let mut state = self.inner.write().await;
        match state.zones.remove(spec.literal()) {
            Some(zone) => debug!(
                zone = %spec.literal(),
                used = zone.used_count(),
                reserved = zone.reserved().len(),
                "removed zone"
            ),
            None => debug!(zone = %spec.literal(), "zone to remove does not exist"),
        }
        Ok(())
    }

    async fn remove_zone_label(&self, literal: &str, key: &str) -> Result<Option<String>> {
        let mut state = self.inner.write().await;
        let zone = state
            .zone_mut(literal)
            .ok_or_else(|| Error::zone_not_found(literal))?;
        Ok(zone.labels_mut().remove(key))
    }

    async fn zone_labels(&self, literal: &str) -> Option<LabelMap> {
        let state = self.inner.read().await;
        state.zone(literal).map(|zone| zone.labels().clone())
    }

    async fn idle_count(&self) -> String {
        let state = self.inner.read().await;
        state
            .zones
            .values()
            .map(Zone::idle_count)
            .sum::<num_bigint::BigUint>()
            .to_string()
    }

    async fn used_addrs(&self) -> Vec<String> {
        let state = self.inner.read().await;
        state
            .zones
            .values()
            .flat_map(|zone| sorted(zone.used().map(|(key, _)| key)))
            .collect()
    }

    async fn reserved_addrs(&self) -> Vec<String> {
        let state = self.inner.read().await;
        state
            .zones
            .values()
            .flat_map(|zone| sorted(zone.reserved().keys()))
            .collect()
    }

    async fn allocate_addr_specific(&self, addr: &str, labels: &LabelMap) -> Result<()> {
        let addr = Address::parse(addr)?;

        let mut state = self.inner.write().await;
        let zone = state
            .zone_of_mut(&addr)
            .ok_or_else(|| Error::not_handled(addr.to_string()))?;
        let ref_count = zone.allocate(
            &self.prefix,
            self.buckets.addr_num_per_bucket,
            &addr,
            labels,
        )?;
        trace!(%addr, zone = %zone.literal(), ref_count, "allocated address");
        Ok(())
    }

    async fn allocate_addr_next(&self, labels: &LabelMap) -> Result<IpAddr> {
        let mut state = self.inner.write().await;
        for zone in state.zones.values_mut() {
            let Some(addr) = zone.first_free() else {
                continue;
            };
            zone.allocate(
                &self.prefix,
                self.buckets.addr_num_per_bucket,
                &addr,
                labels,
            )?;
            trace!(%addr, zone = %zone.literal(), "allocated next free address");
            return Ok(addr.to_ip_addr());
        }
        Err(Error::PoolExhausted)
    }

    async fn reserve_addr(&self, addr: &str, labels: &LabelMap) -> Result<()> {
        let addr = Address::parse(addr)?;

        let mut state = self.inner.write().await;
        let zone = state
            .zone_of_mut(&addr)
            .ok_or_else(|| Error::not_handled(addr.to_string()))?;
        zone.reserve(&addr, labels)?;
        trace!(%addr, zone = %zone.literal(), "reserved address");
        Ok(())
    }

    async fn release_addr(&self, addr: &str) -> Result<()> {
        let addr = Address::parse(addr)?;

        let mut state = self.inner.write().await;
        let zone = state
            .zone_of_mut(&addr)
            .ok_or_else(|| Error::not_handled(addr.to_string()))?;
        match zone.release(&addr) {
            Release::Decremented(ref_count) => {
                trace!(%addr, ref_count, "released one reference")
            }
            Release::Freed => trace!(%addr, zone = %zone.literal(), "freed address"),
            Release::Unreserved => trace!(%addr, zone = %zone.literal(), "dropped reservation"),
            Release::Untracked => trace!(%addr, "released untracked address"),
        }
        Ok(())
    }

    async fn set_addr_label(&self, addr: &str, key: &str, value: &str) -> Result<()> {
        let addr = Address::parse(addr)?.to_string();

        let mut state = self.inner.write().await;
        let desc = state
            .zones
            .values_mut()
            .find_map(|zone| zone.descriptor_mut(&addr))
            .ok_or_else(|| Error::not_allocated(addr.as_str()))?;
        desc.labels.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_addr_label(&self, addr: &str, key: &str) -> Result<Option<String>> {
        let addr = Address::parse(addr)?.to_string();

        let mut state = self.inner.write().await;
        let desc = state
            .zones
            .values_mut()
            .find_map(|zone| zone.descriptor_mut(&addr))
            .ok_or_else(|| Error::not_allocated(addr.as_str()))?;
        Ok(desc.labels.remove(key))
    }

    async fn addr_labels(&self, addr: &str) -> Result<LabelMap> {
        let addr = Address::parse(addr)?.to_string();

        let state = self.inner.read().await;
        state
            .zones
            .values()
            .find_map(|zone| zone.descriptor(&addr))
            .map(|desc| desc.labels.clone())
            .ok_or_else(|| Error::not_allocated(addr))
    }

    async fn find_literal(&self, addr: &str) -> Option<String> {
        let addr = Address::parse(addr).ok()?;

        let state = self.inner.read().await;
        state
            .zones
            .values()
            .find(|zone| zone.contains(&addr))
            .map(|zone| zone.literal().to_string())
    }

    async fn literals(&self) -> Vec<String> {
        self.inner.read().await.zones.keys().cloned().collect()
    }

    async fn dump(&self, fat: bool) -> Result<Vec<u8>> {
        let state = self.inner.read().await;
        let block = state.to_block(fat);
        let raw = codec::encode_block(&block)?;
        debug!(zones = block.zones.len(), bytes = raw.len(), fat, "dumped IPAM block");
        Ok(raw)
    }

    async fn dump_zone_addrs(
        &self,
        literal: &str,
        only_keys: bool,
    ) -> Result<BTreeMap<String, Vec<u8>>> {
        let state = self.inner.read().await;
        let zone = state
            .zone(literal)
            .ok_or_else(|| Error::zone_not_found(literal))?;
        persist::bucket_payloads(zone, only_keys, self.buckets.bucket_size)
    }

    async fn load(&self, raw: &[u8]) -> Result<()> {
        let block = codec::decode_block(raw)?;

        let mut state = self.inner.write().await;
        let loaded = state.apply_block(block)?;
        info!(zones = loaded, total = state.zones.len(), "loaded IPAM block");
        Ok(())
    }

    async fn load_zone_addrs(
        &self,
        literal: &str,
        addrs: &BTreeMap<String, Vec<u8>>,
        force: bool,
    ) -> Result<()> {
        let mut state = self.inner.write().await;
        let zone = state
            .zone_mut(literal)
            .ok_or_else(|| Error::zone_not_found(literal))?;
        let merged = persist::merge_buckets(zone, &self.prefix, addrs, force)?;
        debug!(
            zone = %zone.literal(),
            merged,
            offered = addrs.len(),
            force,
            "loaded zone buckets"
        );
        Ok(())
    }
}

/// Address keys in numeric order
///
/// Keys that are not addresses (only possible through loaded data) follow
/// the sorted ones in their stored order.
fn sorted<'a>(keys: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut addrs = Vec::new();
    let mut unparsed = Vec::new();
    for key in keys {
        match Address::parse(key) {
            Ok(addr) => addrs.push((addr, key)),
            Err(_) => {
                warn!(%key, "tracked key is not an IP address");
                unparsed.push(key.clone());
            }
        }
    }
    addrs.sort_by(|a, b| a.0.cmp(&b.0));
    addrs
        .into_iter()
        .map(|(_, key)| key.clone())
        .chain(unparsed)
        .collect()
}
