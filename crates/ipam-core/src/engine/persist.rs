// Dump/load between the live zone table and the Block -> Zone -> Bucket
// storage model.
//
// Intervals are never read from storage: every zone is rebuilt from its
// literal. A load validates every incoming zone before touching the table.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use super::IpamState;
use crate::address::Address;
use crate::error::{Error, Result};
use crate::storage::{codec, Block};
use crate::zone::{overlap, Zone, ZoneSpec};

impl IpamState {
    /// Block holding the instance labels and every zone
    pub(super) fn to_block(&self, fat: bool) -> Block {
        Block {
            labels: self.labels.clone(),
            zones: self.zones.values().map(|zone| zone.snapshot(fat)).collect(),
        }
    }

    /// Replace zones with those of `block`, returning how many were loaded
    ///
    /// Fails without applying anything if a literal does not parse or a
    /// loaded zone overlaps a zone it does not replace.
    pub(super) fn apply_block(&mut self, block: Block) -> Result<usize> {
        let mut incoming = Vec::with_capacity(block.zones.len());
        for snapshot in block.zones {
            let spec = ZoneSpec::parse(&snapshot.literal)?;
            incoming.push(Zone::from_snapshot(spec, snapshot));
        }

        let replaced: BTreeSet<&str> = incoming.iter().map(Zone::literal).collect();
        for (i, zone) in incoming.iter().enumerate() {
            let kept = self
                .zones
                .iter()
                .filter(|(literal, _)| !replaced.contains(literal.as_str()))
                .map(|(literal, zone)| (literal.as_str(), zone.interval()));
            let earlier = incoming[..i]
                .iter()
                .filter(|other| other.literal() != zone.literal())
                .map(|other| (other.literal(), other.interval()));
            if let Some(existing) = overlap::find_overlap(zone.interval(), kept.chain(earlier)) {
                return Err(Error::overlapping(zone.literal(), existing));
            }
        }

        let loaded = incoming.len();
        self.labels.extend(block.labels);
        for zone in incoming {
            if self.zones.contains_key(zone.literal()) {
                debug!(zone = %zone.literal(), "replacing zone from block");
            }
            self.zones.insert(zone.literal().to_string(), zone);
        }
        Ok(loaded)
    }
}

/// Encode each bucket of `zone` separately
///
/// Placeholders, and every bucket when `only_keys` is set, map to an empty
/// payload.
pub(super) fn bucket_payloads(
    zone: &Zone,
    only_keys: bool,
    bucket_size: usize,
) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut payloads = BTreeMap::new();
    for (key, bucket) in zone.buckets() {
        let raw = match bucket {
            Some(bucket) if !only_keys => codec::encode_bucket(bucket)?,
            _ => Vec::new(),
        };
        if raw.len() > bucket_size {
            warn!(
                bucket = %key,
                bytes = raw.len(),
                limit = bucket_size,
                "bucket exceeds size ceiling"
            );
        }
        payloads.insert(key.clone(), raw);
    }
    Ok(payloads)
}

/// Merge encoded buckets into `zone`, returning how many were applied
///
/// Keys outside `<prefix>/<literal>/` are dropped. Unless `force` is set, so
/// are keys the zone has no bucket or placeholder for. Empty payloads carry a
/// key only and are skipped. Every accepted payload is decoded before any is
/// applied.
///
/// Addresses outside the zone's interval, or already used in another bucket
/// or reserved, are dropped from the incoming bucket; the local entry wins.
pub(super) fn merge_buckets(
    zone: &mut Zone,
    prefix: &str,
    addrs: &BTreeMap<String, Vec<u8>>,
    force: bool,
) -> Result<usize> {
    let scope = format!("{prefix}/{}/", zone.literal());
    let mut accepted = Vec::new();
    for (key, raw) in addrs {
        if !key.starts_with(&scope) {
            debug!(bucket = %key, zone = %zone.literal(), "dropping bucket outside zone scope");
            continue;
        }
        if !force && !zone.buckets().contains_key(key) {
            debug!(bucket = %key, zone = %zone.literal(), "dropping unknown bucket");
            continue;
        }
        if raw.is_empty() {
            continue;
        }
        accepted.push((key.clone(), codec::decode_bucket(raw)?));
    }

    let merged = accepted.len();
    for (key, mut bucket) in accepted {
        bucket.used.retain(|addr, _| {
            let keep = Address::parse(addr).is_ok_and(|parsed| zone.contains(&parsed))
                && !zone.is_reserved(addr)
                && !zone.used_elsewhere(addr, &key);
            if !keep {
                warn!(bucket = %key, %addr, zone = %zone.literal(), "dropping conflicting address");
            }
            keep
        });
        zone.buckets_mut().insert(key, Some(bucket));
    }
    Ok(merged)
}
