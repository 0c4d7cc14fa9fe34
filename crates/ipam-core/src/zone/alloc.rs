//! Allocation inside one zone
//!
//! Each address is free, used (with a reference count) or reserved; used and
//! reserved never hold at the same time. Used addresses live in buckets of
//! bounded capacity so that any single bucket stays small once serialized.
//!
//! Placeholder buckets (key known, data not loaded) are invisible here: their
//! addresses are neither found nor counted, and new addresses never go into
//! them.

use crate::address::Address;
use crate::error::{Error, Result};
use crate::storage::{Bucket, Descriptor, LabelMap};

use super::Zone;

/// Outcome of releasing an address inside a zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Reservation dropped
    Unreserved,
    /// Reference count decremented, address still used
    Decremented(u64),
    /// Last reference dropped, address free again
    Freed,
    /// Address was neither used nor reserved
    Untracked,
}

impl Zone {
    /// Whether `key` is used in a loaded bucket
    pub fn is_used(&self, key: &str) -> bool {
        self.bucket_of(key).is_some()
    }

    /// Whether `key` is used in a loaded bucket other than `bucket_key`
    pub(crate) fn used_elsewhere(&self, key: &str, bucket_key: &str) -> bool {
        self.buckets()
            .iter()
            .filter(|(other, _)| other.as_str() != bucket_key)
            .filter_map(|(_, bucket)| bucket.as_ref())
            .any(|bucket| bucket.used.contains_key(key))
    }

    /// Whether `key` is reserved
    pub fn is_reserved(&self, key: &str) -> bool {
        self.reserved().contains_key(key)
    }

    /// Descriptor of a used address
    pub fn descriptor(&self, key: &str) -> Option<&Descriptor> {
        self.buckets()
            .values()
            .flatten()
            .find_map(|bucket| bucket.used.get(key))
    }

    /// Mutable descriptor of a used address
    pub fn descriptor_mut(&mut self, key: &str) -> Option<&mut Descriptor> {
        self.buckets_mut()
            .values_mut()
            .flatten()
            .find_map(|bucket| bucket.used.get_mut(key))
    }

    /// Allocate `addr`, returning its reference count afterwards
    ///
    /// An address already in use gets its count bumped and `labels` merged
    /// over its current labels.
    pub fn allocate(
        &mut self,
        prefix: &str,
        capacity: usize,
        addr: &Address,
        labels: &LabelMap,
    ) -> Result<u64> {
        let key = addr.to_string();
        if self.is_reserved(&key) {
            return Err(Error::AddressReserved(key));
        }

        if let Some(desc) = self.descriptor_mut(&key) {
            desc.ref_count += 1;
            desc.labels
                .extend(labels.iter().map(|(k, v)| (k.clone(), v.clone())));
            return Ok(desc.ref_count);
        }

        self.place(prefix, capacity, key, Descriptor::allocated(labels));
        Ok(1)
    }

    /// Reserve `addr`, which must be neither used nor reserved
    pub fn reserve(&mut self, addr: &Address, labels: &LabelMap) -> Result<()> {
        let key = addr.to_string();
        if self.is_used(&key) {
            return Err(Error::AddressInUse(key));
        }
        if self.is_reserved(&key) {
            return Err(Error::AddressReserved(key));
        }
        self.reserved.insert(key, Descriptor::reserved(labels));
        Ok(())
    }

    /// Release `addr`
    ///
    /// Reservations are dropped outright. Used addresses lose one reference
    /// and are removed at zero, together with their bucket if it empties.
    pub fn release(&mut self, addr: &Address) -> Release {
        let key = addr.to_string();
        if self.reserved.remove(&key).is_some() {
            return Release::Unreserved;
        }

        let Some(bucket_key) = self.bucket_of(&key).map(str::to_owned) else {
            return Release::Untracked;
        };
        let Some(Some(bucket)) = self.buckets.get_mut(&bucket_key) else {
            return Release::Untracked;
        };
        let Some(desc) = bucket.used.get_mut(&key) else {
            return Release::Untracked;
        };

        desc.ref_count = desc.ref_count.saturating_sub(1);
        if desc.ref_count > 0 {
            return Release::Decremented(desc.ref_count);
        }

        bucket.used.remove(&key);
        if bucket.is_empty() {
            self.buckets.remove(&bucket_key);
        }
        Release::Freed
    }

    /// Lowest address of the interval that is neither used nor reserved
    ///
    /// Linear in the interval size: slow on a nearly full large zone.
    pub fn first_free(&self) -> Option<Address> {
        self.interval().iter().find(|addr| {
            let key = addr.to_string();
            !self.is_used(&key) && !self.is_reserved(&key)
        })
    }

    /// Key of the loaded bucket holding `key`
    fn bucket_of(&self, key: &str) -> Option<&str> {
        self.buckets()
            .iter()
            .find(|(_, bucket)| {
                bucket
                    .as_ref()
                    .is_some_and(|bucket| bucket.used.contains_key(key))
            })
            .map(|(bucket_key, _)| bucket_key.as_str())
    }

    /// Put a new address into the first loaded bucket with room, creating a
    /// bucket when none has any
    fn place(&mut self, prefix: &str, capacity: usize, key: String, desc: Descriptor) {
        let open = self
            .buckets
            .values_mut()
            .flatten()
            .find(|bucket| bucket.len() < capacity);
        if let Some(bucket) = open {
            bucket.used.insert(key, desc);
            return;
        }

        let bucket_key = self.next_bucket_key(prefix);
        tracing::trace!(bucket = %bucket_key, zone = %self.literal(), "creating bucket");
        let mut bucket = Bucket::default();
        bucket.used.insert(key, desc);
        self.buckets.insert(bucket_key, Some(bucket));
    }

    /// `<prefix>/<literal>/<n>`, starting from the bucket count and skipping
    /// keys left behind by deleted or placeholder buckets
    fn next_bucket_key(&self, prefix: &str) -> String {
        let mut index = self.buckets.len();
        loop {
            let key = format!("{prefix}/{}/{index}", self.literal());
            if !self.buckets.contains_key(&key) {
                return key;
            }
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::ZoneSpec;

    fn zone(literal: &str) -> Zone {
        Zone::new(ZoneSpec::parse(literal).unwrap(), false)
    }

    fn addr(text: &str) -> Address {
        Address::parse(text).unwrap()
    }

    fn labels(pairs: &[(&str, &str)]) -> LabelMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn repeated_allocation_counts_references() {
        let mut zone = zone("10.0.0.0/24");
        let a = addr("10.0.0.1");

        assert_eq!(zone.allocate("lab", 8, &a, &labels(&[("a", "1")])).unwrap(), 1);
        assert_eq!(
            zone.allocate("lab", 8, &a, &labels(&[("a", "2"), ("b", "3")]))
                .unwrap(),
            2
        );
        let desc = zone.descriptor("10.0.0.1").unwrap();
        assert_eq!(desc.ref_count, 2);
        assert_eq!(desc.labels, labels(&[("a", "2"), ("b", "3")]));

        assert_eq!(zone.release(&a), Release::Decremented(1));
        assert!(zone.is_used("10.0.0.1"));
        assert_eq!(zone.release(&a), Release::Freed);
        assert!(!zone.is_used("10.0.0.1"));
        assert!(zone.buckets().is_empty());
    }

    #[test]
    fn used_and_reserved_are_exclusive() {
        let mut zone = zone("10.0.0.0/24");
        zone.allocate("lab", 8, &addr("10.0.0.1"), &LabelMap::new())
            .unwrap();
        zone.reserve(&addr("10.0.0.2"), &LabelMap::new()).unwrap();

        assert!(matches!(
            zone.reserve(&addr("10.0.0.1"), &LabelMap::new()),
            Err(Error::AddressInUse(_))
        ));
        assert!(matches!(
            zone.reserve(&addr("10.0.0.2"), &LabelMap::new()),
            Err(Error::AddressReserved(_))
        ));
        assert!(matches!(
            zone.allocate("lab", 8, &addr("10.0.0.2"), &LabelMap::new()),
            Err(Error::AddressReserved(_))
        ));
    }

    #[test]
    fn release_prefers_reservations_and_tolerates_untracked() {
        let mut zone = zone("10.0.0.0/24");
        zone.reserve(&addr("10.0.0.9"), &LabelMap::new()).unwrap();
        assert_eq!(zone.release(&addr("10.0.0.9")), Release::Unreserved);
        assert_eq!(zone.release(&addr("10.0.0.9")), Release::Untracked);
    }

    #[test]
    fn buckets_fill_to_capacity_then_split() {
        let mut zone = zone("10.0.0.0/24");
        for host in 1..=5 {
            zone.allocate("lab", 2, &addr(&format!("10.0.0.{host}")), &LabelMap::new())
                .unwrap();
        }
        let keys: Vec<&String> = zone.buckets().keys().collect();
        assert_eq!(
            keys,
            ["lab/10.0.0.0/24/0", "lab/10.0.0.0/24/1", "lab/10.0.0.0/24/2"]
        );
        assert_eq!(zone.used_count(), 5);
    }

    #[test]
    fn new_bucket_key_skips_existing_indexes() {
        let mut zone = zone("10.0.0.0/24");
        for host in 1..=4 {
            zone.allocate("lab", 2, &addr(&format!("10.0.0.{host}")), &LabelMap::new())
                .unwrap();
        }
        // empty bucket 0; bucket 1 stays full
        zone.release(&addr("10.0.0.1"));
        zone.release(&addr("10.0.0.2"));
        assert_eq!(zone.buckets().len(), 1);

        zone.allocate("lab", 2, &addr("10.0.0.5"), &LabelMap::new())
            .unwrap();
        assert!(zone.buckets().contains_key("lab/10.0.0.0/24/1"));
        assert!(zone.buckets().contains_key("lab/10.0.0.0/24/2"));
        assert_eq!(zone.used_count(), 3);
    }

    #[test]
    fn placeholders_are_not_filled() {
        let mut zone = zone("10.0.0.0/24");
        zone.buckets_mut().insert("lab/10.0.0.0/24/0".into(), None);
        zone.allocate("lab", 8, &addr("10.0.0.1"), &LabelMap::new())
            .unwrap();
        assert_eq!(zone.buckets()["lab/10.0.0.0/24/0"], None);
        assert!(zone.buckets()["lab/10.0.0.0/24/1"].is_some());
    }

    #[test]
    fn first_free_skips_used_and_reserved() {
        let mut zone = zone("10.0.0.0-10.0.0.3");
        zone.allocate("lab", 8, &addr("10.0.0.0"), &LabelMap::new())
            .unwrap();
        zone.reserve(&addr("10.0.0.1"), &LabelMap::new()).unwrap();
        assert_eq!(zone.first_free(), Some(addr("10.0.0.2")));

        zone.allocate("lab", 8, &addr("10.0.0.2"), &LabelMap::new())
            .unwrap();
        zone.allocate("lab", 8, &addr("10.0.0.3"), &LabelMap::new())
            .unwrap();
        assert_eq!(zone.first_free(), None);
    }

    #[test]
    fn empty_cidr_has_nothing_free() {
        let zone = zone("10.0.0.4/31");
        assert_eq!(zone.first_free(), None);
    }
}
