//! Shared helpers for IPAM contract tests

#![allow(dead_code)]

use ipam_core::storage::codec;
use ipam_core::{IpamConfig, IpamEngine, LabelMap};
use std::collections::BTreeMap;

/// Engine with the given prefix and default bucket sizing
pub fn engine(prefix: &str) -> IpamEngine {
    IpamEngine::new(IpamConfig::new(prefix)).expect("valid config")
}

/// Engine with a custom bucket capacity
pub fn engine_with_capacity(prefix: &str, addr_num_per_bucket: usize) -> IpamEngine {
    let config = IpamConfig::new(prefix).with_addr_num_per_bucket(addr_num_per_bucket);
    IpamEngine::new(config).expect("valid config")
}

/// Engine starting with instance labels
pub fn engine_with_labels(prefix: &str, pairs: &[(&str, &str)]) -> IpamEngine {
    let config = IpamConfig::new(prefix).with_labels(labels(pairs));
    IpamEngine::new(config).expect("valid config")
}

/// Build a label map from pairs
pub fn labels(pairs: &[(&str, &str)]) -> LabelMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// No labels
pub fn no_labels() -> LabelMap {
    LabelMap::new()
}

/// Used-address count of every bucket in a `dump_zone_addrs` result
pub fn bucket_sizes(dumped: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, usize> {
    dumped
        .iter()
        .map(|(key, raw)| {
            let size = if raw.is_empty() {
                0
            } else {
                codec::decode_bucket(raw).expect("decodable bucket").len()
            };
            (key.clone(), size)
        })
        .collect()
}
