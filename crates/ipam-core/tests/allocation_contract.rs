//! Contract Test: Zones, Allocation & Labels
//!
//! Constraints verified:
//! - Zone literals are parsed, canonicalized and never overlap
//! - Used and reserved addresses are mutually exclusive
//! - Reference counting keeps an address allocated until its last release
//! - Idle counts are exact, including IPv6 zones
//! - Address labels only reach used addresses
//!
//! If this test fails, allocation bookkeeping is broken.

mod common;

use common::*;
use ipam_core::storage::codec;
use ipam_core::{Error, Ipam};
use std::collections::BTreeSet;
use tokio_test::{assert_err, assert_ok};

#[tokio::test]
async fn basic_lifecycle_across_mixed_zones() {
    let ipam = engine("test");

    for literal in [
        "192.168.1.0/24",
        "FE80::12",
        "FE80::30-FE80::1:30",
        "192.168.3.0-192.168.3.10",
    ] {
        assert_ok!(ipam.add_zone(literal, true).await);
    }

    for addr in ["192.168.1.1", "FE80::12", "FE80::1:12", "192.168.3.3"] {
        assert_ok!(ipam.allocate_addr_specific(addr, &no_labels()).await);
    }
    // network address of the /24 is not allocatable
    assert!(matches!(
        ipam.allocate_addr_specific("192.168.1.0", &no_labels()).await,
        Err(Error::AddressNotHandled(_))
    ));

    let next = assert_ok!(ipam.allocate_addr_next(&no_labels()).await);
    assert_eq!(next.to_string(), "192.168.1.2");

    assert_ok!(ipam.reserve_addr("192.168.1.100", &no_labels()).await);
    assert!(matches!(
        ipam.allocate_addr_specific("192.168.1.100", &no_labels()).await,
        Err(Error::AddressReserved(_))
    ));

    assert_ok!(ipam.release_addr(&next.to_string()).await);
    assert_eq!(
        ipam.find_literal("192.168.3.0").await.as_deref(),
        Some("192.168.3.0-192.168.3.10")
    );
    assert_eq!(ipam.literals().await.len(), 4);

    assert_ok!(ipam.remove_zone("192.168.1.0/24").await);
    assert!(matches!(
        ipam.release_addr("192.168.1.1").await,
        Err(Error::AddressNotHandled(_))
    ));
    assert_eq!(ipam.literals().await.len(), 3);
}

#[tokio::test]
async fn idle_count_is_exact() {
    let ipam = engine("test");
    ipam.add_zone("192.168.1.0/24", false).await.unwrap();
    assert_eq!(ipam.idle_count().await, "254");

    ipam.add_zone("FE80::12", false).await.unwrap();
    assert_eq!(ipam.idle_count().await, "255");

    ipam.allocate_addr_specific("192.168.1.7", &no_labels())
        .await
        .unwrap();
    ipam.reserve_addr("192.168.1.8", &no_labels()).await.unwrap();
    assert_eq!(ipam.idle_count().await, "253");

    // 2^64 - 2 hosts
    ipam.add_zone("2001:db8::/64", false).await.unwrap();
    assert_eq!(ipam.idle_count().await, "18446744073709551867");
}

#[tokio::test]
async fn reference_counting() {
    let ipam = engine("test");
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();

    ipam.allocate_addr_specific("10.0.0.5", &labels(&[("a", "1")]))
        .await
        .unwrap();
    ipam.allocate_addr_specific("10.0.0.5", &labels(&[("a", "2"), ("b", "3")]))
        .await
        .unwrap();

    let block = codec::decode_block(&ipam.dump(true).await.unwrap()).unwrap();
    let desc = block.zones[0]
        .buckets
        .values()
        .flatten()
        .find_map(|bucket| bucket.used.get("10.0.0.5"))
        .cloned()
        .unwrap();
    assert_eq!(desc.ref_count, 2);
    assert_eq!(desc.labels, labels(&[("a", "2"), ("b", "3")]));

    ipam.release_addr("10.0.0.5").await.unwrap();
    assert_eq!(ipam.used_addrs().await, ["10.0.0.5"]);

    ipam.release_addr("10.0.0.5").await.unwrap();
    assert!(ipam.used_addrs().await.is_empty());

    // releasing an untracked address inside a zone is fine
    assert_ok!(ipam.release_addr("10.0.0.5").await);
}

#[tokio::test]
async fn reservation_conflicts() {
    let ipam = engine("test");
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();
    ipam.allocate_addr_specific("10.0.0.1", &no_labels())
        .await
        .unwrap();

    assert!(matches!(
        ipam.reserve_addr("10.0.0.1", &no_labels()).await,
        Err(Error::AddressInUse(_))
    ));

    ipam.reserve_addr("10.0.0.2", &labels(&[("why", "gateway")]))
        .await
        .unwrap();
    assert!(matches!(
        ipam.reserve_addr("10.0.0.2", &no_labels()).await,
        Err(Error::AddressReserved(_))
    ));
    assert!(matches!(
        ipam.reserve_addr("10.9.0.2", &no_labels()).await,
        Err(Error::AddressNotHandled(_))
    ));
    assert_eq!(ipam.reserved_addrs().await, ["10.0.0.2"]);

    // allocate_next skips both
    let next = ipam.allocate_addr_next(&no_labels()).await.unwrap();
    assert_eq!(next.to_string(), "10.0.0.3");

    ipam.release_addr("10.0.0.2").await.unwrap();
    assert!(ipam.reserved_addrs().await.is_empty());
}

#[tokio::test]
async fn allocation_outside_every_zone_is_not_handled() {
    let ipam = engine("test");
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();

    assert!(matches!(
        ipam.allocate_addr_specific("10.0.1.1", &no_labels()).await,
        Err(Error::AddressNotHandled(_))
    ));
    // same integer value, other family
    assert!(matches!(
        ipam.allocate_addr_specific("::a00:1", &no_labels()).await,
        Err(Error::AddressNotHandled(_))
    ));
    assert!(matches!(
        ipam.allocate_addr_specific("10.0.0", &no_labels()).await,
        Err(Error::InvalidFormat(_))
    ));
}

#[tokio::test]
async fn ipv4_mapped_addresses_resolve_to_ipv4() {
    let ipam = engine("test");
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();

    assert_ok!(ipam.allocate_addr_specific("::ffff:10.0.0.5", &no_labels()).await);
    assert_eq!(ipam.used_addrs().await, ["10.0.0.5"]);
    assert_ok!(ipam.release_addr("::ffff:10.0.0.5").await);
    assert!(ipam.used_addrs().await.is_empty());

    assert_ok!(ipam.add_zone("::ffff:192.168.0.1", false).await);
    assert_eq!(ipam.literals().await, ["10.0.0.0/24", "192.168.0.1"]);
}

#[tokio::test]
async fn zones_never_overlap() {
    let ipam = engine("test");
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();

    assert!(matches!(
        ipam.add_zone("10.0.0.128-10.0.1.0", false).await,
        Err(Error::OverlappingRange { .. })
    ));
    assert!(matches!(
        ipam.add_zone("10.0.0.77", false).await,
        Err(Error::OverlappingRange { .. })
    ));
    assert!(matches!(
        ipam.add_zone("10.0.0.0/24", false).await,
        Err(Error::ZoneAlreadyExists(_))
    ));
    // the /24 excludes its network and broadcast addresses
    assert_ok!(ipam.add_zone("10.0.0.0", false).await);
    assert_ok!(ipam.add_zone("10.0.0.255", false).await);

    ipam.add_zone("FE80::/64", false).await.unwrap();
    assert!(matches!(
        ipam.add_zone("fe80:0::/64", false).await,
        Err(Error::ZoneAlreadyExists(_))
    ));
}

#[tokio::test]
async fn malformed_literals_are_rejected() {
    let ipam = engine("test");

    assert!(matches!(
        ipam.add_zone("192.168.1.1/24", false).await,
        Err(Error::InvalidNetwork(_))
    ));
    assert!(matches!(
        ipam.add_zone("192.168.1.9-192.168.1.1", false).await,
        Err(Error::InvalidRange(_))
    ));
    assert!(matches!(
        ipam.add_zone("192.168.1.1-fe80::1", false).await,
        Err(Error::InvalidRange(_))
    ));
    assert!(matches!(
        ipam.add_zone("not a zone", false).await,
        Err(Error::InvalidFormat(_))
    ));
    assert!(matches!(
        ipam.remove_zone("192.168.1.1/24").await,
        Err(Error::InvalidNetwork(_))
    ));
    // unknown but well-formed: no-op
    assert_ok!(ipam.remove_zone("192.168.9.0/24").await);
    assert!(ipam.literals().await.is_empty());
}

#[tokio::test]
async fn zero_capacity_cidr_is_accepted() {
    let ipam = engine("test");
    assert_ok!(ipam.add_zone("10.0.0.4/31", false).await);
    assert_ok!(ipam.add_zone("fe80::/128", false).await);
    assert_eq!(ipam.idle_count().await, "0");

    assert!(matches!(
        ipam.allocate_addr_specific("10.0.0.4", &no_labels()).await,
        Err(Error::AddressNotHandled(_))
    ));
    assert!(matches!(
        ipam.allocate_addr_next(&no_labels()).await,
        Err(Error::PoolExhausted)
    ));
}

#[tokio::test]
async fn pool_exhaustion() {
    let ipam = engine("test");
    assert!(matches!(
        ipam.allocate_addr_next(&no_labels()).await,
        Err(Error::PoolExhausted)
    ));

    ipam.add_zone("10.0.0.1-10.0.0.2", false).await.unwrap();
    ipam.allocate_addr_next(&no_labels()).await.unwrap();
    ipam.allocate_addr_next(&no_labels()).await.unwrap();
    let err = assert_err!(ipam.allocate_addr_next(&no_labels()).await);
    assert!(matches!(err, Error::PoolExhausted));

    ipam.release_addr("10.0.0.1").await.unwrap();
    let next = ipam.allocate_addr_next(&no_labels()).await.unwrap();
    assert_eq!(next.to_string(), "10.0.0.1");
}

#[tokio::test]
async fn instance_and_zone_labels() {
    let ipam = engine_with_labels("test", &[("foo", "bar")]);
    assert_eq!(ipam.labels().await, labels(&[("foo", "bar")]));

    ipam.set_label("foo", "bar2").await;
    assert_eq!(ipam.remove_label("foo").await.as_deref(), Some("bar2"));
    assert_eq!(ipam.remove_label("foo").await, None);

    let literal = "192.168.1.0/24";
    ipam.add_zone(literal, true).await.unwrap();
    ipam.set_zone_label(literal, "foo", "bar").await.unwrap();
    assert_eq!(ipam.zone_labels(literal).await, Some(labels(&[("foo", "bar")])));
    assert_eq!(
        ipam.remove_zone_label(literal, "foo").await.unwrap().as_deref(),
        Some("bar")
    );
    assert_eq!(ipam.zone_labels(literal).await, Some(no_labels()));

    assert_eq!(ipam.zone_labels("10.0.0.0/8").await, None);
    assert!(matches!(
        ipam.set_zone_label("10.0.0.0/8", "k", "v").await,
        Err(Error::ZoneNotFound(_))
    ));
    assert!(matches!(
        ipam.remove_zone_label("10.0.0.0/8", "k").await,
        Err(Error::ZoneNotFound(_))
    ));
}

#[tokio::test]
async fn address_labels() {
    let ipam = engine("test");
    ipam.add_zone("192.168.1.0/24", true).await.unwrap();

    let specific = "192.168.1.1";
    ipam.allocate_addr_specific(specific, &labels(&[("foo", "bar")]))
        .await
        .unwrap();
    ipam.set_addr_label(specific, "foo", "bar2").await.unwrap();
    assert_eq!(
        ipam.addr_labels(specific).await.unwrap(),
        labels(&[("foo", "bar2")])
    );
    assert_eq!(
        ipam.remove_addr_label(specific, "foo").await.unwrap().as_deref(),
        Some("bar2")
    );
    assert!(ipam.addr_labels(specific).await.unwrap().is_empty());

    assert!(matches!(
        ipam.set_addr_label("192.168.1.2", "k", "v").await,
        Err(Error::AddressNotAllocated(_))
    ));
}

#[tokio::test]
async fn reserved_addresses_are_not_label_addressable() {
    let ipam = engine("test");
    ipam.add_zone("192.168.1.0/24", false).await.unwrap();
    ipam.reserve_addr("192.168.1.9", &labels(&[("k", "v")]))
        .await
        .unwrap();

    assert!(matches!(
        ipam.addr_labels("192.168.1.9").await,
        Err(Error::AddressNotAllocated(_))
    ));
    assert!(matches!(
        ipam.set_addr_label("192.168.1.9", "k", "v2").await,
        Err(Error::AddressNotAllocated(_))
    ));
}

#[tokio::test]
async fn find_literal_and_literals() {
    let ipam = engine("test");
    ipam.add_zone("FE80::30-FE80::1:30", false).await.unwrap();

    assert_eq!(
        ipam.find_literal("fe80::1:0").await.as_deref(),
        Some("fe80::30-fe80::1:30")
    );
    assert_eq!(ipam.find_literal("fe80::1").await, None);
    assert_eq!(ipam.find_literal("garbage").await, None);
    assert_eq!(ipam.literals().await, ["fe80::30-fe80::1:30"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_allocations_never_collide() {
    let ipam = engine_with_capacity("test", 16);
    ipam.add_zone("10.0.0.0/24", false).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let ipam = ipam.clone();
        handles.push(tokio::spawn(async move {
            let mut addrs = Vec::new();
            for _ in 0..16 {
                addrs.push(ipam.allocate_addr_next(&no_labels()).await.unwrap());
            }
            addrs
        }));
    }

    let mut all = BTreeSet::new();
    for handle in handles {
        for addr in handle.await.unwrap() {
            assert!(all.insert(addr), "{addr} allocated twice");
        }
    }
    assert_eq!(all.len(), 128);
    assert_eq!(ipam.idle_count().await, "126");

    let dumped = ipam.dump_zone_addrs("10.0.0.0/24", false).await.unwrap();
    assert_eq!(dumped.len(), 8);
    assert!(bucket_sizes(&dumped).values().all(|size| *size == 16));
}

