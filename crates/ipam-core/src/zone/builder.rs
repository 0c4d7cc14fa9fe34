//! Zone literal parsing
//!
//! Turns a single address, a CIDR network or a dashed range into a
//! normalized [`AddressInterval`] and a canonical literal.
//!
//! CIDR networks exclude their network and broadcast addresses. A network
//! without spare host bits (`/31`, `/32`, `/127`, `/128`) therefore yields an
//! empty interval (`start > end`): the zone is accepted with zero capacity.

use num_bigint::BigUint;
use num_traits::{CheckedSub, One, Zero};

use crate::address::{Address, IpVersion};
use crate::error::{Error, Result};

/// Closed numeric interval of addresses of one version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressInterval {
    start: BigUint,
    end: BigUint,
    version: IpVersion,
}

impl AddressInterval {
    pub(crate) fn new(start: BigUint, end: BigUint, version: IpVersion) -> Self {
        Self {
            start,
            end,
            version,
        }
    }

    /// First allocatable address value
    pub fn start(&self) -> &BigUint {
        &self.start
    }

    /// Last allocatable address value
    pub fn end(&self) -> &BigUint {
        &self.end
    }

    /// IP version of both bounds
    pub fn version(&self) -> IpVersion {
        self.version
    }

    /// Whether the interval holds no address at all
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of addresses in the interval
    pub fn len(&self) -> BigUint {
        if self.is_empty() {
            return BigUint::zero();
        }
        &self.end - &self.start + 1u32
    }

    /// Whether `addr` has the same version and lies within the bounds
    pub fn contains(&self, addr: &Address) -> bool {
        addr.version() == self.version && &self.start <= addr.value() && addr.value() <= &self.end
    }

    /// Whether the two intervals intersect, compared numerically regardless
    /// of version
    pub fn overlaps(&self, other: &AddressInterval) -> bool {
        self.end >= other.start && self.start <= other.end
    }

    /// Addresses of the interval in ascending order
    pub fn iter(&self) -> IntervalIter {
        IntervalIter {
            next: self.start.clone(),
            end: self.end.clone(),
            version: self.version,
        }
    }
}

/// Ascending iterator over an [`AddressInterval`]
#[derive(Debug, Clone)]
pub struct IntervalIter {
    next: BigUint,
    end: BigUint,
    version: IpVersion,
}

impl Iterator for IntervalIter {
    type Item = Address;

    fn next(&mut self) -> Option<Address> {
        if self.next > self.end {
            return None;
        }
        let current = self.next.clone();
        self.next += 1u32;
        Address::from_parts(current, self.version).ok()
    }
}

/// Shape of the literal a zone was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    /// One address
    Single,
    /// CIDR network with its prefix length
    Cidr { prefix_len: u32 },
    /// Dashed `low-high` range
    Range,
}

/// A parsed zone literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneSpec {
    literal: String,
    interval: AddressInterval,
    kind: ZoneKind,
}

impl ZoneSpec {
    /// Parse a zone literal
    ///
    /// Recognized forms, tried in this order:
    ///
    /// 1. single address: `192.168.0.1`, `FE80::12`
    /// 2. CIDR network: `192.168.0.0/24`, `FE80::/64`
    /// 3. dashed range: `192.168.0.1-192.168.3.2`, `FE80::12-FE80::1:12`
    pub fn parse(literal: &str) -> Result<Self> {
        let literal = literal.trim();

        if let Ok(addr) = Address::parse(literal) {
            return Ok(Self::single(addr));
        }
        if let Some((addr, len)) = literal.split_once('/') {
            return Self::cidr(literal, addr, len);
        }
        let bounds: Vec<&str> = literal.split('-').collect();
        if let [low, high] = bounds.as_slice() {
            return Self::range(literal, low, high);
        }

        Err(Error::invalid_format(format!(
            "unrecognized zone literal {literal:?}"
        )))
    }

    fn single(addr: Address) -> Self {
        Self {
            literal: addr.to_string(),
            interval: AddressInterval::new(addr.value().clone(), addr.value().clone(), addr.version()),
            kind: ZoneKind::Single,
        }
    }

    fn cidr(literal: &str, addr: &str, len: &str) -> Result<Self> {
        let addr = Address::parse(addr)
            .map_err(|_| Error::invalid_format(format!("invalid CIDR literal {literal:?}")))?;
        let version = addr.version();
        let prefix_len = Some(len)
            .filter(|len| !len.is_empty() && len.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|len| len.parse::<u32>().ok())
            .filter(|len| *len <= version.bits())
            .ok_or_else(|| Error::invalid_format(format!("invalid CIDR prefix in {literal:?}")))?;

        let hostmask = (BigUint::one() << (version.bits() - prefix_len)) - 1u32;
        let all_ones = (BigUint::one() << version.bits()) - 1u32;
        let netmask = &all_ones ^ &hostmask;
        let network = addr.value() & &netmask;
        if &network != addr.value() {
            return Err(Error::invalid_network(format!(
                "{literal} is not a network address"
            )));
        }

        let start = &network + 1u32;
        let end = (&network + &hostmask)
            .checked_sub(&BigUint::one())
            .unwrap_or_default();

        Ok(Self {
            literal: format!("{addr}/{prefix_len}"),
            interval: AddressInterval::new(start, end, version),
            kind: ZoneKind::Cidr { prefix_len },
        })
    }

    fn range(literal: &str, low: &str, high: &str) -> Result<Self> {
        let (low, high) = match (Address::parse(low), Address::parse(high)) {
            (Ok(low), Ok(high)) => (low, high),
            _ => {
                return Err(Error::invalid_range(format!(
                    "{literal}: bounds must be IP addresses"
                )));
            }
        };
        if low.version() != high.version() {
            return Err(Error::invalid_range(format!(
                "{literal}: bounds are different address families"
            )));
        }
        if low.value() >= high.value() {
            return Err(Error::invalid_range(format!(
                "{literal}: the left bound must be less than the right one"
            )));
        }

        Ok(Self {
            literal: format!("{low}-{high}"),
            interval: AddressInterval::new(low.value().clone(), high.value().clone(), low.version()),
            kind: ZoneKind::Range,
        })
    }

    /// Canonical lowercase literal
    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Allocatable interval
    pub fn interval(&self) -> &AddressInterval {
        &self.interval
    }

    /// Literal shape
    pub fn kind(&self) -> ZoneKind {
        self.kind
    }
}

/// Canonical lookup key for a caller-supplied literal
///
/// Literals that parse are normalized through [`ZoneSpec::parse`]; anything
/// else is only lower-cased so lookups stay case-insensitive.
pub fn canonical_literal(literal: &str) -> String {
    ZoneSpec::parse(literal)
        .map(|spec| spec.literal)
        .unwrap_or_else(|_| literal.trim().to_lowercase())
}
