//! Address codec
//!
//! Converts between textual IPv4/IPv6 addresses and an unsigned big integer
//! tagged with its version. Every other module works on [`Address`] values,
//! so ordering and arithmetic are always numeric, never textual.

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::error::{Error, Result};

/// IP version of an address or interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IpVersion {
    V4,
    V6,
}

impl IpVersion {
    /// Fixed byte width of an address of this version
    pub fn byte_width(self) -> usize {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 16,
        }
    }

    /// Fixed bit width of an address of this version
    pub fn bits(self) -> u32 {
        match self {
            IpVersion::V4 => 32,
            IpVersion::V6 => 128,
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpVersion::V4 => f.write_str("IPv4"),
            IpVersion::V6 => f.write_str("IPv6"),
        }
    }
}

/// An IP address as an arbitrary-precision integer plus its version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Address {
    value: BigUint,
    version: IpVersion,
}

impl Address {
    /// Parse an IPv4 or IPv6 literal
    pub fn parse(text: &str) -> Result<Self> {
        text.trim()
            .parse::<IpAddr>()
            .map(Self::from)
            .map_err(|_| Error::invalid_format(format!("invalid IP address {text:?}")))
    }

    /// Build an address from its numeric value
    ///
    /// Fails if `value` does not fit the version's width.
    pub fn from_parts(value: BigUint, version: IpVersion) -> Result<Self> {
        if value.bits() > u64::from(version.bits()) {
            return Err(Error::invalid_format(format!(
                "{value} does not fit in an {version} address"
            )));
        }
        Ok(Self { value, version })
    }

    /// Numeric value
    pub fn value(&self) -> &BigUint {
        &self.value
    }

    /// IP version
    pub fn version(&self) -> IpVersion {
        self.version
    }

    /// Render as a std address, zero-padding to the version's byte width
    pub fn to_ip_addr(&self) -> IpAddr {
        let width = self.version.byte_width();
        let raw = self.value.to_bytes_be();
        let mut bytes = vec![0u8; width];
        let copy = raw.len().min(width);
        bytes[width - copy..].copy_from_slice(&raw[raw.len() - copy..]);

        match self.version {
            IpVersion::V4 => {
                let octets: [u8; 4] = [bytes[0], bytes[1], bytes[2], bytes[3]];
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            IpVersion::V6 => {
                let mut octets = [0u8; 16];
                octets.copy_from_slice(&bytes);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
        }
    }
}

impl From<IpAddr> for Address {
    /// IPv4-mapped IPv6 addresses (`::ffff:a.b.c.d`) become IPv4
    fn from(ip: IpAddr) -> Self {
        match ip.to_canonical() {
            IpAddr::V4(v4) => Self {
                value: BigUint::from(u32::from(v4)),
                version: IpVersion::V4,
            },
            IpAddr::V6(v6) => Self {
                value: BigUint::from_bytes_be(&v6.octets()),
                version: IpVersion::V6,
            },
        }
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_ip_addr(), f)
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .cmp(&other.value)
            .then(self.version.cmp(&other.version))
    }
}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
