//! Overlap detection between a candidate zone and the existing ones

use super::builder::AddressInterval;

/// Literal of the first existing zone whose interval intersects `candidate`
///
/// Intervals are compared as plain integers, whatever their version.
pub fn find_overlap<'a, I>(candidate: &AddressInterval, existing: I) -> Option<&'a str>
where
    I: IntoIterator<Item = (&'a str, &'a AddressInterval)>,
{
    existing
        .into_iter()
        .find(|(_, interval)| candidate.overlaps(interval))
        .map(|(literal, _)| literal)
}

/// Whether `candidate` intersects any of `existing`
pub fn overlaps<'a, I>(candidate: &AddressInterval, existing: I) -> bool
where
    I: IntoIterator<Item = &'a AddressInterval>,
{
    existing.into_iter().any(|interval| candidate.overlaps(interval))
}
