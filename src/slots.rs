//! Free bandwidth slot computation.
//!
//! A slot is a maximal run of addresses inside a bound that is neither the
//! router's own address nor covered by an enabled bandwidth-control entry.

use std::fmt;
use std::net::Ipv4Addr;

use tracing::debug;

use crate::address::{int_to_ip, AddressInterval, Netblock};
use crate::error::{Error, Result};

/// Where the candidate address range comes from.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub enum BoundPolicy {
    /// The DHCP pool's min/max addresses.
    Dhcp,
    /// The LAN subnet of the router address, minus network and broadcast.
    #[default]
    Subnet,
}

/// An address range already handed out on the router.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct AllocatedRange {
    pub interval: AddressInterval,
    pub enabled: bool,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct BwSlot {
    pub range: AddressInterval,
}

impl BwSlot {
    pub fn min_address(&self) -> Ipv4Addr {
        self.range.start_ip()
    }

    pub fn max_address(&self) -> Ipv4Addr {
        self.range.end_ip()
    }

    pub fn capacity(&self) -> u64 {
        self.range.len()
    }
}

impl fmt::Display for BwSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.range, self.capacity())
    }
}

/// Usable host range of the router's subnet.
///
/// Prefix 0 is rejected outright; /31 and /32 leave no host addresses.
pub fn subnet_bound(router_ip: Ipv4Addr, prefix_len: u8) -> Result<AddressInterval> {
    if prefix_len == 0 || prefix_len > 30 {
        return Err(Error::InvalidPrefix(prefix_len));
    }
    let block = Netblock::new(router_ip, prefix_len)?;
    let net = block.interval();
    AddressInterval::new(net.start() + 1, net.end() - 1)
}

/// `bound` minus `exclude_self` minus every enabled allocated range, merged
/// into maximal ascending slots.
pub fn compute_free_slots(
    bound: AddressInterval,
    exclude_self: Option<u32>,
    allocated: &[AllocatedRange],
) -> Vec<BwSlot> {
    let mut taken: Vec<AddressInterval> = allocated
        .iter()
        .filter(|a| a.enabled)
        .filter_map(|a| a.interval.intersect(&bound))
        .collect();
    if let Some(addr) = exclude_self.filter(|a| bound.contains(*a)) {
        taken.push(AddressInterval::single(addr));
    }
    taken.sort();

    // Sweep with a u64 cursor so a range ending at 255.255.255.255 cannot wrap.
    let mut slots = Vec::new();
    let mut cursor = u64::from(bound.start());
    let end = u64::from(bound.end());
    for t in &taken {
        let (t_start, t_end) = (u64::from(t.start()), u64::from(t.end()));
        if t_start > cursor {
            slots.push(slot_between(cursor, t_start - 1));
        }
        cursor = cursor.max(t_end + 1);
    }
    if cursor <= end {
        slots.push(slot_between(cursor, end));
    }

    debug!(bound = %bound, taken = taken.len(), slots = slots.len(), "computed free slots");
    slots
}

// Both ends stay within the u32 bound, so the casts are lossless.
fn slot_between(start: u64, end: u64) -> BwSlot {
    BwSlot {
        range: AddressInterval::spanning(start as u32, end as u32),
    }
}

/// Smallest address in `range` that is not already reserved.
pub fn unused_address(range: AddressInterval, reserved: &[u32]) -> Result<u32> {
    let mut inside: Vec<u32> = reserved
        .iter()
        .copied()
        .filter(|r| range.contains(*r))
        .collect();
    inside.sort_unstable();
    inside.dedup();

    let mut candidate = u64::from(range.start());
    for r in inside {
        if u64::from(r) == candidate {
            candidate += 1;
        } else if u64::from(r) > candidate {
            break;
        }
    }
    if candidate > u64::from(range.end()) {
        return Err(Error::NoAddressAvailable);
    }
    Ok(candidate as u32)
}

/// `start + count`, rejected instead of wrapping past 255.255.255.255.
pub fn max_address(start: u32, count: u64) -> Result<u32> {
    u64::from(start)
        .checked_add(count)
        .and_then(|end| u32::try_from(end).ok())
        .ok_or(Error::AddressOverflow {
            start: int_to_ip(start),
            count,
        })
}

/// Why a manually placed range does not fit its slot.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Placement {
    BelowRange,
    AboveRange,
    PastEnd,
}

impl fmt::Display for Placement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Placement::BelowRange => write!(f, "Given start IP is below range"),
            Placement::AboveRange => write!(f, "Given start IP is above range"),
            Placement::PastEnd => write!(f, "Requested addresses run past the end of the slot"),
        }
    }
}

/// Range of `count` addresses beginning at `start` (or the slot start),
/// checked against the slot it is carved from.
pub fn place_range(
    slot: &BwSlot,
    start: Option<u32>,
    count: u64,
) -> Result<std::result::Result<AddressInterval, Placement>> {
    let start = start.unwrap_or(slot.range.start());
    if start < slot.range.start() {
        return Ok(Err(Placement::BelowRange));
    }
    if start > slot.range.end() {
        return Ok(Err(Placement::AboveRange));
    }
    if count == 0 {
        return Err(Error::InvalidInput);
    }
    let end = max_address(start, count - 1)?;
    if end > slot.range.end() {
        return Ok(Err(Placement::PastEnd));
    }
    AddressInterval::new(start, end).map(Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn iv(start: u32, end: u32) -> AddressInterval {
        AddressInterval::new(start, end).unwrap()
    }

    fn enabled(start: u32, end: u32) -> AllocatedRange {
        AllocatedRange {
            interval: iv(start, end),
            enabled: true,
        }
    }

    fn ranges(slots: &[BwSlot]) -> Vec<(u32, u32)> {
        slots.iter().map(|s| (s.range.start(), s.range.end())).collect()
    }

    #[test]
    fn test_free_slots_split_around_self_and_allocation() {
        let slots = compute_free_slots(iv(10, 20), Some(15), &[enabled(12, 14)]);
        assert_eq!(ranges(&slots), vec![(10, 11), (16, 20)]);
        assert_eq!(slots[1].capacity(), 5);
    }

    #[test]
    fn test_disabled_entries_reserve_nothing() {
        let disabled = AllocatedRange {
            interval: iv(12, 14),
            enabled: false,
        };
        let slots = compute_free_slots(iv(10, 20), None, &[disabled]);
        assert_eq!(ranges(&slots), vec![(10, 20)]);
    }

    #[test]
    fn test_allocations_outside_bound_are_clipped() {
        let slots = compute_free_slots(iv(10, 20), Some(99), &[enabled(0, 11), enabled(19, 40)]);
        assert_eq!(ranges(&slots), vec![(12, 18)]);
    }

    #[test]
    fn test_overlapping_and_adjacent_allocations() {
        let slots = compute_free_slots(
            iv(0, 30),
            None,
            &[enabled(5, 10), enabled(8, 12), enabled(13, 13), enabled(20, 20)],
        );
        assert_eq!(ranges(&slots), vec![(0, 4), (14, 19), (21, 30)]);
    }

    #[test]
    fn test_fully_allocated_bound_has_no_slots() {
        assert!(compute_free_slots(iv(10, 20), None, &[enabled(0, 100)]).is_empty());
        assert!(compute_free_slots(iv(7, 7), Some(7), &[]).is_empty());
    }

    #[test]
    fn test_top_of_address_space() {
        let top = u32::MAX;
        let slots = compute_free_slots(iv(top - 4, top), Some(top - 2), &[]);
        assert_eq!(ranges(&slots), vec![(top - 4, top - 3), (top - 1, top)]);

        let slots = compute_free_slots(iv(top - 4, top), None, &[enabled(top - 1, top)]);
        assert_eq!(ranges(&slots), vec![(top - 4, top - 2)]);
    }

    #[test]
    fn test_free_slots_match_complement_randomized() {
        let mut rng = rand::rng();
        for _ in 0..200 {
            let a = rng.random_range(0..500u32);
            let b = a + rng.random_range(0..80u32);
            let me = rng.random_range(0..600u32);
            let allocated: Vec<AllocatedRange> = (0..rng.random_range(0..6))
                .map(|_| {
                    let s = rng.random_range(0..600u32);
                    AllocatedRange {
                        interval: iv(s, s + rng.random_range(0..20u32)),
                        enabled: rng.random_bool(0.8),
                    }
                })
                .collect();

            let slots = compute_free_slots(iv(a, b), Some(me), &allocated);

            let expected: Vec<u32> = (a..=b)
                .filter(|x| *x != me)
                .filter(|x| !allocated.iter().any(|r| r.enabled && r.interval.contains(*x)))
                .collect();
            let got: Vec<u32> = slots
                .iter()
                .flat_map(|s| s.range.start()..=s.range.end())
                .collect();
            assert_eq!(got, expected);

            for pair in slots.windows(2) {
                assert!(pair[0].range.end() + 1 < pair[1].range.start());
            }
        }
    }

    #[test]
    fn test_subnet_bound() {
        let bound = subnet_bound(Ipv4Addr::new(192, 168, 0, 1), 24).unwrap();
        assert_eq!(bound.start_ip(), Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(bound.end_ip(), Ipv4Addr::new(192, 168, 0, 254));

        let bound = subnet_bound(Ipv4Addr::new(10, 1, 2, 3), 30).unwrap();
        assert_eq!(bound.len(), 2);
    }

    #[test]
    fn test_subnet_bound_rejects_degenerate_prefixes() {
        for prefix in [0, 31, 32, 33] {
            assert!(matches!(
                subnet_bound(Ipv4Addr::new(10, 0, 0, 1), prefix),
                Err(Error::InvalidPrefix(p)) if p == prefix
            ));
        }
    }

    #[test]
    fn test_unused_address_skips_reservations() {
        assert_eq!(unused_address(iv(16, 18), &[16]).unwrap(), 17);
        assert!(matches!(
            unused_address(iv(16, 18), &[18, 3, 16, 17, 16]),
            Err(Error::NoAddressAvailable)
        ));
        assert_eq!(unused_address(iv(16, 18), &[]).unwrap(), 16);
        assert_eq!(unused_address(iv(16, 18), &[17]).unwrap(), 16);
        assert_eq!(unused_address(iv(u32::MAX, u32::MAX), &[]).unwrap(), u32::MAX);
        assert!(unused_address(iv(u32::MAX, u32::MAX), &[u32::MAX]).is_err());
    }

    #[test]
    fn test_max_address_rejects_overflow() {
        assert_eq!(max_address(16, 2).unwrap(), 18);
        assert_eq!(max_address(u32::MAX - 1, 1).unwrap(), u32::MAX);
        assert!(matches!(
            max_address(u32::MAX, 1),
            Err(Error::AddressOverflow { .. })
        ));
    }

    #[test]
    fn test_place_range_defaults_to_slot_start() {
        let slot = BwSlot { range: iv(16, 20) };
        assert_eq!(place_range(&slot, None, 3).unwrap(), Ok(iv(16, 18)));
        assert_eq!(place_range(&slot, Some(18), 3).unwrap(), Ok(iv(18, 20)));
    }

    #[test]
    fn test_place_range_reports_misplacement() {
        let slot = BwSlot { range: iv(16, 20) };
        assert_eq!(place_range(&slot, Some(15), 1).unwrap(), Err(Placement::BelowRange));
        assert_eq!(place_range(&slot, Some(21), 1).unwrap(), Err(Placement::AboveRange));
        assert_eq!(place_range(&slot, Some(19), 3).unwrap(), Err(Placement::PastEnd));
        // upper bound with a single device is accepted
        assert_eq!(place_range(&slot, Some(20), 1).unwrap(), Ok(iv(20, 20)));
    }
}
