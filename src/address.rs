//! IPv4 arithmetic on plain `u32` values.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Error, Result};

pub fn ip_to_int(ip: Ipv4Addr) -> u32 {
    u32::from(ip)
}

pub fn int_to_ip(value: u32) -> Ipv4Addr {
    Ipv4Addr::from(value)
}

/// Parse dotted-quad text into its integer form.
pub fn parse_ip(text: &str) -> Result<u32> {
    Ipv4Addr::from_str(text.trim())
        .map(u32::from)
        .map_err(|_| Error::InvalidAddress(text.to_string()))
}

/// Inclusive address range, `start <= end`.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct AddressInterval {
    start: u32,
    end: u32,
}

impl AddressInterval {
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidRange {
                start: int_to_ip(start),
                end: int_to_ip(end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn single(addr: u32) -> Self {
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Interval covering both addresses, whichever order they come in.
    pub fn spanning(a: u32, b: u32) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    pub fn from_ips(start: Ipv4Addr, end: Ipv4Addr) -> Result<Self> {
        Self::new(ip_to_int(start), ip_to_int(end))
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn start_ip(&self) -> Ipv4Addr {
        int_to_ip(self.start)
    }

    pub fn end_ip(&self) -> Ipv4Addr {
        int_to_ip(self.end)
    }

    /// Number of addresses; `u64` because `0.0.0.0-255.255.255.255` holds 2^32.
    pub fn len(&self) -> u64 {
        u64::from(self.end) - u64::from(self.start) + 1
    }

    pub fn contains(&self, addr: u32) -> bool {
        self.start <= addr && addr <= self.end
    }

    pub fn overlaps(&self, other: &AddressInterval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Overlapping part of two intervals.
    pub fn intersect(&self, other: &AddressInterval) -> Option<AddressInterval> {
        if !self.overlaps(other) {
            return None;
        }
        Some(AddressInterval {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }
}

impl fmt::Display for AddressInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start_ip(), self.end_ip())
    }
}

/// Accepts `a.b.c.d-e.f.g.h`, `a.b.c.d/nn` or a single address.
impl FromStr for AddressInterval {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some((start, end)) = s.split_once('-') {
            return Self::new(parse_ip(start)?, parse_ip(end)?);
        }
        if s.contains('/') {
            let nb: Netblock = s.parse()?;
            return Ok(nb.interval());
        }
        parse_ip(s).map(Self::single)
    }
}

/// Netmask bits for `prefix_len`; `/0` yields an all-zero mask.
pub fn prefix_mask(prefix_len: u8) -> u32 {
    match prefix_len {
        0 => 0,
        p => u32::MAX << (32 - u32::from(p.min(32))),
    }
}

/// Prefix length of a contiguous netmask such as `255.255.255.0`.
pub fn mask_to_prefix(mask: Ipv4Addr) -> Result<u8> {
    let bits = ip_to_int(mask);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return Err(Error::InvalidMask(mask));
    }
    Ok(prefix as u8)
}

#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Clone, Copy)]
pub struct Netblock {
    network: Ipv4Addr,
    prefix_len: u8,
}

impl Netblock {
    /// Zero out bits beyond `prefix_len`.
    pub fn new(addr: Ipv4Addr, prefix_len: u8) -> Result<Self> {
        if prefix_len > 32 {
            return Err(Error::InvalidPrefix(prefix_len));
        }
        let masked = ip_to_int(addr) & prefix_mask(prefix_len);
        Ok(Self {
            network: int_to_ip(masked),
            prefix_len,
        })
    }

    pub fn network(&self) -> Ipv4Addr {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        int_to_ip(ip_to_int(self.network) | !prefix_mask(self.prefix_len))
    }

    pub fn interval(&self) -> AddressInterval {
        AddressInterval {
            start: ip_to_int(self.network),
            end: ip_to_int(self.broadcast()),
        }
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.interval().contains(ip_to_int(addr))
    }
}

impl FromStr for Netblock {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((ip, prefix)) => {
                let ip = Ipv4Addr::from_str(ip).map_err(|_| Error::InvalidAddress(s.to_string()))?;
                let prefix = prefix
                    .parse::<u8>()
                    .map_err(|_| Error::InvalidAddress(s.to_string()))?;
                Self::new(ip, prefix)
            }
            // No /prefix => assume /32
            None => {
                let ip = Ipv4Addr::from_str(s).map_err(|_| Error::InvalidAddress(s.to_string()))?;
                Self::new(ip, 32)
            }
        }
    }
}

impl fmt::Display for Netblock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix_len)
    }
}
