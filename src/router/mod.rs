//! The router as seen by routerman: a handful of fallible remote calls.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::address::{mask_to_prefix, AddressInterval};
use crate::error::Result;
use crate::mac::MacAddr;

mod snapshot;

pub use snapshot::{RouterState, SnapshotRouter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterInfo {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanConfig {
    pub ip: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
}

impl LanConfig {
    pub fn prefix(&self) -> Result<u8> {
        mask_to_prefix(self.subnet_mask)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthEntry {
    pub id: i64,
    pub enabled: bool,
    pub start_ip: Ipv4Addr,
    pub end_ip: Ipv4Addr,
    pub up_min: u32,
    pub up_max: u32,
    pub down_min: u32,
    pub down_max: u32,
}

impl BandwidthEntry {
    pub fn range(&self) -> Result<AddressInterval> {
        AddressInterval::from_ips(self.start_ip, self.end_ip)
    }
}

/// A new entry as submitted to the router; it assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBandwidthEntry {
    pub range: AddressInterval,
    pub up_min: u32,
    pub up_max: u32,
    pub down_min: u32,
    pub down_max: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthControl {
    pub enabled: bool,
    pub up_total: u32,
    pub down_total: u32,
    pub entries: Vec<BandwidthEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DhcpConfig {
    pub enabled: bool,
    pub min_address: Ipv4Addr,
    pub max_address: Ipv4Addr,
    pub lease_minutes: u32,
}

impl DhcpConfig {
    pub fn pool(&self) -> Result<AddressInterval> {
        AddressInterval::from_ips(self.min_address, self.max_address)
    }
}

/// A fixed IP for a MAC: a DHCP reservation or an ARP binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientReservation {
    pub id: i64,
    pub mac: MacAddr,
    pub ip: Ipv4Addr,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientStat {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlHost {
    pub id: i64,
    pub mac: MacAddr,
}

impl AccessControlHost {
    /// How rules refer to this host.
    pub fn reference(&self) -> String {
        format!("host_{}", self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControlRule {
    pub id: i64,
    pub host_ref: String,
    pub enabled: bool,
}

pub trait Router {
    fn info(&self) -> Result<RouterInfo>;
    fn lan_config(&self) -> Result<LanConfig>;

    fn bandwidth_control(&self) -> Result<BandwidthControl>;
    fn bandwidth_entry(&self, id: i64) -> Result<BandwidthEntry>;
    /// Returns the id of the created entry.
    fn add_bandwidth_entry(&mut self, entry: NewBandwidthEntry) -> Result<i64>;
    fn delete_bandwidth_entry(&mut self, id: i64) -> Result<()>;

    fn dhcp_config(&self) -> Result<DhcpConfig>;
    fn update_dhcp_config(&mut self, config: DhcpConfig) -> Result<()>;

    fn address_reservations(&self) -> Result<Vec<ClientReservation>>;
    fn reserve_address(&mut self, mac: MacAddr, ip: Ipv4Addr) -> Result<()>;
    fn delete_reservation(&mut self, mac: MacAddr) -> Result<()>;
    fn ip_mac_bindings(&self) -> Result<Vec<ClientReservation>>;

    fn statistics(&self) -> Result<Vec<ClientStat>>;

    fn set_access_control(&mut self, enabled: bool, default_deny: bool) -> Result<()>;
    fn access_control_hosts(&self) -> Result<Vec<AccessControlHost>>;
    fn add_access_control_host(&mut self, mac: MacAddr) -> Result<AccessControlHost>;
    fn access_control_rules(&self) -> Result<Vec<AccessControlRule>>;
    fn add_access_control_rule(&mut self, host: &AccessControlHost) -> Result<i64>;
    fn delete_access_control_rule(&mut self, id: i64) -> Result<()>;
}
