use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::*;
use crate::address::AddressInterval;
use crate::error::{Error, Result};
use crate::mac::MacAddr;
use crate::snapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    pub enabled: bool,
    pub default_deny: bool,
    pub hosts: Vec<AccessControlHost>,
    pub rules: Vec<AccessControlRule>,
}

/// Everything the router knows, as one serializable document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterState {
    pub info: RouterInfo,
    pub lan: LanConfig,
    pub bandwidth: BandwidthControl,
    pub dhcp: DhcpConfig,
    pub reservations: Vec<ClientReservation>,
    pub bindings: Vec<ClientReservation>,
    pub statistics: Vec<ClientStat>,
    pub access_control: AccessControl,
    #[serde(default)]
    next_id: i64,
}

impl Default for RouterState {
    fn default() -> Self {
        let ip = Ipv4Addr::new(192, 168, 0, 1);
        Self {
            info: RouterInfo {
                ip,
                mac: MacAddr([0x50, 0xC7, 0xBF, 0x00, 0x00, 0x01]),
                model: "snapshot".to_string(),
            },
            lan: LanConfig {
                ip,
                subnet_mask: Ipv4Addr::new(255, 255, 255, 0),
            },
            bandwidth: BandwidthControl {
                enabled: true,
                up_total: 80_000,
                down_total: 80_000,
                entries: Vec::new(),
            },
            dhcp: DhcpConfig {
                enabled: true,
                min_address: Ipv4Addr::new(192, 168, 0, 100),
                max_address: Ipv4Addr::new(192, 168, 0, 199),
                lease_minutes: 120,
            },
            reservations: Vec::new(),
            bindings: Vec::new(),
            statistics: Vec::new(),
            access_control: AccessControl {
                enabled: false,
                default_deny: false,
                hosts: Vec::new(),
                rules: Vec::new(),
            },
            next_id: 1,
        }
    }
}

impl RouterState {
    fn highest_id(&self) -> i64 {
        let entries = self.bandwidth.entries.iter().map(|e| e.id);
        let reservations = self.reservations.iter().map(|r| r.id);
        let hosts = self.access_control.hosts.iter().map(|h| h.id);
        let rules = self.access_control.rules.iter().map(|r| r.id);
        entries.chain(reservations).chain(hosts).chain(rules).max().unwrap_or(0)
    }

    // Hand-edited snapshots may lack the counter; never reuse an id.
    fn next_id(&mut self) -> i64 {
        self.next_id = self.next_id.max(self.highest_id() + 1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// A router whose configuration lives in a JSON file instead of behind a
/// management interface. Every mutation is written back before returning.
pub struct SnapshotRouter {
    path: Option<PathBuf>,
    state: RouterState,
}

impl SnapshotRouter {
    /// Open the snapshot at `path`, starting from defaults if it is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = snapshot::load(&path)?.unwrap_or_default();
        info!(path = %path.display(), "opened router snapshot");
        Ok(Self {
            path: Some(path),
            state,
        })
    }

    /// A router that is never written to disk.
    pub fn in_memory(state: RouterState) -> Self {
        Self { path: None, state }
    }

    pub fn state(&self) -> &RouterState {
        &self.state
    }

    fn commit(&self) -> Result<()> {
        match &self.path {
            Some(path) => snapshot::save(path, &self.state),
            None => Ok(()),
        }
    }
}

impl Router for SnapshotRouter {
    fn info(&self) -> Result<RouterInfo> {
        Ok(self.state.info.clone())
    }

    fn lan_config(&self) -> Result<LanConfig> {
        Ok(self.state.lan.clone())
    }

    fn bandwidth_control(&self) -> Result<BandwidthControl> {
        Ok(self.state.bandwidth.clone())
    }

    fn bandwidth_entry(&self, id: i64) -> Result<BandwidthEntry> {
        self.state
            .bandwidth
            .entries
            .iter()
            .find(|e| e.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("bandwidth entry", id))
    }

    fn add_bandwidth_entry(&mut self, entry: NewBandwidthEntry) -> Result<i64> {
        if let Some(clash) = self
            .state
            .bandwidth
            .entries
            .iter()
            .filter(|e| e.enabled)
            .find(|e| e.range().map(|r| r.overlaps(&entry.range)).unwrap_or(false))
        {
            return Err(Error::Router(format!(
                "range {} overlaps entry {}",
                entry.range, clash.id
            )));
        }
        let id = self.state.next_id();
        self.state.bandwidth.entries.push(BandwidthEntry {
            id,
            enabled: true,
            start_ip: entry.range.start_ip(),
            end_ip: entry.range.end_ip(),
            up_min: entry.up_min,
            up_max: entry.up_max,
            down_min: entry.down_min,
            down_max: entry.down_max,
        });
        self.commit()?;
        info!(id, range = %entry.range, "added bandwidth entry");
        Ok(id)
    }

    fn delete_bandwidth_entry(&mut self, id: i64) -> Result<()> {
        let entries = &mut self.state.bandwidth.entries;
        let before = entries.len();
        entries.retain(|e| e.id != id);
        if entries.len() == before {
            return Err(Error::not_found("bandwidth entry", id));
        }
        self.commit()?;
        info!(id, "deleted bandwidth entry");
        Ok(())
    }

    fn dhcp_config(&self) -> Result<DhcpConfig> {
        Ok(self.state.dhcp.clone())
    }

    fn update_dhcp_config(&mut self, config: DhcpConfig) -> Result<()> {
        config.pool()?;
        self.state.dhcp = config;
        self.commit()?;
        info!(
            min = %self.state.dhcp.min_address,
            max = %self.state.dhcp.max_address,
            "updated dhcp pool"
        );
        Ok(())
    }

    fn address_reservations(&self) -> Result<Vec<ClientReservation>> {
        Ok(self.state.reservations.clone())
    }

    fn reserve_address(&mut self, mac: MacAddr, ip: Ipv4Addr) -> Result<()> {
        if let Some(existing) = self
            .state
            .reservations
            .iter()
            .find(|r| r.mac == mac || r.ip == ip)
        {
            return Err(Error::Router(format!(
                "reservation {} already holds {} for {}",
                existing.id, existing.ip, existing.mac
            )));
        }
        let id = self.state.next_id();
        self.state.reservations.push(ClientReservation {
            id,
            mac,
            ip,
            enabled: true,
        });
        self.commit()?;
        info!(%mac, %ip, "reserved address");
        Ok(())
    }

    fn delete_reservation(&mut self, mac: MacAddr) -> Result<()> {
        let reservations = &mut self.state.reservations;
        let before = reservations.len();
        reservations.retain(|r| r.mac != mac);
        if reservations.len() == before {
            return Err(Error::not_found("address reservation", mac));
        }
        self.commit()?;
        info!(%mac, "deleted address reservation");
        Ok(())
    }

    fn ip_mac_bindings(&self) -> Result<Vec<ClientReservation>> {
        Ok(self.state.bindings.clone())
    }

    fn statistics(&self) -> Result<Vec<ClientStat>> {
        Ok(self.state.statistics.clone())
    }

    fn set_access_control(&mut self, enabled: bool, default_deny: bool) -> Result<()> {
        self.state.access_control.enabled = enabled;
        self.state.access_control.default_deny = default_deny;
        self.commit()
    }

    fn access_control_hosts(&self) -> Result<Vec<AccessControlHost>> {
        Ok(self.state.access_control.hosts.clone())
    }

    fn add_access_control_host(&mut self, mac: MacAddr) -> Result<AccessControlHost> {
        let host = AccessControlHost {
            id: self.state.next_id(),
            mac,
        };
        self.state.access_control.hosts.push(host.clone());
        self.commit()?;
        Ok(host)
    }

    fn access_control_rules(&self) -> Result<Vec<AccessControlRule>> {
        Ok(self.state.access_control.rules.clone())
    }

    fn add_access_control_rule(&mut self, host: &AccessControlHost) -> Result<i64> {
        let id = self.state.next_id();
        self.state.access_control.rules.push(AccessControlRule {
            id,
            host_ref: host.reference(),
            enabled: true,
        });
        self.commit()?;
        Ok(id)
    }

    fn delete_access_control_rule(&mut self, id: i64) -> Result<()> {
        let rules = &mut self.state.access_control.rules;
        let before = rules.len();
        rules.retain(|r| r.id != id);
        if rules.len() == before {
            return Err(Error::not_found("access control rule", id));
        }
        self.commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: [u8; 4], end: [u8; 4]) -> NewBandwidthEntry {
        NewBandwidthEntry {
            range: AddressInterval::from_ips(start.into(), end.into()).unwrap(),
            up_min: 50,
            up_max: 1000,
            down_min: 50,
            down_max: 1000,
        }
    }

    #[test]
    fn test_entries_get_fresh_ids_and_reject_overlap() {
        let mut router = SnapshotRouter::in_memory(RouterState::default());
        let a = router.add_bandwidth_entry(entry([192, 168, 0, 10], [192, 168, 0, 12])).unwrap();
        let b = router.add_bandwidth_entry(entry([192, 168, 0, 13], [192, 168, 0, 13])).unwrap();
        assert_ne!(a, b);
        assert!(matches!(
            router.add_bandwidth_entry(entry([192, 168, 0, 12], [192, 168, 0, 20])),
            Err(Error::Router(_))
        ));
        router.delete_bandwidth_entry(a).unwrap();
        assert!(matches!(
            router.bandwidth_entry(a),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn test_state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.json");
        let mac: MacAddr = "AA:BB:CC:DD:EE:01".parse().unwrap();
        {
            let mut router = SnapshotRouter::open(&path).unwrap();
            router.reserve_address(mac, Ipv4Addr::new(192, 168, 0, 20)).unwrap();
        }
        let router = SnapshotRouter::open(&path).unwrap();
        let reservations = router.address_reservations().unwrap();
        assert_eq!(reservations.len(), 1);
        assert_eq!(reservations[0].mac, mac);
    }

    #[test]
    fn test_duplicate_reservation_rejected() {
        let mut router = SnapshotRouter::in_memory(RouterState::default());
        let mac: MacAddr = "AA:BB:CC:DD:EE:01".parse().unwrap();
        let other: MacAddr = "AA:BB:CC:DD:EE:02".parse().unwrap();
        router.reserve_address(mac, Ipv4Addr::new(192, 168, 0, 20)).unwrap();
        assert!(router.reserve_address(other, Ipv4Addr::new(192, 168, 0, 20)).is_err());
        router.delete_reservation(mac).unwrap();
        assert!(matches!(router.delete_reservation(mac), Err(Error::NotFound { .. })));
    }
}
