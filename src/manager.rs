//! Workflows that span the router and the local store.

use std::net::Ipv4Addr;

use tracing::{debug, info, warn};

use crate::address::{ip_to_int, AddressInterval};
use crate::error::{ActionError, Error, Result};
use crate::mac::MacAddr;
use crate::router::{BandwidthEntry, ClientReservation, NewBandwidthEntry, Router};
use crate::slots::{
    compute_free_slots, place_range, subnet_bound, unused_address, AllocatedRange, BoundPolicy,
    BwSlot,
};
use crate::storage::{BandwidthSlot, Device, Store, User};

pub const MIN_SPEED_KBPS: u32 = 50;
pub const DEFAULT_SPEED_KBPS: u32 = 1000;

/// Operator answers for carving a bandwidth entry out of a free slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotRequest {
    /// `None` starts at the slot's first address.
    pub start: Option<Ipv4Addr>,
    pub devices: u64,
    pub max_up_kbps: u32,
    pub max_down_kbps: u32,
}

/// A client the router currently sees, matched against known devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedClient {
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    pub alias: Option<String>,
    pub owner: Option<String>,
}

/// Outcome of registering a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub ip: Ipv4Addr,
    /// `None` when a device with that MAC was already stored.
    pub device: Option<Device>,
}

pub struct Manager<R, S> {
    router: R,
    store: S,
}

impl<R: Router, S: Store> Manager<R, S> {
    pub fn new(router: R, store: S) -> Self {
        Self { router, store }
    }

    pub fn router(&self) -> &R {
        &self.router
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register_user(&mut self, name: &str) -> Result<User> {
        self.store.create_user(name)
    }

    /// Free address runs within the chosen bound.
    pub fn available_slots(&self, policy: BoundPolicy) -> Result<Vec<BwSlot>> {
        let info = self.router.info()?;
        let bound = match policy {
            BoundPolicy::Dhcp => self.router.dhcp_config()?.pool()?,
            BoundPolicy::Subnet => subnet_bound(info.ip, self.router.lan_config()?.prefix()?)?,
        };
        let allocated = self
            .router
            .bandwidth_control()?
            .entries
            .iter()
            .map(|e| {
                Ok(AllocatedRange {
                    interval: e.range()?,
                    enabled: e.enabled,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(?policy, %bound, "listing available slots");
        Ok(compute_free_slots(bound, Some(ip_to_int(info.ip)), &allocated))
    }

    /// Router entries for `ids`, in the same order.
    pub fn entries_by_ids(&self, ids: &[i64]) -> Result<Vec<BandwidthEntry>> {
        let entries = self.router.bandwidth_control()?.entries;
        ids.iter()
            .map(|id| {
                entries
                    .iter()
                    .find(|e| e.id == *id)
                    .cloned()
                    .ok_or_else(|| Error::not_found("bandwidth entry", id))
            })
            .collect()
    }

    /// One page of a user's slots with their router entries.
    pub fn user_slots(
        &self,
        user_id: i64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<(BandwidthSlot, BandwidthEntry)>> {
        let slots = self.store.read_slots_by_user(user_id, page_size, page_number)?;
        let ids: Vec<i64> = slots.iter().map(|s| s.remote_id).collect();
        let entries = self.entries_by_ids(&ids)?;
        Ok(slots.into_iter().zip(entries).collect())
    }

    /// First address of a slot's router entry that has no reservation yet.
    pub fn unused_address(&self, remote_id: i64) -> Result<Ipv4Addr> {
        let range = self.router.bandwidth_entry(remote_id)?.range()?;
        let reserved: Vec<u32> = self
            .router
            .address_reservations()?
            .iter()
            .map(|r| ip_to_int(r.ip))
            .collect();
        unused_address(range, &reserved).map(Ipv4Addr::from)
    }

    /// Create a router entry for part of `slot` and record it for the user.
    pub fn assign_slot(
        &mut self,
        user_id: i64,
        slot: &BwSlot,
        request: &SlotRequest,
    ) -> std::result::Result<BandwidthSlot, ActionError> {
        self.store.read_user(user_id)?;

        if request.devices < 1 || request.devices > slot.capacity() {
            return Err(ActionError::recoverable(format!(
                "invalid number of devices '{}'",
                request.devices
            )));
        }
        if request.max_up_kbps < MIN_SPEED_KBPS || request.max_down_kbps < MIN_SPEED_KBPS {
            return Err(ActionError::recoverable(format!(
                "speeds must be at least {MIN_SPEED_KBPS} kbps"
            )));
        }

        let start = request.start.map(ip_to_int);
        let range = place_range(slot, start, request.devices)?
            .map_err(|placement| ActionError::recoverable(placement.to_string()))?;

        let remote_id = self.router.add_bandwidth_entry(NewBandwidthEntry {
            range,
            up_min: MIN_SPEED_KBPS,
            up_max: request.max_up_kbps,
            down_min: MIN_SPEED_KBPS,
            down_max: request.max_down_kbps,
        })?;

        // An entry no stored slot points at could never be deleted from the menu.
        let stored = match self.store.create_slot(user_id, remote_id) {
            Ok(stored) => stored,
            Err(e) => {
                self.discard_entry(remote_id);
                return Err(e.into());
            }
        };
        if let Err(e) = self.shrink_dhcp_pool(range) {
            if let Err(cleanup) = self.store.delete_slot(stored.id) {
                warn!(slot_id = stored.id, error = %cleanup, "could not remove bandwidth slot");
            }
            self.discard_entry(remote_id);
            return Err(e.into());
        }

        info!(user_id, remote_id, %range, "assigned bandwidth slot");
        Ok(stored)
    }

    fn discard_entry(&mut self, remote_id: i64) {
        if let Err(e) = self.router.delete_bandwidth_entry(remote_id) {
            warn!(remote_id, error = %e, "could not remove bandwidth entry");
        }
    }

    // Keep the DHCP pool from handing out addresses at the start of a
    // freshly assigned range.
    fn shrink_dhcp_pool(&mut self, range: AddressInterval) -> Result<()> {
        let mut dhcp = self.router.dhcp_config()?;
        let pool = dhcp.pool()?;
        if !range.contains(pool.start()) || range.end() >= pool.end() {
            return Ok(());
        }
        dhcp.min_address = Ipv4Addr::from(range.end() + 1);
        self.router.update_dhcp_config(dhcp)
    }

    /// Reserve the next free address of the slot for `mac` and store the device.
    pub fn register_device(
        &mut self,
        user_id: i64,
        slot_id: i64,
        mac: MacAddr,
        alias: &str,
    ) -> std::result::Result<Registration, ActionError> {
        let slot = self.store.read_slot(slot_id)?;
        self.store.read_user(user_id)?;

        if mac.is_multicast() {
            return Err(ActionError::recoverable("multicast addresses not allowed"));
        }

        if let Some(existing) = self
            .router
            .address_reservations()?
            .into_iter()
            .find(|r| r.mac == mac)
        {
            return Err(ActionError::recoverable(format!(
                "mac address '{mac}' already has a reservation for {}",
                existing.ip
            )));
        }

        let known = !self.store.read_devices_by_mac(&[mac])?.is_empty();
        let ip = self.unused_address(slot.remote_id)?;
        self.router.reserve_address(mac, ip)?;

        let device = if known {
            warn!(%mac, "device already registered");
            None
        } else {
            Some(self.store.create_device(user_id, alias, mac)?)
        };
        Ok(Registration { ip, device })
    }

    /// Revoke the device's reservation and forget it.
    pub fn deregister_device(&mut self, device_id: i64) -> Result<Device> {
        let device = self.store.read_device(device_id)?;
        self.router.delete_reservation(device.mac)?;
        self.store.delete_device(device_id)?;
        info!(device_id, mac = %device.mac, "deregistered device");
        Ok(device)
    }

    pub fn delete_slot(&mut self, slot_id: i64) -> Result<()> {
        let slot = self.store.read_slot(slot_id)?;
        self.router.delete_bandwidth_entry(slot.remote_id)?;
        self.store.delete_slot(slot_id)?;
        info!(slot_id, remote_id = slot.remote_id, "deleted bandwidth slot");
        Ok(())
    }

    /// Remove the user with all their slots and devices, on the router too.
    pub fn deregister_user(&mut self, user_id: i64) -> Result<User> {
        let user = self.store.read_user(user_id)?;

        for slot in all_pages(|size, n| self.store.read_slots_by_user(user_id, size, n))? {
            match self.router.delete_bandwidth_entry(slot.remote_id) {
                Err(Error::NotFound { .. }) => {
                    warn!(remote_id = slot.remote_id, "bandwidth entry already gone")
                }
                other => other?,
            }
        }
        for device in all_pages(|size, n| self.store.read_devices_by_user(user_id, size, n))? {
            match self.router.delete_reservation(device.mac) {
                Err(Error::NotFound { .. }) => {
                    debug!(mac = %device.mac, "device had no reservation")
                }
                other => other?,
            }
        }

        self.store.delete_slots_by_user(user_id)?;
        self.store.delete_devices_by_user(user_id)?;
        self.store.delete_user(user_id)?;
        info!(user_id, name = %user.name, "deregistered user");
        Ok(user)
    }

    /// Deny internet access for `mac` through a MAC access-control rule.
    pub fn block_device(&mut self, mac: MacAddr) -> Result<()> {
        self.router.set_access_control(true, false)?;

        let existing = self
            .router
            .access_control_hosts()?
            .into_iter()
            .find(|h| h.mac == mac);
        let host = match existing {
            Some(host) => host,
            None => self.router.add_access_control_host(mac)?,
        };

        let reference = host.reference();
        if self
            .router
            .access_control_rules()?
            .iter()
            .any(|r| r.host_ref == reference)
        {
            debug!(%mac, "device already blocked");
            return Ok(());
        }
        self.router.add_access_control_rule(&host)?;
        info!(%mac, "blocked device");
        Ok(())
    }

    pub fn unblock_device(&mut self, mac: MacAddr) -> std::result::Result<(), ActionError> {
        let host = self
            .router
            .access_control_hosts()?
            .into_iter()
            .find(|h| h.mac == mac)
            .ok_or_else(|| ActionError::recoverable(format!("host with mac '{mac}' not found")))?;

        let reference = host.reference();
        let rule = self
            .router
            .access_control_rules()?
            .into_iter()
            .find(|r| r.host_ref == reference)
            .ok_or_else(|| {
                ActionError::recoverable(format!("rule for host with ref '{reference}' not found"))
            })?;

        self.router.delete_access_control_rule(rule.id)?;
        info!(%mac, "unblocked device");
        Ok(())
    }

    /// Stored devices whose MAC currently has a blocking rule.
    pub fn blocked_devices(&self) -> Result<Vec<Device>> {
        let rules = self.router.access_control_rules()?;
        if rules.is_empty() {
            return Ok(Vec::new());
        }
        let macs: Vec<MacAddr> = self
            .router
            .access_control_hosts()?
            .into_iter()
            .filter(|h| rules.iter().any(|r| r.host_ref == h.reference()))
            .map(|h| h.mac)
            .collect();
        self.store.read_devices_by_mac(&macs)
    }

    /// Name of the user owning a device; `None` when that user is gone.
    pub fn owner_name(&self, user_id: i64) -> Result<Option<String>> {
        match self.store.read_user(user_id) {
            Ok(user) => Ok(Some(user.name)),
            Err(Error::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn connected_clients(&self) -> Result<Vec<ConnectedClient>> {
        let stats = self.router.statistics()?;
        let macs: Vec<MacAddr> = stats.iter().map(|s| s.mac).collect();
        let devices = self.store.read_devices_by_mac(&macs)?;

        stats
            .into_iter()
            .map(|stat| {
                let device = devices.iter().find(|d| d.mac == stat.mac);
                let owner = match device {
                    Some(d) => self.owner_name(d.user_id)?,
                    None => None,
                };
                Ok(ConnectedClient {
                    ip: stat.ip,
                    mac: stat.mac,
                    alias: device.map(|d| d.alias.clone()),
                    owner,
                })
            })
            .collect()
    }

    pub fn ip_mac_bindings(&self) -> Result<Vec<ClientReservation>> {
        self.router.ip_mac_bindings()
    }

    pub fn address_reservations(&self) -> Result<Vec<ClientReservation>> {
        self.router.address_reservations()
    }
}

fn all_pages<T>(mut fetch: impl FnMut(usize, usize) -> Result<Vec<T>>) -> Result<Vec<T>> {
    const CHUNK: usize = 100;
    let mut all = Vec::new();
    for page_number in 1.. {
        let page = fetch(CHUNK, page_number)?;
        let done = page.len() < CHUNK;
        all.extend(page);
        if done {
            break;
        }
    }
    Ok(all)
}
