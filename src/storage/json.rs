use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::*;
use crate::error::{Error, Result};
use crate::mac::MacAddr;
use crate::snapshot;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Database {
    users: Vec<User>,
    devices: Vec<Device>,
    slots: Vec<BandwidthSlot>,
    next_id: i64,
}

impl Database {
    fn next_id(&mut self) -> i64 {
        self.next_id = self.next_id.max(1);
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

fn page<T: Clone>(items: impl Iterator<Item = T>, page_size: usize, page_number: usize) -> Vec<T> {
    items
        .skip(page_offset(page_size, page_number))
        .take(page_size)
        .collect()
}

/// All records in one JSON document, rewritten after each change.
/// Records are kept in id order, so pages are stable.
pub struct JsonStore {
    path: Option<PathBuf>,
    db: Database,
}

impl JsonStore {
    /// Open an existing store. A missing file means `db --init` was never run.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let db = snapshot::load(&path)?
            .ok_or_else(|| Error::not_found("database", path.display()))?;
        Ok(Self {
            path: Some(path),
            db,
        })
    }

    /// Create an empty store at `path` unless one already exists.
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        match snapshot::load::<Database>(&path)? {
            Some(db) => Ok(Self {
                path: Some(path),
                db,
            }),
            None => {
                let store = Self {
                    path: Some(path),
                    db: Database::default(),
                };
                store.commit()?;
                info!(path = ?store.path, "initialised database");
                Ok(store)
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            db: Database::default(),
        }
    }

    fn commit(&self) -> Result<()> {
        match &self.path {
            Some(path) => snapshot::save(path, &self.db),
            None => Ok(()),
        }
    }
}

impl UserStorage for JsonStore {
    fn create_user(&mut self, name: &str) -> Result<User> {
        let user = User {
            id: self.db.next_id(),
            name: name.to_string(),
        };
        self.db.users.push(user.clone());
        self.commit()?;
        info!(id = user.id, name, "created user");
        Ok(user)
    }

    fn read_user(&self, id: i64) -> Result<User> {
        self.db
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("user", id))
    }

    fn read_users(&self, page_size: usize, page_number: usize) -> Result<Vec<User>> {
        Ok(page(self.db.users.iter().cloned(), page_size, page_number))
    }

    fn delete_user(&mut self, id: i64) -> Result<()> {
        self.db.users.retain(|u| u.id != id);
        self.commit()
    }
}

impl DeviceStorage for JsonStore {
    fn create_device(&mut self, user_id: i64, alias: &str, mac: MacAddr) -> Result<Device> {
        let device = Device {
            id: self.db.next_id(),
            user_id,
            alias: alias.to_string(),
            mac,
        };
        self.db.devices.push(device.clone());
        self.commit()?;
        info!(id = device.id, user_id, %mac, "created device");
        Ok(device)
    }

    fn read_device(&self, id: i64) -> Result<Device> {
        self.db
            .devices
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("device", id))
    }

    fn read_devices(&self, page_size: usize, page_number: usize) -> Result<Vec<Device>> {
        Ok(page(self.db.devices.iter().cloned(), page_size, page_number))
    }

    fn read_devices_by_user(
        &self,
        user_id: i64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<Device>> {
        let owned = self.db.devices.iter().filter(|d| d.user_id == user_id).cloned();
        Ok(page(owned, page_size, page_number))
    }

    fn read_devices_by_mac(&self, macs: &[MacAddr]) -> Result<Vec<Device>> {
        Ok(self
            .db
            .devices
            .iter()
            .filter(|d| macs.contains(&d.mac))
            .cloned()
            .collect())
    }

    fn delete_device(&mut self, id: i64) -> Result<()> {
        self.db.devices.retain(|d| d.id != id);
        self.commit()
    }

    fn delete_devices_by_user(&mut self, user_id: i64) -> Result<()> {
        self.db.devices.retain(|d| d.user_id != user_id);
        self.commit()
    }
}

impl SlotStorage for JsonStore {
    fn create_slot(&mut self, user_id: i64, remote_id: i64) -> Result<BandwidthSlot> {
        let slot = BandwidthSlot {
            id: self.db.next_id(),
            user_id,
            remote_id,
        };
        self.db.slots.push(slot.clone());
        self.commit()?;
        info!(id = slot.id, user_id, remote_id, "created bandwidth slot");
        Ok(slot)
    }

    fn read_slot(&self, id: i64) -> Result<BandwidthSlot> {
        self.db
            .slots
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("bandwidth slot", id))
    }

    fn read_slots(&self, page_size: usize, page_number: usize) -> Result<Vec<BandwidthSlot>> {
        Ok(page(self.db.slots.iter().cloned(), page_size, page_number))
    }

    fn read_slots_by_user(
        &self,
        user_id: i64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<BandwidthSlot>> {
        let owned = self.db.slots.iter().filter(|s| s.user_id == user_id).cloned();
        Ok(page(owned, page_size, page_number))
    }

    fn delete_slot(&mut self, id: i64) -> Result<()> {
        self.db.slots.retain(|s| s.id != id);
        self.commit()
    }

    fn delete_slots_by_user(&mut self, user_id: i64) -> Result<()> {
        self.db.slots.retain(|s| s.user_id != user_id);
        self.commit()
    }
}
