//! Users, devices and bandwidth slots owned by routerman.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::mac::MacAddr;

mod json;

pub use json::JsonStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub user_id: i64,
    pub alias: String,
    pub mac: MacAddr,
}

/// A router bandwidth-control entry handed to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandwidthSlot {
    pub id: i64,
    pub user_id: i64,
    pub remote_id: i64,
}

/// Pages are 1-based; page 0 is treated as page 1.
pub fn page_offset(page_size: usize, page_number: usize) -> usize {
    page_number.saturating_sub(1) * page_size
}

pub trait UserStorage {
    fn create_user(&mut self, name: &str) -> Result<User>;
    fn read_user(&self, id: i64) -> Result<User>;
    fn read_users(&self, page_size: usize, page_number: usize) -> Result<Vec<User>>;
    fn delete_user(&mut self, id: i64) -> Result<()>;
}

pub trait DeviceStorage {
    fn create_device(&mut self, user_id: i64, alias: &str, mac: MacAddr) -> Result<Device>;
    fn read_device(&self, id: i64) -> Result<Device>;
    fn read_devices(&self, page_size: usize, page_number: usize) -> Result<Vec<Device>>;
    fn read_devices_by_user(
        &self,
        user_id: i64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<Device>>;
    fn read_devices_by_mac(&self, macs: &[MacAddr]) -> Result<Vec<Device>>;
    fn delete_device(&mut self, id: i64) -> Result<()>;
    fn delete_devices_by_user(&mut self, user_id: i64) -> Result<()>;
}

pub trait SlotStorage {
    fn create_slot(&mut self, user_id: i64, remote_id: i64) -> Result<BandwidthSlot>;
    fn read_slot(&self, id: i64) -> Result<BandwidthSlot>;
    fn read_slots(&self, page_size: usize, page_number: usize) -> Result<Vec<BandwidthSlot>>;
    fn read_slots_by_user(
        &self,
        user_id: i64,
        page_size: usize,
        page_number: usize,
    ) -> Result<Vec<BandwidthSlot>>;
    fn delete_slot(&mut self, id: i64) -> Result<()>;
    fn delete_slots_by_user(&mut self, user_id: i64) -> Result<()>;
}

/// Everything a session needs from persistence.
pub trait Store: UserStorage + DeviceStorage + SlotStorage {}

impl<T: UserStorage + DeviceStorage + SlotStorage> Store for T {}
