//! The routerman menu tree and the executor that runs its actions.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use tabled::Tabled;
use tracing::debug;

use crate::console::Console;
use crate::context::{Context, ContextKey::*};
use crate::error::{self, ActionError, Error};
use crate::export::{self, BINDINGS_FILE, RESERVATIONS_FILE};
use crate::mac::MacAddr;
use crate::manager::{Manager, SlotRequest, DEFAULT_SPEED_KBPS};
use crate::menu::{ActionNode, Executor, Navigation};
use crate::navigator::run_menu;
use crate::pager::{browse, Browse, PageSpec};
use crate::router::Router;
use crate::slots::{BoundPolicy, BwSlot};
use crate::storage::{page_offset, Store};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Action {
    RegisterUser,
    ListUsers,
    ListUserSlots,
    AssignSlot,
    RegisterDevice,
    DeleteSlot,
    /// With `by_user` the listing is limited to the selected user.
    ListDevices { by_user: bool },
    DeregisterDevice,
    BlockDevice,
    UnblockDevice,
    DeregisterUser,
    ListAvailableSlots,
    ShowConnectedDevices,
    ExportBindings,
    ExportReservations,
    ListBlockedDevices,
}

fn device_actions() -> Vec<ActionNode<Action>> {
    vec![
        ActionNode::leaf("Deregister device", Action::DeregisterDevice).requires(&[DeviceId]),
        ActionNode::leaf("Block device", Action::BlockDevice).requires(&[DeviceId]),
        ActionNode::leaf("Unblock device", Action::UnblockDevice).requires(&[DeviceId]),
    ]
}

/// Top-level menu entries, ending with the quit entry.
pub fn action_tree() -> Vec<ActionNode<Action>> {
    let user_actions = vec![
        ActionNode::leaf("List user bandwidth slots", Action::ListUserSlots)
            .requires(&[UserId])
            .with_children(vec![
                ActionNode::leaf("Register a device", Action::RegisterDevice)
                    .requires(&[UserId, SlotId]),
                ActionNode::leaf("Delete slot", Action::DeleteSlot).requires(&[SlotId]),
            ]),
        ActionNode::leaf("Assign bandwidth slot", Action::AssignSlot).requires(&[UserId]),
        ActionNode::leaf("List devices", Action::ListDevices { by_user: true })
            .requires(&[UserId])
            .with_children(device_actions()),
        ActionNode::leaf("Deregister user", Action::DeregisterUser).requires(&[UserId]),
    ];

    vec![
        ActionNode::branch(
            "Manage users",
            vec![
                ActionNode::leaf("Register a user", Action::RegisterUser),
                ActionNode::leaf("List users", Action::ListUsers).with_children(user_actions),
                ActionNode::leaf("List available bandwidth slots", Action::ListAvailableSlots),
            ],
        ),
        ActionNode::branch(
            "Manage devices",
            vec![
                ActionNode::leaf("List devices", Action::ListDevices { by_user: false })
                    .with_children(device_actions()),
                ActionNode::leaf("Show connected devices", Action::ShowConnectedDevices),
                ActionNode::leaf("Export ARP bindings", Action::ExportBindings),
                ActionNode::leaf("Export DHCP address reservations", Action::ExportReservations),
            ],
        ),
        ActionNode::branch(
            "Manage internet access",
            vec![ActionNode::leaf("List blocked devices", Action::ListBlockedDevices)],
        ),
        ActionNode::quit(),
    ]
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub page_size: usize,
    pub bound_policy: BoundPolicy,
    /// Where exported CSV files are written.
    pub export_dir: PathBuf,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            bound_policy: BoundPolicy::default(),
            export_dir: PathBuf::from("."),
        }
    }
}

/// One operator session over a router and a store.
pub struct Session<R, S> {
    manager: Manager<R, S>,
    settings: SessionSettings,
}

#[derive(Tabled)]
struct BlockedRow {
    #[tabled(rename = "Alias")]
    alias: String,
    #[tabled(rename = "MAC")]
    mac: MacAddr,
    #[tabled(rename = "Owner")]
    owner: String,
}

// Operator typos are shown and the menu is redrawn; anything else ends the session.
fn soft(e: Error) -> ActionError {
    if e.is_input() {
        ActionError::Recoverable(e.to_string())
    } else {
        ActionError::Fatal(e)
    }
}

fn selected(id: Option<i64>, what: &str) -> Result<i64, ActionError> {
    id.ok_or_else(|| ActionError::recoverable(format!("no {what} selected")))
}

fn page_of<T: Clone>(items: &[T], page_size: usize, page_number: usize) -> Vec<T> {
    items
        .iter()
        .skip(page_offset(page_size, page_number))
        .take(page_size)
        .cloned()
        .collect()
}

fn prompt_kbps<C: Console>(console: &mut C, label: &str) -> error::Result<u32> {
    let label = format!("Enter max {label} speed in kbps [Default {DEFAULT_SPEED_KBPS}]: ");
    let value = console.prompt_u64(&label, u64::from(DEFAULT_SPEED_KBPS))?;
    u32::try_from(value).map_err(|_| Error::InvalidInput)
}

impl<R: Router, S: Store> Session<R, S> {
    pub fn new(manager: Manager<R, S>, settings: SessionSettings) -> Self {
        Self { manager, settings }
    }

    pub fn manager(&self) -> &Manager<R, S> {
        &self.manager
    }

    fn spec(&self, items: &'static str, selectable: bool) -> PageSpec {
        PageSpec {
            items,
            page_size: self.settings.page_size,
            selectable,
        }
    }

    /// Run the interactive menu until the operator quits.
    pub fn run<C: Console>(&mut self, console: &mut C) -> error::Result<()> {
        let tree = action_tree();
        let roots: Vec<&ActionNode<Action>> = tree.iter().collect();
        let mut ctx = Context::new();
        run_menu(console, self, &mut ctx, &roots)?;
        Ok(())
    }

    fn register_user<C: Console>(&mut self, console: &mut C) -> Result<Navigation, ActionError> {
        let name = console.prompt("Enter user name: ")?;
        if name.is_empty() {
            return Err(soft(Error::InvalidInput));
        }
        let user = self.manager.register_user(&name)?;
        console.println(&format!("Registered user '{}' with id {}", user.name, user.id))?;
        Ok(Navigation::Advance)
    }

    fn list_users<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let store = self.manager.store();
        let picked = browse(
            console,
            self.spec("users", true),
            |size, n| store.read_users(size, n),
            |u| format!("{} (id {})", u.name, u.id),
        )?;
        match picked {
            Browse::Selected(user) => {
                ctx.clear_user();
                ctx.user_id = Some(user.id);
                console.println(&format!("Selected user '{}'", user.name))?;
                Ok(Navigation::Advance)
            }
            Browse::Quit | Browse::Empty => Ok(Navigation::Repeat),
        }
    }

    fn list_user_slots<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let user_id = selected(ctx.user_id, "user")?;
        let manager = &self.manager;
        let picked = browse(
            console,
            self.spec("bandwidth slots", true),
            |size, n| manager.user_slots(user_id, size, n),
            |(_, entry)| {
                format!(
                    "{} - {} (down {} / up {} kbps)",
                    entry.start_ip, entry.end_ip, entry.down_max, entry.up_max
                )
            },
        )?;
        match picked {
            Browse::Selected((slot, _)) => {
                ctx.slot_id = Some(slot.id);
                Ok(Navigation::Advance)
            }
            Browse::Quit | Browse::Empty => Ok(Navigation::Repeat),
        }
    }

    fn assign_slot<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let user_id = selected(ctx.user_id, "user")?;
        let slots = self.manager.available_slots(self.settings.bound_policy)?;
        let picked = browse(
            console,
            self.spec("bandwidth slots", true),
            |size, n| Ok(page_of(&slots, size, n)),
            BwSlot::to_string,
        )?;
        let slot = match picked {
            Browse::Selected(slot) => slot,
            Browse::Quit | Browse::Empty => return Ok(Navigation::Repeat),
        };

        let capacity = slot.capacity();
        let devices = console
            .prompt_u64(
                &format!("Enter number of devices [Default {capacity}]: "),
                capacity,
            )
            .map_err(soft)?;

        let start_text = console.prompt(&format!(
            "Enter start IP address [Default {}]: ",
            slot.min_address()
        ))?;
        let start = if start_text.is_empty() {
            None
        } else {
            let ip = start_text.parse::<Ipv4Addr>().map_err(|_| {
                ActionError::recoverable(format!("invalid IPv4 address '{start_text}'"))
            })?;
            Some(ip)
        };

        let max_down_kbps = prompt_kbps(console, "download").map_err(soft)?;
        let max_up_kbps = prompt_kbps(console, "upload").map_err(soft)?;

        let request = SlotRequest {
            start,
            devices,
            max_up_kbps,
            max_down_kbps,
        };
        let stored = self.manager.assign_slot(user_id, &slot, &request)?;
        console.println(&format!("Assigned bandwidth slot {}", stored.id))?;
        Ok(Navigation::Advance)
    }

    fn register_device<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let user_id = selected(ctx.user_id, "user")?;
        let slot_id = selected(ctx.slot_id, "bandwidth slot")?;

        let mac = loop {
            let text = console.prompt("Enter MAC address: ")?;
            match text.parse::<MacAddr>() {
                Ok(mac) => break mac,
                Err(e) => console.println(&format!("{e}, try again"))?,
            }
        };
        let alias = console.prompt("Enter device alias: ")?;

        let registration = self.manager.register_device(user_id, slot_id, mac, &alias)?;
        console.println(&format!("Reserved {} for {}", registration.ip, mac))?;
        if registration.device.is_none() {
            console.println(&format!("Device with mac '{mac}' was already registered"))?;
        }
        Ok(Navigation::Advance)
    }

    fn delete_slot<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let slot_id = selected(ctx.slot_id, "bandwidth slot")?;
        self.manager.delete_slot(slot_id)?;
        ctx.slot_id = None;
        console.println("Deleted bandwidth slot")?;
        Ok(Navigation::Back)
    }

    fn list_devices<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
        by_user: bool,
    ) -> Result<Navigation, ActionError> {
        let owner = if by_user { ctx.user_id } else { None };
        let store = self.manager.store();
        let picked = browse(
            console,
            self.spec("devices", true),
            |size, n| match owner {
                Some(user_id) => store.read_devices_by_user(user_id, size, n),
                None => store.read_devices(size, n),
            },
            |d| format!("{} ({})", d.alias, d.mac),
        )?;
        match picked {
            Browse::Selected(device) => {
                ctx.device_id = Some(device.id);
                Ok(Navigation::Advance)
            }
            Browse::Quit | Browse::Empty => Ok(Navigation::Repeat),
        }
    }

    fn deregister_device<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let device_id = selected(ctx.device_id, "device")?;
        let device = self.manager.deregister_device(device_id)?;
        ctx.device_id = None;
        console.println(&format!("Deregistered device '{}'", device.alias))?;
        Ok(Navigation::Back)
    }

    fn set_blocked<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
        blocked: bool,
    ) -> Result<Navigation, ActionError> {
        let device_id = selected(ctx.device_id, "device")?;
        let device = self.manager.store().read_device(device_id)?;
        if blocked {
            self.manager.block_device(device.mac)?;
            console.println(&format!("Blocked device '{}'", device.alias))?;
        } else {
            self.manager.unblock_device(device.mac)?;
            console.println(&format!("Unblocked device '{}'", device.alias))?;
        }
        Ok(Navigation::Advance)
    }

    fn deregister_user<C: Console>(
        &mut self,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        let user_id = selected(ctx.user_id, "user")?;
        let user = self.manager.deregister_user(user_id)?;
        ctx.clear_user();
        console.println(&format!("Deregistered user '{}'", user.name))?;
        Ok(Navigation::Back)
    }

    fn list_available_slots<C: Console>(&mut self, console: &mut C) -> Result<Navigation, ActionError> {
        let slots = self.manager.available_slots(self.settings.bound_policy)?;
        browse(
            console,
            self.spec("bandwidth slots", false),
            |size, n| Ok(page_of(&slots, size, n)),
            BwSlot::to_string,
        )?;
        Ok(Navigation::Advance)
    }

    fn show_connected<C: Console>(&mut self, console: &mut C) -> Result<Navigation, ActionError> {
        let clients = self.manager.connected_clients()?;
        browse(
            console,
            self.spec("connected devices", false),
            |size, n| Ok(page_of(&clients, size, n)),
            |c| {
                format!(
                    "{:<15}  {}  {}  {}",
                    c.ip,
                    c.mac,
                    c.alias.as_deref().unwrap_or("Unknown"),
                    c.owner.as_deref().unwrap_or("Unknown")
                )
            },
        )?;
        Ok(Navigation::Advance)
    }

    fn export<C: Console>(&mut self, console: &mut C, bindings: bool) -> Result<Navigation, ActionError> {
        let (rows, file) = if bindings {
            (self.manager.ip_mac_bindings()?, BINDINGS_FILE)
        } else {
            (self.manager.address_reservations()?, RESERVATIONS_FILE)
        };
        let path = self.settings.export_dir.join(file);
        let count = export::export_to(&path, &rows)?;
        console.println(&format!("Exported {count} entries to {}", path.display()))?;
        Ok(Navigation::Advance)
    }

    fn list_blocked<C: Console>(&mut self, console: &mut C) -> Result<Navigation, ActionError> {
        let devices = self.manager.blocked_devices()?;
        if devices.is_empty() {
            console.println("no blocked devices found")?;
            return Ok(Navigation::Advance);
        }
        let rows = devices
            .into_iter()
            .map(|d| {
                Ok(BlockedRow {
                    owner: self
                        .manager
                        .owner_name(d.user_id)?
                        .unwrap_or_else(|| "Unknown".to_string()),
                    alias: d.alias,
                    mac: d.mac,
                })
            })
            .collect::<error::Result<Vec<_>>>()?;
        console.print_table(rows)?;
        Ok(Navigation::Advance)
    }
}

impl<R: Router, S: Store> Executor<Action> for Session<R, S> {
    fn execute<C: Console>(
        &mut self,
        action: &Action,
        console: &mut C,
        ctx: &mut Context,
    ) -> Result<Navigation, ActionError> {
        debug!(?action, ?ctx, "executing");
        match *action {
            Action::RegisterUser => self.register_user(console),
            Action::ListUsers => self.list_users(console, ctx),
            Action::ListUserSlots => self.list_user_slots(console, ctx),
            Action::AssignSlot => self.assign_slot(console, ctx),
            Action::RegisterDevice => self.register_device(console, ctx),
            Action::DeleteSlot => self.delete_slot(console, ctx),
            Action::ListDevices { by_user } => self.list_devices(console, ctx, by_user),
            Action::DeregisterDevice => self.deregister_device(console, ctx),
            Action::BlockDevice => self.set_blocked(console, ctx, true),
            Action::UnblockDevice => self.set_blocked(console, ctx, false),
            Action::DeregisterUser => self.deregister_user(console, ctx),
            Action::ListAvailableSlots => self.list_available_slots(console),
            Action::ShowConnectedDevices => self.show_connected(console),
            Action::ExportBindings => self.export(console, true),
            Action::ExportReservations => self.export(console, false),
            Action::ListBlockedDevices => self.list_blocked(console),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find<'a>(nodes: &'a [ActionNode<Action>], name: &str) -> &'a ActionNode<Action> {
        nodes.iter().find(|n| n.name == name).unwrap()
    }

    #[test]
    fn test_root_ends_with_quit() {
        let tree = action_tree();
        let names: Vec<&str> = tree.iter().map(|n| n.name).collect();
        assert_eq!(
            names,
            ["Manage users", "Manage devices", "Manage internet access", "Quit"]
        );
        assert!(tree[3].is_quit());
    }

    #[test]
    fn test_user_menu_gated_on_selection() {
        let tree = action_tree();
        let users = find(&find(&tree, "Manage users").children, "List users");

        let mut ctx = Context::new();
        assert!(users.valid_children(&ctx).is_empty());

        ctx.user_id = Some(1);
        let names: Vec<&str> = users.valid_children(&ctx).iter().map(|n| n.name).collect();
        assert_eq!(
            names,
            [
                "List user bandwidth slots",
                "Assign bandwidth slot",
                "List devices",
                "Deregister user"
            ]
        );

        let slots = find(&users.children, "List user bandwidth slots");
        assert!(slots.valid_children(&ctx).is_empty());
        ctx.slot_id = Some(4);
        assert_eq!(slots.valid_children(&ctx).len(), 2);
    }

    #[test]
    fn test_device_listing_scope() {
        let tree = action_tree();
        let devices = find(&find(&tree, "Manage devices").children, "List devices");
        assert_eq!(devices.action, Some(Action::ListDevices { by_user: false }));
        assert!(devices.requires.is_empty());
    }
}
