//! Bookkeeping for a small router: users, their bandwidth slots and devices,
//! driven from an interactive, context-gated menu.

pub mod actions;
pub mod address;
pub mod config;
pub mod console;
pub mod context;
pub mod error;
pub mod export;
pub mod logging;
pub mod mac;
pub mod manager;
pub mod menu;
pub mod navigator;
pub mod pager;
pub mod router;
pub mod slots;
pub mod snapshot;
pub mod storage;

pub use actions::{action_tree, Action, Session, SessionSettings};
pub use address::{AddressInterval, Netblock};
pub use console::{Console, LineConsole};
pub use context::{Context, ContextKey};
pub use error::{ActionError, Error, Result};
pub use mac::MacAddr;
pub use manager::Manager;
pub use menu::{ActionNode, Executor, Navigation};
pub use navigator::run_menu;
pub use slots::{compute_free_slots, unused_address, BoundPolicy, BwSlot};
