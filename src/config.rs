//! Command line and environment configuration for the `routerman` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::actions::SessionSettings;
use crate::slots::BoundPolicy;

#[derive(Parser, Debug)]
#[command(name = "routerman", version, about = "Router bandwidth and device bookkeeping")]
pub struct Cli {
    /// Local database file
    #[arg(long, env = "ROUTERMAN_DB", default_value = "routerman.json", global = true)]
    pub db: PathBuf,

    /// Router snapshot file
    #[arg(
        long,
        env = "ROUTERMAN_ROUTER_STATE",
        default_value = "router.json",
        global = true
    )]
    pub router_state: PathBuf,

    /// Router admin user
    #[arg(long, env = "USERNAME", global = true)]
    pub username: Option<String>,

    /// Router admin password
    #[arg(long, env = "PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,

    /// Router management address
    #[arg(long, env = "ADDRESS", global = true)]
    pub address: Option<String>,

    /// Entries per listing page
    #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u16).range(1..), global = true)]
    pub page_size: u16,

    /// Take available slots from the DHCP pool instead of the LAN subnet
    #[arg(long, global = true)]
    pub dhcp_bounds: bool,

    /// Directory for exported CSV files
    #[arg(long, default_value = ".", global = true)]
    pub export_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Check the local database, or create it with --init
    Db {
        #[arg(long)]
        init: bool,
    },
    /// Start the interactive session
    Cli,
    /// Print the available bandwidth slots
    Slots,
}

impl Cli {
    pub fn bound_policy(&self) -> BoundPolicy {
        if self.dhcp_bounds {
            BoundPolicy::Dhcp
        } else {
            BoundPolicy::Subnet
        }
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            page_size: usize::from(self.page_size),
            bound_policy: self.bound_policy(),
            export_dir: self.export_dir.clone(),
        }
    }
}
