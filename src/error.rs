//! Error types for routerman.

use std::net::Ipv4Addr;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Operator input
    #[error("invalid choice")]
    InvalidChoice,

    #[error("invalid input")]
    InvalidInput,

    #[error("input closed")]
    InputClosed,

    // Address arithmetic
    #[error("invalid IPv4 address '{0}'")]
    InvalidAddress(String),

    #[error("invalid address range {start} - {end}")]
    InvalidRange { start: Ipv4Addr, end: Ipv4Addr },

    #[error("invalid subnet prefix '{0}'")]
    InvalidPrefix(u8),

    #[error("invalid subnet mask '{0}'")]
    InvalidMask(Ipv4Addr),

    #[error("address range starting at {start} with {count} more addresses exceeds 255.255.255.255")]
    AddressOverflow { start: Ipv4Addr, count: u64 },

    #[error("no ip addresses available")]
    NoAddressAvailable,

    #[error("invalid mac address '{0}'")]
    InvalidMac(String),

    // Collaborators
    #[error("{entity} not found '{id}'")]
    NotFound { entity: &'static str, id: String },

    #[error("router: {0}")]
    Router(String),

    #[error("{path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Console(#[from] std::io::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Operator-input errors that only warrant a re-prompt.
    pub fn is_input(&self) -> bool {
        matches!(self, Error::InvalidChoice | Error::InvalidInput)
    }
}

/// Outcome of a failed action, as seen by the navigation engine.
#[derive(Error, Debug)]
pub enum ActionError {
    /// Shown to the operator; the current menu level is redrawn.
    #[error("{0}")]
    Recoverable(String),

    /// Aborts the session.
    #[error(transparent)]
    Fatal(#[from] Error),
}

impl ActionError {
    pub fn recoverable(message: impl Into<String>) -> Self {
        ActionError::Recoverable(message.into())
    }
}
