//! Error types for the onamae DDNS client
//!
//! Every failure the protocol client, the update workflow and the scheduler
//! can produce is a variant of [`Error`].

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for DDNS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a command exchange was not accepted by the registrar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A status line arrived but lacked the success marker
    Response(String),

    /// No status line arrived before the exchange deadline
    Timeout {
        /// Text captured before the deadline expired
        partial: String,
        /// The deadline that expired
        after: Duration,
    },
}

impl Rejection {
    /// Raw server text carried by this rejection
    pub fn raw_text(&self) -> &str {
        match self {
            Rejection::Response(text) => text,
            Rejection::Timeout { partial, .. } => partial,
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::Response(text) => write!(f, "server replied {:?}", text),
            Rejection::Timeout { partial, after } => write!(
                f,
                "no status line within {:?} (captured {:?})",
                after, partial
            ),
        }
    }
}

/// Core error type for the DDNS client
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors (missing or invalid fields)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dialing the endpoint or completing the TLS handshake failed
    #[error("Connection error: {0}")]
    Connection(#[source] std::io::Error),

    /// Reading from or writing to an open session failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// No status line observed within the exchange deadline
    #[error("Timed out after {after:?} waiting for a status line (captured {partial:?})")]
    Timeout {
        /// Text captured before the deadline expired
        partial: String,
        /// The deadline that expired
        after: Duration,
    },

    /// LOGIN was not accepted
    #[error("Login failed: {0}")]
    Auth(Rejection),

    /// MODIP was not accepted
    #[error("Record update failed: {0}")]
    Update(Rejection),

    /// LOGOUT was not accepted
    #[error("Logout failed: {0}")]
    Logout(Rejection),

    /// Public IP discovery failed
    #[error("IP lookup error: {0}")]
    IpLookup(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an IP lookup error
    pub fn ip_lookup(msg: impl Into<String>) -> Self {
        Self::IpLookup(msg.into())
    }

    /// Configuration error listing every missing required field
    pub fn missing_fields(fields: &[&str]) -> Self {
        Self::Config(format!("missing required field(s): {}", fields.join(", ")))
    }

    /// Raw server text for command errors, if any
    pub fn server_response(&self) -> Option<&str> {
        match self {
            Error::Auth(r) | Error::Update(r) | Error::Logout(r) => Some(r.raw_text()),
            Error::Timeout { partial, .. } => Some(partial),
            _ => None,
        }
    }

    /// Whether this error was detected before any network activity
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }
}
