//! Configuration types for the DDNS client
//!
//! Loading these from flags or the environment is the binary's job; this
//! module only defines the shapes, their defaults and their validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Registrar endpoint host
pub const DEFAULT_HOST: &str = "ddnsclient.onamae.com";

/// Registrar endpoint port
pub const DEFAULT_PORT: u16 = 65010;

/// Literal substring marking an accepted command
pub const DEFAULT_SUCCESS_MARKER: &str = "SUCCESSFUL";

/// Remote address of the registrar's DDNS service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Host name, also used as the TLS server name
    pub host: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| crate::Error::config(format!("endpoint '{}' is not host:port", s)))?;
        if host.is_empty() {
            return Err(crate::Error::config(format!("endpoint '{}' has no host", s)));
        }
        let port = port
            .parse()
            .map_err(|_| crate::Error::config(format!("endpoint '{}' has an invalid port", s)))?;
        Ok(Self::new(host, port))
    }
}

/// Protocol client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Registrar endpoint
    #[serde(default)]
    pub endpoint: Endpoint,

    /// Per-exchange deadline for a status line (in seconds)
    #[serde(default = "default_response_timeout_secs")]
    pub response_timeout_secs: u64,

    /// Substring that marks a command as accepted
    ///
    /// The registrar does not document its status codes, so acceptance is
    /// decided by this marker alone.
    #[serde(default = "default_success_marker")]
    pub success_marker: String,
}

impl ClientConfig {
    /// Per-exchange response deadline
    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_secs)
    }

    /// Validate the client configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.endpoint.host.is_empty() {
            return Err(crate::Error::config("Endpoint host cannot be empty"));
        }
        if self.endpoint.port == 0 {
            return Err(crate::Error::config("Endpoint port must be > 0"));
        }
        if self.response_timeout_secs == 0 {
            return Err(crate::Error::config("Response timeout must be > 0"));
        }
        if self.success_marker.is_empty() {
            return Err(crate::Error::config("Success marker cannot be empty"));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            response_timeout_secs: default_response_timeout_secs(),
            success_marker: default_success_marker(),
        }
    }
}

/// How the scheduler drives the update workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Run the workflow once and exit
    #[default]
    Once,
    /// Run the workflow every interval until cancelled
    Daemon,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Single-shot or periodic
    #[serde(default)]
    pub mode: RunMode,

    /// Tick interval in daemon mode (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Skip the exchange when the resolved IP equals the last applied one
    #[serde(default = "default_dedup")]
    pub dedup: bool,
}

impl SchedulerConfig {
    /// Tick interval
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate the scheduler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Scheduler interval must be > 0"));
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::default(),
            interval_secs: default_interval_secs(),
            dedup: default_dedup(),
        }
    }
}

fn default_response_timeout_secs() -> u64 {
    10
}

fn default_success_marker() -> String {
    DEFAULT_SUCCESS_MARKER.to_string()
}

fn default_interval_secs() -> u64 {
    60
}

fn default_dedup() -> bool {
    true
}
