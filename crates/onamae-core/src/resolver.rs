// # IP Resolver Trait
//
// Supplies the IPv4 address for an attempt. The scheduler asks once per
// tick; it never caches or compares inside the resolver.
//
// ## Implementations
//
// - [`StaticIp`]: a fixed, caller-supplied address
// - HTTP lookup: `onamae-ip-http` crate

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Source of the address to apply
///
/// Implementations perform at most one lookup per call and leave retries to
/// the scheduler's next tick.
#[async_trait]
pub trait IpResolver: Send + Sync {
    /// Resolve the address for this attempt
    async fn resolve(&self) -> Result<String>;

    /// Resolver name (for logging)
    fn name(&self) -> &'static str;
}

/// An address given up front
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticIp(String);

impl StaticIp {
    /// Use `ipv4` for every attempt
    ///
    /// # Errors
    ///
    /// `Error::Config` if `ipv4` is not a dotted-quad IPv4 address.
    pub fn new(ipv4: impl Into<String>) -> Result<Self> {
        let ipv4 = ipv4.into();
        ipv4.trim()
            .parse::<Ipv4Addr>()
            .map_err(|_| Error::config(format!("'{}' is not an IPv4 address", ipv4)))?;
        Ok(Self(ipv4.trim().to_string()))
    }
}

#[async_trait]
impl IpResolver for StaticIp {
    async fn resolve(&self) -> Result<String> {
        Ok(self.0.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}
