// # HTTP IP Resolver
//
// This crate discovers the caller's public IPv4 address through an external
// HTTP service that answers with a JSON object, e.g. httpbin:
//
// ```text
// GET https://httpbin.org/ip
// { "origin": "203.0.113.9" }
// ```
//
// ## Behavior
//
// - One GET per `resolve()` call; no caching, no retries
// - The address is read from a configurable JSON field (`origin` by default)
// - Proxy chains reported as `"a, b"` resolve to the first entry
// - Anything that is not an IPv4 address is an error

use async_trait::async_trait;
use onamae_core::{Error, IpResolver, Result};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default lookup service
pub const DEFAULT_LOOKUP_URL: &str = "https://httpbin.org/ip";

/// Default JSON field holding the address
pub const DEFAULT_FIELD: &str = "origin";

/// Per-request timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Resolver backed by a JSON-over-HTTP lookup service
#[derive(Debug, Clone)]
pub struct HttpIpResolver {
    /// URL to fetch the address from
    url: String,

    /// JSON field carrying the address
    field: String,

    /// HTTP client
    client: reqwest::Client,
}

impl HttpIpResolver {
    /// Create a resolver for `url`, reading the default field
    pub fn new(url: impl Into<String>) -> Result<Self> {
        Self::with_field(url, DEFAULT_FIELD)
    }

    /// Create a resolver reading a custom JSON field
    pub fn with_field(url: impl Into<String>, field: impl Into<String>) -> Result<Self> {
        let url = url.into();
        if !url.starts_with("https://") && !url.starts_with("http://") {
            return Err(Error::config(format!(
                "IP lookup URL must use HTTP or HTTPS scheme. Got: {}",
                url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url,
            field: field.into(),
            client,
        })
    }

    /// URL this resolver queries
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Pull the IPv4 address out of a lookup response body
pub fn extract_ipv4(body: &Value, field: &str) -> Result<String> {
    let raw = body
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Error::ip_lookup(format!("response has no string field '{}'", field)))?;

    let first = raw.split(',').next().unwrap_or_default().trim();
    let ip: Ipv4Addr = first
        .parse()
        .map_err(|_| Error::ip_lookup(format!("Invalid IPv4 address: {}", raw)))?;

    Ok(ip.to_string())
}

#[async_trait]
impl IpResolver for HttpIpResolver {
    async fn resolve(&self) -> Result<String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ip_lookup(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::ip_lookup(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::ip_lookup(format!("Failed to decode response: {}", e)))?;

        let ip = extract_ipv4(&body, &self.field)?;
        tracing::info!("Got ipv4 {} from {}", ip, self.url);
        Ok(ip)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
