// # Update Request
//
// The immutable input of one update attempt: credentials, the record to
// modify and the IPv4 address to point it at.

use crate::error::{Error, Result};
use std::fmt;

/// Everything one update attempt needs
///
/// The password is never shown by the `Debug` implementation.
#[derive(Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Registrar account ID
    pub username: String,
    /// Registrar account password
    pub password: String,
    /// Host label of the record (e.g. "www")
    pub hostname: String,
    /// Domain the record belongs to (e.g. "example.com")
    pub domain: String,
    /// Address to apply
    pub ipv4: String,
}

impl UpdateRequest {
    /// Create a new request
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        hostname: impl Into<String>,
        domain: impl Into<String>,
        ipv4: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            hostname: hostname.into(),
            domain: domain.into(),
            ipv4: ipv4.into(),
        }
    }

    fn fields(&self) -> [(&'static str, &str); 5] {
        [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("hostname", self.hostname.as_str()),
            ("domain", self.domain.as_str()),
            ("ipv4", self.ipv4.as_str()),
        ]
    }

    /// Names of the required fields that are empty
    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.fields()
            .into_iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| name)
            .collect()
    }

    /// Check that every required field is present
    ///
    /// Line breaks are rejected too, since each field becomes one line of a
    /// request block.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(Error::missing_fields(&missing));
        }

        let broken: Vec<&str> = self
            .fields()
            .into_iter()
            .filter(|(_, value)| value.contains(['\r', '\n']))
            .map(|(name, _)| name)
            .collect();
        if !broken.is_empty() {
            return Err(Error::config(format!(
                "line break in field(s): {}",
                broken.join(", ")
            )));
        }

        Ok(())
    }

    /// Fully qualified record name, for logging
    pub fn record_name(&self) -> String {
        format!("{}.{}", self.hostname, self.domain)
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("hostname", &self.hostname)
            .field("domain", &self.domain)
            .field("ipv4", &self.ipv4)
            .finish()
    }
}

/// The parts of an [`UpdateRequest`] that stay fixed across ticks
///
/// The daemon resolves the address anew every tick and combines it with
/// this template.
#[derive(Clone, PartialEq, Eq)]
pub struct RequestTemplate {
    pub username: String,
    pub password: String,
    pub hostname: String,
    pub domain: String,
}

impl RequestTemplate {
    /// Build the request for one attempt
    pub fn with_ip(&self, ipv4: impl Into<String>) -> UpdateRequest {
        UpdateRequest::new(
            self.username.clone(),
            self.password.clone(),
            self.hostname.clone(),
            self.domain.clone(),
            ipv4,
        )
    }
}

impl fmt::Debug for RequestTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTemplate")
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("hostname", &self.hostname)
            .field("domain", &self.domain)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> UpdateRequest {
        UpdateRequest::new("user", "secret", "www", "example.com", "192.0.2.1")
    }

    #[test]
    fn complete_request_validates() {
        assert!(complete().validate().is_ok());
        assert_eq!(complete().record_name(), "www.example.com");
    }

    #[test]
    fn every_empty_field_is_reported() {
        let mut request = complete();
        request.password = String::new();
        request.ipv4 = "  ".to_string();

        assert_eq!(request.missing_fields(), vec!["password", "ipv4"]);
        let err = request.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("password, ipv4"));
    }

    #[test]
    fn line_breaks_are_rejected() {
        let mut request = complete();
        request.hostname = "www\nLOGOUT".to_string();

        let err = request.validate().unwrap_err();
        assert!(err.is_config());
        assert!(err.to_string().contains("hostname"));
    }

    #[test]
    fn debug_hides_password() {
        let rendered = format!("{:?}", complete());
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<REDACTED>"));
    }

    #[test]
    fn template_fills_in_address() {
        let template = RequestTemplate {
            username: "user".to_string(),
            password: "secret".to_string(),
            hostname: "www".to_string(),
            domain: "example.com".to_string(),
        };
        assert_eq!(template.with_ip("192.0.2.1"), complete());
    }
}
