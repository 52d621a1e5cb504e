// # Protocol Client
//
// Speaks the registrar's line-oriented command protocol over a `Session`.
//
// ## Wire format
//
// Every request is a block of `KEY:value` lines after a command word,
// terminated by a line holding a single `.`:
//
// ```text
// LOGIN            MODIP                  LOGOUT
// USERID:<user>    HOSTNAME:<host>        .
// PASSWORD:<pass>  DOMNAME:<domain>
// .                IPV4:<address>
//                  .
// ```
//
// The reply is free text. The exchange ends at the first line carrying a
// three-digit status token, and the command counts as accepted iff the
// captured text contains the success marker. The status code itself is
// reported but not interpreted.
//
// Each operation performs exactly one exchange and never retries.

use crate::config::ClientConfig;
use crate::error::{Error, Rejection, Result};
use crate::matcher::{ResponseMatcher, StatusLine};
use crate::transport::Session;
use tracing::debug;

/// A request block
pub enum Command<'a> {
    Login {
        username: &'a str,
        password: &'a str,
    },
    ModIp {
        hostname: &'a str,
        domain: &'a str,
        ipv4: &'a str,
    },
    Logout,
}

impl Command<'_> {
    /// Command word, safe to log
    pub fn name(&self) -> &'static str {
        match self {
            Command::Login { .. } => "LOGIN",
            Command::ModIp { .. } => "MODIP",
            Command::Logout => "LOGOUT",
        }
    }

    /// Encode as a request block
    pub fn encode(&self) -> String {
        match self {
            Command::Login { username, password } => {
                format!("LOGIN\nUSERID:{}\nPASSWORD:{}\n.\n", username, password)
            }
            Command::ModIp {
                hostname,
                domain,
                ipv4,
            } => format!(
                "MODIP\nHOSTNAME:{}\nDOMNAME:{}\nIPV4:{}\n.\n",
                hostname, domain, ipv4
            ),
            Command::Logout => "LOGOUT\n.\n".to_string(),
        }
    }
}

/// Interpretation of one reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// The status line, verbatim
    pub raw_text: String,
    /// Its three-digit token
    pub status_code: String,
    /// Whether the success marker was present
    pub success: bool,
}

/// Client for the LOGIN / MODIP / LOGOUT exchanges
#[derive(Debug, Clone)]
pub struct ProtocolClient {
    matcher: ResponseMatcher,
    success_marker: String,
}

impl ProtocolClient {
    /// Create a client from configuration
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            matcher: ResponseMatcher::new(config.response_timeout()),
            success_marker: config.success_marker.clone(),
        }
    }

    /// Decide whether a status line reports success
    pub fn classify(&self, line: StatusLine) -> ResponseOutcome {
        let success = line.text.contains(&self.success_marker);
        ResponseOutcome {
            raw_text: line.text,
            status_code: line.code,
            success,
        }
    }

    /// Send one command and interpret its reply
    ///
    /// Rejections and timeouts are mapped onto the command's error by `fail`.
    async fn exchange(
        &self,
        session: &mut Session,
        command: Command<'_>,
        fail: fn(Rejection) -> Error,
    ) -> Result<ResponseOutcome> {
        debug!("Sending {} to {}", command.name(), session.peer());
        session.write(command.encode().as_bytes()).await?;

        let line = match self.matcher.expect(session).await {
            Ok(line) => line,
            Err(Error::Timeout { partial, after }) => {
                return Err(fail(Rejection::Timeout { partial, after }));
            }
            Err(e) => return Err(e),
        };

        let outcome = self.classify(line);
        debug!(
            "{} answered with status {} (success: {})",
            command.name(),
            outcome.status_code,
            outcome.success
        );

        if outcome.success {
            Ok(outcome)
        } else {
            Err(fail(Rejection::Response(outcome.raw_text)))
        }
    }

    /// Log in with the account credentials
    ///
    /// # Errors
    ///
    /// `Error::Auth` if the reply lacks the success marker or never arrives.
    pub async fn authenticate(
        &self,
        session: &mut Session,
        username: &str,
        password: &str,
    ) -> Result<ResponseOutcome> {
        self.exchange(session, Command::Login { username, password }, Error::Auth)
            .await
    }

    /// Point `hostname.domain` at `ipv4`
    ///
    /// # Errors
    ///
    /// `Error::Update` if the reply lacks the success marker or never arrives.
    pub async fn update_record(
        &self,
        session: &mut Session,
        hostname: &str,
        domain: &str,
        ipv4: &str,
    ) -> Result<ResponseOutcome> {
        let command = Command::ModIp {
            hostname,
            domain,
            ipv4,
        };
        self.exchange(session, command, Error::Update).await
    }

    /// End the authenticated session
    ///
    /// # Errors
    ///
    /// `Error::Logout` if the reply lacks the success marker or never arrives.
    pub async fn logout(&self, session: &mut Session) -> Result<ResponseOutcome> {
        self.exchange(session, Command::Logout, Error::Logout).await
    }
}

impl Default for ProtocolClient {
    fn default() -> Self {
        Self::new(&ClientConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::StreamTransport;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn mock_session(mock: tokio_test::io::Mock) -> Session {
        Session::new(Box::new(StreamTransport::new(mock)), "mock")
    }

    #[test]
    fn request_blocks_end_with_dot_line() {
        let login = Command::Login {
            username: "user",
            password: "secret",
        };
        assert_eq!(login.encode(), "LOGIN\nUSERID:user\nPASSWORD:secret\n.\n");

        let modip = Command::ModIp {
            hostname: "www",
            domain: "example.com",
            ipv4: "192.0.2.1",
        };
        assert_eq!(
            modip.encode(),
            "MODIP\nHOSTNAME:www\nDOMNAME:example.com\nIPV4:192.0.2.1\n.\n"
        );

        assert_eq!(Command::Logout.encode(), "LOGOUT\n.\n");
    }

    #[test]
    fn success_is_substring_match() {
        let client = ProtocolClient::default();
        let outcome = client.classify(StatusLine {
            text: "000 COMMAND SUCCESSFUL".to_string(),
            code: "000".to_string(),
        });
        assert!(outcome.success);
        assert_eq!(outcome.status_code, "000");

        // The code does not matter, only the marker does.
        let outcome = client.classify(StatusLine {
            text: "200 OK".to_string(),
            code: "200".to_string(),
        });
        assert!(!outcome.success);
    }

    #[test]
    fn marker_is_configurable() {
        let config = ClientConfig {
            success_marker: "ACCEPTED".to_string(),
            ..ClientConfig::default()
        };
        let client = ProtocolClient::new(&config);
        let outcome = client.classify(StatusLine {
            text: "001 ACCEPTED".to_string(),
            code: "001".to_string(),
        });
        assert!(outcome.success);
    }

    #[tokio::test]
    async fn authenticate_sends_login_block() {
        let mock = tokio_test::io::Builder::new()
            .write(b"LOGIN\nUSERID:user\nPASSWORD:secret\n.\n")
            .read(b"000 COMMAND SUCCESSFUL\n")
            .build();
        let mut session = mock_session(mock);

        let outcome = ProtocolClient::default()
            .authenticate(&mut session, "user", "secret")
            .await
            .unwrap();
        assert_eq!(outcome.raw_text, "000 COMMAND SUCCESSFUL");
    }

    #[tokio::test]
    async fn rejected_update_carries_server_text() {
        let mock = tokio_test::io::Builder::new()
            .write(b"MODIP\nHOSTNAME:www\nDOMNAME:example.com\nIPV4:192.0.2.1\n.\n")
            .read(b"003 MODIP ERROR\n")
            .build();
        let mut session = mock_session(mock);

        let err = ProtocolClient::default()
            .update_record(&mut session, "www", "example.com", "192.0.2.1")
            .await
            .unwrap_err();
        match err {
            Error::Update(Rejection::Response(text)) => assert_eq!(text, "003 MODIP ERROR"),
            other => panic!("expected update error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn silent_logout_times_out_as_logout_error() {
        let (client, mut server) = tokio::io::duplex(256);
        let mut session = Session::new(Box::new(StreamTransport::new(client)), "duplex");
        server.write_all(b"LOGOUT ").await.unwrap();

        let err = ProtocolClient::default()
            .logout(&mut session)
            .await
            .unwrap_err();
        match err {
            Error::Logout(Rejection::Timeout { partial, after }) => {
                assert_eq!(partial, "LOGOUT ");
                assert_eq!(after, Duration::from_secs(10));
            }
            other => panic!("expected logout timeout, got {:?}", other),
        }
    }
}
