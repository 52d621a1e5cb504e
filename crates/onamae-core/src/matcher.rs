//! Status line matching
//!
//! The registrar answers every command with free text. An exchange is
//! complete once a line carrying a three-digit status token has arrived.

use crate::error::Result;
use crate::transport::Session;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::trace;

/// Default deadline for one exchange
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(10);

static STATUS_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{3})\b").expect("status token pattern is valid"));

/// A response line containing a status token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    /// The whole line, without its terminator
    pub text: String,
    /// The first three-digit token on the line, verbatim
    pub code: String,
}

/// Find the first complete line carrying a status token
///
/// A line is complete once its `\n` has arrived, or when the peer has
/// closed the stream (`eof`). A trailing `\r` is stripped.
pub fn find_status_line(text: &str, eof: bool) -> Option<StatusLine> {
    let mut segments: Vec<&str> = text.split('\n').collect();
    if !eof {
        // The last segment is still being received.
        segments.pop();
    }

    segments.into_iter().find_map(|segment| {
        let line = segment.trim_end_matches('\r');
        let code = STATUS_TOKEN.captures(line)?.get(1)?.as_str().to_string();
        Some(StatusLine {
            text: line.to_string(),
            code,
        })
    })
}

/// Waits for a status line on a session
///
/// Holds no state between exchanges; every call scans fresh input.
#[derive(Debug, Clone)]
pub struct ResponseMatcher {
    deadline: Duration,
}

impl ResponseMatcher {
    pub fn new(deadline: Duration) -> Self {
        Self { deadline }
    }

    /// Deadline applied to each exchange
    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Read from `session` until a status line arrives
    ///
    /// # Errors
    ///
    /// `Error::Timeout` with the captured text if the deadline expires first.
    pub async fn expect(&self, session: &mut Session) -> Result<StatusLine> {
        let line = session.read_until(find_status_line, self.deadline).await?;
        trace!("Status line from {}: {:?}", session.peer(), line.text);
        Ok(line)
    }
}

impl Default for ResponseMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_RESPONSE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_first_line_with_token() {
        let text = "Welcome\r\n000 COMMAND SUCCESSFUL\r\nrest";
        let line = find_status_line(text, false).unwrap();
        assert_eq!(line.text, "000 COMMAND SUCCESSFUL");
        assert_eq!(line.code, "000");
    }

    #[test]
    fn incomplete_line_waits_for_terminator() {
        assert_eq!(find_status_line("200 SUCC", false), None);
        let line = find_status_line("200 SUCCESSFUL", true).unwrap();
        assert_eq!(line.code, "200");
    }

    #[test]
    fn token_must_be_exactly_three_digits() {
        assert_eq!(find_status_line("serial 2024\n", false), None);
        assert_eq!(find_status_line("E500 nope\n", false), None);
        assert_eq!(find_status_line("12 items\n", false), None);

        let line = find_status_line("error 500: login failed\n", false).unwrap();
        assert_eq!(line.code, "500");
    }

    #[test]
    fn default_deadline_is_ten_seconds() {
        assert_eq!(ResponseMatcher::default().deadline(), Duration::from_secs(10));
    }
}
