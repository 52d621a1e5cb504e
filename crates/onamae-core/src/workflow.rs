//! Update workflow
//!
//! One logical transaction per attempt:
//!
//! ```text
//! Disconnected ─open─▶ Authenticating ─LOGIN ok─▶ Ready ─▶ Updating
//!                           │                                 │
//!                      LOGIN failed                      MODIP done
//!                           │                                 ▼
//!                           │                            LoggingOut
//!                           ▼                                 │
//!                         Closed ◀──────────close─────────────┘
//! ```
//!
//! The session is closed on every path that opened it, including failed
//! exchanges and timeouts. A failed LOGOUT is recorded in the report but
//! never turns an applied update into a failure. An unanswered MODIP skips
//! LOGOUT and goes straight to `Closed`, since replies on that session can
//! no longer be attributed.

use crate::error::{Error, Rejection, Result};
use crate::protocol::ProtocolClient;
use crate::request::UpdateRequest;
use crate::transport::{Connector, Session};
use std::fmt;
use tracing::{debug, info, warn};

/// Where an attempt currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowState {
    Disconnected,
    Authenticating,
    Ready,
    Updating,
    LoggingOut,
    Closed,
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkflowState::Disconnected => "disconnected",
            WorkflowState::Authenticating => "authenticating",
            WorkflowState::Ready => "ready",
            WorkflowState::Updating => "updating",
            WorkflowState::LoggingOut => "logging-out",
            WorkflowState::Closed => "closed",
        };
        f.write_str(name)
    }
}

impl WorkflowState {
    /// Whether an attempt may move from this state to `next`
    ///
    /// `Closed` is reachable from every state that holds an open session,
    /// and nothing leaves it.
    pub fn can_move_to(self, next: WorkflowState) -> bool {
        use WorkflowState::*;
        matches!(
            (self, next),
            (Disconnected, Authenticating)
                | (Authenticating, Ready)
                | (Ready, Updating)
                | (Updating, LoggingOut)
                | (Authenticating | Ready | Updating | LoggingOut, Closed)
        )
    }
}

/// Result of a successful attempt
#[derive(Debug)]
pub struct UpdateReport {
    /// Address now held by the record
    pub ipv4: String,
    /// Why LOGOUT failed, if it did
    pub logout_failure: Option<Error>,
}

/// Runs LOGIN → MODIP → LOGOUT over one session
pub struct UpdateWorkflow {
    connector: Box<dyn Connector>,
    client: ProtocolClient,
}

impl UpdateWorkflow {
    /// Create a workflow
    ///
    /// # Parameters
    ///
    /// - `connector`: opens the session for each attempt
    /// - `client`: encodes commands and interprets replies
    pub fn new(connector: Box<dyn Connector>, client: ProtocolClient) -> Self {
        Self { connector, client }
    }

    /// Apply `request` at the registrar
    ///
    /// The request is validated before anything touches the network.
    ///
    /// # Errors
    ///
    /// - `Error::Config` if a required field is missing
    /// - `Error::Connection` if the session cannot be opened
    /// - `Error::Auth` / `Error::Update` if the registrar rejects a command
    /// - `Error::Io` if the stream breaks mid-exchange
    pub async fn run_update(&self, request: &UpdateRequest) -> Result<UpdateReport> {
        request.validate()?;

        let mut state = WorkflowState::Disconnected;
        let mut session = self.connector.open().await?;
        let result = self.exchange(&mut session, request, &mut state).await;

        session.close().await;
        transition(&mut state, WorkflowState::Closed);

        if result.is_ok() {
            info!("Updated {} -> {}", request.record_name(), request.ipv4);
        }
        result
    }

    async fn exchange(
        &self,
        session: &mut Session,
        request: &UpdateRequest,
        state: &mut WorkflowState,
    ) -> Result<UpdateReport> {
        transition(state, WorkflowState::Authenticating);
        self.client
            .authenticate(session, &request.username, &request.password)
            .await?;
        transition(state, WorkflowState::Ready);

        transition(state, WorkflowState::Updating);
        let updated = self
            .client
            .update_record(session, &request.hostname, &request.domain, &request.ipv4)
            .await;

        // A late MODIP reply would be read as the LOGOUT answer.
        if let Err(e @ Error::Update(Rejection::Timeout { .. })) = updated {
            warn!("Skipping logout after unanswered MODIP");
            return Err(e);
        }

        // The session is authenticated; end it whatever MODIP said.
        transition(state, WorkflowState::LoggingOut);
        let logout_failure = self.client.logout(session).await.err();
        if let Some(e) = &logout_failure {
            warn!("Ignoring logout failure: {}", e);
        }

        updated?;
        Ok(UpdateReport {
            ipv4: request.ipv4.clone(),
            logout_failure,
        })
    }
}

fn transition(state: &mut WorkflowState, next: WorkflowState) {
    debug_assert!(
        state.can_move_to(next),
        "illegal workflow transition {} -> {}",
        state,
        next
    );
    debug!("Workflow state: {} -> {}", state, next);
    *state = next;
}
