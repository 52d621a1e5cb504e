// # onamae-core
//
// Client library for the onamae.com dynamic DNS service.
//
// ## Architecture Overview
//
// Data flows one way, responses flow back up, and any failure
// short-circuits the chain:
//
// - **Scheduler**: runs the workflow once or on an interval, deduplicates
//   unchanged addresses, stops on shutdown
// - **UpdateWorkflow**: LOGIN → MODIP → LOGOUT over one session, which is
//   closed on every path
// - **ProtocolClient**: encodes request blocks and classifies replies by
//   their success marker
// - **ResponseMatcher**: waits (with a deadline) for a line carrying a
//   three-digit status token
// - **Transport**: the encrypted byte stream (`TlsConnector` in production)
//
// Public IP discovery sits outside the chain behind the `IpResolver` trait.

pub mod config;
pub mod error;
pub mod matcher;
pub mod protocol;
pub mod request;
pub mod resolver;
pub mod scheduler;
pub mod transport;
pub mod workflow;

// Re-export core types for convenience
pub use config::{ClientConfig, Endpoint, RunMode, SchedulerConfig};
pub use error::{Error, Rejection, Result};
pub use matcher::{ResponseMatcher, StatusLine};
pub use protocol::{ProtocolClient, ResponseOutcome};
pub use request::{RequestTemplate, UpdateRequest};
pub use resolver::{IpResolver, StaticIp};
pub use scheduler::{Scheduler, SchedulerState, TickOutcome};
pub use transport::{Connector, Session, StreamTransport, TlsConnector, Transport};
pub use workflow::{UpdateReport, UpdateWorkflow, WorkflowState};
