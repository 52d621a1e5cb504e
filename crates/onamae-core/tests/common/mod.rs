//! Test doubles and common utilities for contract tests
//!
//! A scripted registrar stands in for the TLS endpoint: it answers each
//! command word with a canned reply and records everything it sees.

#![allow(dead_code)]

use async_trait::async_trait;
use onamae_core::config::{ClientConfig, RunMode, SchedulerConfig};
use onamae_core::error::{Error, Result};
use onamae_core::{
    Connector, IpResolver, ProtocolClient, RequestTemplate, Scheduler, Session, Transport,
    UpdateRequest, UpdateWorkflow,
};
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// How the scripted registrar answers one command
#[derive(Debug, Clone)]
pub enum Reply {
    /// Send this line (a newline is appended)
    Line(&'static str),
    /// Send this line once the delay has passed
    Delayed(Duration, &'static str),
    /// Never answer
    Silent,
    /// Close the stream without answering
    Hangup,
}

pub const OK: Reply = Reply::Line("000 COMMAND SUCCESSFUL");

/// Shared counters, readable after the connector has been moved away
#[derive(Debug, Clone, Default)]
pub struct Probe {
    opens: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
}

impl Probe {
    /// Number of sessions opened
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Number of transport shutdowns
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Command words received, in order, across all sessions
    pub fn commands(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|block| block.lines().next().unwrap_or_default().to_string())
            .collect()
    }

    /// Full request blocks received
    pub fn blocks(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

/// Transport answering from a script
pub struct ScriptedTransport {
    replies: HashMap<&'static str, Reply>,
    pending: Vec<u8>,
    ready_at: Option<Instant>,
    hung_up: bool,
    probe: Probe,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let block = String::from_utf8_lossy(bytes).into_owned();
        let command = block.lines().next().unwrap_or_default().to_string();
        self.probe.sent.lock().unwrap().push(block);

        match self.replies.get(command.as_str()).cloned().unwrap_or(OK) {
            Reply::Line(line) => {
                self.pending.extend_from_slice(line.as_bytes());
                self.pending.push(b'\n');
            }
            Reply::Delayed(delay, line) => {
                self.pending.extend_from_slice(line.as_bytes());
                self.pending.push(b'\n');
                self.ready_at = Some(Instant::now() + delay);
            }
            Reply::Silent => {}
            Reply::Hangup => self.hung_up = true,
        }
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(at) = self.ready_at {
            tokio::time::sleep_until(at).await;
            self.ready_at = None;
        }
        if !self.pending.is_empty() {
            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            return Ok(n);
        }
        if self.hung_up {
            return Ok(0);
        }
        std::future::pending().await
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Connector handing out scripted sessions
pub struct ScriptedConnector {
    replies: HashMap<&'static str, Reply>,
    refuse: bool,
    probe: Probe,
}

impl ScriptedConnector {
    /// Every command succeeds
    pub fn accepting() -> (Self, Probe) {
        Self::with_replies(&[])
    }

    /// Override the reply for some command words
    pub fn with_replies(replies: &[(&'static str, Reply)]) -> (Self, Probe) {
        let probe = Probe::default();
        let connector = Self {
            replies: replies.iter().cloned().collect(),
            refuse: false,
            probe: probe.clone(),
        };
        (connector, probe)
    }

    /// Every dial fails
    pub fn refusing() -> (Self, Probe) {
        let (mut connector, probe) = Self::accepting();
        connector.refuse = true;
        (connector, probe)
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self) -> Result<Session> {
        self.probe.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse {
            return Err(Error::Connection(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        let transport = ScriptedTransport {
            replies: self.replies.clone(),
            pending: Vec::new(),
            ready_at: None,
            hung_up: false,
            probe: self.probe.clone(),
        };
        Ok(Session::new(Box::new(transport), "scripted"))
    }
}

/// Resolver returning a fixed sequence; `None` entries fail the lookup
///
/// After the sequence is exhausted the last entry repeats.
pub struct SequenceResolver {
    answers: Vec<Option<&'static str>>,
    calls: Arc<AtomicUsize>,
}

impl SequenceResolver {
    pub fn new(answers: &[Option<&'static str>]) -> Self {
        Self {
            answers: answers.to_vec(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl IpResolver for SequenceResolver {
    async fn resolve(&self) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let index = call.min(self.answers.len().saturating_sub(1));
        match self.answers.get(index).copied().flatten() {
            Some(ip) => Ok(ip.to_string()),
            None => Err(Error::ip_lookup("lookup service unavailable")),
        }
    }

    fn name(&self) -> &'static str {
        "sequence"
    }
}

pub fn request(ipv4: &str) -> UpdateRequest {
    template().with_ip(ipv4)
}

pub fn template() -> RequestTemplate {
    RequestTemplate {
        username: "user".to_string(),
        password: "secret".to_string(),
        hostname: "www".to_string(),
        domain: "example.com".to_string(),
    }
}

pub fn workflow(connector: ScriptedConnector) -> UpdateWorkflow {
    UpdateWorkflow::new(
        Box::new(connector),
        ProtocolClient::new(&ClientConfig::default()),
    )
}

pub fn daemon_config(interval_secs: u64) -> SchedulerConfig {
    SchedulerConfig {
        mode: RunMode::Daemon,
        interval_secs,
        dedup: true,
    }
}

pub fn scheduler(
    connector: ScriptedConnector,
    resolver: SequenceResolver,
    config: SchedulerConfig,
) -> Scheduler {
    Scheduler::new(workflow(connector), Box::new(resolver), template(), config)
        .expect("scheduler construction succeeds")
}
