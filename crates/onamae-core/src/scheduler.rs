//! Update scheduler
//!
//! Drives the [`UpdateWorkflow`] either once or on a fixed interval.
//!
//! ## Tick
//!
//! 1. Resolve the address via the [`IpResolver`]
//! 2. Build and validate the request
//! 3. Skip if the address equals the last applied one (dedup)
//! 4. Run the workflow; remember the address on success
//!
//! A failed tick is logged and the loop carries on; the next tick is the
//! retry.
//!
//! ## Cancellation
//!
//! The shutdown signal is only observed while waiting for the next tick.
//! An attempt that has started always runs to completion first.
//!
//! ## Limitations
//!
//! Nothing bounds an attempt as a whole. Each exchange has its deadline, but
//! a dial that hangs blocks the loop until the OS gives up on it.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::request::RequestTemplate;
use crate::resolver::IpResolver;
use crate::workflow::{UpdateReport, UpdateWorkflow};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// State carried from tick to tick in daemon mode
///
/// Owned by the scheduling loop and never shared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerState {
    /// Address applied by the last successful attempt
    pub last_applied_ip: Option<String>,
    /// When that attempt finished
    pub last_applied_at: Option<DateTime<Utc>>,
    /// Time between ticks
    pub interval: Duration,
    /// Set once the shutdown signal has been observed
    pub cancelled: bool,
}

impl SchedulerState {
    /// Fresh state for a loop ticking every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }

    fn record_applied(&mut self, ipv4: &str) {
        self.last_applied_ip = Some(ipv4.to_string());
        self.last_applied_at = Some(Utc::now());
    }
}

/// What a single tick did
#[derive(Debug)]
pub enum TickOutcome {
    /// The record was updated
    Applied(UpdateReport),
    /// The address had not changed; nothing was sent
    Skipped { ipv4: String },
    /// The attempt failed; the loop continues
    Failed(Error),
}

/// Runs the update workflow once or periodically
pub struct Scheduler {
    workflow: UpdateWorkflow,
    resolver: Box<dyn IpResolver>,
    template: RequestTemplate,
    config: SchedulerConfig,
}

impl Scheduler {
    /// Create a scheduler
    ///
    /// # Errors
    ///
    /// `Error::Config` if the scheduler configuration is invalid.
    pub fn new(
        workflow: UpdateWorkflow,
        resolver: Box<dyn IpResolver>,
        template: RequestTemplate,
        config: SchedulerConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            workflow,
            resolver,
            template,
            config,
        })
    }

    /// Run a single attempt
    ///
    /// Any error is the caller's final outcome.
    pub async fn run_once(&self) -> Result<UpdateReport> {
        let ipv4 = self.resolver.resolve().await?;
        debug!("Resolved {} via {}", ipv4, self.resolver.name());
        self.workflow.run_update(&self.template.with_ip(ipv4)).await
    }

    /// Run one daemon tick against `state`
    pub async fn tick(&self, state: &mut SchedulerState) -> TickOutcome {
        let ipv4 = match self.resolver.resolve().await {
            Ok(ip) => ip,
            Err(e) => return TickOutcome::Failed(e),
        };
        debug!("Resolved {} via {}", ipv4, self.resolver.name());

        let request = self.template.with_ip(ipv4);
        if let Err(e) = request.validate() {
            return TickOutcome::Failed(e);
        }

        if self.config.dedup && state.last_applied_ip.as_deref() == Some(request.ipv4.as_str()) {
            info!(
                "Skipping {}: {} unchanged since {}",
                request.record_name(),
                request.ipv4,
                state
                    .last_applied_at
                    .map(|at| at.to_rfc3339())
                    .unwrap_or_else(|| "start".to_string())
            );
            return TickOutcome::Skipped { ipv4: request.ipv4 };
        }

        match self.workflow.run_update(&request).await {
            Ok(report) => {
                state.record_applied(&report.ipv4);
                TickOutcome::Applied(report)
            }
            Err(e) => TickOutcome::Failed(e),
        }
    }

    /// Tick every interval until `shutdown` fires
    ///
    /// The first tick runs immediately. Returns the final state.
    pub async fn run_until(&self, mut shutdown: oneshot::Receiver<()>) -> SchedulerState {
        let mut state = SchedulerState::new(self.config.interval());
        let mut ticker = tokio::time::interval(state.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!("Scheduler started (interval {:?})", state.interval);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    state.cancelled = true;
                    break;
                }

                _ = ticker.tick() => {}
            }

            if let TickOutcome::Failed(e) = self.tick(&mut state).await {
                error!("Update attempt failed: {}", e);
                // Continue running despite errors
            }
        }

        info!("Scheduler stopped");
        state
    }
}
