//! Waiting for install milestones
//!
//! Once the infrastructure exists the installer has nothing left to drive;
//! the remaining progress is reported by an external status service. The
//! wait-for commands poll that service at a fixed interval until the
//! requested milestone is reached, the service reports a terminal failure,
//! or an optional timeout runs out.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

pub mod rest;

pub use rest::RestStatusSource;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    /// The cluster manifests passed validation
    ClusterValidated,
    /// The control plane took over from the bootstrap machine
    BootstrapComplete,
    /// Every operator finished rolling out
    InstallComplete,
}

impl Milestone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Milestone::ClusterValidated => "cluster-validated",
            Milestone::BootstrapComplete => "bootstrap-complete",
            Milestone::InstallComplete => "install-complete",
        }
    }
}

impl fmt::Display for Milestone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress of a milestone as seen by the status source
#[derive(Debug, Clone, PartialEq)]
pub enum MilestoneStatus {
    Reached,
    /// Not there yet; carries the service's current status for logging
    Pending(String),
    /// The install can no longer reach the milestone
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    /// Worth retrying on the next poll
    #[error("{0}")]
    Transient(String),

    #[error("{0}")]
    Fatal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WaitError {
    #[error("{milestone} failed: {reason}")]
    Failed { milestone: Milestone, reason: String },

    #[error("timed out after {elapsed:?} waiting for {milestone}")]
    Timeout {
        milestone: Milestone,
        elapsed: Duration,
    },

    #[error("status source error: {0}")]
    Source(#[from] StatusError),
}

#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status(&self, milestone: Milestone) -> Result<MilestoneStatus, StatusError>;
}

#[derive(Debug, Clone)]
pub struct WaitOptions {
    pub poll_interval: Duration,
    /// `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Block until `milestone` is reached
#[instrument(skip(source, options), fields(milestone = %milestone))]
pub async fn wait_for(
    source: &dyn StatusSource,
    milestone: Milestone,
    options: &WaitOptions,
) -> Result<(), WaitError> {
    let started = Instant::now();
    info!(timeout = ?options.timeout, "Waiting for milestone");

    loop {
        match source.status(milestone).await {
            Ok(MilestoneStatus::Reached) => {
                info!(elapsed = ?started.elapsed(), "Milestone reached");
                return Ok(());
            }
            Ok(MilestoneStatus::Failed(reason)) => {
                return Err(WaitError::Failed { milestone, reason });
            }
            Ok(MilestoneStatus::Pending(status)) => {
                debug!(%status, "Milestone pending");
            }
            Err(StatusError::Transient(e)) => {
                warn!(error = %e, "Status check failed, retrying");
            }
            Err(e) => return Err(e.into()),
        }

        let elapsed = started.elapsed();
        let mut delay = options.poll_interval;
        if let Some(timeout) = options.timeout {
            if elapsed >= timeout {
                return Err(WaitError::Timeout { milestone, elapsed });
            }
            // never sleep past the deadline
            delay = delay.min(timeout - elapsed);
        }

        tokio::time::sleep(delay).await;
    }
}
