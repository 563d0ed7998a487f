//! Polling Driver
//!
//! Drives a long-running video operation to a terminal state by re-querying
//! it at a fixed interval. Bounded by an optional attempt count and total
//! wait, and interruptible through a [`CancellationToken`].

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::ai::VideoOperation;
use crate::core::{CoreError, CoreResult};

/// Default wait between status queries
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default ceiling on total polling time
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(900);

// =============================================================================
// Job State
// =============================================================================

/// Status of a submitted job as observed through its handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Still running
    Pending,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed(String),
}

impl JobState {
    /// Classifies an operation handle
    pub fn of(operation: &VideoOperation) -> Self {
        if !operation.done {
            return JobState::Pending;
        }

        match &operation.error {
            Some(error) => JobState::Failed(
                error
                    .message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| match error.code {
                        Some(code) => format!("operation failed with code {}", code),
                        None => "operation failed".to_string(),
                    }),
            ),
            None => JobState::Succeeded,
        }
    }

    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Pending)
    }
}

// =============================================================================
// Poll Policy
// =============================================================================

/// How often and how long to poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Wait between status queries
    pub interval: Duration,
    /// Maximum number of waits (`None` = unbounded)
    pub max_attempts: Option<u32>,
    /// Maximum total time spent waiting (`None` = unbounded)
    pub max_wait: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            max_wait: Some(DEFAULT_MAX_WAIT),
        }
    }
}

impl PollPolicy {
    /// Polls until the job itself finishes
    pub fn unbounded() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: None,
            max_wait: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Final handle of a successful job
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// The terminal operation, carrying the result payload
    pub operation: VideoOperation,
    /// Number of intervals waited before the job finished
    pub waits: u32,
}

/// Re-queries a job handle until it reaches a terminal state
#[derive(Debug, Clone)]
pub struct PollingDriver {
    policy: PollPolicy,
    cancel: CancellationToken,
}

impl PollingDriver {
    pub fn new(policy: PollPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    /// Polls `handle` with `query` until it succeeds or fails.
    ///
    /// A handle already terminal is returned without querying. Each
    /// pending observation costs one interval wait followed by one query;
    /// query errors are returned unchanged.
    pub async fn run<F, Fut>(&self, handle: VideoOperation, mut query: F) -> CoreResult<PollOutcome>
    where
        F: FnMut(VideoOperation) -> Fut,
        Fut: Future<Output = CoreResult<VideoOperation>>,
    {
        let started = Instant::now();
        let mut operation = handle;
        let mut waits: u32 = 0;

        loop {
            match JobState::of(&operation) {
                JobState::Succeeded => {
                    debug!(
                        "Operation {} succeeded after {} waits",
                        operation.name, waits
                    );
                    return Ok(PollOutcome { operation, waits });
                }
                JobState::Failed(message) => {
                    return Err(CoreError::Generation(message));
                }
                JobState::Pending => {}
            }

            self.check_bounds(waits, started.elapsed())?;

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(CoreError::Cancelled),
                _ = tokio::time::sleep(self.policy.interval) => {}
            }

            waits += 1;
            debug!("Polling operation {} (wait {})", operation.name, waits);
            operation = query(operation).await?;
        }
    }

    fn check_bounds(&self, waits: u32, elapsed: Duration) -> CoreResult<()> {
        if let Some(max) = self.policy.max_attempts {
            if waits >= max {
                return Err(CoreError::Timeout(format!(
                    "job still running after {} status checks",
                    waits
                )));
            }
        }

        if let Some(max_wait) = self.policy.max_wait {
            if elapsed + self.policy.interval > max_wait {
                return Err(CoreError::Timeout(format!(
                    "job still running after {}s",
                    elapsed.as_secs()
                )));
            }
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
