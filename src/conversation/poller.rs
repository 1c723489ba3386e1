//! Run polling state machine.

use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::trace;

use crate::assistant::{AssistantService, Run, RunStatus};
use crate::error::BridgeError;
use crate::Result;

/// Default delay between two status checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default cap on status checks for one run.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 1200;

/// Default wall-clock budget for one run.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(600);

/// Bounds on how long a run is polled before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before each status check.
    pub interval: Duration,
    /// Maximum number of status checks.
    pub max_attempts: u32,
    /// Maximum wall-clock time spent polling.
    pub timeout: Duration,
}

impl PollPolicy {
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// How a polled run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The run completed; the reply is in the thread.
    Completed(Run),
    /// The run failed or was cancelled.
    Failed(Run),
}

impl RunOutcome {
    /// Classify a run, handing it back if it must be polled again.
    ///
    /// Only `completed`, `failed` and `cancelled` end polling. Every other
    /// status, including ones this crate does not know, keeps waiting.
    pub fn settle(run: Run) -> std::result::Result<Self, Run> {
        match run.status {
            RunStatus::Completed => Ok(Self::Completed(run)),
            RunStatus::Failed | RunStatus::Cancelled => Ok(Self::Failed(run)),
            _ => Err(run),
        }
    }

    pub fn run(&self) -> &Run {
        match self {
            Self::Completed(run) | Self::Failed(run) => run,
        }
    }
}

enum PollState {
    Waiting { attempts: u32, last: Run },
    Finished(RunOutcome),
    TimedOut { attempts: u32, last: Run },
}

/// Polls a run until it settles or the policy is exhausted.
pub struct RunPoller<'a> {
    service: &'a dyn AssistantService,
    policy: PollPolicy,
}

impl<'a> RunPoller<'a> {
    pub fn new(service: &'a dyn AssistantService, policy: PollPolicy) -> Self {
        Self { service, policy }
    }

    /// Wait for `run` to settle.
    ///
    /// Errors from the service propagate unchanged. Running out of attempts
    /// or time yields [`BridgeError::RunTimedOut`].
    pub async fn wait(&self, run: Run) -> Result<RunOutcome> {
        let start = Instant::now();
        let mut state = PollState::Waiting {
            attempts: 0,
            last: run,
        };

        loop {
            state = match state {
                PollState::Waiting { attempts, last } => self.step(start, attempts, last).await?,
                PollState::Finished(outcome) => return Ok(outcome),
                PollState::TimedOut { attempts, last } => {
                    return Err(BridgeError::RunTimedOut {
                        run_id: last.id,
                        last_status: last.status,
                        attempts,
                    });
                }
            };
        }
    }

    async fn step(&self, start: Instant, attempts: u32, last: Run) -> Result<PollState> {
        if attempts >= self.policy.max_attempts || start.elapsed() >= self.policy.timeout {
            return Ok(PollState::TimedOut { attempts, last });
        }

        sleep(self.policy.interval).await;

        let run = self.service.retrieve_run(&last.thread_id, &last.id).await?;
        let attempts = attempts + 1;
        trace!(run = %run.id, status = %run.status, attempts, "polled run");

        Ok(match RunOutcome::settle(run) {
            Ok(outcome) => PollState::Finished(outcome),
            Err(run) => PollState::Waiting { attempts, last: run },
        })
    }
}
