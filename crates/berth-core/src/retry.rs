//! Bounded retry primitive for eventually-consistent remote flows.

use std::time::Duration;

use tracing::debug;

use crate::error::DeployError;
use crate::probe::Clock;

/// Attempt and sleep budget for [`retry`].
///
/// Both values must be strictly positive; invalid values are rejected at
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    attempts: u32,
    sleep: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_ATTEMPTS: u32 = 10;
    pub const DEFAULT_SLEEP: Duration = Duration::from_secs(30);

    pub fn new(attempts: u32, sleep: Duration) -> anyhow::Result<Self> {
        if attempts == 0 {
            return Err(
                DeployError::InvalidConfig("retry attempts must be strictly positive".into())
                    .into(),
            );
        }
        if sleep.is_zero() {
            return Err(DeployError::InvalidConfig(
                "retry sleep interval must be strictly positive".into(),
            )
            .into());
        }
        Ok(Self { attempts, sleep })
    }

    /// Derive the sleep interval from a total timeout: `timeout / attempts`.
    pub fn from_timeout(timeout: Duration, attempts: u32) -> anyhow::Result<Self> {
        if attempts == 0 {
            return Err(
                DeployError::InvalidConfig("retry attempts must be strictly positive".into())
                    .into(),
            );
        }
        Self::new(attempts, timeout / attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn sleep(&self) -> Duration {
        self.sleep
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: Self::DEFAULT_ATTEMPTS,
            sleep: Self::DEFAULT_SLEEP,
        }
    }
}

/// Whether the retried operation wants another attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// The operation settled; stop retrying.
    Done,
    /// Keep going; the message becomes the timeout error on exhaustion.
    Retry(String),
}

/// Run `operation` up to `policy.attempts()` times, sleeping between
/// iterations while it keeps signalling [`RetryState::Retry`].
///
/// Exhaustion converts into [`DeployError::Timeout`] carrying the last
/// operation-supplied message. Errors from the operation abort immediately.
pub fn retry(
    policy: &RetryPolicy,
    clock: &dyn Clock,
    mut operation: impl FnMut() -> anyhow::Result<RetryState>,
) -> anyhow::Result<()> {
    let started = clock.now();
    let mut last_message = String::new();
    for attempt in 1..=policy.attempts() {
        match operation()? {
            RetryState::Done => return Ok(()),
            RetryState::Retry(message) => {
                debug!(attempt, %message, "operation not settled, retrying");
                last_message = message;
            }
        }
        if attempt < policy.attempts() {
            clock.sleep(policy.sleep());
        }
    }
    Err(DeployError::Timeout {
        what: last_message,
        elapsed: clock.now().duration_since(started),
    }
    .into())
}
