//! Polling framework: wait until a predicate holds, else time out.
//!
//! The clock is injected so tests can simulate elapsed time without real
//! sleeping. Probe evaluation reports a retry-state enum rather than
//! signalling "not yet" through errors; errors from a probe are genuine
//! failures and abort the poll immediately.

use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::DeployError;
use crate::process::RuntimeHandle;

/// Source of time and sleeping for pollers and retriers.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation used outside tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Outcome of one probe evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    Satisfied,
    Pending,
}

/// A predicate over a deployment's externally observable state.
pub trait Probe {
    fn check(&self) -> anyhow::Result<ProbeStatus>;

    /// Subject of the probe, used in the timeout message.
    fn describe(&self) -> String;
}

/// Repeatedly evaluates a probe, sleeping a fixed delay between attempts,
/// until it is satisfied or the total budget is spent.
pub struct Prober<'c> {
    poll_delay: Duration,
    timeout: Duration,
    clock: &'c dyn Clock,
}

impl<'c> Prober<'c> {
    pub fn new(poll_delay: Duration, timeout: Duration, clock: &'c dyn Clock) -> Self {
        Self {
            poll_delay,
            timeout,
            clock,
        }
    }

    /// Poll until the probe is satisfied.
    ///
    /// The probe is evaluated `timeout / poll_delay` times (at least once),
    /// one delay apart; each sleep is capped at the remaining budget, so the
    /// total wait never exceeds the configured timeout. Exhaustion converts
    /// into [`DeployError::Timeout`] naming the probe's subject and the
    /// elapsed time.
    pub fn check(&self, probe: &dyn Probe) -> anyhow::Result<()> {
        let attempts = (self.timeout.as_millis() / self.poll_delay.as_millis().max(1)).max(1);
        let started = self.clock.now();
        let deadline = started + self.timeout;
        for attempt in 1..=attempts {
            let remaining = deadline.saturating_duration_since(self.clock.now());
            self.clock.sleep(self.poll_delay.min(remaining));
            match probe.check()? {
                ProbeStatus::Satisfied => {
                    debug!(subject = probe.describe(), attempt, "probe satisfied");
                    return Ok(());
                }
                ProbeStatus::Pending => {
                    debug!(subject = probe.describe(), attempt, "probe pending");
                }
            }
        }
        Err(DeployError::Timeout {
            what: probe.describe(),
            elapsed: self.clock.now().duration_since(started),
        }
        .into())
    }
}

/// Satisfied once the runtime has generated the started marker for an
/// application in its drop directory.
pub struct AppDeployedProbe {
    handle: RuntimeHandle,
    name: String,
}

impl AppDeployedProbe {
    pub fn new(handle: RuntimeHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }
}

impl Probe for AppDeployedProbe {
    fn check(&self) -> anyhow::Result<ProbeStatus> {
        let marker = self.handle.app_started_marker(&self.name);
        if marker.is_file() {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Pending)
        }
    }

    fn describe(&self) -> String {
        format!(
            "application '{}' deployed on {}",
            self.name,
            self.handle.home().display()
        )
    }
}

/// Satisfied once the runtime has generated the loaded marker for a domain
/// in its drop directory. The pushed artifact itself is not evidence; the
/// deployer wrote that file.
pub struct DomainDeployedProbe {
    handle: RuntimeHandle,
    name: String,
}

impl DomainDeployedProbe {
    pub fn new(handle: RuntimeHandle, name: impl Into<String>) -> Self {
        Self {
            handle,
            name: name.into(),
        }
    }
}

impl Probe for DomainDeployedProbe {
    fn check(&self) -> anyhow::Result<ProbeStatus> {
        let marker = self.handle.domain_started_marker(&self.name);
        if marker.is_file() {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Pending)
        }
    }

    fn describe(&self) -> String {
        format!(
            "domain '{}' deployed on {}",
            self.name,
            self.handle.home().display()
        )
    }
}
