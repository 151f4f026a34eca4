//! Unix runtime controller.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::exec::{self, ExecOutput};
use super::{ProcessControl, ProcessStatus, RuntimeHandle, is_running_output, parse_pid};
use crate::error::DeployError;

const START_ATTEMPTS: u32 = 3;

/// Exit code the control script uses for "already stopped"; treated as a
/// successful stop.
const BENIGN_STOP_CODE: i32 = 3;

pub struct UnixController {
    handle: RuntimeHandle,
    command_timeout: Duration,
}

impl UnixController {
    pub fn new(handle: RuntimeHandle, command_timeout: Duration) -> Self {
        Self {
            handle,
            command_timeout,
        }
    }

    fn run(&self, verb: &str, args: &[String]) -> anyhow::Result<ExecOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(verb.to_string());
        full.extend_from_slice(args);
        exec::run_with_timeout(&self.handle.control_script(), &full, self.command_timeout)
    }
}

impl ProcessControl for UnixController {
    fn start(&self, args: &[String]) -> anyhow::Result<()> {
        for attempt in 1..=START_ATTEMPTS {
            let out = self.run("start", args)?;
            if out.success() {
                info!(home = %self.handle.home().display(), "runtime started");
                return Ok(());
            }
            warn!(
                attempt,
                code = out.code,
                stderr = out.stderr.trim(),
                "runtime start failed"
            );
            if attempt < START_ATTEMPTS {
                // Stop before retrying so a half-started instance cannot
                // shadow the next attempt.
                if let Err(err) = self.stop(&[]) {
                    warn!(%err, "stop between start attempts failed");
                }
            }
        }
        Err(DeployError::Process(format!(
            "runtime at {} failed to start after {} attempts",
            self.handle.home().display(),
            START_ATTEMPTS
        ))
        .into())
    }

    fn stop(&self, args: &[String]) -> anyhow::Result<()> {
        let out = self.run("stop", args)?;
        if out.success() || out.code == BENIGN_STOP_CODE {
            debug!(code = out.code, "runtime stopped");
            return Ok(());
        }
        Err(DeployError::Process(format!(
            "runtime stop exited with code {}: {}",
            out.code,
            out.stderr.trim()
        ))
        .into())
    }

    fn restart(&self, args: &[String]) -> anyhow::Result<()> {
        let out = self.run("restart", args)?;
        if out.success() {
            return Ok(());
        }
        Err(DeployError::Process(format!(
            "runtime restart exited with code {}: {}",
            out.code,
            out.stderr.trim()
        ))
        .into())
    }

    fn status(&self) -> anyhow::Result<ProcessStatus> {
        let out = self.run("status", &[])?;
        if out.success() && is_running_output(&out.stdout) {
            Ok(ProcessStatus::Running)
        } else {
            Ok(ProcessStatus::Stopped)
        }
    }

    fn process_id(&self) -> anyhow::Result<u32> {
        let out = self.run("status", &[])?;
        parse_pid(&out.stdout).ok_or_else(|| {
            DeployError::Process("no instance of the runtime is running".into()).into()
        })
    }
}
