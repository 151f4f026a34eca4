//! Windows runtime controller.
//!
//! The runtime runs as a service on Windows; registration happens
//! transparently before the first start.

use std::cell::Cell;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::exec::{self, ExecOutput};
use super::{ProcessControl, ProcessStatus, RuntimeHandle, is_running_output, parse_pid};
use crate::error::DeployError;

const START_ATTEMPTS: u32 = 3;

/// Exit code for "service already stopped"; treated as a successful stop.
const BENIGN_STOP_CODE: i32 = 2;

/// Exit code for "service already installed".
const ALREADY_INSTALLED_CODE: i32 = 1;

pub struct WindowsController {
    handle: RuntimeHandle,
    command_timeout: Duration,
    installed: Cell<bool>,
}

impl WindowsController {
    pub fn new(handle: RuntimeHandle, command_timeout: Duration) -> Self {
        Self {
            handle,
            command_timeout,
            installed: Cell::new(false),
        }
    }

    fn run(&self, verb: &str, args: &[String]) -> anyhow::Result<ExecOutput> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(verb.to_string());
        full.extend_from_slice(args);
        exec::run_with_timeout(&self.handle.control_script(), &full, self.command_timeout)
    }

    /// Register the runtime service.
    pub fn install(&self) -> anyhow::Result<()> {
        let out = self.run("install", &[])?;
        if out.success() || out.code == ALREADY_INSTALLED_CODE {
            debug!(code = out.code, "runtime service installed");
            self.installed.set(true);
            return Ok(());
        }
        Err(DeployError::Process(format!(
            "runtime service install exited with code {}: {}",
            out.code,
            out.stderr.trim()
        ))
        .into())
    }

    /// Remove the service registration.
    pub fn uninstall(&self) -> anyhow::Result<()> {
        let out = self.run("uninstall", &[])?;
        if out.success() {
            self.installed.set(false);
            return Ok(());
        }
        Err(DeployError::Process(format!(
            "runtime service uninstall exited with code {}: {}",
            out.code,
            out.stderr.trim()
        ))
        .into())
    }
}

impl ProcessControl for WindowsController {
    fn start(&self, args: &[String]) -> anyhow::Result<()> {
        if !self.installed.get() {
            self.install()?;
        }
        for attempt in 1..=START_ATTEMPTS {
            let out = self.run("start", args)?;
            if out.success() {
                info!(home = %self.handle.home().display(), "runtime service started");
                return Ok(());
            }
            warn!(
                attempt,
                code = out.code,
                stderr = out.stderr.trim(),
                "runtime service start failed"
            );
            if attempt < START_ATTEMPTS {
                if let Err(err) = self.stop(&[]) {
                    warn!(%err, "stop between start attempts failed");
                }
            }
        }
        Err(DeployError::Process(format!(
            "runtime service at {} failed to start after {} attempts",
            self.handle.home().display(),
            START_ATTEMPTS
        ))
        .into())
    }

    fn stop(&self, args: &[String]) -> anyhow::Result<()> {
        let out = self.run("stop", args)?;
        if out.success() || out.code == BENIGN_STOP_CODE {
            debug!(code = out.code, "runtime service stopped");
            return Ok(());
        }
        Err(DeployError::Process(format!(
            "runtime service stop exited with code {}: {}",
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
            "runtime service restart exited with code {}: {}",
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
