//! Local runtime process control.
//!
//! One controller per OS family, both speaking the same contract against
//! the installation's control script. Deployers hold the controller behind
//! the [`ProcessControl`] trait so tests can inject fakes.

pub mod exec;
mod unix;
mod windows;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

pub use unix::UnixController;
pub use windows::WindowsController;

/// OS family of a runtime installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Unix,
    Windows,
}

impl OsFamily {
    pub fn current() -> Self {
        if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Unix
        }
    }
}

/// Queried (never cached) run state of a runtime process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    Stopped,
}

/// One local runtime installation.
///
/// On-disk contract: the home directory contains the control script under
/// `bin/`, an `apps/` drop directory (a correctly named artifact file means
/// "deployed", a generated `<name>.deployed` marker means "fully started"),
/// a `domains/` drop directory with the same marker contract, and a `conf/`
/// directory whose per-run `*.run` files are cleared before each run.
#[derive(Debug, Clone)]
pub struct RuntimeHandle {
    home: PathBuf,
    os: OsFamily,
}

impl RuntimeHandle {
    pub fn new(home: PathBuf) -> Self {
        Self::with_os(home, OsFamily::current())
    }

    pub fn with_os(home: PathBuf, os: OsFamily) -> Self {
        Self { home, os }
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn os(&self) -> OsFamily {
        self.os
    }

    pub fn apps_dir(&self) -> PathBuf {
        self.home.join("apps")
    }

    pub fn domains_dir(&self) -> PathBuf {
        self.home.join("domains")
    }

    pub fn conf_dir(&self) -> PathBuf {
        self.home.join("conf")
    }

    /// Marker the runtime generates once an application is fully started.
    pub fn app_started_marker(&self, name: &str) -> PathBuf {
        self.apps_dir().join(format!("{name}.deployed"))
    }

    /// Marker the runtime generates once a domain is fully loaded.
    pub fn domain_started_marker(&self, name: &str) -> PathBuf {
        self.domains_dir().join(format!("{name}.deployed"))
    }

    /// Derived control-script path for the installation's OS family.
    pub fn control_script(&self) -> PathBuf {
        match self.os {
            OsFamily::Unix => self.home.join("bin").join("runtime"),
            OsFamily::Windows => self.home.join("bin").join("runtime.bat"),
        }
    }

    /// Fails unless the installation root and control script are present.
    pub fn validate(&self) -> anyhow::Result<()> {
        if !self.home.is_dir() {
            anyhow::bail!("runtime home does not exist: {}", self.home.display());
        }
        let script = self.control_script();
        if !script.is_file() {
            anyhow::bail!("runtime control script not found: {}", script.display());
        }
        Ok(())
    }

    /// Remove stale per-run files (`conf/*.run`) left by a previous run.
    pub fn clear_conf(&self) -> anyhow::Result<()> {
        let conf = self.conf_dir();
        if !conf.is_dir() {
            return Ok(());
        }
        for entry in std::fs::read_dir(&conf)
            .with_context(|| format!("Failed to read conf dir: {}", conf.display()))?
        {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "run") {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                tracing::debug!(file = %path.display(), "cleared per-run config file");
            }
        }
        Ok(())
    }
}

/// Control primitive over one runtime installation.
///
/// `status()` queries the live process state; implementations never cache it.
pub trait ProcessControl {
    fn start(&self, args: &[String]) -> anyhow::Result<()>;
    fn stop(&self, args: &[String]) -> anyhow::Result<()>;
    fn restart(&self, args: &[String]) -> anyhow::Result<()>;
    fn status(&self) -> anyhow::Result<ProcessStatus>;
    fn process_id(&self) -> anyhow::Result<u32>;
}

/// Budget for any single control-command invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Construct the controller matching the installation's OS family.
pub fn controller_for(handle: &RuntimeHandle, command_timeout: Duration) -> Box<dyn ProcessControl> {
    match handle.os() {
        OsFamily::Unix => Box::new(UnixController::new(handle.clone(), command_timeout)),
        OsFamily::Windows => Box::new(WindowsController::new(handle.clone(), command_timeout)),
    }
}

/// Extract the PID from the control command's status output.
///
/// The fixed pattern is `runtime is running (pid: N)`.
pub(crate) fn parse_pid(output: &str) -> Option<u32> {
    let idx = output.find("(pid:")?;
    let rest = &output[idx + "(pid:".len()..];
    let end = rest.find(')')?;
    rest[..end].trim().parse().ok()
}

pub(crate) fn is_running_output(output: &str) -> bool {
    output.contains("is running")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pid_from_status_output() {
        assert_eq!(parse_pid("runtime is running (pid: 4711)"), Some(4711));
        assert_eq!(parse_pid("runtime is running (pid:12)"), Some(12));
    }

    #[test]
    fn missing_pattern_yields_none() {
        assert_eq!(parse_pid("runtime is not running"), None);
        assert_eq!(parse_pid(""), None);
    }

    #[test]
    fn running_detection() {
        assert!(is_running_output("runtime is running (pid: 1)"));
        assert!(!is_running_output("stopped"));
    }

    #[test]
    fn control_script_per_os_family() {
        let unix = RuntimeHandle::with_os("/opt/rt".into(), OsFamily::Unix);
        assert!(unix.control_script().ends_with("bin/runtime"));
        let windows = RuntimeHandle::with_os("/opt/rt".into(), OsFamily::Windows);
        assert!(
            windows
                .control_script()
                .to_string_lossy()
                .ends_with("runtime.bat")
        );
    }
}
