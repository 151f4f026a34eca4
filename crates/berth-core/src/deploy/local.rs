//! Routines shared by the local-process targets (standalone and cluster).

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{info, warn};

use crate::artifact::{Artifact, Packaging};
use crate::error::DeployError;
use crate::process::{ProcessControl, ProcessStatus, RuntimeHandle};

/// Copy a staged artifact into the runtime's drop directory.
pub(crate) fn push_artifact(
    handle: &RuntimeHandle,
    staged: &Path,
    artifact: &Artifact,
) -> anyhow::Result<PathBuf> {
    let dir = match artifact.packaging() {
        Packaging::Application => handle.apps_dir(),
        Packaging::Domain => handle.domains_dir(),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create drop directory: {}", dir.display()))?;
    let dest = dir.join(artifact.target_file_name());
    std::fs::copy(staged, &dest).with_context(|| {
        format!(
            "Failed to push artifact {} to {}",
            staged.display(),
            dest.display()
        )
    })?;
    info!(artifact = artifact.name(), to = %dest.display(), "pushed artifact");
    Ok(dest)
}

/// Start the runtime when it is stopped; fail fast when it still reports
/// stopped after the attempted start.
pub(crate) fn ensure_running(
    control: &dyn ProcessControl,
    args: &[String],
    handle: &RuntimeHandle,
) -> anyhow::Result<()> {
    if control.status()? == ProcessStatus::Running {
        return Ok(());
    }
    info!(home = %handle.home().display(), "runtime is stopped, starting it");
    control.start(args)?;
    if control.status()? == ProcessStatus::Stopped {
        return Err(DeployError::Process(format!(
            "runtime at {} is not running after start",
            handle.home().display()
        ))
        .into());
    }
    Ok(())
}

/// Delete every drop-directory entry whose base name matches the
/// application name. Returns whether anything was removed; a miss is an
/// error only when the configuration demands the application exists.
pub(crate) fn remove_artifact(
    handle: &RuntimeHandle,
    name: &str,
    fail_if_not_exists: bool,
) -> anyhow::Result<bool> {
    let apps = handle.apps_dir();
    let mut removed = false;
    if apps.is_dir() {
        for entry in std::fs::read_dir(&apps)
            .with_context(|| format!("Failed to scan drop directory: {}", apps.display()))?
        {
            let path = entry?.path();
            let matches = path
                .file_stem()
                .map(|stem| stem.to_string_lossy() == name)
                .unwrap_or(false);
            if matches && path.is_file() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
                info!(file = %path.display(), "removed deployed artifact");
                removed = true;
            }
        }
    }
    if !removed {
        if fail_if_not_exists {
            return Err(DeployError::NotFound(format!(
                "application '{}' on {}",
                name,
                handle.home().display()
            ))
            .into());
        }
        info!(
            application = name,
            home = %handle.home().display(),
            "application not deployed, nothing to remove"
        );
    }
    Ok(removed)
}

/// Best-effort stop while another failure is already being handled; the
/// original failure must never be masked.
pub(crate) fn stop_quietly(control: &dyn ProcessControl, handle: &RuntimeHandle) {
    if let Err(err) = control.stop(&[]) {
        warn!(
            home = %handle.home().display(),
            %err,
            "best-effort stop failed while handling an earlier failure"
        );
    }
}
