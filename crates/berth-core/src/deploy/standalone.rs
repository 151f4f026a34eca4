//! Deployment to a single local runtime process.
//!
//! State machine: assert artifact → ensure the process runs → push the
//! artifact (and optional companion domain) into the drop location → poll
//! the packaging-specific deployed marker until the configured timeout.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use super::local;
use crate::artifact::Artifact;
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::probe::{AppDeployedProbe, Clock, DomainDeployedProbe, Prober, SystemClock};
use crate::process::{self, ProcessControl, RuntimeHandle};

const POLL_DELAY: Duration = Duration::from_millis(1000);

pub struct StandaloneDeployer {
    config: DeploymentConfig,
    artifact: Artifact,
    domain: Option<Artifact>,
    staged: Option<PathBuf>,
    staged_domain: Option<PathBuf>,
    handle: Option<RuntimeHandle>,
    control: Option<Box<dyn ProcessControl>>,
    clock: Box<dyn Clock>,
    prepared: bool,
}

impl StandaloneDeployer {
    pub fn new(config: DeploymentConfig) -> anyhow::Result<Self> {
        if config.runtime_home.is_none() {
            return Err(DeployError::InvalidConfig(
                "standalone target requires runtime-home".into(),
            )
            .into());
        }
        let artifact = Artifact::application(config.artifact.clone(), &config.application_name);
        let domain = config.domain.clone().map(Artifact::domain);
        Ok(Self {
            config,
            artifact,
            domain,
            staged: None,
            staged_domain: None,
            handle: None,
            control: None,
            clock: Box::new(SystemClock),
            prepared: false,
        })
    }

    /// Use a caller-supplied process controller instead of deriving one
    /// from the runtime home's OS family.
    pub fn with_control(mut self, control: Box<dyn ProcessControl>) -> Self {
        self.control = Some(control);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate prerequisites and build derived handles. Must run before
    /// `deploy()` or `undeploy()`.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        self.staged = Some(self.artifact.staged_path()?);
        if let Some(domain) = &self.domain {
            domain.ensure_exists()?;
            self.staged_domain = Some(domain.path().to_path_buf());
        }
        let home = self
            .config
            .runtime_home
            .clone()
            .expect("checked at construction");
        let handle = RuntimeHandle::new(home);
        handle.validate()?;
        handle.clear_conf()?;
        if self.control.is_none() {
            self.control = Some(process::controller_for(
                &handle,
                process::DEFAULT_COMMAND_TIMEOUT,
            ));
        }
        self.handle = Some(handle);
        self.prepared = true;
        Ok(())
    }

    fn parts(&self) -> anyhow::Result<(&RuntimeHandle, &dyn ProcessControl)> {
        if !self.prepared {
            anyhow::bail!("prepare() must run before deploy()/undeploy()");
        }
        Ok((
            self.handle.as_ref().expect("prepared"),
            self.control.as_deref().expect("prepared"),
        ))
    }

    pub fn deploy(&mut self) -> anyhow::Result<()> {
        let (handle, control) = self.parts()?;
        local::ensure_running(control, &self.config.process_args, handle)?;

        if let (Some(domain), Some(staged)) = (&self.domain, &self.staged_domain) {
            local::push_artifact(handle, staged, domain)?;
        }
        let staged = self.staged.as_ref().expect("prepared");
        local::push_artifact(handle, staged, &self.artifact)?;

        if self.config.skip_verification {
            info!(
                application = self.artifact.name(),
                "verification skipped by configuration"
            );
            return Ok(());
        }
        let prober = Prober::new(POLL_DELAY, self.config.timeout(), self.clock.as_ref());
        if let Some(domain) = &self.domain {
            prober
                .check(&DomainDeployedProbe::new(handle.clone(), domain.name()))
                .with_context(|| format!("domain '{}' failed to deploy", domain.name()))?;
        }
        prober
            .check(&AppDeployedProbe::new(
                handle.clone(),
                self.artifact.name(),
            ))
            .with_context(|| {
                format!("application '{}' failed to deploy", self.artifact.name())
            })?;
        info!(application = self.artifact.name(), "deployment verified");
        Ok(())
    }

    pub fn undeploy(&mut self) -> anyhow::Result<()> {
        let (handle, control) = self.parts()?;
        local::remove_artifact(
            handle,
            &self.config.application_name,
            self.config.fail_if_not_exists,
        )?;
        info!(home = %handle.home().display(), "stopping runtime");
        control.stop(&self.config.process_args)?;
        Ok(())
    }
}
