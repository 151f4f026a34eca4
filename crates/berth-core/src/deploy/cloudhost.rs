//! Deployment to the cloud application host.
//!
//! Create-or-update semantics: an available name is created and started, an
//! existing application is updated in place (custom properties merged or
//! overridden per configuration) and given a grace period before
//! verification, since updates are eventually consistent.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::client::{Application, ApplicationRequest, CloudHostApi, CloudHostClient};
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::probe::{Clock, Probe, ProbeStatus, Prober, SystemClock};

const POLL_DELAY: Duration = Duration::from_millis(1000);

/// Settling time after an update before status polling is meaningful.
const UPDATE_GRACE: Duration = Duration::from_secs(5);

pub struct CloudHostDeployer {
    config: DeploymentConfig,
    artifact: Artifact,
    staged: Option<PathBuf>,
    api: Option<Box<dyn CloudHostApi>>,
    clock: Box<dyn Clock>,
    prepared: bool,
}

impl CloudHostDeployer {
    pub fn new(config: DeploymentConfig) -> anyhow::Result<Self> {
        let artifact = Artifact::application(config.artifact.clone(), &config.application_name);
        Ok(Self {
            config,
            artifact,
            staged: None,
            api: None,
            clock: Box::new(SystemClock),
            prepared: false,
        })
    }

    /// Use a caller-supplied control-plane client instead of connecting.
    pub fn with_api(mut self, api: Box<dyn CloudHostApi>) -> Self {
        self.api = Some(api);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the artifact and establish the authenticated client.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        self.staged = Some(self.artifact.staged_path()?);
        if self.api.is_none() {
            let base = self.config.base_url.clone().ok_or_else(|| {
                DeployError::InvalidConfig("cloud-host target requires base-url".into())
            })?;
            let credentials = self.config.credentials.as_ref().ok_or_else(|| {
                DeployError::InvalidConfig("cloud-host target requires credentials".into())
            })?;
            let environment = self.config.environment.as_deref().ok_or_else(|| {
                DeployError::InvalidConfig("cloud-host target requires environment".into())
            })?;
            self.api = Some(Box::new(CloudHostClient::connect(
                base,
                credentials,
                environment,
            )?));
        }
        self.prepared = true;
        Ok(())
    }

    fn api(&self) -> anyhow::Result<&dyn CloudHostApi> {
        if !self.prepared {
            anyhow::bail!("prepare() must run before deploy()/undeploy()");
        }
        Ok(self.api.as_deref().expect("prepared"))
    }

    fn request_for(&self, existing: Option<&Application>) -> ApplicationRequest {
        let properties = match existing {
            None => self.config.properties.clone(),
            Some(app) => {
                // The update path preserves what the platform already holds;
                // the override flag lets conflicting keys take the new value.
                let mut merged = app.properties.clone();
                for (key, value) in &self.config.properties {
                    if self.config.override_properties {
                        merged.insert(key.clone(), value.clone());
                    } else {
                        merged.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                }
                merged
            }
        };
        ApplicationRequest {
            name: self.config.application_name.clone(),
            artifact_file_name: self.artifact.target_file_name(),
            worker_count: self.config.worker_count,
            worker_type: self.config.worker_type.clone(),
            region: self.config.region.clone(),
            properties,
        }
    }

    pub fn deploy(&mut self) -> anyhow::Result<()> {
        let api = self.api()?;
        let name = self.config.application_name.clone();

        let existing = api
            .find_application(&name)
            .context("cloud-host application lookup failed")?;
        match &existing {
            None => {
                info!(application = %name, "name is available, creating application");
                let request = self.request_for(None);
                api.create_application(&request)
                    .context("cloud-host create failed")?;
                api.start_application(&name)
                    .context("cloud-host start failed")?;
            }
            Some(app) => {
                info!(application = %name, status = %app.status, "application exists, updating in place");
                let request = self.request_for(Some(app));
                api.update_application(&name, &request)
                    .context("cloud-host update failed")?;
                self.clock.sleep(UPDATE_GRACE);
            }
        }

        if self.config.skip_verification {
            info!(application = %name, "verification skipped by configuration");
            return Ok(());
        }
        let prober = Prober::new(POLL_DELAY, self.config.timeout(), self.clock.as_ref());
        prober.check(&StartedProbe { api, name: &name })?;
        info!(application = %name, "cloud-host deployment verified");
        Ok(())
    }

    pub fn undeploy(&mut self) -> anyhow::Result<()> {
        let api = self.api()?;
        let name = &self.config.application_name;

        let existing = api
            .find_application(name)
            .context("cloud-host application lookup failed")?;
        if existing.is_none() {
            if self.config.fail_if_not_exists {
                return Err(DeployError::NotFound(format!("application '{name}'")).into());
            }
            info!(application = %name, "application not present, nothing to undeploy");
            return Ok(());
        }

        // Two sequential single-shot calls; client errors re-raise as-is.
        info!(application = %name, "stopping application");
        api.stop_application(name)
            .context("cloud-host stop failed")?;
        info!(application = %name, "deleting application");
        api.delete_application(name)
            .context("cloud-host delete failed")?;
        Ok(())
    }
}

struct StartedProbe<'a> {
    api: &'a dyn CloudHostApi,
    name: &'a str,
}

impl Probe for StartedProbe<'_> {
    fn check(&self) -> anyhow::Result<ProbeStatus> {
        let status = self.api.application_status(self.name)?;
        match status.as_str() {
            "STARTED" => Ok(ProbeStatus::Satisfied),
            "DEPLOY_FAILED" => {
                warn!(application = self.name, "platform reported DEPLOY_FAILED");
                Err(DeployError::Process(format!(
                    "application '{}' entered DEPLOY_FAILED on the cloud host",
                    self.name
                ))
                .into())
            }
            _ => Ok(ProbeStatus::Pending),
        }
    }

    fn describe(&self) -> String {
        format!("application '{}' started on cloud host", self.name)
    }
}
