//! Deployment to the fleet-management control plane.
//!
//! The target id is resolved from its human name, the runtime image tag
//! from the requested base version, and the public URL from the target's
//! wildcard domain unless one is configured. Create is not strictly
//! idempotent on the platform: a bad-request rejection falls back to one
//! modify call against the existing deployment.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::client::fleet::resolve_runtime_version;
use crate::client::{Deployment, DeploymentRequest, FleetApi, FleetClient, Target};
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::probe::{Clock, SystemClock};
use crate::retry::{RetryPolicy, RetryState, retry};

pub struct FleetDeployer {
    config: DeploymentConfig,
    artifact: Artifact,
    staged: Option<PathBuf>,
    api: Option<Box<dyn FleetApi>>,
    clock: Box<dyn Clock>,
    prepared: bool,
}

impl FleetDeployer {
    pub fn new(config: DeploymentConfig) -> anyhow::Result<Self> {
        if config.target_name.is_none() {
            return Err(DeployError::InvalidConfig(
                "fleet-platform target requires target-name".into(),
            )
            .into());
        }
        if config.runtime_version.is_none() {
            return Err(DeployError::InvalidConfig(
                "fleet-platform target requires runtime-version".into(),
            )
            .into());
        }
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
    pub fn with_api(mut self, api: Box<dyn FleetApi>) -> Self {
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
                DeployError::InvalidConfig("fleet-platform target requires base-url".into())
            })?;
            let credentials = self.config.credentials.as_ref().ok_or_else(|| {
                DeployError::InvalidConfig("fleet-platform target requires credentials".into())
            })?;
            self.api = Some(Box::new(FleetClient::connect(
                base,
                credentials,
                self.config.business_group.as_deref(),
            )?));
        }
        self.prepared = true;
        Ok(())
    }

    fn api(&self) -> anyhow::Result<&dyn FleetApi> {
        if !self.prepared {
            anyhow::bail!("prepare() must run before deploy()/undeploy()");
        }
        Ok(self.api.as_deref().expect("prepared"))
    }

    fn resolve_target(&self, api: &dyn FleetApi) -> anyhow::Result<Target> {
        let wanted = self.config.target_name.as_deref().expect("validated");
        let targets = api.list_targets().context("fleet-platform target listing failed")?;
        targets
            .into_iter()
            .find(|target| target.name == wanted)
            .ok_or_else(|| DeployError::NotFound(format!("target '{wanted}'")).into())
    }

    fn public_url_for(&self, target: &Target) -> Option<String> {
        self.config.public_url.clone().or_else(|| {
            target
                .domain
                .as_ref()
                .map(|domain| domain.replace('*', &self.config.application_name))
        })
    }

    pub fn deploy(&mut self) -> anyhow::Result<()> {
        let api = self.api()?;
        let name = self.config.application_name.clone();

        let target = self.resolve_target(api)?;
        let requested = self.config.runtime_version.as_deref().expect("validated");
        let versions = api
            .runtime_versions(&target.id)
            .context("fleet-platform runtime catalogue lookup failed")?;
        let runtime_version = resolve_runtime_version(&versions, requested)?;
        info!(
            target = %target.name,
            runtime = %runtime_version,
            "resolved fleet target and runtime version"
        );

        let request = DeploymentRequest {
            name: name.clone(),
            target_id: target.id.clone(),
            runtime_version,
            artifact_file_name: self.artifact.target_file_name(),
            replicas: self.config.worker_count.unwrap_or(1),
            public_url: self.public_url_for(&target),
            properties: self.config.properties.clone(),
        };

        let deployment = match api.create_deployment(&request) {
            Ok(deployment) => deployment,
            Err(err) if err.is_bad_request() => {
                warn!(
                    application = %name,
                    %err,
                    "create rejected as bad request, falling back to modify"
                );
                self.modify_existing(api, &target, &request)?
            }
            Err(err) => {
                return Err(anyhow::Error::from(err).context("fleet-platform create failed"));
            }
        };

        if self.config.skip_verification {
            info!(application = %name, "verification skipped by configuration");
            return Ok(());
        }
        self.verify_started(api, &target, &deployment)?;
        info!(application = %name, target = %target.name, "fleet deployment verified");
        Ok(())
    }

    fn modify_existing(
        &self,
        api: &dyn FleetApi,
        target: &Target,
        request: &DeploymentRequest,
    ) -> anyhow::Result<Deployment> {
        let existing = api
            .find_deployment(&request.name, &target.id)
            .context("fleet-platform deployment lookup failed")?
            .ok_or_else(|| {
                DeployError::NotFound(format!(
                    "deployment '{}' on target '{}'",
                    request.name, target.name
                ))
            })?;
        api.modify_deployment(&existing.id, request)
            .context("fleet-platform modify failed")
    }

    /// A freshly registered deployment needs time to settle; wait for it
    /// with the bounded retrier rather than the prober.
    fn verify_started(
        &self,
        api: &dyn FleetApi,
        target: &Target,
        deployment: &Deployment,
    ) -> anyhow::Result<()> {
        let policy =
            RetryPolicy::from_timeout(self.config.timeout(), RetryPolicy::DEFAULT_ATTEMPTS)?;
        retry(&policy, self.clock.as_ref(), || {
            let status = api
                .deployment_status(&deployment.id)
                .context("fleet-platform status lookup failed")?;
            match status.as_str() {
                "STARTED" => Ok(RetryState::Done),
                "FAILED" => Err(DeployError::Process(format!(
                    "deployment '{}' failed on target '{}'",
                    deployment.name, target.name
                ))
                .into()),
                other => Ok(RetryState::Retry(format!(
                    "deployment '{}' is {} on target '{}'",
                    deployment.name, other, target.name
                ))),
            }
        })
    }

    pub fn undeploy(&mut self) -> anyhow::Result<()> {
        let api = self.api()?;
        let name = &self.config.application_name;

        let target = self.resolve_target(api)?;
        let existing = api
            .find_deployment(name, &target.id)
            .context("fleet-platform deployment lookup failed")?;
        match existing {
            None => {
                if self.config.fail_if_not_exists {
                    return Err(DeployError::NotFound(format!(
                        "deployment '{}' on target '{}'",
                        name, target.name
                    ))
                    .into());
                }
                info!(application = %name, "deployment not present, nothing to undeploy");
                Ok(())
            }
            Some(deployment) => {
                info!(application = %name, id = %deployment.id, "deleting deployment");
                api.delete_deployment(&deployment.id)
                    .context("fleet-platform delete failed")?;
                Ok(())
            }
        }
    }
}
