//! Fan-out deployment over a fixed set of local runtime nodes.
//!
//! Node operations are strictly sequential: start-and-push over all nodes,
//! then a second pass verifying each node's deployed marker. The first node
//! whose verification exhausts its timeout aborts the whole operation;
//! nodes already confirmed are not rolled back.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use tracing::info;

use super::local;
use crate::artifact::Artifact;
use crate::config::DeploymentConfig;
use crate::error::DeployError;
use crate::probe::{AppDeployedProbe, Clock, Prober, SystemClock};
use crate::process::{self, ProcessControl, RuntimeHandle};

pub const MAX_CLUSTER_NODES: usize = 8;

const POLL_DELAY: Duration = Duration::from_millis(1000);

pub struct ClusterDeployer {
    config: DeploymentConfig,
    artifact: Artifact,
    staged: Option<PathBuf>,
    handles: Vec<RuntimeHandle>,
    controls: Vec<Box<dyn ProcessControl>>,
    clock: Box<dyn Clock>,
    prepared: bool,
}

impl ClusterDeployer {
    pub fn new(config: DeploymentConfig) -> anyhow::Result<Self> {
        if config.node_homes.is_empty() {
            return Err(DeployError::InvalidConfig(
                "cluster target requires at least one node home".into(),
            )
            .into());
        }
        let artifact = Artifact::application(config.artifact.clone(), &config.application_name);
        Ok(Self {
            config,
            artifact,
            staged: None,
            handles: Vec::new(),
            controls: Vec::new(),
            clock: Box::new(SystemClock),
            prepared: false,
        })
    }

    /// Use caller-supplied controllers, one per node home, in order.
    pub fn with_controls(mut self, controls: Vec<Box<dyn ProcessControl>>) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Validate the node count, stage the shared artifact once and build
    /// per-node handles. Runs before any process interaction.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        let nodes = self.config.node_homes.len();
        if nodes > MAX_CLUSTER_NODES {
            return Err(DeployError::InvalidConfig(format!(
                "cluster size {nodes} exceeds the maximum of {MAX_CLUSTER_NODES}"
            ))
            .into());
        }
        if !self.controls.is_empty() && self.controls.len() != nodes {
            return Err(DeployError::InvalidConfig(format!(
                "{} controllers supplied for {} nodes",
                self.controls.len(),
                nodes
            ))
            .into());
        }
        self.staged = Some(self.artifact.staged_path()?);
        for home in &self.config.node_homes {
            let handle = RuntimeHandle::new(home.clone());
            handle.validate()?;
            handle.clear_conf()?;
            if self.controls.len() < self.config.node_homes.len() {
                self.controls.push(process::controller_for(
                    &handle,
                    process::DEFAULT_COMMAND_TIMEOUT,
                ));
            }
            self.handles.push(handle);
        }
        self.prepared = true;
        Ok(())
    }

    fn ensure_prepared(&self) -> anyhow::Result<()> {
        if !self.prepared {
            anyhow::bail!("prepare() must run before deploy()/undeploy()");
        }
        Ok(())
    }

    pub fn deploy(&mut self) -> anyhow::Result<()> {
        self.ensure_prepared()?;
        let staged = self.staged.clone().expect("prepared");

        for (index, (handle, control)) in
            self.handles.iter().zip(self.controls.iter()).enumerate()
        {
            let node = index + 1;
            info!(node, home = %handle.home().display(), "deploying to cluster node");
            local::ensure_running(control.as_ref(), &self.config.process_args, handle)
                .with_context(|| format!("failed to start cluster node {node}"))?;
            local::push_artifact(handle, &staged, &self.artifact)
                .with_context(|| format!("failed to push artifact to cluster node {node}"))?;
        }

        if self.config.skip_verification {
            info!("cluster verification skipped by configuration");
            return Ok(());
        }
        let prober = Prober::new(POLL_DELAY, self.config.timeout(), self.clock.as_ref());
        for (index, handle) in self.handles.iter().enumerate() {
            let node = index + 1;
            prober
                .check(&AppDeployedProbe::new(
                    handle.clone(),
                    self.artifact.name(),
                ))
                .with_context(|| {
                    format!(
                        "application '{}' failed to deploy on cluster node {node}; \
                         earlier nodes remain deployed",
                        self.artifact.name()
                    )
                })?;
            info!(node, "cluster node verified");
        }
        Ok(())
    }

    pub fn undeploy(&mut self) -> anyhow::Result<()> {
        self.ensure_prepared()?;
        for (index, (handle, control)) in
            self.handles.iter().zip(self.controls.iter()).enumerate()
        {
            let node = index + 1;
            info!(node, home = %handle.home().display(), "undeploying cluster node");
            if let Err(err) = local::remove_artifact(
                handle,
                &self.config.application_name,
                self.config.fail_if_not_exists,
            ) {
                local::stop_quietly(control.as_ref(), handle);
                return Err(err.context(format!("failed to undeploy cluster node {node}")));
            }
            control
                .stop(&self.config.process_args)
                .with_context(|| format!("failed to stop cluster node {node}"))?;
        }
        Ok(())
    }
}
