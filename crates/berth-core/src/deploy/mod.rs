//! Deployment orchestration: target dispatch and per-target deployers.
//!
//! The orchestrator builds a [`Deployer`] from the configuration, runs
//! `prepare()` once, then `deploy()` or `undeploy()` at most once each.

mod cloudhost;
mod cluster;
mod fleet;
mod local;
mod standalone;

pub use cloudhost::CloudHostDeployer;
pub use cluster::{ClusterDeployer, MAX_CLUSTER_NODES};
pub use fleet::FleetDeployer;
pub use standalone::StandaloneDeployer;

use crate::config::{DeploymentConfig, TargetKind};
use crate::error::DeployError;

enum Inner {
    Standalone(StandaloneDeployer),
    Cluster(ClusterDeployer),
    CloudHost(CloudHostDeployer),
    FleetPlatform(FleetDeployer),
}

/// A deployer bound to exactly one configuration for its lifetime.
pub struct Deployer {
    inner: Inner,
    target: TargetKind,
    deployed: bool,
    undeployed: bool,
}

impl Deployer {
    /// Pure dispatch from target kind to concrete deployer. An unmapped
    /// kind fails with a typed error naming it; nothing else happens here.
    pub fn from_config(config: DeploymentConfig) -> anyhow::Result<Self> {
        let target = config.target;
        let inner = match target {
            TargetKind::Standalone => Inner::Standalone(StandaloneDeployer::new(config)?),
            TargetKind::Cluster => Inner::Cluster(ClusterDeployer::new(config)?),
            TargetKind::CloudHost => Inner::CloudHost(CloudHostDeployer::new(config)?),
            TargetKind::FleetPlatform => Inner::FleetPlatform(FleetDeployer::new(config)?),
            TargetKind::Agent => {
                return Err(DeployError::UnsupportedTarget(target.to_string()).into());
            }
        };
        Ok(Self {
            inner,
            target,
            deployed: false,
            undeployed: false,
        })
    }

    pub fn target(&self) -> TargetKind {
        self.target
    }

    /// Validate prerequisites and build derived handles.
    pub fn prepare(&mut self) -> anyhow::Result<()> {
        match &mut self.inner {
            Inner::Standalone(d) => d.prepare(),
            Inner::Cluster(d) => d.prepare(),
            Inner::CloudHost(d) => d.prepare(),
            Inner::FleetPlatform(d) => d.prepare(),
        }
    }

    pub fn deploy(&mut self) -> anyhow::Result<()> {
        if self.deployed {
            anyhow::bail!("deploy() may only be called once per deployer");
        }
        self.deployed = true;
        match &mut self.inner {
            Inner::Standalone(d) => d.deploy(),
            Inner::Cluster(d) => d.deploy(),
            Inner::CloudHost(d) => d.deploy(),
            Inner::FleetPlatform(d) => d.deploy(),
        }
    }

    pub fn undeploy(&mut self) -> anyhow::Result<()> {
        if self.undeployed {
            anyhow::bail!("undeploy() may only be called once per deployer");
        }
        self.undeployed = true;
        match &mut self.inner {
            Inner::Standalone(d) => d.undeploy(),
            Inner::Cluster(d) => d.undeploy(),
            Inner::CloudHost(d) => d.undeploy(),
            Inner::FleetPlatform(d) => d.undeploy(),
        }
    }
}
