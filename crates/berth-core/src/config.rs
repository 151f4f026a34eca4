//! Deployment configuration surface.
//!
//! A `DeploymentConfig` is built once by the caller (CLI or an embedding
//! build orchestrator), is immutable afterwards and is consumed by exactly
//! one deployer for its lifetime.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported deployment target kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TargetKind {
    /// One local runtime process.
    Standalone,
    /// A set of local runtime processes sharing one artifact.
    Cluster,
    /// Managed application-hosting platform (create/update/start/stop).
    CloudHost,
    /// Fleet-management control plane (target/deployment CRUD).
    FleetPlatform,
    /// Agent-mediated deployment. Recognized but not dispatched.
    Agent,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TargetKind::Standalone => "standalone",
            TargetKind::Cluster => "cluster",
            TargetKind::CloudHost => "cloud-host",
            TargetKind::FleetPlatform => "fleet-platform",
            TargetKind::Agent => "agent",
        };
        f.write_str(name)
    }
}

/// Credentials for the remote control planes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Credentials {
    UsernamePassword { username: String, password: String },
    ClientCredentials { client_id: String, client_secret: String },
}

/// Resolved deployment configuration.
///
/// Only the fields relevant to the configured target kind are consulted;
/// validation of target-specific prerequisites happens in the deployer's
/// `prepare()` step, before any process or remote interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeploymentConfig {
    /// Target kind to dispatch on.
    pub target: TargetKind,

    /// Path to the built application artifact.
    pub artifact: PathBuf,

    /// Logical application name. The artifact is copied to match it when
    /// the base names differ.
    pub application_name: String,

    /// Optional companion domain artifact (local targets).
    #[serde(default)]
    pub domain: Option<PathBuf>,

    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// Runtime installation root (standalone target).
    #[serde(default)]
    pub runtime_home: Option<PathBuf>,

    /// Runtime installation roots, one per cluster node.
    #[serde(default)]
    pub node_homes: Vec<PathBuf>,

    /// Control-plane base URL (remote targets).
    #[serde(default)]
    pub base_url: Option<Url>,

    /// Environment name (cloud-host target).
    #[serde(default)]
    pub environment: Option<String>,

    /// Human target name (fleet-platform target).
    #[serde(default)]
    pub target_name: Option<String>,

    /// Backslash-delimited business-group path, backslash-escapable.
    #[serde(default)]
    pub business_group: Option<String>,

    /// Requested base runtime version (fleet-platform target).
    #[serde(default)]
    pub runtime_version: Option<String>,

    /// Explicit public URL; derived from the target's wildcard domain
    /// when absent.
    #[serde(default)]
    pub public_url: Option<String>,

    #[serde(default)]
    pub worker_count: Option<u32>,

    #[serde(default)]
    pub worker_type: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Custom application properties pushed to remote targets.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// When updating an existing remote application, let conflicting
    /// property keys take the new value instead of preserving the old one.
    #[serde(default)]
    pub override_properties: bool,

    /// Total verification budget in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Skip post-deploy verification polling.
    #[serde(default)]
    pub skip_verification: bool,

    /// Undeploying a missing application is an error (true) or a silent
    /// no-op (false).
    #[serde(default = "default_true")]
    pub fail_if_not_exists: bool,

    /// Pass-through arguments handed to the local runtime control script.
    #[serde(default)]
    pub process_args: Vec<String>,
}

fn default_timeout_ms() -> u64 {
    60_000
}

fn default_true() -> bool {
    true
}

impl DeploymentConfig {
    /// Verification budget as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Load a configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }
}

/// Split a business-group path into segments.
///
/// Segments are separated by a single backslash; a doubled backslash is an
/// escaped literal backslash inside a segment name.
pub fn parse_business_group(path: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = path.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if chars.peek() == Some(&'\\') {
                chars.next();
                current.push('\\');
            } else {
                segments.push(std::mem::take(&mut current));
            }
        } else {
            current.push(c);
        }
    }
    segments.push(current);
    segments
}
