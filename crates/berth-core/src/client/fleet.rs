//! Fleet-management control-plane client.
//!
//! Targets are registered runtime clusters; deployments are applications
//! pinned to a target and a runtime image version.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::rest::{RestClient, session_from_login};
use crate::config::{Credentials, parse_business_group};
use crate::error::{ClientError, DeployError};

/// A registered deployment target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub id: String,
    pub name: String,
    /// Wildcard domain public URLs are derived from, e.g. `*.apps.example.com`.
    #[serde(default)]
    pub domain: Option<String>,
}

/// A deployment registered on a target.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: String,
}

/// Create/modify payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRequest {
    pub name: String,
    pub target_id: String,
    pub runtime_version: String,
    pub artifact_file_name: String,
    pub replicas: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// Contract the fleet-platform deployer consumes.
pub trait FleetApi {
    fn list_targets(&self) -> Result<Vec<Target>, ClientError>;
    /// Runtime image versions the target supports.
    fn runtime_versions(&self, target_id: &str) -> Result<Vec<String>, ClientError>;
    fn find_deployment(
        &self,
        name: &str,
        target_id: &str,
    ) -> Result<Option<Deployment>, ClientError>;
    fn create_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, ClientError>;
    fn modify_deployment(
        &self,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ClientError>;
    fn delete_deployment(&self, id: &str) -> Result<(), ClientError>;
    fn deployment_status(&self, id: &str) -> Result<String, ClientError>;
}

/// HTTP implementation scoped to one organization (business group).
pub struct FleetClient {
    rest: RestClient,
    organization_id: String,
}

impl FleetClient {
    /// Log in and resolve the organization from the business-group path.
    pub fn connect(
        base: Url,
        credentials: &Credentials,
        business_group: Option<&str>,
    ) -> anyhow::Result<Self> {
        let mut rest = RestClient::new(base)?;
        let session = login(&rest, credentials).context("fleet-platform login failed")?;
        rest.set_session(session);
        let organization_id = match business_group {
            Some(path) => resolve_business_group(&rest, path)?,
            None => own_organization(&rest)?,
        };
        Ok(Self {
            rest,
            organization_id,
        })
    }

    fn scoped(&self, tail: &str) -> String {
        format!(
            "fleet/api/v1/organizations/{}/{}",
            self.organization_id, tail
        )
    }

    fn parse<T: serde::de::DeserializeOwned>(
        &self,
        path: String,
        value: Value,
    ) -> Result<T, ClientError> {
        serde_json::from_value(value).map_err(|e| ClientError::Malformed {
            url: path,
            message: e.to_string(),
        })
    }
}

fn login(rest: &RestClient, credentials: &Credentials) -> Result<crate::client::Session, ClientError> {
    let body = match credentials {
        Credentials::UsernamePassword { username, password } => {
            json!({ "username": username, "password": password })
        }
        Credentials::ClientCredentials {
            client_id,
            client_secret,
        } => json!({
            "grant_type": "client_credentials",
            "client_id": client_id,
            "client_secret": client_secret,
        }),
    };
    let response = rest.post_unauthenticated("accounts/login", &body)?;
    session_from_login(rest.base(), &response)
}

fn own_organization(rest: &RestClient) -> anyhow::Result<String> {
    let me = rest.get("accounts/api/me")?;
    me.pointer("/organization/id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("profile response carries no organization id"))
}

/// Walk the organization tree following the parsed business-group path.
fn resolve_business_group(rest: &RestClient, path: &str) -> anyhow::Result<String> {
    let segments = parse_business_group(path);
    let response = rest.get("accounts/api/organizations")?;
    let mut candidates = response.as_array().cloned().unwrap_or_default();
    let mut resolved: Option<Value> = None;
    for segment in &segments {
        let found = candidates
            .iter()
            .find(|org| org.get("name").and_then(Value::as_str) == Some(segment.as_str()))
            .cloned();
        match found {
            Some(org) => {
                candidates = org
                    .get("subOrganizations")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default();
                resolved = Some(org);
            }
            None => {
                return Err(DeployError::NotFound(format!(
                    "business group '{segment}' in path '{path}'"
                ))
                .into());
            }
        }
    }
    resolved
        .as_ref()
        .and_then(|org| org.get("id"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| DeployError::NotFound(format!("business group '{path}'")).into())
}

/// Pick the newest runtime version compatible with the requested base
/// version, semver style.
pub fn resolve_runtime_version(available: &[String], requested: &str) -> anyhow::Result<String> {
    let requirement = semver::VersionReq::parse(requested)
        .with_context(|| format!("Invalid runtime version request: {requested}"))?;
    let best = available
        .iter()
        .filter_map(|raw| semver::Version::parse(raw).ok().map(|v| (v, raw)))
        .filter(|(version, _)| requirement.matches(version))
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, raw)| raw.clone());
    best.ok_or_else(|| {
        DeployError::NotFound(format!("runtime version compatible with '{requested}'")).into()
    })
}

impl FleetApi for FleetClient {
    fn list_targets(&self) -> Result<Vec<Target>, ClientError> {
        let path = self.scoped("targets");
        let value = self.rest.get(&path)?;
        self.parse(path, value)
    }

    fn runtime_versions(&self, target_id: &str) -> Result<Vec<String>, ClientError> {
        let path = self.scoped(&format!("targets/{target_id}/runtime-versions"));
        let value = self.rest.get(&path)?;
        self.parse(path, value)
    }

    fn find_deployment(
        &self,
        name: &str,
        target_id: &str,
    ) -> Result<Option<Deployment>, ClientError> {
        let path = self.scoped(&format!("deployments?targetId={target_id}"));
        let value = self.rest.get(&path)?;
        let deployments: Vec<Deployment> = self.parse(path, value)?;
        Ok(deployments.into_iter().find(|d| d.name == name))
    }

    fn create_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, ClientError> {
        let path = self.scoped("deployments");
        let body = serde_json::to_value(request).expect("request serializes");
        let value = self.rest.post(&path, &body)?;
        self.parse(path, value)
    }

    fn modify_deployment(
        &self,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ClientError> {
        let path = self.scoped(&format!("deployments/{id}"));
        let body = serde_json::to_value(request).expect("request serializes");
        let value = self.rest.patch(&path, &body)?;
        self.parse(path, value)
    }

    fn delete_deployment(&self, id: &str) -> Result<(), ClientError> {
        self.rest.delete(&self.scoped(&format!("deployments/{id}")))?;
        Ok(())
    }

    fn deployment_status(&self, id: &str) -> Result<String, ClientError> {
        let path = self.scoped(&format!("deployments/{id}"));
        let value = self.rest.get(&path)?;
        value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed {
                url: path,
                message: "deployment carries no status field".into(),
            })
    }
}
