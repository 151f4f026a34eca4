//! Cloud-host control-plane client.
//!
//! Simple application-hosting semantics: applications are created, updated
//! in place, started, stopped and deleted by name within one environment.

use std::collections::BTreeMap;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use url::Url;

use super::rest::{RestClient, session_from_login};
use crate::config::Credentials;
use crate::error::{ClientError, DeployError};

/// Remote application state as reported by the platform.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub worker_count: Option<u32>,
    #[serde(default)]
    pub worker_type: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// Create/update payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRequest {
    pub name: String,
    pub artifact_file_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub properties: BTreeMap<String, String>,
}

/// Contract the cloud-host deployer consumes.
pub trait CloudHostApi {
    /// Look the application up by name; `None` when the name is available.
    fn find_application(&self, name: &str) -> Result<Option<Application>, ClientError>;
    fn create_application(&self, request: &ApplicationRequest) -> Result<Application, ClientError>;
    fn update_application(
        &self,
        name: &str,
        request: &ApplicationRequest,
    ) -> Result<Application, ClientError>;
    fn start_application(&self, name: &str) -> Result<(), ClientError>;
    fn stop_application(&self, name: &str) -> Result<(), ClientError>;
    fn delete_application(&self, name: &str) -> Result<(), ClientError>;
    fn application_status(&self, name: &str) -> Result<String, ClientError>;
}

/// HTTP implementation bound to one environment.
pub struct CloudHostClient {
    rest: RestClient,
    environment_id: String,
}

impl CloudHostClient {
    /// Log in, resolve the environment by name and return a ready client.
    pub fn connect(
        base: Url,
        credentials: &Credentials,
        environment: &str,
    ) -> anyhow::Result<Self> {
        let mut rest = RestClient::new(base)?;
        let session = login(&rest, credentials).context("cloud-host login failed")?;
        rest.set_session(session);
        let environment_id = resolve_environment(&rest, environment)?;
        Ok(Self {
            rest,
            environment_id,
        })
    }

    fn app_path(&self, tail: &str) -> String {
        format!(
            "cloudhost/api/environments/{}/applications{}",
            self.environment_id, tail
        )
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
        } => json!({ "client_id": client_id, "client_secret": client_secret }),
    };
    let response = rest.post_unauthenticated("accounts/login", &body)?;
    session_from_login(rest.base(), &response)
}

fn resolve_environment(rest: &RestClient, name: &str) -> anyhow::Result<String> {
    let response = rest.get("accounts/api/environments")?;
    let environments = response.as_array().cloned().unwrap_or_default();
    for env in &environments {
        if env.get("name").and_then(Value::as_str) == Some(name) {
            if let Some(id) = env.get("id").and_then(Value::as_str) {
                return Ok(id.to_string());
            }
        }
    }
    Err(DeployError::NotFound(format!("environment '{name}'")).into())
}

impl CloudHostApi for CloudHostClient {
    fn find_application(&self, name: &str) -> Result<Option<Application>, ClientError> {
        match self.rest.get(&self.app_path(&format!("/{name}"))) {
            Ok(value) => {
                let app = serde_json::from_value(value).map_err(|e| ClientError::Malformed {
                    url: self.app_path(&format!("/{name}")),
                    message: e.to_string(),
                })?;
                Ok(Some(app))
            }
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn create_application(&self, request: &ApplicationRequest) -> Result<Application, ClientError> {
        let body = serde_json::to_value(request).expect("request serializes");
        let value = self.rest.post(&self.app_path(""), &body)?;
        serde_json::from_value(value).map_err(|e| ClientError::Malformed {
            url: self.app_path(""),
            message: e.to_string(),
        })
    }

    fn update_application(
        &self,
        name: &str,
        request: &ApplicationRequest,
    ) -> Result<Application, ClientError> {
        let body = serde_json::to_value(request).expect("request serializes");
        let path = self.app_path(&format!("/{name}"));
        let value = self.rest.put(&path, &body)?;
        serde_json::from_value(value).map_err(|e| ClientError::Malformed {
            url: path,
            message: e.to_string(),
        })
    }

    fn start_application(&self, name: &str) -> Result<(), ClientError> {
        self.rest
            .post(&self.app_path(&format!("/{name}/status")), &json!({ "status": "start" }))?;
        Ok(())
    }

    fn stop_application(&self, name: &str) -> Result<(), ClientError> {
        self.rest
            .post(&self.app_path(&format!("/{name}/status")), &json!({ "status": "stop" }))?;
        Ok(())
    }

    fn delete_application(&self, name: &str) -> Result<(), ClientError> {
        self.rest.delete(&self.app_path(&format!("/{name}")))?;
        Ok(())
    }

    fn application_status(&self, name: &str) -> Result<String, ClientError> {
        let path = self.app_path(&format!("/{name}"));
        let value = self.rest.get(&path)?;
        value
            .get("status")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ClientError::Malformed {
                url: path,
                message: "application carries no status field".into(),
            })
    }
}
