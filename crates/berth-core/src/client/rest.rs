//! Synchronous REST plumbing shared by the control-plane clients.
//!
//! The engine is single-threaded and blocking; reqwest's async client is
//! driven through an owned tokio runtime, one `block_on` per call.

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::Value;
use url::Url;

use crate::error::ClientError;

/// Bearer-token session with its expiry.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(token: String, expires_in_secs: i64) -> Self {
        Self {
            token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in_secs),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Thin JSON-over-HTTP client bound to one base URL.
pub struct RestClient {
    runtime: tokio::runtime::Runtime,
    http: reqwest::Client,
    base: Url,
    session: Option<Session>,
}

impl RestClient {
    pub fn new(base: Url) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()
            .map_err(|e| anyhow::anyhow!("Failed to create tokio runtime: {}", e))?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("berth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            runtime,
            http,
            base,
            session: None,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Install the session used for bearer authentication on later calls.
    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn get(&self, path: &str) -> Result<Value, ClientError> {
        self.execute(Method::GET, path, None)
    }

    pub fn post(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.execute(Method::POST, path, Some(body))
    }

    pub fn put(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.execute(Method::PUT, path, Some(body))
    }

    pub fn patch(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        self.execute(Method::PATCH, path, Some(body))
    }

    pub fn delete(&self, path: &str) -> Result<Value, ClientError> {
        self.execute(Method::DELETE, path, None)
    }

    /// POST without a bearer token; used for token acquisition itself.
    pub fn post_unauthenticated(&self, path: &str, body: &Value) -> Result<Value, ClientError> {
        let url = self.url(path)?;
        let request = self.http.request(Method::POST, url.clone()).json(body);
        self.dispatch(url, request)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base.join(path).map_err(|e| ClientError::Malformed {
            url: format!("{}{}", self.base, path),
            message: e.to_string(),
        })
    }

    fn execute(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ClientError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ClientError::NotAuthenticated("no session token".into()))?;
        if session.is_expired() {
            return Err(ClientError::NotAuthenticated("session token expired".into()));
        }
        let url = self.url(path)?;
        let mut request = self
            .http
            .request(method, url.clone())
            .bearer_auth(session.token());
        if let Some(body) = body {
            request = request.json(body);
        }
        self.dispatch(url, request)
    }

    fn dispatch(
        &self,
        url: Url,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, ClientError> {
        self.runtime.block_on(async {
            let response = request.send().await.map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
            let status = response.status();
            let text = response.text().await.map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
            if !status.is_success() {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    url: url.to_string(),
                    message: text.trim().to_string(),
                });
            }
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&text).map_err(|e| ClientError::Malformed {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }
}

/// Pull `access_token` / `expires_in` out of a login response.
pub(crate) fn session_from_login(url: &Url, body: &Value) -> Result<Session, ClientError> {
    let token = body
        .get("access_token")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Malformed {
            url: url.to_string(),
            message: "login response carries no access_token".into(),
        })?;
    let expires_in = body
        .get("expires_in")
        .and_then(Value::as_i64)
        .unwrap_or(3600);
    Ok(Session::new(token.to_string(), expires_in))
}
