//! Typed failure taxonomy surfaced to the orchestrator and the CLI.
//!
//! Engine code propagates `anyhow::Error` chains whose root cause is one of
//! the enums below, so callers that need to react to a specific class (for
//! example the bad-request fallback in the fleet deployer) can downcast while
//! everything else flows through `?` with added context.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised by the remote control-plane clients.
///
/// Every failed HTTP call is mapped to one of these, carrying the upstream
/// status code and message so the deployer layer can re-raise or react.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The platform answered with a non-success status.
    #[error("HTTP {status} from {url}: {message}")]
    Status {
        status: u16,
        url: String,
        message: String,
    },

    /// The request never produced a response.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response arrived but did not have the expected shape.
    #[error("unexpected response from {url}: {message}")]
    Malformed { url: String, message: String },

    /// A call was attempted without (or with an expired) session token.
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
}

impl ClientError {
    /// Upstream HTTP status, when the platform produced one.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(400)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Engine-level failures.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The artifact was not on disk before a process/remote call was made.
    #[error("artifact does not exist: {}", .0.display())]
    MissingArtifact(PathBuf),

    /// The factory has no deployer for the configured target kind.
    #[error("unsupported target kind: {0}")]
    UnsupportedTarget(String),

    /// A precondition on the configuration was violated.
    #[error("invalid deployment configuration: {0}")]
    InvalidConfig(String),

    /// A bounded wait (prober or retrier) exhausted its budget.
    #[error("{what} not satisfied after {elapsed:?}")]
    Timeout { what: String, elapsed: Duration },

    /// Local process control failed fatally.
    #[error("process control failed: {0}")]
    Process(String),

    /// A named resource was absent and the configuration demands it exists.
    #[error("{0} not found")]
    NotFound(String),

    #[error(transparent)]
    Client(#[from] ClientError),
}
