//! Berth Core Library
//!
//! Provides the deployment orchestration engine: target dispatch, per-target
//! deploy/undeploy state machines, local process control and the polling and
//! retry primitives used to verify outcomes against eventually-consistent
//! backends.

pub mod artifact;
pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod probe;
pub mod process;
pub mod retry;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{Credentials, DeploymentConfig, TargetKind};

    // Artifacts
    pub use crate::artifact::{Artifact, Packaging};

    // Errors
    pub use crate::error::{ClientError, DeployError};

    // Deployers
    pub use crate::deploy::Deployer;

    // Process control
    pub use crate::process::{ProcessControl, ProcessStatus, RuntimeHandle};

    // Verification primitives
    pub use crate::probe::{Clock, Probe, ProbeStatus, Prober, SystemClock};
    pub use crate::retry::{RetryPolicy, RetryState, retry};
}
