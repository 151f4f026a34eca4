//! Authenticated HTTP clients for the remote control planes.
//!
//! The deployers consume these through the [`CloudHostApi`] and [`FleetApi`]
//! traits so the orchestration layer (and its tests) never depend on the
//! concrete transport.

pub mod cloudhost;
pub mod fleet;
pub mod rest;

pub use cloudhost::{Application, ApplicationRequest, CloudHostApi, CloudHostClient};
pub use fleet::{Deployment, DeploymentRequest, FleetApi, FleetClient, Target};
pub use rest::{RestClient, Session};
