//! Shared fixtures: fake clock, fake process control, fake control planes.
#![allow(dead_code)]

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use berth_core::client::{
    Application, ApplicationRequest, CloudHostApi, Deployment, DeploymentRequest, FleetApi, Target,
};
use berth_core::config::{DeploymentConfig, TargetKind};
use berth_core::error::ClientError;
use berth_core::probe::{Clock, Probe, ProbeStatus};
use berth_core::process::{ProcessControl, ProcessStatus};

/// Simulated clock: `sleep` advances time instead of blocking.
#[derive(Clone)]
pub struct FakeClock {
    inner: Arc<Mutex<FakeClockState>>,
}

struct FakeClockState {
    base: Instant,
    offset: Duration,
    sleeps: u32,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeClockState {
                base: Instant::now(),
                offset: Duration::ZERO,
                sleeps: 0,
            })),
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> u32 {
        self.inner.lock().unwrap().sleeps
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.lock().unwrap().offset
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        let state = self.inner.lock().unwrap();
        state.base + state.offset
    }

    fn sleep(&self, duration: Duration) {
        let mut state = self.inner.lock().unwrap();
        state.offset += duration;
        state.sleeps += 1;
    }
}

/// Probe that becomes satisfied on the n-th evaluation (never, when `None`).
#[derive(Clone)]
pub struct CountingProbe {
    succeed_on: Option<u32>,
    checks: Arc<Mutex<u32>>,
}

impl CountingProbe {
    pub fn succeeding_on(check: u32) -> Self {
        Self {
            succeed_on: Some(check),
            checks: Arc::new(Mutex::new(0)),
        }
    }

    pub fn never_succeeding() -> Self {
        Self {
            succeed_on: None,
            checks: Arc::new(Mutex::new(0)),
        }
    }

    pub fn checks(&self) -> u32 {
        *self.checks.lock().unwrap()
    }
}

impl Probe for CountingProbe {
    fn check(&self) -> anyhow::Result<ProbeStatus> {
        let mut checks = self.checks.lock().unwrap();
        *checks += 1;
        if Some(*checks) == self.succeed_on {
            Ok(ProbeStatus::Satisfied)
        } else {
            Ok(ProbeStatus::Pending)
        }
    }

    fn describe(&self) -> String {
        "counting probe".to_string()
    }
}

/// Recording process controller with a scripted status sequence.
#[derive(Clone, Default)]
pub struct FakeProcess {
    inner: Arc<Mutex<FakeProcessState>>,
}

#[derive(Default)]
struct FakeProcessState {
    calls: Vec<String>,
    statuses: VecDeque<ProcessStatus>,
    fail_stop: bool,
}

impl FakeProcess {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the statuses returned by successive `status()` calls; once the
    /// queue drains, `Running` is reported.
    pub fn with_statuses(self, statuses: &[ProcessStatus]) -> Self {
        self.inner.lock().unwrap().statuses = statuses.iter().copied().collect();
        self
    }

    pub fn failing_stop(self) -> Self {
        self.inner.lock().unwrap().fail_stop = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }
}

impl ProcessControl for FakeProcess {
    fn start(&self, _args: &[String]) -> anyhow::Result<()> {
        self.inner.lock().unwrap().calls.push("start".into());
        Ok(())
    }

    fn stop(&self, _args: &[String]) -> anyhow::Result<()> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("stop".into());
        if state.fail_stop {
            anyhow::bail!("scripted stop failure");
        }
        Ok(())
    }

    fn restart(&self, _args: &[String]) -> anyhow::Result<()> {
        self.inner.lock().unwrap().calls.push("restart".into());
        Ok(())
    }

    fn status(&self) -> anyhow::Result<ProcessStatus> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("status".into());
        Ok(state.statuses.pop_front().unwrap_or(ProcessStatus::Running))
    }

    fn process_id(&self) -> anyhow::Result<u32> {
        Ok(4711)
    }
}

/// Recording cloud-host control plane.
#[derive(Clone, Default)]
pub struct FakeCloudHost {
    inner: Arc<Mutex<CloudHostState>>,
}

#[derive(Default)]
struct CloudHostState {
    existing: Option<Application>,
    calls: Vec<String>,
    statuses: VecDeque<String>,
    last_request: Option<ApplicationRequest>,
}

impl FakeCloudHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_existing(self, app: Application) -> Self {
        self.inner.lock().unwrap().existing = Some(app);
        self
    }

    /// Queue `application_status` responses; once drained, `STARTED`.
    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        self.inner.lock().unwrap().statuses =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn last_request(&self) -> Option<ApplicationRequest> {
        self.inner.lock().unwrap().last_request.clone()
    }
}

impl CloudHostApi for FakeCloudHost {
    fn find_application(&self, name: &str) -> Result<Option<Application>, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("find".into());
        Ok(state.existing.clone().filter(|app| app.name == name))
    }

    fn create_application(&self, request: &ApplicationRequest) -> Result<Application, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("create".into());
        state.last_request = Some(request.clone());
        Ok(Application {
            name: request.name.clone(),
            status: "DEPLOYING".into(),
            properties: request.properties.clone(),
            worker_count: request.worker_count,
            worker_type: request.worker_type.clone(),
            region: request.region.clone(),
        })
    }

    fn update_application(
        &self,
        name: &str,
        request: &ApplicationRequest,
    ) -> Result<Application, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("update".into());
        state.last_request = Some(request.clone());
        Ok(Application {
            name: name.to_string(),
            status: "DEPLOYING".into(),
            properties: request.properties.clone(),
            worker_count: request.worker_count,
            worker_type: request.worker_type.clone(),
            region: request.region.clone(),
        })
    }

    fn start_application(&self, _name: &str) -> Result<(), ClientError> {
        self.inner.lock().unwrap().calls.push("start".into());
        Ok(())
    }

    fn stop_application(&self, _name: &str) -> Result<(), ClientError> {
        self.inner.lock().unwrap().calls.push("stop".into());
        Ok(())
    }

    fn delete_application(&self, _name: &str) -> Result<(), ClientError> {
        self.inner.lock().unwrap().calls.push("delete".into());
        Ok(())
    }

    fn application_status(&self, _name: &str) -> Result<String, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("status".into());
        Ok(state
            .statuses
            .pop_front()
            .unwrap_or_else(|| "STARTED".to_string()))
    }
}

/// Recording fleet control plane.
#[derive(Clone, Default)]
pub struct FakeFleet {
    inner: Arc<Mutex<FleetState>>,
}

#[derive(Default)]
struct FleetState {
    targets: Vec<Target>,
    versions: Vec<String>,
    existing: Option<Deployment>,
    reject_create: bool,
    calls: Vec<String>,
    statuses: VecDeque<String>,
    last_request: Option<DeploymentRequest>,
}

impl FakeFleet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_target(self, id: &str, name: &str, domain: Option<&str>) -> Self {
        self.inner.lock().unwrap().targets.push(Target {
            id: id.to_string(),
            name: name.to_string(),
            domain: domain.map(str::to_string),
        });
        self
    }

    pub fn with_versions(self, versions: &[&str]) -> Self {
        self.inner.lock().unwrap().versions =
            versions.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn with_existing(self, id: &str, name: &str) -> Self {
        self.inner.lock().unwrap().existing = Some(Deployment {
            id: id.to_string(),
            name: name.to_string(),
            status: "STARTED".into(),
        });
        self
    }

    /// Have `create_deployment` answer with HTTP 400.
    pub fn rejecting_create(self) -> Self {
        self.inner.lock().unwrap().reject_create = true;
        self
    }

    pub fn with_statuses(self, statuses: &[&str]) -> Self {
        self.inner.lock().unwrap().statuses =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn last_request(&self) -> Option<DeploymentRequest> {
        self.inner.lock().unwrap().last_request.clone()
    }
}

impl FleetApi for FakeFleet {
    fn list_targets(&self) -> Result<Vec<Target>, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("targets".into());
        Ok(state.targets.clone())
    }

    fn runtime_versions(&self, _target_id: &str) -> Result<Vec<String>, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("versions".into());
        Ok(state.versions.clone())
    }

    fn find_deployment(
        &self,
        name: &str,
        _target_id: &str,
    ) -> Result<Option<Deployment>, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("find".into());
        Ok(state.existing.clone().filter(|d| d.name == name))
    }

    fn create_deployment(&self, request: &DeploymentRequest) -> Result<Deployment, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("create".into());
        state.last_request = Some(request.clone());
        if state.reject_create {
            return Err(ClientError::Status {
                status: 400,
                url: "https://fleet.test/deployments".into(),
                message: "deployment already exists".into(),
            });
        }
        Ok(Deployment {
            id: "dep-1".into(),
            name: request.name.clone(),
            status: "DEPLOYING".into(),
        })
    }

    fn modify_deployment(
        &self,
        id: &str,
        request: &DeploymentRequest,
    ) -> Result<Deployment, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("modify".into());
        state.last_request = Some(request.clone());
        Ok(Deployment {
            id: id.to_string(),
            name: request.name.clone(),
            status: "DEPLOYING".into(),
        })
    }

    fn delete_deployment(&self, _id: &str) -> Result<(), ClientError> {
        self.inner.lock().unwrap().calls.push("delete".into());
        Ok(())
    }

    fn deployment_status(&self, _id: &str) -> Result<String, ClientError> {
        let mut state = self.inner.lock().unwrap();
        state.calls.push("status".into());
        Ok(state
            .statuses
            .pop_front()
            .unwrap_or_else(|| "STARTED".to_string()))
    }
}

/// Lay out a runtime installation under `root/<name>`.
pub fn make_runtime_home(root: &Path, name: &str) -> PathBuf {
    let home = root.join(name);
    std::fs::create_dir_all(home.join("bin")).unwrap();
    let script = home.join("bin").join("runtime");
    std::fs::write(&script, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
    std::fs::create_dir_all(home.join("apps")).unwrap();
    std::fs::create_dir_all(home.join("domains")).unwrap();
    std::fs::create_dir_all(home.join("conf")).unwrap();
    home
}

/// Write an artifact file and return its path.
pub fn make_artifact(root: &Path, file_name: &str) -> PathBuf {
    let path = root.join(file_name);
    std::fs::write(&path, b"artifact-bytes").unwrap();
    path
}

/// Minimal configuration; tests fill in target-specific fields.
pub fn base_config(target: TargetKind, artifact: PathBuf, name: &str) -> DeploymentConfig {
    DeploymentConfig {
        target,
        artifact,
        application_name: name.to_string(),
        domain: None,
        credentials: None,
        runtime_home: None,
        node_homes: Vec::new(),
        base_url: None,
        environment: None,
        target_name: None,
        business_group: None,
        runtime_version: None,
        public_url: None,
        worker_count: None,
        worker_type: None,
        region: None,
        properties: BTreeMap::new(),
        override_properties: false,
        timeout_ms: 5000,
        skip_verification: false,
        fail_if_not_exists: true,
        process_args: Vec::new(),
    }
}
