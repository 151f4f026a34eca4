//! Cluster deployer: sequential fan-out, size bound, no rollback.

mod support;

use berth_core::config::TargetKind;
use berth_core::deploy::ClusterDeployer;
use berth_core::error::DeployError;
use berth_core::process::ProcessControl;
use tempfile::TempDir;

use support::{FakeClock, FakeProcess, base_config, make_artifact, make_runtime_home};

fn cluster_setup(
    temp: &TempDir,
    nodes: usize,
) -> (berth_core::config::DeploymentConfig, Vec<FakeProcess>) {
    let artifact = make_artifact(temp.path(), "app-1.0.0.jar");
    let mut config = base_config(TargetKind::Cluster, artifact, "demo");
    config.node_homes = (1..=nodes)
        .map(|n| make_runtime_home(temp.path(), &format!("node{n}")))
        .collect();
    let fakes: Vec<FakeProcess> = (0..nodes).map(|_| FakeProcess::new()).collect();
    (config, fakes)
}

fn boxed(fakes: &[FakeProcess]) -> Vec<Box<dyn ProcessControl>> {
    fakes
        .iter()
        .map(|f| Box::new(f.clone()) as Box<dyn ProcessControl>)
        .collect()
}

#[test]
fn node_count_over_eight_fails_before_any_process_interaction() {
    let temp = TempDir::new().unwrap();
    let (config, fakes) = cluster_setup(&temp, 9);

    let mut deployer = ClusterDeployer::new(config)
        .unwrap()
        .with_controls(boxed(&fakes));
    let err = deployer.prepare().unwrap_err();

    match err.downcast_ref::<DeployError>() {
        Some(DeployError::InvalidConfig(message)) => {
            assert!(message.contains("cluster size 9"));
            assert!(message.contains("8"));
        }
        other => panic!("expected invalid config, got {other:?}"),
    }
    for fake in &fakes {
        assert!(fake.calls().is_empty());
    }
}

#[test]
fn deploys_shared_artifact_to_every_node() {
    let temp = TempDir::new().unwrap();
    let (config, fakes) = cluster_setup(&temp, 3);
    let homes = config.node_homes.clone();
    for home in &homes {
        std::fs::write(home.join("apps").join("demo.deployed"), b"").unwrap();
    }

    let mut deployer = ClusterDeployer::new(config)
        .unwrap()
        .with_controls(boxed(&fakes))
        .with_clock(Box::new(FakeClock::new()));
    deployer.prepare().unwrap();
    deployer.deploy().unwrap();

    for home in &homes {
        assert!(home.join("apps").join("demo.jar").is_file());
    }
    // Exactly one staged copy of the shared artifact beside the original.
    assert!(temp.path().join("demo.jar").is_file());
}

#[test]
fn first_node_verification_timeout_aborts_without_rollback() {
    let temp = TempDir::new().unwrap();
    let (config, fakes) = cluster_setup(&temp, 3);
    let homes = config.node_homes.clone();
    // Only node 1 ever reports the application as started.
    std::fs::write(homes[0].join("apps").join("demo.deployed"), b"").unwrap();

    let mut deployer = ClusterDeployer::new(config)
        .unwrap()
        .with_controls(boxed(&fakes))
        .with_clock(Box::new(FakeClock::new()));
    deployer.prepare().unwrap();
    let err = deployer.deploy().unwrap_err();

    assert!(err.to_string().contains("node 2"));
    // Node 1 stays deployed; the artifact was pushed to all nodes in the
    // first pass.
    assert!(homes[0].join("apps").join("demo.jar").is_file());
    assert!(homes[2].join("apps").join("demo.jar").is_file());
    assert!(matches!(
        err.downcast_ref::<DeployError>(),
        Some(DeployError::Timeout { .. })
    ));
}

#[test]
fn undeploy_stops_every_node_in_order() {
    let temp = TempDir::new().unwrap();
    let (config, fakes) = cluster_setup(&temp, 2);
    let homes = config.node_homes.clone();
    for home in &homes {
        std::fs::write(home.join("apps").join("demo.jar"), b"deployed").unwrap();
    }

    let mut deployer = ClusterDeployer::new(config)
        .unwrap()
        .with_controls(boxed(&fakes));
    deployer.prepare().unwrap();
    deployer.undeploy().unwrap();

    for (home, fake) in homes.iter().zip(&fakes) {
        assert!(!home.join("apps").join("demo.jar").exists());
        assert!(fake.calls().contains(&"stop".to_string()));
    }
}

#[test]
fn undeploy_aborts_remaining_nodes_on_first_failure() {
    let temp = TempDir::new().unwrap();
    let (config, fakes) = cluster_setup(&temp, 3);
    let homes = config.node_homes.clone();
    // Node 2 has nothing deployed; with fail-if-not-exists the removal
    // fails there and node 3 is never touched.
    std::fs::write(homes[0].join("apps").join("demo.jar"), b"deployed").unwrap();
    std::fs::write(homes[2].join("apps").join("demo.jar"), b"deployed").unwrap();

    let mut deployer = ClusterDeployer::new(config)
        .unwrap()
        .with_controls(boxed(&fakes));
    deployer.prepare().unwrap();
    let err = deployer.undeploy().unwrap_err();

    assert!(err.to_string().contains("node 2"));
    // Node 1 was undeployed, node 3 was not reached.
    assert!(!homes[0].join("apps").join("demo.jar").exists());
    assert!(homes[2].join("apps").join("demo.jar").exists());
    assert!(!fakes[2].calls().contains(&"stop".to_string()));
    // Best-effort stop of the failing node is attempted, not propagated.
    assert!(fakes[1].calls().contains(&"stop".to_string()));
}
