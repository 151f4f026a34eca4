//! Tests for artifact naming and staging.

mod support;

use berth_core::artifact::Artifact;
use berth_core::error::DeployError;
use tempfile::TempDir;

use support::make_artifact;

#[test]
fn differing_name_copies_to_configured_name() {
    let temp = TempDir::new().unwrap();
    let original = make_artifact(temp.path(), "app-1.0.0.jar");

    let artifact = Artifact::application(original.clone(), "demo");
    let staged = artifact.staged_path().unwrap();

    assert_eq!(staged, temp.path().join("demo.jar"));
    assert!(staged.is_file());
    // The original is copied, never moved.
    assert!(original.is_file());
    assert_eq!(
        std::fs::read(&original).unwrap(),
        std::fs::read(&staged).unwrap()
    );
}

#[test]
fn matching_name_stages_in_place() {
    let temp = TempDir::new().unwrap();
    let original = make_artifact(temp.path(), "demo.jar");

    let artifact = Artifact::application(original.clone(), "demo");
    let staged = artifact.staged_path().unwrap();

    assert_eq!(staged, original);
    // No copy appears beside it.
    let entries = std::fs::read_dir(temp.path()).unwrap().count();
    assert_eq!(entries, 1);
}

#[test]
fn missing_artifact_is_a_typed_error() {
    let temp = TempDir::new().unwrap();
    let artifact = Artifact::application(temp.path().join("ghost.jar"), "demo");

    let err = artifact.staged_path().unwrap_err();
    assert!(matches!(
        err.downcast_ref::<DeployError>(),
        Some(DeployError::MissingArtifact(_))
    ));
}

#[test]
fn domain_artifact_deploys_under_its_own_stem() {
    let temp = TempDir::new().unwrap();
    let path = make_artifact(temp.path(), "shared-domain.jar");

    let artifact = Artifact::domain(path);
    assert_eq!(artifact.name(), "shared-domain");
    assert_eq!(artifact.target_file_name(), "shared-domain.jar");
}
