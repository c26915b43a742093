//! Loading sessions from configuration and snapshot files.

mod common;

use std::io::Write;
use std::sync::Arc;

use common::{GRID, MockDelegationService, MockJobManager};
use grid_access::{DelegationType, GridConfig, GridError, GridSession, JobRequest, ManualClock, SnapshotRegistry};

#[test]
fn test_load_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
log_level = "debug"

[delegation]
host = "myproxy.vpac.org"
port = 7513

[proxy]
min_lifetime_secs = 600
delegation = "limited"

[staging]
server = "gsiftp://portal.example.org:2811"
stage_in_dir = "/srv/grid/in"
stage_out_dir = "/srv/grid/out"
"#
    )
    .unwrap();

    let config = GridConfig::load(file.path()).unwrap();
    assert_eq!(config.log_level(), "debug");
    assert_eq!(config.delegation.port, 7513);
    assert_eq!(config.proxy.min_lifetime_secs, 600);
    assert_eq!(config.proxy.key_bits, 512);
    assert_eq!(config.proxy.delegation, DelegationType::Limited);
    assert_eq!(config.staging.require().unwrap().stage_out_dir, "/srv/grid/out");
}

#[test]
fn test_missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GridConfig::load(dir.path().join("grid.toml")).unwrap_err();
    assert!(matches!(err, GridError::Io(_)));
}

#[tokio::test]
async fn test_session_uses_configured_server_and_lifetime() {
    let clock = ManualClock::default();
    let config = GridConfig::from_toml_str(
        r#"
[delegation]
host = "myproxy.vpac.org"
port = 7513

[proxy]
min_lifetime_secs = 600
"#,
    )
    .unwrap();
    let delegation = Arc::new(MockDelegationService::new(clock.clone()));
    let session = GridSession::new(
        config,
        Arc::new(SnapshotRegistry::from_json_str(GRID).unwrap()),
        Arc::new(MockJobManager::new()),
    )
    .unwrap()
    .with_clock(Arc::new(clock.clone()))
    .with_delegation_service(delegation.clone());

    let mut password = b"s3cret".to_vec();
    let err = session
        .init_proxy_with_password("alice", &mut password, 600)
        .await
        .unwrap_err();
    assert!(matches!(err, GridError::CredentialTooShortLived { min_secs: 600, .. }));
    assert_eq!(
        *delegation.requests.lock().unwrap(),
        vec![("myproxy.vpac.org".to_string(), 7513, "alice".to_string())]
    );
}

#[tokio::test]
async fn test_staging_set_on_session() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let mut session = GridSession::new(
        GridConfig::default(),
        Arc::new(SnapshotRegistry::from_json_str(GRID).unwrap()),
        manager.clone(),
    )
    .unwrap()
    .with_clock(Arc::new(clock.clone()))
    .with_delegation_service(Arc::new(MockDelegationService::new(clock.clone())));

    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap_err();
    assert!(matches!(err, GridError::Configuration(_)));

    session.set_local_staging_server("gsiftp://portal.example.org:2811");
    session.set_local_stage_in_dir("/home/alice/in");
    session.set_local_stage_out_dir("/home/alice/out/");
    session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();

    let submissions = manager.submissions.lock().unwrap();
    assert_eq!(submissions[0].description.stage_in[0].source.path, "/home/alice/in/");
    assert_eq!(submissions[0].description.stage_out[0].destination.path, "/home/alice/out/");
}

#[tokio::test]
async fn test_snapshot_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("grid.json");
    std::fs::write(&path, GRID).unwrap();

    let registry = SnapshotRegistry::load(&path).unwrap();
    assert_eq!(registry.snapshot().sites.len(), 3);

    std::fs::write(&path, "not json").unwrap();
    assert!(matches!(SnapshotRegistry::load(&path), Err(GridError::RegistryMalformed(_))));
}
