//! End-to-end portal flows against mocked grid services.

mod common;

use std::sync::Arc;

use common::{
    ALICE_DN, DownInformation, MockJobManager, StaticInformation, portal_session, session_with,
};
use grid_access::{GridError, JobRequest, JobState, LocalProxy, ManualClock};
use serde_json::json;

#[tokio::test]
async fn test_happy_path_submit() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());

    let mut password = b"s3cret".to_vec();
    session
        .init_proxy_with_password("alice", &mut password, 3600)
        .await
        .unwrap();
    assert!(session.is_proxy_valid());

    let job = session
        .submit_job(JobRequest::new("vpac", "awk", "3.1.6").with_arguments(["-f", "count.awk"]))
        .await
        .unwrap();
    assert!(!job.as_str().is_empty());
    assert_eq!(session.retrieve_job_status(&job).await.unwrap(), JobState::from("Pending"));

    let submissions = manager.submissions.lock().unwrap();
    assert_eq!(submissions.len(), 1);
    let submitted = &submissions[0];
    assert_eq!(submitted.principal, ALICE_DN);
    assert_eq!(submitted.endpoint, "https://jm.vpac:8443/wsrf");
    assert_eq!(submitted.description.preamble, vec!["module load awk/3.1.6"]);
    assert_eq!(submitted.description.executable, "/usr/bin/awk");
    assert_eq!(submitted.description.arguments, vec!["-f", "count.awk"]);
    assert_eq!(
        submitted.description.stage_in[0].source.url(),
        "gsiftp://portal.example.org:2811/srv/grid/in/"
    );
    assert_eq!(submitted.description.stage_in[0].destination.endpoint, "gsiftp://data.vpac:2811");
    assert_eq!(submitted.description.stage_out[0].destination.path, "/srv/grid/out/");
}

#[tokio::test]
async fn test_missing_code_at_site_is_not_submitted() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session
        .submit_job(JobRequest::new("vpac", "ghost", "1.0"))
        .await
        .unwrap_err();
    assert!(matches!(&err, GridError::EnrichmentIncomplete { missing } if missing.contains(&"module_name")));
    assert_eq!(manager.submission_count(), 0);
}

#[tokio::test]
async fn test_empty_module_name_is_not_submitted() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session.submit_job(JobRequest::new("vpac", "sed", "4.1")).await.unwrap_err();
    assert!(matches!(err, GridError::EnrichmentIncomplete { missing } if missing == vec!["module_name"]));
    assert_eq!(manager.submission_count(), 0);
}

#[tokio::test]
async fn test_expired_credential_before_submit() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    clock.advance_secs(3601);
    assert!(!session.is_proxy_valid());

    let err = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap_err();
    assert!(matches!(err, GridError::NoCredential));
    assert!(err.is_credential_error());
    assert_eq!(manager.submission_count(), 0);
}

#[tokio::test]
async fn test_credential_within_minimum_lifetime_is_invalid() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let job = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();
    clock.advance_secs(3300);

    assert!(matches!(session.retrieve_job_status(&job).await, Err(GridError::NoCredential)));
    assert!(matches!(session.kill_job(&job).await, Err(GridError::NoCredential)));
}

#[tokio::test]
async fn test_kill_terminal_job_returns_terminal_state() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let job = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();
    manager.set_state(&job, "Done");

    let killed = session.kill_job(&job).await.unwrap();
    assert_eq!(killed, JobState::from("Done"));
    let s1 = session.retrieve_job_status(&job).await.unwrap();
    session.kill_job(&job).await.unwrap();
    let s2 = session.retrieve_job_status(&job).await.unwrap();
    assert_eq!(s1, s2);
    assert!(s1.is_done());
}

#[tokio::test]
async fn test_kill_active_job() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let job = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();
    manager.set_state(&job, "Active");

    let state = session.kill_job(&job).await.unwrap();
    assert!(state.is_terminal());
    assert!(!state.is_done());
}

#[tokio::test]
async fn test_retrieve_job_results() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let job = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();
    assert!(session.retrieve_job_results(&job).await.unwrap());

    let transfers = manager.transfers.lock().unwrap();
    assert_eq!(transfers[0].url(), "gsiftp://portal.example.org:2811/srv/grid/out/");
}

#[tokio::test]
async fn test_unknown_job_is_remote_error() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager);
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session.retrieve_job_status(&"no-such-job".into()).await.unwrap_err();
    assert!(matches!(err, GridError::Remote(msg) if msg == "unknown job no-such-job"));
}

#[tokio::test]
async fn test_null_epr_is_submission_failure() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::with_null_epr());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap_err();
    assert!(matches!(err, GridError::SubmissionFailed(_)));
    assert_eq!(manager.submission_count(), 1);
}

#[tokio::test]
async fn test_site_list_is_sorted_and_stable() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));

    let first = session.retrieve_all_sites_on_grid().await.unwrap();
    let second = session.retrieve_all_sites_on_grid().await.unwrap();
    assert_eq!(first, vec!["ac3", "tpac", "vpac"]);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_lists_are_distinct() {
    let clock = ManualClock::default();
    let information = Arc::new(StaticInformation(json!(["vpac", "ac3", "vpac", "tpac", "ac3"])));
    let session = session_with(&clock, Arc::new(MockJobManager::new()), information);

    assert_eq!(session.retrieve_all_sites_on_grid().await.unwrap(), vec!["ac3", "tpac", "vpac"]);
    assert_eq!(session.retrieve_all_codes_at_site("vpac").await.unwrap(), vec!["ac3", "tpac", "vpac"]);
}

#[tokio::test]
async fn test_empty_site_list_is_not_an_error() {
    let clock = ManualClock::default();
    for answer in [json!([]), json!(null)] {
        let session = session_with(&clock, Arc::new(MockJobManager::new()), Arc::new(StaticInformation(answer)));
        assert!(session.retrieve_all_sites_on_grid().await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_registry_failures() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = session_with(&clock, manager.clone(), Arc::new(DownInformation));
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();

    let err = session.retrieve_all_sites_on_grid().await.unwrap_err();
    assert!(matches!(err, GridError::RegistryUnavailable(_)));
    assert!(err.is_registry_error());

    let err = session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap_err();
    assert!(matches!(err, GridError::RegistryUnavailable(_)));
    assert_eq!(manager.submission_count(), 0);

    let garbled = session_with(&clock, manager, Arc::new(StaticInformation(json!({"sites": 3}))));
    let err = garbled.retrieve_all_sites_on_grid().await.unwrap_err();
    assert!(matches!(err, GridError::RegistryMalformed(_)));
}

#[tokio::test]
async fn test_registry_pass_through_queries() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));

    assert_eq!(
        session.retrieve_module_name_for_code("awk", "vpac", "3.1.6").await.unwrap().as_deref(),
        Some("awk/3.1.6")
    );
    assert_eq!(session.retrieve_module_name_for_code("sed", "vpac", "4.1").await.unwrap(), None);
    assert_eq!(
        session.retrieve_job_manager_at_site("tpac").await.unwrap().as_deref(),
        Some("https://jm.tpac:8443/wsrf")
    );
    assert_eq!(session.retrieve_staging_server_at_site("tpac").await.unwrap(), None);
    assert_eq!(
        session.retrieve_storage_path_for_queue("normal", 1024).await.unwrap().as_deref(),
        Some("/scratch")
    );
    assert_eq!(session.retrieve_all_sites_with_code_version("awk", "3.1.6").await.unwrap(), vec!["vpac"]);
    assert_eq!(session.retrieve_all_codes_on_grid().await.unwrap(), vec!["awk", "sed"]);
    assert_eq!(session.retrieve_site_status().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_password_buffer_zeroed() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));

    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();
    assert!(password.iter().all(|&b| b == 0));

    let mut wrong = b"guess".to_vec();
    let err = session.init_proxy_with_password("alice", &mut wrong, 3600).await.unwrap_err();
    assert!(matches!(err, GridError::DelegationRejected(_)));
    assert!(wrong.iter().all(|&b| b == 0));
    assert!(session.is_proxy_valid());
}

#[tokio::test]
async fn test_short_lived_proxy_is_not_retained() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));

    let mut password = b"s3cret".to_vec();
    let err = session.init_proxy_with_password("alice", &mut password, 300).await.unwrap_err();
    assert!(matches!(err, GridError::CredentialTooShortLived { remaining_secs: 300, min_secs: 300 }));
    assert!(!session.is_proxy_valid());
    assert!(session.credential_store().current().is_none());

    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 301).await.unwrap();
    assert!(session.is_proxy_valid());
}

#[tokio::test]
async fn test_short_lived_proxy_keeps_previous() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));
    session
        .init_proxy_with_key_pair(b"cert".to_vec(), b"key".to_vec(), 7200)
        .await
        .unwrap();

    let mut password = b"s3cret".to_vec();
    assert!(session.init_proxy_with_password("alice", &mut password, 60).await.is_err());
    let held = session.credential_store().current().unwrap();
    assert_eq!(held.principal(), format!("{ALICE_DN}/CN=512"));
    assert!(session.is_proxy_valid());
}

#[tokio::test]
async fn test_key_pair_mint_failure() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));
    let err = session
        .init_proxy_with_key_pair(b"cert".to_vec(), Vec::new(), 3600)
        .await
        .unwrap_err();
    assert!(matches!(err, GridError::ProxyMintFailed(_)));
    assert!(!session.is_proxy_valid());
}

#[tokio::test]
async fn test_rotation_is_seen_by_next_call() {
    let clock = ManualClock::default();
    let manager = Arc::new(MockJobManager::new());
    let session = portal_session(&clock, manager.clone());
    let mut password = b"s3cret".to_vec();
    session.init_proxy_with_password("alice", &mut password, 3600).await.unwrap();
    session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("x509up_u1000");
    std::fs::write(&path, "/C=AU/O=APACGrid/OU=VPAC/CN=alice/CN=renewed\n").unwrap();
    let factory = Arc::new(common::MockProxyFactory::new(clock.clone()));
    session.init_proxy(&mut LocalProxy::at(&path, factory)).await.unwrap();
    session.submit_job(JobRequest::new("vpac", "awk", "3.1.6")).await.unwrap();

    let principals: Vec<_> = manager
        .submissions
        .lock()
        .unwrap()
        .iter()
        .map(|s| s.principal.clone())
        .collect();
    assert_eq!(principals, vec![ALICE_DN.to_string(), format!("{ALICE_DN}/CN=renewed")]);
}

#[tokio::test]
async fn test_missing_local_proxy() {
    let clock = ManualClock::default();
    let session = portal_session(&clock, Arc::new(MockJobManager::new()));
    let factory = Arc::new(common::MockProxyFactory::new(clock.clone()));

    let err = session
        .init_proxy(&mut LocalProxy::at("/nonexistent/x509up_u0", factory))
        .await
        .unwrap_err();
    assert!(matches!(err, GridError::NoLocalProxy(_)));
}
