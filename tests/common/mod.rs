//! In-memory stand-ins for the remote grid services.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Duration;
use grid_access::{
    Clock, Credential, CredentialUsage, DelegationRequest, DelegationService, ExecutionManager, GridConfig,
    GridSession, InformationService, JobDescription, JobHandle, JobState, ManualClock, ProxyCertificate,
    ProxyFactory, ProxyRequest, RegistryQuery, SnapshotRegistry, StagingLocation,
};
use rustc_hash::FxHashMap;
use serde_json::Value;

pub const ALICE_DN: &str = "/C=AU/O=APACGrid/OU=VPAC/CN=alice";

/// Sites, codes and endpoints of a small grid.
pub const GRID: &str = r#"{
    "sites": [
        {
            "name": "vpac",
            "contact_email": "grid@vpac.org",
            "job_manager": "https://jm.vpac:8443/wsrf",
            "staging_server": "gsiftp://data.vpac:2811",
            "software": [
                {"code": "awk", "version": "3.1.6", "module": "awk/3.1.6", "executable": "/usr/bin/awk"},
                {"code": "sed", "version": "4.1", "module": "", "executable": "/bin/sed"}
            ],
            "queues": [{"name": "normal", "sub_cluster": "edda-std", "default_storage_element": "se.vpac"}],
            "storage_elements": [{"id": "se.vpac", "areas": [{"path": "/scratch", "free_bytes": 1000000}]}]
        },
        {"name": "tpac", "job_manager": "https://jm.tpac:8443/wsrf"},
        {"name": "ac3", "status": "down"}
    ]
}"#;

/// A job manager keeping job states in memory.
///
/// Submitted jobs start `Pending`; tests move them on with [`set_state`].
pub struct MockJobManager {
    jobs: Mutex<FxHashMap<String, String>>,
    next_id: Mutex<u64>,
    null_epr: bool,
    pub submissions: Mutex<Vec<Submission>>,
    pub transfers: Mutex<Vec<StagingLocation>>,
}

#[derive(Debug, Clone)]
pub struct Submission {
    pub principal: String,
    pub endpoint: String,
    pub description: JobDescription,
}

impl MockJobManager {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(FxHashMap::default()),
            next_id: Mutex::new(0),
            null_epr: false,
            submissions: Mutex::new(Vec::new()),
            transfers: Mutex::new(Vec::new()),
        }
    }

    /// Accept submissions but answer without an endpoint reference.
    pub fn with_null_epr() -> Self {
        Self {
            null_epr: true,
            ..Self::new()
        }
    }

    pub fn set_state(&self, job: &JobHandle, state: &str) {
        self.jobs.lock().unwrap().insert(job.0.clone(), state.to_string());
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutionManager for MockJobManager {
    async fn submit(
        &self,
        credential: &Credential,
        endpoint: &str,
        description: &JobDescription,
    ) -> Result<Option<String>, String> {
        self.submissions.lock().unwrap().push(Submission {
            principal: credential.principal().to_string(),
            endpoint: endpoint.to_string(),
            description: description.clone(),
        });
        if self.null_epr {
            return Ok(None);
        }

        let epr = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("{endpoint}/services/ManagedJobFactoryService?job={}", *next)
        };
        self.jobs.lock().unwrap().insert(epr.clone(), "Pending".into());
        Ok(Some(epr))
    }

    async fn status(&self, _credential: &Credential, job: &JobHandle) -> Result<String, String> {
        self.jobs
            .lock()
            .unwrap()
            .get(&job.0)
            .cloned()
            .ok_or_else(|| format!("unknown job {job}"))
    }

    async fn cancel(&self, _credential: &Credential, job: &JobHandle) -> Result<String, String> {
        let mut jobs = self.jobs.lock().unwrap();
        let state = jobs.get_mut(&job.0).ok_or_else(|| format!("unknown job {job}"))?;
        if !JobState::from(state.as_str()).is_terminal() {
            *state = "UserTerminateDone".into();
        }
        Ok(state.clone())
    }

    async fn transfer_results(
        &self,
        _credential: &Credential,
        job: &JobHandle,
        destination: &StagingLocation,
    ) -> Result<Option<String>, String> {
        if !self.jobs.lock().unwrap().contains_key(&job.0) {
            return Err(format!("unknown job {job}"));
        }
        self.transfers.lock().unwrap().push(destination.clone());
        Ok(Some(format!("{job}#transfer")))
    }
}

/// A MyProxy server knowing one account: alice / s3cret.
pub struct MockDelegationService {
    clock: ManualClock,
    pub requests: Mutex<Vec<(String, u16, String)>>,
}

impl MockDelegationService {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DelegationService for MockDelegationService {
    async fn get_delegation(&self, request: DelegationRequest<'_>) -> Result<Credential, String> {
        self.requests
            .lock()
            .unwrap()
            .push((request.host.to_string(), request.port, request.username.to_string()));
        if request.username != "alice" || request.password != b"s3cret" {
            return Err("invalid pass phrase".into());
        }
        Ok(Credential::with_lifetime(
            ALICE_DN,
            self.clock.now(),
            request.lifetime_secs,
            CredentialUsage::InitiateAndAccept,
        ))
    }
}

/// X.509 stand-in: proxies are the subject line in plain text.
pub struct MockProxyFactory {
    clock: ManualClock,
}

impl MockProxyFactory {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock }
    }
}

impl ProxyFactory for MockProxyFactory {
    fn create_proxy(&self, request: &ProxyRequest<'_>) -> Result<ProxyCertificate, String> {
        if request.private_key.is_empty() {
            return Err("unable to read private key".into());
        }
        let subject = format!("{ALICE_DN}/CN={}", request.key_bits);
        Ok(ProxyCertificate {
            encoded: subject.clone().into_bytes(),
            subject,
            not_after: self.clock.now() + Duration::seconds(request.lifetime_secs),
        })
    }

    fn decode_proxy(&self, encoded: &[u8]) -> Result<ProxyCertificate, String> {
        let subject = std::str::from_utf8(encoded).map_err(|e| e.to_string())?.trim();
        if subject.is_empty() {
            return Err("empty proxy file".into());
        }
        Ok(ProxyCertificate {
            subject: subject.to_string(),
            not_after: self.clock.now() + Duration::hours(12),
            encoded: encoded.to_vec(),
        })
    }
}

/// Answers every query with the same value.
pub struct StaticInformation(pub Value);

#[async_trait]
impl InformationService for StaticInformation {
    async fn query(&self, _query: &RegistryQuery) -> Result<Value, String> {
        Ok(self.0.clone())
    }
}

/// An information service that cannot be reached.
pub struct DownInformation;

#[async_trait]
impl InformationService for DownInformation {
    async fn query(&self, _query: &RegistryQuery) -> Result<Value, String> {
        Err("connection refused".into())
    }
}

pub fn portal_config() -> GridConfig {
    GridConfig::from_toml_str(
        r#"
[staging]
server = "gsiftp://portal.example.org:2811"
stage_in_dir = "/srv/grid/in"
stage_out_dir = "/srv/grid/out"
"#,
    )
    .unwrap()
}

/// A configured session over [`GRID`], with every remote service mocked.
pub fn portal_session(clock: &ManualClock, manager: Arc<MockJobManager>) -> GridSession {
    session_with(clock, manager, Arc::new(SnapshotRegistry::from_json_str(GRID).unwrap()))
}

pub fn session_with(
    clock: &ManualClock,
    manager: Arc<MockJobManager>,
    information: Arc<dyn InformationService>,
) -> GridSession {
    GridSession::new(portal_config(), information, manager)
        .unwrap()
        .with_clock(Arc::new(clock.clone()))
        .with_proxy_factory(Arc::new(MockProxyFactory::new(clock.clone())))
        .with_delegation_service(Arc::new(MockDelegationService::new(clock.clone())))
}
