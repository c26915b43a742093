//! The access facade a portal talks to.
//!
//! A [`GridSession`] owns one user's credential slot, a registry client and
//! the job manager client. It is the only type most callers need:
//!
//! ```text
//!   init_proxy_*() ──→ submit_job() ──→ retrieve_job_status() ──→ retrieve_job_results()
//!                          │                    │
//!                          │                    └──→ kill_job()
//!                          └── enrich() via the registry
//! ```
//!
//! # Concurrency
//!
//! A session is meant to be driven by one caller at a time. It is
//! `Send + Sync`, and the credential slot is lock-protected, but two callers
//! acquiring proxies on the same session race with last-writer-wins
//! semantics. A server handling several portal users gives each user its own
//! session; sessions share nothing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::acquire::{Acquire, DelegationService, KeyPairProxy, LocalProxy, MyProxyLogon, ProxyFactory, wipe};
use crate::clock::{Clock, SystemClock};
use crate::config::GridConfig;
use crate::controller::JobController;
use crate::description::{StagingLocation, as_dir};
use crate::enrich::enrich;
use crate::error::{GridError, GridResult};
use crate::execution::ExecutionManager;
use crate::job::{JobHandle, JobRequest, JobState};
use crate::registry::{InformationService, RegistryClient, SiteInfo, SubCluster};
use crate::store::CredentialStore;

/// One portal user's view of the grid.
pub struct GridSession {
    config: GridConfig,
    store: CredentialStore,
    registry: RegistryClient,
    manager: Arc<dyn ExecutionManager>,
    proxy_factory: Option<Arc<dyn ProxyFactory>>,
    delegation: Option<Arc<dyn DelegationService>>,
}

impl GridSession {
    /// Create a session with an empty credential slot.
    ///
    /// # Errors
    ///
    /// [`GridError::Configuration`] if `config` does not validate.
    pub fn new(
        config: GridConfig,
        information: Arc<dyn InformationService>,
        manager: Arc<dyn ExecutionManager>,
    ) -> GridResult<Self> {
        config.validate()?;
        Ok(Self {
            store: CredentialStore::new(config.proxy.min_lifetime_secs, Arc::new(SystemClock)),
            config,
            registry: RegistryClient::new(information),
            manager,
            proxy_factory: None,
            delegation: None,
        })
    }

    /// Measure credential lifetimes against `clock`. Drops any held credential.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.store = CredentialStore::new(self.config.proxy.min_lifetime_secs, clock);
        self
    }

    /// X.509 library used to mint and decode proxies.
    pub fn with_proxy_factory(mut self, factory: Arc<dyn ProxyFactory>) -> Self {
        self.proxy_factory = Some(factory);
        self
    }

    /// MyProxy client used by [`init_proxy_with_password`](Self::init_proxy_with_password).
    pub fn with_delegation_service(mut self, service: Arc<dyn DelegationService>) -> Self {
        self.delegation = Some(service);
        self
    }

    /// The session configuration, including staging set at runtime.
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The session's credential slot.
    pub fn credential_store(&self) -> &CredentialStore {
        &self.store
    }

    /// Typed client of the grid information service.
    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    // ── Credentials ─────────────────────────────────────────────────────

    /// Acquire a proxy with `strategy` and make it the session credential.
    ///
    /// # Errors
    ///
    /// The strategy's own error, or [`GridError::CredentialTooShortLived`]
    /// if the new proxy does not outlive the minimum lifetime. In both cases
    /// the previously held credential stays in place.
    pub async fn init_proxy<A>(&self, strategy: &mut A) -> GridResult<()>
    where
        A: Acquire + ?Sized,
    {
        let credential = strategy.acquire().await.inspect_err(|e| {
            warn!(strategy = strategy.name(), "proxy acquisition failed: {e}");
        })?;
        let credential = self.store.install(credential)?;
        info!(
            strategy = strategy.name(),
            principal = credential.principal(),
            lifetime = self.store.remaining_lifetime().unwrap_or_default(),
            "proxy initialised"
        );
        Ok(())
    }

    /// Mint a proxy from a private key and certificate, with the configured
    /// key size and delegation type.
    pub async fn init_proxy_with_key_pair(
        &self,
        certificate: impl Into<Vec<u8>>,
        private_key: impl Into<Vec<u8>>,
        lifetime_secs: i64,
    ) -> GridResult<()> {
        let factory = self.proxy_factory()?;
        let mut strategy = KeyPairProxy::new(certificate, private_key, lifetime_secs, factory)
            .with_key_bits(self.config.proxy.key_bits)
            .with_delegation(self.config.proxy.delegation);
        self.init_proxy(&mut strategy).await
    }

    /// Log on to the configured MyProxy server.
    ///
    /// `password` is zeroed before this returns, whatever the outcome.
    pub async fn init_proxy_with_password(
        &self,
        username: &str,
        password: &mut [u8],
        lifetime_secs: i64,
    ) -> GridResult<()> {
        let Some(service) = self.delegation.clone() else {
            wipe(password);
            return Err(GridError::Configuration("no delegation service configured".into()));
        };
        let mut strategy = MyProxyLogon::new(username, password, lifetime_secs, service)
            .with_server(self.config.delegation.host.clone(), self.config.delegation.port);
        self.init_proxy(&mut strategy).await
    }

    /// Load the proxy already on disk (`$X509_USER_PROXY` or `/tmp/x509up_u<uid>`).
    pub async fn init_proxy_from_local(&self) -> GridResult<()> {
        let mut strategy = LocalProxy::new(self.proxy_factory()?);
        self.init_proxy(&mut strategy).await
    }

    /// `true` iff the session holds a proxy that outlives the minimum lifetime.
    pub fn is_proxy_valid(&self) -> bool {
        self.store.is_valid()
    }

    fn proxy_factory(&self) -> GridResult<Arc<dyn ProxyFactory>> {
        self.proxy_factory
            .clone()
            .ok_or_else(|| GridError::Configuration("no proxy factory configured".into()))
    }

    // ── Local staging ───────────────────────────────────────────────────

    /// Set the staging server the sites copy inputs from and results to.
    pub fn set_local_staging_server(&mut self, server: impl Into<String>) {
        self.config.staging.server = Some(server.into());
    }

    /// Set the directory on the local staging server holding job inputs.
    pub fn set_local_stage_in_dir(&mut self, dir: impl Into<String>) {
        self.config.staging.stage_in_dir = Some(dir.into());
    }

    /// Set the directory on the local staging server receiving job outputs.
    pub fn set_local_stage_out_dir(&mut self, dir: impl Into<String>) {
        self.config.staging.stage_out_dir = Some(dir.into());
    }

    // ── Jobs ────────────────────────────────────────────────────────────

    fn controller(&self) -> JobController<'_> {
        JobController::new(&self.store, self.manager.as_ref())
    }

    /// Enrich `request` from the registry and submit it.
    ///
    /// # Errors
    ///
    /// - [`GridError::Configuration`] if local staging is not configured.
    /// - [`GridError::EnrichmentIncomplete`] if the registry lacks an entry;
    ///   nothing is submitted.
    /// - Registry errors, [`GridError::NoCredential`] and
    ///   [`GridError::SubmissionFailed`] from the steps below.
    pub async fn submit_job(&self, mut request: JobRequest) -> GridResult<JobHandle> {
        let staging = self.config.staging.require()?;
        request.local_staging_server = staging.server;
        request.local_stage_in_dir = staging.stage_in_dir;
        request.local_stage_out_dir = staging.stage_out_dir;

        enrich(&self.registry, &mut request).await?;
        self.controller().submit(&request).await
    }

    /// Current state of a job, as the job manager reports it.
    pub async fn retrieve_job_status(&self, job: &JobHandle) -> GridResult<JobState> {
        self.controller().status(job).await
    }

    /// Cancel a job and return the state observed afterwards.
    pub async fn kill_job(&self, job: &JobHandle) -> GridResult<JobState> {
        self.controller().kill(job).await
    }

    /// Ask the job manager to copy the job's outputs to the local stage-out directory.
    pub async fn retrieve_job_results(&self, job: &JobHandle) -> GridResult<bool> {
        let staging = self.config.staging.require()?;
        let destination = StagingLocation::new(staging.server, as_dir(&staging.stage_out_dir));
        self.controller().fetch_results(job, &destination).await
    }

    // ── Registry ────────────────────────────────────────────────────────

    /// All sites on the grid, sorted.
    pub async fn retrieve_all_sites_on_grid(&self) -> GridResult<Vec<String>> {
        self.registry.all_sites().await
    }

    /// All codes installed anywhere on the grid.
    pub async fn retrieve_all_codes_on_grid(&self) -> GridResult<Vec<String>> {
        self.registry.all_codes().await
    }

    /// All versions of `code` on the grid.
    pub async fn retrieve_all_versions_of_code_on_grid(&self, code: &str) -> GridResult<Vec<String>> {
        self.registry.versions_of_code(code).await
    }

    /// Sites offering `version` of `code`.
    pub async fn retrieve_all_sites_with_code_version(&self, code: &str, version: &str) -> GridResult<Vec<String>> {
        self.registry.sites_with_code_version(code, version).await
    }

    /// Codes installed at `site`.
    pub async fn retrieve_all_codes_at_site(&self, site: &str) -> GridResult<Vec<String>> {
        self.registry.codes_at_site(site).await
    }

    /// Versions of `code` installed at `site`.
    pub async fn retrieve_all_versions_of_code_at_site(&self, site: &str, code: &str) -> GridResult<Vec<String>> {
        self.registry.versions_of_code_at_site(site, code).await
    }

    /// Job manager endpoint of `site`.
    pub async fn retrieve_job_manager_at_site(&self, site: &str) -> GridResult<Option<String>> {
        self.registry.job_manager_at_site(site).await
    }

    /// Environment module providing `version` of `code` at `site`.
    pub async fn retrieve_module_name_for_code(
        &self,
        code: &str,
        site: &str,
        version: &str,
    ) -> GridResult<Option<String>> {
        self.registry.module_name(site, code, version).await
    }

    /// Executable of `version` of `code` at `site`.
    pub async fn retrieve_executable_name_for_code(
        &self,
        code: &str,
        site: &str,
        version: &str,
    ) -> GridResult<Option<String>> {
        self.registry.executable_name(site, code, version).await
    }

    /// Data-staging endpoint of `site`.
    pub async fn retrieve_staging_server_at_site(&self, site: &str) -> GridResult<Option<String>> {
        self.registry.staging_server_at_site(site).await
    }

    /// Queue names at `site`.
    pub async fn retrieve_queues_at_site(&self, site: &str) -> GridResult<Vec<String>> {
        self.registry.queues_at_site(site).await
    }

    /// A sub-cluster running `version` of `code` with enough CPUs and memory.
    pub async fn retrieve_sub_cluster_for_code(
        &self,
        code: &str,
        version: &str,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    ) -> GridResult<Option<SubCluster>> {
        self.registry.sub_cluster_for_code(code, version, min_cpus, min_memory_mb).await
    }

    /// Sub-clusters of `cluster` at `site` with enough CPUs and memory.
    pub async fn retrieve_sub_clusters_at_site(
        &self,
        site: &str,
        cluster: &str,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    ) -> GridResult<Vec<SubCluster>> {
        self.registry.sub_clusters_at_site(site, cluster, min_cpus, min_memory_mb).await
    }

    /// Queues on `sub_cluster` that allow `wall_time_mins`.
    pub async fn retrieve_queues_for_sub_cluster(
        &self,
        sub_cluster: &str,
        wall_time_mins: Option<u32>,
    ) -> GridResult<Vec<String>> {
        self.registry.queues_for_sub_cluster(sub_cluster, wall_time_mins).await
    }

    /// Default storage element of `queue`.
    pub async fn retrieve_default_storage_element(&self, queue: &str) -> GridResult<Option<String>> {
        self.registry.default_storage_element(queue).await
    }

    /// A path on `storage_element` with at least `min_free_bytes` free.
    pub async fn retrieve_storage_path(&self, storage_element: &str, min_free_bytes: u64) -> GridResult<Option<String>> {
        self.registry.storage_path(storage_element, min_free_bytes).await
    }

    /// A storage path for jobs on `queue` with at least `min_free_bytes` free.
    pub async fn retrieve_storage_path_for_queue(&self, queue: &str, min_free_bytes: u64) -> GridResult<Option<String>> {
        self.registry.storage_path_for_queue(queue, min_free_bytes).await
    }

    /// All data-staging servers on the grid.
    pub async fn retrieve_all_staging_servers(&self) -> GridResult<Vec<String>> {
        self.registry.all_staging_servers().await
    }

    /// Up/down status of every site.
    pub async fn retrieve_site_status(&self) -> GridResult<Vec<SiteInfo>> {
        self.registry.site_status().await
    }

    /// Administrative contact address of `site`.
    pub async fn retrieve_site_contact_email(&self, site: &str) -> GridResult<Option<String>> {
        self.registry.site_contact_email(site).await
    }
}
