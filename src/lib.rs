//! Grid Access — client-side coordination for federated HPC grids
//!
//! This crate lets a science portal act on a user's behalf on a grid of HPC
//! sites: obtain a short-lived X.509 proxy credential, discover which sites
//! run which codes, submit jobs to a site's job manager, follow them, and
//! bring their results back.
//!
//! # Overview
//!
//! The crate provides:
//! - A [`CredentialStore`] holding at most one proxy [`Credential`], valid
//!   only while it outlives a minimum lifetime (300 s by default)
//! - Three [`Acquire`] strategies: [`KeyPairProxy`], [`MyProxyLogon`] and
//!   [`LocalProxy`]
//! - A typed [`RegistryClient`] over an [`InformationService`], with an
//!   in-memory [`SnapshotRegistry`]
//! - [`enrich`] to fill a [`JobRequest`] with site-specific details
//! - A [`JobController`] driving an [`ExecutionManager`] under the current
//!   credential
//! - [`GridSession`], the facade tying them together
//! - [`GridError`] with categorized error variants
//!
//! The X.509 library, the MyProxy protocol, the registry transport and the
//! job manager protocol are not implemented here; they plug in through
//! [`ProxyFactory`], [`DelegationService`], [`InformationService`] and
//! [`ExecutionManager`].
//!
//! # Lifecycle
//!
//! ```text
//!   init_proxy() ──→ submit_job() ──→ retrieve_job_status() ──→ retrieve_job_results()
//!   (acquire +        (enrich +         (async)                   (async)
//!    install)          submit)               └──→ kill_job()
//! ```
//!
//! Every job operation checks the credential at the moment of use and fails
//! with [`GridError::NoCredential`] once it has expired.

pub mod acquire;
pub mod clock;
pub mod config;
pub mod controller;
pub mod credential;
pub mod description;
pub mod enrich;
pub mod error;
pub mod execution;
pub mod job;
pub mod logging;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod store;

pub use acquire::{
    Acquire, DelegationRequest, DelegationService, KeyPairProxy, LocalProxy, MyProxyLogon, ProxyCertificate,
    ProxyFactory, ProxyRequest, default_proxy_path,
};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DelegationConfig, GridConfig, LocalStaging, ProxyConfig, StagingConfig};
pub use controller::JobController;
pub use credential::{Credential, CredentialUsage, DelegationType};
pub use description::{FileTransfer, JobDescription, StagingLocation};
pub use enrich::enrich;
pub use error::{GridError, GridResult};
pub use execution::ExecutionManager;
pub use job::{JobHandle, JobRequest, JobState, JobType};
pub use registry::{InformationService, RegistryClient, RegistryQuery, SiteInfo, SiteStatus, SubCluster};
pub use session::GridSession;
pub use snapshot::{GridSnapshot, SnapshotRegistry};
pub use store::CredentialStore;
