//! Typed queries against the grid information service.
//!
//! The information service is a remote hierarchical directory (sites →
//! clusters → sub-clusters, software packages, queues, storage elements).
//! Its transport lives behind [`InformationService`], which answers a
//! [`RegistryQuery`] with a raw JSON value. [`RegistryClient`] decodes that
//! value into the typed answer.
//!
//! # Answer rules
//!
//! - Every query is idempotent and read-only.
//! - Missing data is an empty answer (`null`, `[]`, `""` → `None` / empty
//!   `Vec`), never an error.
//! - Transport failures are [`GridError::RegistryUnavailable`]; values that
//!   do not decode are [`GridError::RegistryMalformed`].
//! - Every list answer is sorted and free of duplicates, so identical backend
//!   contents always produce identical lists.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{GridError, GridResult};

/// One request to the information service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", rename_all = "snake_case")]
pub enum RegistryQuery {
    AllSites,
    AllCodes,
    VersionsOfCode {
        code: String,
    },
    SitesWithCodeVersion {
        code: String,
        version: String,
    },
    CodesAtSite {
        site: String,
    },
    VersionsOfCodeAtSite {
        site: String,
        code: String,
    },
    JobManagerAtSite {
        site: String,
    },
    ModuleName {
        site: String,
        code: String,
        version: String,
    },
    ExecutableName {
        site: String,
        code: String,
        version: String,
    },
    StagingServerAtSite {
        site: String,
    },
    QueuesAtSite {
        site: String,
    },
    SubClusterForCode {
        code: String,
        version: String,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    },
    SubClustersAtSite {
        site: String,
        cluster: String,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    },
    QueuesForSubCluster {
        sub_cluster: String,
        wall_time_mins: Option<u32>,
    },
    DefaultStorageElement {
        queue: String,
    },
    StoragePath {
        storage_element: String,
        min_free_bytes: u64,
    },
    AllStagingServers,
    AllSiteStatus,
    SiteContactEmail {
        site: String,
    },
}

/// Transport to the information service.
#[async_trait]
pub trait InformationService: Send + Sync {
    /// Run one query. `Err` means the service could not be reached.
    async fn query(&self, query: &RegistryQuery) -> Result<Value, String>;
}

/// A homogeneous partition of a compute cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubCluster {
    pub name: String,
    pub site: String,
    pub cluster: String,
    /// Logical CPUs per node.
    pub cpus: u32,
    /// Memory per node in megabytes.
    pub memory_mb: u64,
    /// Any further attributes the registry publishes (OS, architecture, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

/// Up/down status of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteStatus {
    Up,
    Down,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteStatus::Up => write!(f, "up"),
            SiteStatus::Down => write!(f, "down"),
            SiteStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// Identity, administrative contact and status of one site.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteInfo {
    pub name: String,
    #[serde(default)]
    pub contact_email: String,
    pub status: SiteStatus,
}

/// Typed client over an [`InformationService`].
#[derive(Clone)]
pub struct RegistryClient {
    service: Arc<dyn InformationService>,
}

impl fmt::Debug for RegistryClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryClient").finish_non_exhaustive()
    }
}

impl RegistryClient {
    /// Wrap a transport.
    pub fn new(service: Arc<dyn InformationService>) -> Self {
        Self { service }
    }

    /// All sites on the grid.
    pub async fn all_sites(&self) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::AllSites).await
    }

    /// All codes installed anywhere on the grid.
    pub async fn all_codes(&self) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::AllCodes).await
    }

    /// All versions of `code` on the grid.
    pub async fn versions_of_code(&self, code: &str) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::VersionsOfCode { code: code.into() }).await
    }

    /// Sites offering `version` of `code`.
    pub async fn sites_with_code_version(&self, code: &str, version: &str) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::SitesWithCodeVersion {
            code: code.into(),
            version: version.into(),
        })
        .await
    }

    /// Codes installed at `site`.
    pub async fn codes_at_site(&self, site: &str) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::CodesAtSite { site: site.into() }).await
    }

    /// Versions of `code` installed at `site`.
    pub async fn versions_of_code_at_site(&self, site: &str, code: &str) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::VersionsOfCodeAtSite {
            site: site.into(),
            code: code.into(),
        })
        .await
    }

    /// Job manager endpoint URL of `site`.
    pub async fn job_manager_at_site(&self, site: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::JobManagerAtSite { site: site.into() }).await
    }

    /// Environment module providing `version` of `code` at `site`.
    pub async fn module_name(&self, site: &str, code: &str, version: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::ModuleName {
            site: site.into(),
            code: code.into(),
            version: version.into(),
        })
        .await
    }

    /// Executable of `version` of `code` at `site`.
    pub async fn executable_name(&self, site: &str, code: &str, version: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::ExecutableName {
            site: site.into(),
            code: code.into(),
            version: version.into(),
        })
        .await
    }

    /// Data-staging endpoint of the cluster at `site`.
    pub async fn staging_server_at_site(&self, site: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::StagingServerAtSite { site: site.into() }).await
    }

    /// Queue names at `site`.
    pub async fn queues_at_site(&self, site: &str) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::QueuesAtSite { site: site.into() }).await
    }

    /// A sub-cluster offering `version` of `code` with at least the given CPUs and memory.
    pub async fn sub_cluster_for_code(
        &self,
        code: &str,
        version: &str,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    ) -> GridResult<Option<SubCluster>> {
        self.fetch(RegistryQuery::SubClusterForCode {
            code: code.into(),
            version: version.into(),
            min_cpus,
            min_memory_mb,
        })
        .await
    }

    /// Sub-clusters of `cluster` at `site` with at least the given CPUs and memory.
    pub async fn sub_clusters_at_site(
        &self,
        site: &str,
        cluster: &str,
        min_cpus: Option<u32>,
        min_memory_mb: Option<u64>,
    ) -> GridResult<Vec<SubCluster>> {
        let mut sub_clusters: Vec<SubCluster> = self
            .fetch(RegistryQuery::SubClustersAtSite {
                site: site.into(),
                cluster: cluster.into(),
                min_cpus,
                min_memory_mb,
            })
            .await?;
        sub_clusters.sort();
        sub_clusters.dedup();
        Ok(sub_clusters)
    }

    /// Queues serving `sub_cluster` that allow `wall_time_mins`.
    pub async fn queues_for_sub_cluster(
        &self,
        sub_cluster: &str,
        wall_time_mins: Option<u32>,
    ) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::QueuesForSubCluster {
            sub_cluster: sub_cluster.into(),
            wall_time_mins,
        })
        .await
    }

    /// Default storage element of `queue`.
    pub async fn default_storage_element(&self, queue: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::DefaultStorageElement { queue: queue.into() }).await
    }

    /// A path on `storage_element` with at least `min_free_bytes` free.
    pub async fn storage_path(&self, storage_element: &str, min_free_bytes: u64) -> GridResult<Option<String>> {
        self.text(RegistryQuery::StoragePath {
            storage_element: storage_element.into(),
            min_free_bytes,
        })
        .await
    }

    /// Storage path for jobs on `queue` with at least `min_free_bytes` free.
    ///
    /// Resolves the queue's default storage element first; empty if either
    /// lookup is.
    pub async fn storage_path_for_queue(&self, queue: &str, min_free_bytes: u64) -> GridResult<Option<String>> {
        match self.default_storage_element(queue).await? {
            Some(element) => self.storage_path(&element, min_free_bytes).await,
            None => Ok(None),
        }
    }

    /// All data-staging servers on the grid.
    pub async fn all_staging_servers(&self) -> GridResult<Vec<String>> {
        self.list(RegistryQuery::AllStagingServers).await
    }

    /// Status of every site, ordered by site name, then contact and status.
    pub async fn site_status(&self) -> GridResult<Vec<SiteInfo>> {
        let mut sites: Vec<SiteInfo> = self.fetch(RegistryQuery::AllSiteStatus).await?;
        sites.sort();
        sites.dedup();
        Ok(sites)
    }

    /// Administrative contact address of `site`.
    pub async fn site_contact_email(&self, site: &str) -> GridResult<Option<String>> {
        self.text(RegistryQuery::SiteContactEmail { site: site.into() }).await
    }

    async fn list(&self, query: RegistryQuery) -> GridResult<Vec<String>> {
        let mut values: Vec<String> = self.fetch(query).await?;
        values.sort();
        values.dedup();
        Ok(values)
    }

    async fn text(&self, query: RegistryQuery) -> GridResult<Option<String>> {
        let value: Option<String> = self.fetch(query).await?;
        Ok(value.filter(|v| !v.is_empty()))
    }

    async fn fetch<T: DeserializeOwned + Default>(&self, query: RegistryQuery) -> GridResult<T> {
        let raw = self.service.query(&query).await.map_err(|e| {
            warn!(?query, "registry unavailable: {e}");
            GridError::RegistryUnavailable(e)
        })?;
        debug!(?query, answer = %raw, "registry answer");

        if raw.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(raw).map_err(|e| GridError::RegistryMalformed(format!("{query:?}: {e}")))
    }
}
