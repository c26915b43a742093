//! An in-memory information service.
//!
//! [`SnapshotRegistry`] answers every [`RegistryQuery`] from a
//! [`GridSnapshot`]: a serde description of the grid, usually exported from
//! the live registry as JSON. Portals use it when the registry is offline;
//! tests use it as a deterministic backend.
//!
//! Answers come out in snapshot order. Sorting is the client's business.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{GridError, GridResult};
use crate::registry::{InformationService, RegistryQuery, SiteInfo, SiteStatus, SubCluster};

/// The whole grid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSnapshot {
    pub sites: Vec<SiteRecord>,
    /// Staging servers not attached to any site's clusters.
    pub staging_servers: Vec<String>,
}

/// One site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: String,
    #[serde(default)]
    pub contact_email: String,
    #[serde(default = "default_status")]
    pub status: SiteStatus,
    #[serde(default)]
    pub job_manager: Option<String>,
    #[serde(default)]
    pub staging_server: Option<String>,
    #[serde(default)]
    pub clusters: Vec<ClusterRecord>,
    #[serde(default)]
    pub software: Vec<SoftwarePackage>,
    #[serde(default)]
    pub queues: Vec<QueueRecord>,
    #[serde(default)]
    pub storage_elements: Vec<StorageElementRecord>,
}

fn default_status() -> SiteStatus {
    SiteStatus::Up
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub name: String,
    #[serde(default)]
    pub sub_clusters: Vec<SubClusterRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubClusterRecord {
    pub name: String,
    pub cpus: u32,
    pub memory_mb: u64,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// A code version installed at a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftwarePackage {
    pub code: String,
    pub version: String,
    #[serde(default)]
    pub module: String,
    #[serde(default)]
    pub executable: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub name: String,
    /// Sub-cluster the queue runs on.
    pub sub_cluster: String,
    #[serde(default)]
    pub max_wall_time_mins: Option<u32>,
    #[serde(default)]
    pub default_storage_element: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageElementRecord {
    pub id: String,
    #[serde(default)]
    pub areas: Vec<StorageArea>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageArea {
    pub path: String,
    pub free_bytes: u64,
}

/// [`InformationService`] over a [`GridSnapshot`].
#[derive(Debug, Clone, Default)]
pub struct SnapshotRegistry {
    snapshot: GridSnapshot,
}

impl SnapshotRegistry {
    pub fn new(snapshot: GridSnapshot) -> Self {
        Self { snapshot }
    }

    /// Parse a JSON snapshot.
    pub fn from_json_str(content: &str) -> GridResult<Self> {
        let snapshot = serde_json::from_str(content).map_err(|e| GridError::RegistryMalformed(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    /// Load a JSON snapshot file.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn snapshot(&self) -> &GridSnapshot {
        &self.snapshot
    }

    fn site(&self, name: &str) -> Option<&SiteRecord> {
        self.snapshot.sites.iter().find(|s| s.name == name)
    }

    fn package(&self, site: &str, code: &str, version: &str) -> Option<&SoftwarePackage> {
        self.site(site)?
            .software
            .iter()
            .find(|p| p.code == code && p.version == version)
    }

    fn sub_clusters(&self) -> impl Iterator<Item = (&SiteRecord, SubCluster)> {
        self.snapshot.sites.iter().flat_map(|site| {
            site.clusters.iter().flat_map(move |cluster| {
                cluster.sub_clusters.iter().map(move |sc| {
                    let descriptor = SubCluster {
                        name: sc.name.clone(),
                        site: site.name.clone(),
                        cluster: cluster.name.clone(),
                        cpus: sc.cpus,
                        memory_mb: sc.memory_mb,
                        attributes: sc.attributes.clone(),
                    };
                    (site, descriptor)
                })
            })
        })
    }

    fn queues(&self) -> impl Iterator<Item = &QueueRecord> {
        self.snapshot.sites.iter().flat_map(|s| s.queues.iter())
    }

    fn answer(&self, query: &RegistryQuery) -> Value {
        let sites = &self.snapshot.sites;
        match query {
            RegistryQuery::AllSites => json!(sites.iter().map(|s| &s.name).collect::<Vec<_>>()),
            RegistryQuery::AllCodes => {
                json!(sites.iter().flat_map(|s| s.software.iter().map(|p| &p.code)).collect::<Vec<_>>())
            }
            RegistryQuery::VersionsOfCode { code } => json!(
                sites
                    .iter()
                    .flat_map(|s| s.software.iter())
                    .filter(|p| &p.code == code)
                    .map(|p| &p.version)
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::SitesWithCodeVersion { code, version } => json!(
                sites
                    .iter()
                    .filter(|s| s.software.iter().any(|p| &p.code == code && &p.version == version))
                    .map(|s| &s.name)
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::CodesAtSite { site } => match self.site(site) {
                Some(s) => json!(s.software.iter().map(|p| &p.code).collect::<Vec<_>>()),
                None => Value::Null,
            },
            RegistryQuery::VersionsOfCodeAtSite { site, code } => match self.site(site) {
                Some(s) => json!(
                    s.software
                        .iter()
                        .filter(|p| &p.code == code)
                        .map(|p| &p.version)
                        .collect::<Vec<_>>()
                ),
                None => Value::Null,
            },
            RegistryQuery::JobManagerAtSite { site } => json!(self.site(site).and_then(|s| s.job_manager.as_ref())),
            RegistryQuery::ModuleName { site, code, version } => {
                json!(self.package(site, code, version).map(|p| &p.module))
            }
            RegistryQuery::ExecutableName { site, code, version } => {
                json!(self.package(site, code, version).map(|p| &p.executable))
            }
            RegistryQuery::StagingServerAtSite { site } => {
                json!(self.site(site).and_then(|s| s.staging_server.as_ref()))
            }
            RegistryQuery::QueuesAtSite { site } => match self.site(site) {
                Some(s) => json!(s.queues.iter().map(|q| &q.name).collect::<Vec<_>>()),
                None => Value::Null,
            },
            RegistryQuery::SubClusterForCode {
                code,
                version,
                min_cpus,
                min_memory_mb,
            } => {
                let found = self
                    .sub_clusters()
                    .filter(|(site, _)| site.software.iter().any(|p| &p.code == code && &p.version == version))
                    .map(|(_, sc)| sc)
                    .find(|sc| fits(sc, *min_cpus, *min_memory_mb));
                json!(found)
            }
            RegistryQuery::SubClustersAtSite {
                site,
                cluster,
                min_cpus,
                min_memory_mb,
            } => json!(
                self.sub_clusters()
                    .map(|(_, sc)| sc)
                    .filter(|sc| &sc.site == site && &sc.cluster == cluster)
                    .filter(|sc| fits(sc, *min_cpus, *min_memory_mb))
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::QueuesForSubCluster {
                sub_cluster,
                wall_time_mins,
            } => json!(
                self.queues()
                    .filter(|q| &q.sub_cluster == sub_cluster)
                    .filter(|q| match (wall_time_mins, q.max_wall_time_mins) {
                        (Some(wanted), Some(max)) => *wanted <= max,
                        _ => true,
                    })
                    .map(|q| &q.name)
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::DefaultStorageElement { queue } => json!(
                self.queues()
                    .find(|q| &q.name == queue)
                    .and_then(|q| q.default_storage_element.as_ref())
            ),
            RegistryQuery::StoragePath {
                storage_element,
                min_free_bytes,
            } => json!(
                sites
                    .iter()
                    .flat_map(|s| s.storage_elements.iter())
                    .find(|se| &se.id == storage_element)
                    .and_then(|se| se.areas.iter().find(|a| a.free_bytes >= *min_free_bytes))
                    .map(|a| &a.path)
            ),
            RegistryQuery::AllStagingServers => json!(
                sites
                    .iter()
                    .filter_map(|s| s.staging_server.as_ref())
                    .chain(self.snapshot.staging_servers.iter())
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::AllSiteStatus => json!(
                sites
                    .iter()
                    .map(|s| SiteInfo {
                        name: s.name.clone(),
                        contact_email: s.contact_email.clone(),
                        status: s.status,
                    })
                    .collect::<Vec<_>>()
            ),
            RegistryQuery::SiteContactEmail { site } => json!(self.site(site).map(|s| &s.contact_email)),
        }
    }
}

fn fits(sub_cluster: &SubCluster, min_cpus: Option<u32>, min_memory_mb: Option<u64>) -> bool {
    min_cpus.is_none_or(|cpus| sub_cluster.cpus >= cpus)
        && min_memory_mb.is_none_or(|memory| sub_cluster.memory_mb >= memory)
}

#[async_trait]
impl InformationService for SnapshotRegistry {
    async fn query(&self, query: &RegistryQuery) -> Result<Value, String> {
        Ok(self.answer(query))
    }
}
