//! The job description document posted to a job manager.
//!
//! Built from an enriched [`JobRequest`]: the environment-module preamble,
//! the executable with its arguments, resource limits, and two staging
//! lists. Inputs travel from the local staging server to the site's staging
//! endpoint before the job starts; outputs travel back to the local stage-out
//! directory when it ends.
//!
//! ```text
//!   local_staging_server:local_stage_in_dir/ ──stage-in──→  site_staging_endpoint:directory/
//!   site_staging_endpoint:directory/         ──stage-out─→  local_staging_server:local_stage_out_dir/
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{GridError, GridResult};
use crate::job::{JobRequest, JobType};

/// Scratch root on the site, expanded by the job manager.
pub const SCRATCH_DIR: &str = "${GLOBUS_SCRATCH_DIR}";

/// A directory or file on a data-staging server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagingLocation {
    /// Staging server URL, e.g. `gsiftp://data.vpac:2811`.
    pub endpoint: String,
    pub path: String,
}

impl StagingLocation {
    pub fn new(endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            path: path.into(),
        }
    }

    /// Full transfer URL.
    pub fn url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        if self.path.starts_with('/') {
            format!("{endpoint}{}", self.path)
        } else {
            format!("{endpoint}/{}", self.path)
        }
    }
}

/// One transfer directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransfer {
    pub source: StagingLocation,
    pub destination: StagingLocation,
}

/// Job description document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescription {
    /// Shell lines run before the executable, one `module load` per module.
    pub preamble: Vec<String>,
    pub executable: String,
    pub arguments: Vec<String>,
    /// Working directory on the site.
    pub directory: String,
    pub job_type: JobType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wall_time_mins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    pub stage_in: Vec<FileTransfer>,
    pub stage_out: Vec<FileTransfer>,
}

impl JobDescription {
    /// Build the document for an enriched request.
    ///
    /// # Errors
    ///
    /// - [`GridError::EnrichmentIncomplete`] if a registry-provided field is empty.
    /// - [`GridError::Configuration`] if a local staging field is empty.
    pub fn from_request(request: &JobRequest) -> GridResult<Self> {
        let missing = request.missing_enrichment();
        if !missing.is_empty() {
            return Err(GridError::EnrichmentIncomplete { missing });
        }
        for (value, key) in [
            (&request.local_staging_server, "local_staging_server"),
            (&request.local_stage_in_dir, "local_stage_in_dir"),
            (&request.local_stage_out_dir, "local_stage_out_dir"),
        ] {
            if value.is_empty() {
                return Err(GridError::Configuration(format!("{key} is not set on the job request")));
            }
        }

        let name = if request.name.is_empty() { request.code.as_str() } else { request.name.as_str() };
        let directory = format!("{SCRATCH_DIR}/{name}");

        let local_in = StagingLocation::new(&request.local_staging_server, as_dir(&request.local_stage_in_dir));
        let site_dir = StagingLocation::new(&request.site_staging_endpoint, as_dir(&directory));
        let local_out = StagingLocation::new(&request.local_staging_server, as_dir(&request.local_stage_out_dir));

        let stage_in = if request.stage_in_files.is_empty() {
            vec![FileTransfer {
                source: local_in,
                destination: site_dir.clone(),
            }]
        } else {
            request
                .stage_in_files
                .iter()
                .map(|file| FileTransfer {
                    source: StagingLocation::new(&local_in.endpoint, format!("{}{file}", local_in.path)),
                    destination: StagingLocation::new(&site_dir.endpoint, format!("{}{file}", site_dir.path)),
                })
                .collect()
        };

        Ok(Self {
            preamble: request
                .module_names
                .iter()
                .map(|module| format!("module load {module}"))
                .collect(),
            executable: request.executable_name.clone(),
            arguments: request.arguments.clone(),
            directory,
            job_type: request.job_type,
            queue: request.queue.clone(),
            max_wall_time_mins: request.max_wall_time_mins,
            cpu_count: request.cpu_count,
            max_memory_mb: request.max_memory_mb,
            stdout: request.stdout.clone(),
            stderr: request.stderr.clone(),
            email_address: request.email_address.clone(),
            stage_in,
            stage_out: vec![FileTransfer {
                source: site_dir,
                destination: local_out,
            }],
        })
    }
}

pub(crate) fn as_dir(path: &str) -> String {
    if path.ends_with('/') {
        path.to_string()
    } else {
        format!("{path}/")
    }
}
