//! Job lifecycle types.
//!
//! The remote job manager drives the state machine; this crate forwards its
//! state names untouched:
//!
//! ```text
//!   submit() ──→ Pending ──→ Active ──→ Done
//!                  │           │
//!                  │           ├──→ Failed
//!                  │           │
//!                  └───────────┴──→ UserTerminateDone
//! ```
//!
//! **Invariants:**
//! - A [`JobHandle`] is the only identity of a submitted job.
//! - `kill` is valid from pending or active and idempotent afterwards.
//! - [`JobState`] is opaque. Callers compare against the success marker
//!   with [`JobState::is_done`]; the controller never branches on it.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Endpoint reference (EPR) of a submitted job, as returned by the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub String);

impl JobHandle {
    /// Create a new job handle.
    pub fn new(epr: impl Into<String>) -> Self {
        Self(epr.into())
    }

    /// The serialised endpoint reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobHandle {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobHandle {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// State of a job as reported by the job manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobState(pub String);

impl JobState {
    /// Terminal success marker.
    pub const DONE: &'static str = "Done";

    /// States after which a job never changes again.
    pub const TERMINAL: [&'static str; 4] = ["Done", "Failed", "UserTerminateDone", "UserTerminateFailed"];

    /// Wrap a state name.
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    /// The state name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if the job finished successfully and its results may be fetched.
    pub fn is_done(&self) -> bool {
        self.0 == Self::DONE
    }

    /// `true` for any state that will not change again.
    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(&self.0.as_str())
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobState {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// How the executable is launched at the site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    /// One process.
    #[default]
    Single,
    /// MPI launch across `cpu_count` processes.
    Mpi,
}

/// A request to run a code on the grid.
///
/// The portal fills in what the user chose. The site-specific fields
/// (`job_manager_endpoint`, `executable_name`, `module_names`,
/// `site_staging_endpoint`) start empty and are filled by
/// [`enrich`](crate::enrich); the local staging fields come from the session
/// configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    /// Job name, also used for the site working directory.
    pub name: String,
    /// Target site.
    pub site: String,
    /// Code (software package) name.
    pub code: String,
    /// Code version.
    pub version: String,
    /// Arguments passed to the executable.
    pub arguments: Vec<String>,
    /// Queue to submit to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    /// Maximum wall time in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_wall_time_mins: Option<u32>,
    /// Maximum memory in megabytes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_memory_mb: Option<u32>,
    /// Number of CPUs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    pub job_type: JobType,
    /// File receiving standard output, relative to the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// File receiving standard error, relative to the working directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Notification address.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_address: Option<String>,
    /// Input files, by name, inside the local stage-in directory.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stage_in_files: Vec<String>,

    // Filled from the registry.
    pub job_manager_endpoint: String,
    pub executable_name: String,
    pub module_names: Vec<String>,
    pub site_staging_endpoint: String,

    // Filled from the session's staging configuration.
    pub local_staging_server: String,
    pub local_stage_in_dir: String,
    pub local_stage_out_dir: String,
}

impl JobRequest {
    /// A request for `version` of `code` at `site`.
    pub fn new(site: impl Into<String>, code: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            code: code.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    /// Set the job name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the executable's arguments.
    pub fn with_arguments(mut self, arguments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Names of the registry-provided fields that are still empty.
    pub fn missing_enrichment(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.job_manager_endpoint.is_empty() {
            missing.push("job_manager_endpoint");
        }
        if !self.module_names.first().is_some_and(|m| !m.is_empty()) {
            missing.push("module_name");
        }
        if self.executable_name.is_empty() {
            missing.push("executable_name");
        }
        if self.site_staging_endpoint.is_empty() {
            missing.push("site_staging_endpoint");
        }
        missing
    }

    /// `true` once all registry-provided fields are non-empty.
    pub fn is_enriched(&self) -> bool {
        self.missing_enrichment().is_empty()
    }
}
