//! Job submission and control under the session credential.
//!
//! A [`JobController`] borrows the session's [`CredentialStore`] rather than
//! a credential, and asks it for a valid credential at the start of every
//! operation. A proxy rotated between two calls is therefore picked up by
//! the second one. Each operation is a single remote round trip; nothing is
//! retried and job states are passed through undecoded.

use tracing::{error, info};

use crate::description::{JobDescription, StagingLocation};
use crate::error::{GridError, GridResult};
use crate::execution::ExecutionManager;
use crate::job::{JobHandle, JobRequest, JobState};
use crate::store::CredentialStore;

/// Submits, monitors, kills and fetches results of grid jobs.
pub struct JobController<'s> {
    store: &'s CredentialStore,
    manager: &'s dyn ExecutionManager,
}

impl<'s> JobController<'s> {
    pub fn new(store: &'s CredentialStore, manager: &'s dyn ExecutionManager) -> Self {
        Self { store, manager }
    }

    /// Submit an enriched request to its job manager.
    ///
    /// # Errors
    ///
    /// - [`GridError::NoCredential`] without a valid proxy.
    /// - [`GridError::EnrichmentIncomplete`] / [`GridError::Configuration`]
    ///   if the request cannot be turned into a job description.
    /// - [`GridError::SubmissionFailed`] if the job manager fails or returns
    ///   no endpoint reference.
    pub async fn submit(&self, request: &JobRequest) -> GridResult<JobHandle> {
        let credential = self.store.valid_credential()?;
        let description = JobDescription::from_request(request)?;

        let reply = self
            .manager
            .submit(&credential, &request.job_manager_endpoint, &description)
            .await
            .map_err(|e| {
                error!(endpoint = %request.job_manager_endpoint, "job submission failed: {e}");
                GridError::SubmissionFailed(e)
            })?;

        match reply.filter(|epr| !epr.trim().is_empty()) {
            Some(epr) => {
                info!(site = %request.site, code = %request.code, %epr, "Successfully submitted job");
                Ok(JobHandle::new(epr))
            }
            None => {
                error!(endpoint = %request.job_manager_endpoint, "Job did not submit (EPR was null)");
                Err(GridError::SubmissionFailed(format!(
                    "{} returned no endpoint reference",
                    request.job_manager_endpoint
                )))
            }
        }
    }

    /// Current state of a job.
    pub async fn status(&self, job: &JobHandle) -> GridResult<JobState> {
        let credential = self.store.valid_credential()?;
        let state = self.manager.status(&credential, job).await.map_err(GridError::Remote)?;
        Ok(JobState::new(state))
    }

    /// Cancel a job; returns the state after cancellation.
    pub async fn kill(&self, job: &JobHandle) -> GridResult<JobState> {
        let credential = self.store.valid_credential()?;
        let state = self.manager.cancel(&credential, job).await.map_err(GridError::Remote)?;
        info!(%job, %state, "kill requested");
        Ok(JobState::new(state))
    }

    /// Start copying the job's current output files to `destination`.
    ///
    /// Returns `true` iff the job manager accepted the transfer. The copy
    /// itself completes asynchronously on the remote side.
    pub async fn fetch_results(&self, job: &JobHandle, destination: &StagingLocation) -> GridResult<bool> {
        let credential = self.store.valid_credential()?;
        let transfer = self
            .manager
            .transfer_results(&credential, job, destination)
            .await
            .map_err(GridError::Remote)?;

        let accepted = transfer.is_some_and(|t| !t.is_empty());
        info!(%job, destination = %destination.url(), accepted, "result transfer requested");
        Ok(accepted)
    }
}
