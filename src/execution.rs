//! Remote job manager contract.
//!
//! The [`ExecutionManager`] trait is the client side of a grid job manager
//! (a WS-GRAM style managed-job factory):
//!
//! ```text
//!   submit() ──→ status() ──→ cancel()
//!   (async)       (async)      (async)
//!                    └──────→ transfer_results()
//!                                (async)
//! ```
//!
//! ## Contract
//!
//! - Every call carries the credential the caller wants the job manager to
//!   act under. Implementations must not keep it past the call.
//! - `submit()` returns `Ok(None)` when the job manager answers without an
//!   endpoint reference. The caller treats that as a failed submission even
//!   though the remote job may exist.
//! - State strings are returned exactly as the job manager reports them.
//! - `cancel()` on a job that already reached a terminal state is not an
//!   error; it returns that state.
//! - `transfer_results()` starts an asynchronous copy and returns the handle
//!   of the transfer, or `Ok(None)` if the job manager did not accept it.
//! - Any other failure is `Err(message)`; nothing is retried.
//!
//! ## Method table
//!
//! | Method | Returns |
//! |--------|---------|
//! | `submit()` | `Result<Option<String>, String>` |
//! | `status()` | `Result<String, String>` |
//! | `cancel()` | `Result<String, String>` |
//! | `transfer_results()` | `Result<Option<String>, String>` |

use async_trait::async_trait;

use crate::credential::Credential;
use crate::description::{JobDescription, StagingLocation};
use crate::job::JobHandle;

/// Client of a remote job manager.
#[async_trait]
pub trait ExecutionManager: Send + Sync {
    /// Post a job description to the job manager at `endpoint`.
    async fn submit(
        &self,
        credential: &Credential,
        endpoint: &str,
        description: &JobDescription,
    ) -> Result<Option<String>, String>;

    /// Current state of a job.
    async fn status(&self, credential: &Credential, job: &JobHandle) -> Result<String, String>;

    /// Cancel a job and report the state observed afterwards.
    async fn cancel(&self, credential: &Credential, job: &JobHandle) -> Result<String, String>;

    /// Start copying the job's current output files to `destination`.
    async fn transfer_results(
        &self,
        credential: &Credential,
        job: &JobHandle,
        destination: &StagingLocation,
    ) -> Result<Option<String>, String>;
}
