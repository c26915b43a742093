//! Filling site-specific job fields from the registry.

use tracing::{debug, warn};

use crate::error::{GridError, GridResult};
use crate::job::JobRequest;
use crate::registry::RegistryClient;

/// Look up the job manager, module, executable and staging endpoint for the
/// request's site, code and version, and write them into `request`.
///
/// The request is only modified when all four answers are non-empty;
/// otherwise it is left untouched and [`GridError::EnrichmentIncomplete`]
/// names the missing fields. Registry failures propagate unchanged.
pub async fn enrich(registry: &RegistryClient, request: &mut JobRequest) -> GridResult<()> {
    let (site, code, version) = (&request.site, &request.code, &request.version);

    let job_manager = registry.job_manager_at_site(site).await?;
    let module = registry.module_name(site, code, version).await?;
    let executable = registry.executable_name(site, code, version).await?;
    let staging = registry.staging_server_at_site(site).await?;

    match (job_manager, module, executable, staging) {
        (Some(job_manager), Some(module), Some(executable), Some(staging)) => {
            debug!(%site, %code, %version, %job_manager, %module, %executable, %staging, "enriched job request");
            request.job_manager_endpoint = job_manager;
            request.module_names = vec![module];
            request.executable_name = executable;
            request.site_staging_endpoint = staging;
            Ok(())
        }
        (job_manager, module, executable, staging) => {
            let missing: Vec<&'static str> = [
                ("job_manager_endpoint", job_manager.is_none()),
                ("module_name", module.is_none()),
                ("executable_name", executable.is_none()),
                ("site_staging_endpoint", staging.is_none()),
            ]
            .into_iter()
            .filter_map(|(field, absent)| absent.then_some(field))
            .collect();
            warn!(%site, %code, %version, ?missing, "registry has no complete entry for job");
            Err(GridError::EnrichmentIncomplete { missing })
        }
    }
}
