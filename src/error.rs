//! Grid access error types.
//!
//! Errors are categorized by what the caller has to do next:
//!
//! | Category | Variants | Recovery |
//! |----------|----------|----------|
//! | **Credential** | `NoCredential`, `ProxyMintFailed`, `DelegationRejected`, `NoLocalProxy`, `CredentialTooShortLived` | Re-authenticate |
//! | **Registry** | `RegistryUnavailable`, `RegistryMalformed` | Report, the answer is unknown |
//! | **Job** | `EnrichmentIncomplete`, `SubmissionFailed`, `Remote` | Fix the request or resubmit |
//! | **Config** | `Configuration`, `Io`, `ConfigParse` | Fix configuration |
//!
//! Nothing in this crate retries. An empty registry answer is not an error;
//! an empty submission answer is.

use thiserror::Error;

/// Errors that can occur in grid access operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GridError {
    // ── Credential errors (re-authenticate) ──────────────────────────
    /// No valid proxy credential is held at the moment of use.
    #[error("No valid grid credential")]
    NoCredential,

    /// Minting a proxy from a local key and certificate failed.
    #[error("Proxy creation failed: {0}")]
    ProxyMintFailed(String),

    /// The delegation service refused or could not be reached.
    #[error("Delegation rejected: {0}")]
    DelegationRejected(String),

    /// No existing proxy could be loaded from the local environment.
    #[error("No local proxy: {0}")]
    NoLocalProxy(String),

    /// A freshly acquired credential is already below the minimum lifetime.
    #[error("Credential lifetime {remaining_secs}s does not exceed the minimum of {min_secs}s")]
    CredentialTooShortLived {
        /// Remaining lifetime of the rejected credential.
        remaining_secs: i64,
        /// Configured minimum lifetime.
        min_secs: i64,
    },

    // ── Registry errors ──────────────────────────────────────────────
    /// The information service could not be reached.
    #[error("Registry unavailable: {0}")]
    RegistryUnavailable(String),

    /// The information service answered with data that does not parse.
    #[error("Registry answer malformed: {0}")]
    RegistryMalformed(String),

    // ── Job errors ───────────────────────────────────────────────────
    /// One or more site-specific job fields came back empty from the registry.
    #[error("Job enrichment incomplete, missing: {}", missing.join(", "))]
    EnrichmentIncomplete {
        /// Names of the fields the registry left empty.
        missing: Vec<&'static str>,
    },

    /// The job manager returned no endpoint reference.
    #[error("Job submission failed: {0}")]
    SubmissionFailed(String),

    /// Any other failure reported by a remote service.
    #[error("Remote error: {0}")]
    Remote(String),

    // ── Config errors ────────────────────────────────────────────────
    /// Configuration error (fix configuration).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Reading a configuration file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file is not valid TOML for [`GridConfig`](crate::GridConfig).
    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl GridError {
    /// Returns `true` if the caller has to (re-)acquire a credential.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self,
            Self::NoCredential
                | Self::ProxyMintFailed(_)
                | Self::DelegationRejected(_)
                | Self::NoLocalProxy(_)
                | Self::CredentialTooShortLived { .. }
        )
    }

    /// Returns `true` if the error came from the grid information service.
    pub fn is_registry_error(&self) -> bool {
        matches!(self, Self::RegistryUnavailable(_) | Self::RegistryMalformed(_))
    }
}

/// Result type for grid access operations.
pub type GridResult<T> = Result<T, GridError>;
