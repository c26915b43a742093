//! Delegated proxy credentials.
//!
//! A [`Credential`] is an opaque, immutable token standing for a short-lived
//! X.509 proxy. The cryptographic material is carried as bytes produced by
//! the security library and handed back to it on every remote call; this
//! crate only reads the principal name and the expiry.
//!
//! Credentials are never edited in place. Rotation means minting a new one
//! and swapping it into the [`CredentialStore`](crate::CredentialStore).

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// What a credential may be used for (GSS-API credential usage).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialUsage {
    /// Initiate security contexts only.
    Initiate,
    /// Accept security contexts only.
    Accept,
    /// Both initiate and accept.
    InitiateAndAccept,
}

/// Proxy delegation type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelegationType {
    /// Full impersonation proxy.
    #[default]
    Full,
    /// Limited proxy, refused by job managers for job startup.
    Limited,
}

impl fmt::Display for DelegationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DelegationType::Full => write!(f, "full"),
            DelegationType::Limited => write!(f, "limited"),
        }
    }
}

/// A delegated X.509 proxy credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    principal: String,
    not_after: DateTime<Utc>,
    usage: CredentialUsage,
    material: Vec<u8>,
}

impl Credential {
    /// Create a credential expiring at `not_after`.
    pub fn new(principal: impl Into<String>, not_after: DateTime<Utc>, usage: CredentialUsage) -> Self {
        Self {
            principal: principal.into(),
            not_after,
            usage,
            material: Vec::new(),
        }
    }

    /// Create a credential valid for `lifetime_secs` from `issued_at`.
    pub fn with_lifetime(
        principal: impl Into<String>,
        issued_at: DateTime<Utc>,
        lifetime_secs: i64,
        usage: CredentialUsage,
    ) -> Self {
        Self::new(principal, issued_at + Duration::seconds(lifetime_secs), usage)
    }

    /// Attach the encoded proxy (certificate chain and key) from the security library.
    pub fn with_material(mut self, material: impl Into<Vec<u8>>) -> Self {
        self.material = material.into();
        self
    }

    /// Distinguished name of the proxy subject.
    pub fn principal(&self) -> &str {
        &self.principal
    }

    /// Expiry instant.
    pub fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Intended usage.
    pub fn usage(&self) -> CredentialUsage {
        self.usage
    }

    /// Encoded proxy as produced by the security library.
    pub fn material(&self) -> &[u8] {
        &self.material
    }

    /// Whole seconds left before expiry at `now`, never negative.
    pub fn remaining_lifetime(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_seconds().max(0)
    }
}

// Proxy material includes the private key.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("principal", &self.principal)
            .field("not_after", &self.not_after)
            .field("usage", &self.usage)
            .field("material", &format_args!("<{} bytes>", self.material.len()))
            .finish()
    }
}
