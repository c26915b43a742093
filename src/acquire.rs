//! Credential acquisition strategies.
//!
//! Three independent ways to obtain a proxy, all behind the [`Acquire`]
//! trait:
//!
//! | Strategy | Source | Failure |
//! |----------|--------|---------|
//! | [`KeyPairProxy`] | long-term key + certificate (e.g. from an SLCS server) | `ProxyMintFailed` |
//! | [`MyProxyLogon`] | delegation service, username + password | `DelegationRejected` |
//! | [`LocalProxy`] | proxy file already on disk | `NoLocalProxy` |
//!
//! No strategy retries and none falls back to another; the caller decides.
//! The X.509 primitives and the delegation wire protocol belong to the
//! security library, reached through [`ProxyFactory`] and
//! [`DelegationService`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{Ordering, compiler_fence};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, error};

use crate::config::{DEFAULT_DELEGATION_HOST, DEFAULT_DELEGATION_PORT, DEFAULT_PROXY_KEY_BITS};
use crate::credential::{Credential, CredentialUsage, DelegationType};
use crate::error::{GridError, GridResult};

/// Environment variable naming the proxy file, honoured before the default location.
pub const X509_USER_PROXY: &str = "X509_USER_PROXY";

/// A way to obtain a fresh proxy credential.
///
/// Implementations only produce the credential. Installing it into a
/// [`CredentialStore`](crate::CredentialStore) and the minimum-lifetime
/// post-condition are the session's job.
#[async_trait]
pub trait Acquire: Send {
    /// Short name of the strategy for logs.
    fn name(&self) -> &str;

    /// Obtain a credential.
    async fn acquire(&mut self) -> GridResult<Credential>;
}

// ── Security library seams ──────────────────────────────────────────────

/// A proxy certificate as produced or decoded by the X.509 library.
#[derive(Clone)]
pub struct ProxyCertificate {
    /// Subject distinguished name of the proxy.
    pub subject: String,
    /// Expiry instant.
    pub not_after: DateTime<Utc>,
    /// Encoded proxy chain and private key.
    pub encoded: Vec<u8>,
}

impl fmt::Debug for ProxyCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyCertificate")
            .field("subject", &self.subject)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

/// Parameters for minting a proxy under a long-term certificate.
///
/// No X.509 extensions beyond the proxy defaults are requested.
#[derive(Debug, Clone, Copy)]
pub struct ProxyRequest<'a> {
    /// PEM certificate of the issuer.
    pub certificate: &'a [u8],
    /// PEM private key of the issuer (RSA or DSA).
    pub private_key: &'a [u8],
    /// Size of the proxy's fresh key pair.
    pub key_bits: u32,
    /// Requested lifetime in seconds.
    pub lifetime_secs: i64,
    /// Proxy delegation type.
    pub delegation: DelegationType,
}

/// X.509 proxy primitives.
pub trait ProxyFactory: Send + Sync {
    /// Mint a proxy signed by the issuer in `request`.
    fn create_proxy(&self, request: &ProxyRequest<'_>) -> Result<ProxyCertificate, String>;

    /// Decode an encoded proxy file.
    fn decode_proxy(&self, encoded: &[u8]) -> Result<ProxyCertificate, String>;
}

/// A delegation request sent to a MyProxy server.
#[derive(Clone, Copy)]
pub struct DelegationRequest<'a> {
    /// MyProxy server host.
    pub host: &'a str,
    /// MyProxy server port.
    pub port: u16,
    /// Account name on the server.
    pub username: &'a str,
    /// Pass phrase; the caller zeroes it after the call.
    pub password: &'a [u8],
    /// Requested proxy lifetime in seconds.
    pub lifetime_secs: i64,
}

impl fmt::Debug for DelegationRequest<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegationRequest")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

/// Client side of the credential delegation protocol (TLS, username/password).
#[async_trait]
pub trait DelegationService: Send + Sync {
    /// Authenticate and retrieve a delegated proxy of the requested lifetime.
    async fn get_delegation(&self, request: DelegationRequest<'_>) -> Result<Credential, String>;
}

// ── Strategies ──────────────────────────────────────────────────────────

/// Mint a proxy from a local private key and certificate.
pub struct KeyPairProxy {
    certificate: Vec<u8>,
    private_key: Vec<u8>,
    lifetime_secs: i64,
    key_bits: u32,
    delegation: DelegationType,
    factory: Arc<dyn ProxyFactory>,
}

impl KeyPairProxy {
    /// A full-delegation, 512-bit proxy of `lifetime_secs`.
    pub fn new(
        certificate: impl Into<Vec<u8>>,
        private_key: impl Into<Vec<u8>>,
        lifetime_secs: i64,
        factory: Arc<dyn ProxyFactory>,
    ) -> Self {
        Self {
            certificate: certificate.into(),
            private_key: private_key.into(),
            lifetime_secs,
            key_bits: DEFAULT_PROXY_KEY_BITS,
            delegation: DelegationType::Full,
            factory,
        }
    }

    /// Override the proxy key size.
    pub fn with_key_bits(mut self, key_bits: u32) -> Self {
        self.key_bits = key_bits;
        self
    }

    /// Override the delegation type.
    pub fn with_delegation(mut self, delegation: DelegationType) -> Self {
        self.delegation = delegation;
        self
    }
}

#[async_trait]
impl Acquire for KeyPairProxy {
    fn name(&self) -> &str {
        "key-pair"
    }

    async fn acquire(&mut self) -> GridResult<Credential> {
        let request = ProxyRequest {
            certificate: &self.certificate,
            private_key: &self.private_key,
            key_bits: self.key_bits,
            lifetime_secs: self.lifetime_secs,
            delegation: self.delegation,
        };
        debug!(
            key_bits = request.key_bits,
            lifetime = request.lifetime_secs,
            delegation = %request.delegation,
            "minting proxy"
        );

        let proxy = self.factory.create_proxy(&request).map_err(|e| {
            error!("create user proxy error: {e}");
            GridError::ProxyMintFailed(e)
        })?;

        Ok(Credential::new(proxy.subject, proxy.not_after, CredentialUsage::InitiateAndAccept)
            .with_material(proxy.encoded))
    }
}

/// Retrieve a delegated proxy from a MyProxy server.
///
/// The password buffer is borrowed from the caller and overwritten with
/// zeroes when [`acquire`](Acquire::acquire) returns, whatever the outcome,
/// and again when the strategy is dropped.
pub struct MyProxyLogon<'p> {
    host: String,
    port: u16,
    username: String,
    password: &'p mut [u8],
    lifetime_secs: i64,
    service: Arc<dyn DelegationService>,
}

impl<'p> MyProxyLogon<'p> {
    /// Log on to the default server (`myproxy.arcs.org.au:7512`).
    pub fn new(
        username: impl Into<String>,
        password: &'p mut [u8],
        lifetime_secs: i64,
        service: Arc<dyn DelegationService>,
    ) -> Self {
        Self {
            host: DEFAULT_DELEGATION_HOST.to_string(),
            port: DEFAULT_DELEGATION_PORT,
            username: username.into(),
            password,
            lifetime_secs,
            service,
        }
    }

    /// Use another delegation server.
    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }
}

#[async_trait]
impl Acquire for MyProxyLogon<'_> {
    fn name(&self) -> &str {
        "myproxy"
    }

    async fn acquire(&mut self) -> GridResult<Credential> {
        let request = DelegationRequest {
            host: &self.host,
            port: self.port,
            username: &self.username,
            password: &*self.password,
            lifetime_secs: self.lifetime_secs,
        };
        debug!(host = request.host, port = request.port, username = request.username, "requesting delegation");

        let outcome = self.service.get_delegation(request).await;
        wipe(self.password);

        outcome.map_err(|e| {
            error!(host = %self.host, "Could not get delegated proxy from server: {e}");
            GridError::DelegationRejected(e)
        })
    }
}

impl Drop for MyProxyLogon<'_> {
    fn drop(&mut self) {
        wipe(self.password);
    }
}

impl fmt::Debug for MyProxyLogon<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MyProxyLogon")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("lifetime_secs", &self.lifetime_secs)
            .finish_non_exhaustive()
    }
}

pub(crate) fn wipe(buffer: &mut [u8]) {
    buffer.fill(0);
    compiler_fence(Ordering::SeqCst);
}

/// Load the caller's existing proxy file.
///
/// Without an explicit path the location is resolved the way the grid
/// security libraries do it; see [`default_proxy_path`].
pub struct LocalProxy {
    path: Option<PathBuf>,
    factory: Arc<dyn ProxyFactory>,
}

impl LocalProxy {
    /// Load from the conventional location.
    pub fn new(factory: Arc<dyn ProxyFactory>) -> Self {
        Self { path: None, factory }
    }

    /// Load from an explicit file.
    pub fn at(path: impl Into<PathBuf>, factory: Arc<dyn ProxyFactory>) -> Self {
        Self {
            path: Some(path.into()),
            factory,
        }
    }
}

#[async_trait]
impl Acquire for LocalProxy {
    fn name(&self) -> &str {
        "local-proxy"
    }

    async fn acquire(&mut self) -> GridResult<Credential> {
        let path = self
            .path
            .clone()
            .or_else(default_proxy_path)
            .ok_or_else(|| GridError::NoLocalProxy("cannot resolve the proxy file location".into()))?;
        debug!(path = %path.display(), "loading local proxy");

        let encoded = tokio::fs::read(&path).await.map_err(|e| {
            error!(path = %path.display(), "cannot read proxy file: {e}");
            GridError::NoLocalProxy(format!("{}: {e}", path.display()))
        })?;
        let proxy = self
            .factory
            .decode_proxy(&encoded)
            .map_err(|e| GridError::NoLocalProxy(format!("{}: {e}", path.display())))?;

        Ok(Credential::new(proxy.subject, proxy.not_after, CredentialUsage::InitiateAndAccept)
            .with_material(encoded))
    }
}

/// Conventional proxy location: `$X509_USER_PROXY` if set and non-empty,
/// else `/tmp/x509up_u<uid>` with the real uid of the process.
///
/// The fallback ignores `TMPDIR`, as the Globus libraries do. It is `None`
/// on platforms without user ids.
pub fn default_proxy_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(X509_USER_PROXY).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    uid_proxy_path()
}

#[cfg(unix)]
fn uid_proxy_path() -> Option<PathBuf> {
    let uid = nix::unistd::getuid();
    Some(PathBuf::from(format!("/tmp/x509up_u{uid}")))
}

#[cfg(not(unix))]
fn uid_proxy_path() -> Option<PathBuf> {
    None
}
