//! Session configuration.
//!
//! Every value has a default except the local staging locations, which must
//! be set (in the file or on the session) before jobs are submitted.
//!
//! ```toml
//! log_level = "debug"
//!
//! [delegation]
//! host = "myproxy.arcs.org.au"
//! port = 7512
//!
//! [proxy]
//! min_lifetime_secs = 300
//! key_bits = 512
//! delegation = "full"
//!
//! [staging]
//! server = "gsiftp://portal.example.org:2811"
//! stage_in_dir = "/srv/grid/in"
//! stage_out_dir = "/srv/grid/out"
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::credential::DelegationType;
use crate::error::{GridError, GridResult};
use crate::store::DEFAULT_MIN_LIFETIME_SECS;

/// Default MyProxy server.
pub const DEFAULT_DELEGATION_HOST: &str = "myproxy.arcs.org.au";

/// Default MyProxy port.
pub const DEFAULT_DELEGATION_PORT: u16 = 7512;

/// Default proxy key size in bits.
pub const DEFAULT_PROXY_KEY_BITS: u32 = 512;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Credential delegation service
    pub delegation: DelegationConfig,

    /// Proxy minting and validity
    pub proxy: ProxyConfig,

    /// Local data staging server and directories
    pub staging: StagingConfig,
}

/// Credential delegation (MyProxy) server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DelegationConfig {
    pub host: String,
    pub port: u16,
}

impl Default for DelegationConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DELEGATION_HOST.to_string(),
            port: DEFAULT_DELEGATION_PORT,
        }
    }
}

/// Proxy parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Remaining lifetime a proxy needs to be considered valid.
    pub min_lifetime_secs: i64,

    /// Key size of minted proxies.
    pub key_bits: u32,

    /// Delegation type of minted proxies.
    pub delegation: DelegationType,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            min_lifetime_secs: DEFAULT_MIN_LIFETIME_SECS,
            key_bits: DEFAULT_PROXY_KEY_BITS,
            delegation: DelegationType::Full,
        }
    }
}

/// Local staging locations. No defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Data-transfer server reachable from the compute sites.
    pub server: Option<String>,

    /// Directory on `server` holding job inputs.
    pub stage_in_dir: Option<String>,

    /// Directory on `server` receiving job outputs.
    pub stage_out_dir: Option<String>,
}

/// Fully specified local staging locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalStaging {
    pub server: String,
    pub stage_in_dir: String,
    pub stage_out_dir: String,
}

impl StagingConfig {
    /// All three staging values, or a configuration error naming the first missing one.
    pub fn require(&self) -> GridResult<LocalStaging> {
        fn present(value: &Option<String>, key: &str) -> GridResult<String> {
            match value.as_deref() {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => Err(GridError::Configuration(format!("staging.{key} is not set"))),
            }
        }

        Ok(LocalStaging {
            server: present(&self.server, "server")?,
            stage_in_dir: present(&self.stage_in_dir, "stage_in_dir")?,
            stage_out_dir: present(&self.stage_out_dir, "stage_out_dir")?,
        })
    }
}

impl GridConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> GridResult<Self> {
        let config: GridConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn load(path: impl AsRef<Path>) -> GridResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Reject values no session can work with.
    pub fn validate(&self) -> GridResult<()> {
        if self.delegation.host.is_empty() {
            return Err(GridError::Configuration("delegation.host is empty".into()));
        }
        if self.delegation.port == 0 {
            return Err(GridError::Configuration("delegation.port must be non-zero".into()));
        }
        if self.proxy.min_lifetime_secs <= 0 {
            return Err(GridError::Configuration(
                "proxy.min_lifetime_secs must be positive".into(),
            ));
        }
        if self.proxy.key_bits == 0 {
            return Err(GridError::Configuration("proxy.key_bits must be non-zero".into()));
        }
        Ok(())
    }

    /// Effective log level.
    pub fn log_level(&self) -> &str {
        if self.log_level.is_empty() {
            "info"
        } else {
            &self.log_level
        }
    }
}
