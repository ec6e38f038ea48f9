//! Configuration for Misery
//!
//! Centralized configuration with sensible defaults, loadable from the
//! process environment.

use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::credentials::ServiceAccount;
use crate::error::{MiseryError, Result};
use crate::partition::DEFAULT_PARTITION_LIMIT;

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_CACHE_ENDPOINT: &str = "MEMCACHIER_ENDPOINT";
pub const ENV_CACHE_USERNAME: &str = "MEMCACHIER_USERNAME";
pub const ENV_CACHE_PASSWORD: &str = "MEMCACHIER_PASSWORD";
pub const ENV_SERVICE_ACCOUNT: &str = "FIRESTORE";
pub const ENV_GATEWAY_TOKEN: &str = "MISERYBOT_OAUTH_KEY";
pub const ENV_DISPATCH_TOKEN: &str = "MISERYBOT_DISPATCH_TOKEN";
pub const ENV_OWNERS: &str = "MISERYBOT_OWNERS";
pub const ENV_GATEWAY_ADDR: &str = "MISERYBOT_GATEWAY";

/// Key under which the deploy webhook endpoint is stored
pub const DEPLOY_ENDPOINT_KEY: &str = "Misery/Config%dispatch_deploy_endpoint";

/// Main configuration for a bot instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Gateway Configuration
    // -------------------------------------------------------------------------
    /// Gateway address (host:port)
    pub gateway_addr: String,

    /// Token sent in IDENTIFY
    pub gateway_token: String,

    /// Identities allowed to run privileged commands
    pub authorized_ids: BTreeSet<u64>,

    /// Connection read timeout (milliseconds); also the shutdown poll interval
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Store Configuration
    // -------------------------------------------------------------------------
    /// Which document store backend to use
    pub store_backend: StoreBackend,

    /// Root directory for the file store
    /// Internal structure:
    ///   {data_dir}/
    ///     └── {project_id or "default"}/   (one directory tree per namespace)
    pub data_dir: PathBuf,

    /// Decoded service-account credential, if one was supplied
    pub service_account: Option<ServiceAccount>,

    /// Chunk ceiling for striping byte values across records
    pub partition_limit: usize,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Memcached endpoint; the in-memory cache is used when absent
    pub cache_endpoint: Option<String>,

    /// SASL username/password for the cache
    pub cache_credentials: Option<(String, String)>,

    /// Cache connect/read/write timeout (milliseconds)
    pub cache_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Webhook Configuration
    // -------------------------------------------------------------------------
    /// Bearer token for the deploy webhook
    pub dispatch_token: Option<String>,

    /// Webhook connect/read/write timeout (milliseconds)
    pub webhook_timeout_ms: u64,
}

/// Document store backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Volatile, process-local
    Memory,

    /// Durable, one file per record under `data_dir`
    File,
}

impl std::str::FromStr for StoreBackend {
    type Err = MiseryError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "memory" => Ok(StoreBackend::Memory),
            "file" => Ok(StoreBackend::File),
            other => Err(MiseryError::Config(format!(
                "unknown store backend {:?} (expected memory or file)",
                other
            ))),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway_addr: "127.0.0.1:7878".to_string(),
            gateway_token: String::new(),
            authorized_ids: BTreeSet::new(),
            read_timeout_ms: 500,
            write_timeout_ms: 5000,
            store_backend: StoreBackend::File,
            data_dir: PathBuf::from("./misery_data"),
            service_account: None,
            partition_limit: DEFAULT_PARTITION_LIMIT,
            cache_endpoint: None,
            cache_credentials: None,
            cache_timeout_ms: 3000,
            dispatch_token: None,
            webhook_timeout_ms: 10_000,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    ///
    /// Unset and empty variables are treated alike.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut builder = Config::builder();

        if let Some(addr) = get(ENV_GATEWAY_ADDR) {
            builder = builder.gateway_addr(addr);
        }
        if let Some(token) = get(ENV_GATEWAY_TOKEN) {
            builder = builder.gateway_token(token);
        }
        if let Some(owners) = get(ENV_OWNERS) {
            builder = builder.authorized_ids(parse_ids(&owners)?);
        }
        if let Some(blob) = get(ENV_SERVICE_ACCOUNT) {
            builder = builder.service_account(ServiceAccount::from_base64(&blob)?);
        }
        if let Some(endpoint) = get(ENV_CACHE_ENDPOINT) {
            builder = builder.cache_endpoint(endpoint);
            match (get(ENV_CACHE_USERNAME), get(ENV_CACHE_PASSWORD)) {
                (Some(user), Some(pass)) => builder = builder.cache_credentials(user, pass),
                (None, None) => {}
                _ => {
                    return Err(MiseryError::Config(format!(
                        "{} and {} must be set together",
                        ENV_CACHE_USERNAME, ENV_CACHE_PASSWORD
                    )))
                }
            }
        }
        if let Some(token) = get(ENV_DISPATCH_TOKEN) {
            builder = builder.dispatch_token(token);
        }

        Ok(builder.build())
    }

    /// Check settings that have no usable default
    pub fn validate(&self) -> Result<()> {
        if self.gateway_token.is_empty() {
            return Err(MiseryError::Config(format!(
                "gateway token missing (set {})",
                ENV_GATEWAY_TOKEN
            )));
        }
        if self.partition_limit == 0 {
            return Err(MiseryError::Config(
                "partition limit must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Namespace directory of the file store
    pub fn store_namespace(&self) -> &str {
        self.service_account
            .as_ref()
            .map(|account| account.project_id.as_str())
            .unwrap_or("default")
    }
}

/// Parse a comma-separated list of numeric identities
pub fn parse_ids(list: &str) -> Result<BTreeSet<u64>> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| {
            id.parse::<u64>()
                .map_err(|_| MiseryError::Config(format!("invalid identity {:?}", id)))
        })
        .collect()
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the gateway address
    pub fn gateway_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.gateway_addr = addr.into();
        self
    }

    /// Set the gateway token
    pub fn gateway_token(mut self, token: impl Into<String>) -> Self {
        self.config.gateway_token = token.into();
        self
    }

    /// Replace the set of authorized identities
    pub fn authorized_ids(mut self, ids: impl IntoIterator<Item = u64>) -> Self {
        self.config.authorized_ids = ids.into_iter().collect();
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the store backend
    pub fn store_backend(mut self, backend: StoreBackend) -> Self {
        self.config.store_backend = backend;
        self
    }

    /// Set the data directory (root for the file store)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn service_account(mut self, account: ServiceAccount) -> Self {
        self.config.service_account = Some(account);
        self
    }

    /// Set the partition limit (in bytes)
    pub fn partition_limit(mut self, limit: usize) -> Self {
        self.config.partition_limit = limit;
        self
    }

    pub fn cache_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.cache_endpoint = Some(endpoint.into());
        self
    }

    pub fn cache_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.cache_credentials = Some((username.into(), password.into()));
        self
    }

    pub fn cache_timeout_ms(mut self, ms: u64) -> Self {
        self.config.cache_timeout_ms = ms;
        self
    }

    pub fn dispatch_token(mut self, token: impl Into<String>) -> Self {
        self.config.dispatch_token = Some(token.into());
        self
    }

    pub fn webhook_timeout_ms(mut self, ms: u64) -> Self {
        self.config.webhook_timeout_ms = ms;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
