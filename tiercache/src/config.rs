use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::core::{BackendKind, CacheError, LocalStoreConfig, Result};

/// Default entry lifetime: one day
pub const DEFAULT_TTL_SECS: u64 = 86_400;

/// Facade configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
    /// Remote backend host
    pub backend_address: String,
    /// Remote backend port
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Default time-to-live in seconds (0 disables expiry)
    #[serde(rename = "default_ttl")]
    pub default_ttl_secs: u64,
    /// Namespace registered when the facade is built
    pub default_namespace: String,
    /// Backend serving the default namespace
    pub default_backend: BackendKind,
    /// In-process store settings
    pub local: LocalStoreConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend_address: "127.0.0.1".to_string(),
            port: 6379,
            user: None,
            password: None,
            default_ttl_secs: DEFAULT_TTL_SECS,
            default_namespace: "default".to_string(),
            default_backend: BackendKind::Local,
            local: LocalStoreConfig::default(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))?;
        let config: CacheConfig = serde_yaml::from_str(&content)
            .map_err(|e| CacheError::Config(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    pub fn with_backend_address(mut self, address: impl Into<String>, port: u16) -> Self {
        self.backend_address = address.into();
        self.port = port;
        self
    }

    pub fn with_credentials(mut self, user: Option<String>, password: Option<String>) -> Self {
        self.user = user;
        self.password = password;
        self
    }

    pub fn with_default_ttl(mut self, secs: u64) -> Self {
        self.default_ttl_secs = secs;
        self
    }

    pub fn with_default_namespace(mut self, name: impl Into<String>, kind: BackendKind) -> Self {
        self.default_namespace = name.into();
        self.default_backend = kind;
        self
    }

    /// Immutable snapshot used to provision a backend
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            host: self.backend_address.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            default_ttl_secs: self.default_ttl_secs,
            local: self.local.clone(),
        }
    }
}

/// Connection parameters a backend instance is provisioned from
///
/// Fixed once the instance exists: later facade-level changes only
/// affect backends provisioned afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub default_ttl_secs: u64,
    pub local: LocalStoreConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        CacheConfig::default().backend_config()
    }
}

impl BackendConfig {
    pub fn default_ttl(&self) -> Option<Duration> {
        (self.default_ttl_secs > 0).then(|| Duration::from_secs(self.default_ttl_secs))
    }

    /// `redis://[user[:password]@]host:port/` with credentials escaped
    pub fn redis_url(&self) -> Result<String> {
        let host = if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };

        let mut url = Url::parse(&format!("redis://{}:{}/", host, self.port))
            .map_err(|e| CacheError::InvalidNamespaceConfig(format!("bad address: {}", e)))?;

        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(user)
                .map_err(|_| CacheError::InvalidNamespaceConfig("bad user".to_string()))?;
        }
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| CacheError::InvalidNamespaceConfig("bad password".to_string()))?;
        }

        Ok(url.to_string())
    }
}
