use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Which storage engine serves a namespace
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process store
    #[default]
    #[serde(alias = "node", alias = "memory")]
    Local,
    /// Networked Redis-compatible store
    #[serde(alias = "redis")]
    Remote,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a backend instance
///
/// `Uninitialized -> Provisioning -> Ready -> (Error <-> Ready) -> Closed`.
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendState {
    Uninitialized,
    Provisioning,
    Ready,
    Error,
    Closed,
}

impl BackendState {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Stored value in the local store with metadata
#[derive(Debug, Clone)]
pub struct StoredValue {
    /// Raw byte data
    pub data: Vec<u8>,
    /// Optional expiration time
    pub expires_at: Option<Instant>,
}

impl StoredValue {
    /// Create a new stored value
    pub fn new(data: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            data,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    /// Check if the value has expired
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|expires| Instant::now() >= expires)
    }
}

/// Configuration for the in-process store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Maximum memory in MB
    pub max_memory_mb: usize,
    /// TTL cleanup interval in milliseconds
    pub ttl_cleanup_interval_ms: u64,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            max_memory_mb: 512,
            ttl_cleanup_interval_ms: 1000,
        }
    }
}

/// Statistics for the in-process store
#[derive(Debug, Default, Clone, Serialize)]
pub struct LocalStats {
    /// Total number of keys
    pub total_keys: usize,
    /// Estimated memory usage in bytes
    pub total_memory_bytes: usize,
    /// Number of GET operations
    pub gets: u64,
    /// Number of SET operations
    pub sets: u64,
    /// Number of DELETE operations
    pub dels: u64,
    /// Number of hits
    pub hits: u64,
    /// Number of misses
    pub misses: u64,
}

impl LocalStats {
    /// Calculate hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
