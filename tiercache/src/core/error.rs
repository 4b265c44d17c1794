use thiserror::Error;

use super::types::BackendKind;

/// Main error type for cache facade operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid namespace config: {0}")]
    InvalidNamespaceConfig(String),

    #[error("Unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("{kind} backend fault: {message}")]
    BackendConnectionFault { kind: BackendKind, message: String },

    #[error("Cache is not ready (shut down)")]
    NotReady,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl CacheError {
    /// Shorthand for a fault raised by one of the backends
    pub fn backend(kind: BackendKind, message: impl Into<String>) -> Self {
        Self::BackendConnectionFault {
            kind,
            message: message.into(),
        }
    }

    /// Whether the facade may swallow this error and fall back to compute
    ///
    /// Caching plumbing faults are recoverable; routing and lifecycle
    /// errors fail the call.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::BackendConnectionFault { .. } | Self::Serialization(_) => true,
            Self::InvalidNamespaceConfig(_)
            | Self::UnknownNamespace(_)
            | Self::NotReady
            | Self::Config(_) => false,
        }
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        Self::backend(BackendKind::Remote, err.to_string())
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;
