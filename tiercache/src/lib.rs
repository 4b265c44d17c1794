//! # tiercache
//!
//! Read-through cache facade that routes namespaced keys to an in-process
//! store or a Redis-compatible server behind one key format.
//!
//! ```rust,no_run
//! use tiercache::{BackendKind, BulkFilter, CacheConfig, CacheError, CacheFacade};
//!
//! # async fn run() -> Result<(), CacheError> {
//! let cache = CacheFacade::new(CacheConfig::default())?;
//! cache.register("sessions", BackendKind::Remote)?;
//!
//! let _profile: String = cache
//!     .scope("sessions")?
//!     .get_or_compute("user/42", || async { Ok::<_, CacheError>("loaded".to_string()) })
//!     .await?;
//!
//! cache
//!     .invalidate_all(&BulkFilter::all().namespace("sessions").pattern("user:*"))
//!     .await?;
//! cache.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod core;
pub mod facade;
pub mod registry;

pub use backend::{BackendAdapter, ConnectionStatus, LocalAdapter, RemoteAdapter};
pub use config::{BackendConfig, CacheConfig, DEFAULT_TTL_SECS};
pub use core::{
    BackendKind, BackendState, CacheError, GlobMatcher, KeyCodec, LocalStats, LocalStore,
    LocalStoreConfig, Result,
};
pub use facade::{BulkFilter, CacheFacade, CacheFacadeBuilder, FacadeStats, NamespaceScope};
pub use registry::{Namespace, NamespaceRegistry, Registration, ResolvedNamespace};
