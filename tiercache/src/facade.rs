//! Read-through cache facade

use crate::backend::BackendAdapter;
use crate::config::{BackendConfig, CacheConfig};
use crate::core::{
    BackendKind, BackendState, CacheError, GlobMatcher, KeyCodec, LocalStats, Result,
};
use crate::registry::{Namespace, NamespaceRegistry, Registration, ResolvedNamespace};
use futures::future::join_all;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counters for read-through traffic
#[derive(Debug, Default, Clone, Serialize)]
pub struct FacadeStats {
    /// Reads served from a backend
    pub hits: u64,
    /// Reads that found nothing and computed
    pub misses: u64,
    /// Reads that skipped a disabled backend
    pub bypasses: u64,
    /// Reads that computed because the backend faulted
    pub fallbacks: u64,
    /// Successful backend writes
    pub writes: u64,
    /// Backend writes that failed and were dropped
    pub write_failures: u64,
}

impl FacadeStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.fallbacks;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Selects namespaces and keys for bulk listing and eviction
///
/// `None` for the backend and `"*"` for the namespace match everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFilter {
    pub backend: Option<BackendKind>,
    pub namespace: String,
    pub pattern: String,
}

impl Default for BulkFilter {
    fn default() -> Self {
        Self {
            backend: None,
            namespace: "*".to_string(),
            pattern: "*".to_string(),
        }
    }
}

impl BulkFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn backend(mut self, kind: BackendKind) -> Self {
        self.backend = Some(kind);
        self
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = pattern.into();
        self
    }
}

/// Builds a [`CacheFacade`], optionally with pre-built backends
pub struct CacheFacadeBuilder {
    config: CacheConfig,
    backends: Vec<Arc<dyn BackendAdapter>>,
    codec: Option<KeyCodec>,
}

impl CacheFacadeBuilder {
    /// Use `backend` for its kind instead of provisioning one from config
    pub fn backend(mut self, backend: Arc<dyn BackendAdapter>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Root directory stripped from file keys
    pub fn key_root(mut self, root: impl AsRef<Path>) -> Self {
        self.codec = Some(KeyCodec::new(root));
        self
    }

    pub fn build(self) -> Result<CacheFacade> {
        let registry = NamespaceRegistry::new();

        for backend in self.backends {
            registry.install_backend(backend)?;
        }

        let default_namespace = self.config.default_namespace.clone();
        let registration = registry.register(
            &default_namespace,
            self.config.default_backend,
            &self.config.backend_config(),
        )?;
        if registration == Registration::Rejected {
            return Err(CacheError::InvalidNamespaceConfig(format!(
                "default namespace '{}' could not be registered",
                default_namespace
            )));
        }

        info!(
            "Cache facade ready (default namespace {} on {} backend)",
            default_namespace, self.config.default_backend
        );

        Ok(CacheFacade {
            codec: self.codec.unwrap_or_else(KeyCodec::from_entry_point),
            current: RwLock::new(default_namespace),
            registry,
            stats: RwLock::new(FacadeStats::default()),
            config: self.config,
        })
    }
}

/// Tiered read-through cache
///
/// Routes every key through its namespace to the shared backend of the
/// namespace's kind. Backend faults never fail a read: the caller's
/// compute function is used instead.
///
/// Calls without an explicit namespace use the current namespace.
/// Switching it with [`CacheFacade::use_namespace`] while other tasks issue
/// such calls lets them observe either namespace; use
/// [`CacheFacade::scope`] to pin one.
pub struct CacheFacade {
    config: CacheConfig,
    registry: NamespaceRegistry,
    codec: KeyCodec,
    current: RwLock<String>,
    stats: RwLock<FacadeStats>,
}

impl CacheFacade {
    /// Build a facade provisioning backends from `config`
    pub fn new(config: CacheConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: CacheConfig) -> CacheFacadeBuilder {
        CacheFacadeBuilder {
            config,
            backends: Vec::new(),
            codec: None,
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn codec(&self) -> &KeyCodec {
        &self.codec
    }

    /// Register a namespace using the facade's connection settings
    pub fn register(&self, name: &str, kind: BackendKind) -> Result<Registration> {
        self.register_with_config(name, kind, &self.config.backend_config())
    }

    /// Register a namespace; `config` is only used if this provisions the
    /// backend for `kind`
    pub fn register_with_config(
        &self,
        name: &str,
        kind: BackendKind,
        config: &BackendConfig,
    ) -> Result<Registration> {
        self.registry.register(name, kind, config)
    }

    pub fn namespaces(&self) -> Vec<Namespace> {
        self.registry.namespaces()
    }

    pub fn current_namespace(&self) -> String {
        self.current.read().clone()
    }

    /// Switch the current namespace; unknown names are rejected
    pub fn use_namespace(&self, name: &str) -> Result<()> {
        self.ensure_ready()?;
        if !self.registry.contains(name) {
            return Err(CacheError::UnknownNamespace(name.to_string()));
        }
        debug!("Current namespace -> {}", name);
        *self.current.write() = name.to_string();
        Ok(())
    }

    /// Handle bound to one namespace, resolved once
    pub fn scope(&self, name: &str) -> Result<NamespaceScope<'_>> {
        self.ensure_ready()?;
        let resolved = self.registry.resolve(name)?;
        Ok(NamespaceScope {
            facade: self,
            resolved,
        })
    }

    fn current_scope(&self) -> Result<NamespaceScope<'_>> {
        let name = self.current_namespace();
        self.scope(&name)
    }

    /// Cached value for `key` in the current namespace, computing and
    /// storing it on a miss
    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.current_scope()?.get_or_compute(key, compute).await
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.current_scope()?.put(key, value).await
    }

    pub async fn put_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.current_scope()?.put_with_ttl(key, value, ttl).await
    }

    pub async fn invalidate(&self, key: &str) -> Result<u64> {
        self.current_scope()?.invalidate(key).await
    }

    /// Read-through for a file path, keyed relative to the codec root
    pub async fn get_or_compute_file<T, E, F, Fut>(
        &self,
        path: impl AsRef<Path>,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let scope = self.current_scope()?;
        let backend_key = self.codec.file_key(path, scope.name());
        scope.read_through(backend_key, compute).await
    }

    pub async fn invalidate_file(&self, path: impl AsRef<Path>) -> Result<u64> {
        let scope = self.current_scope()?;
        let backend_key = self.codec.file_key(path, scope.name());
        Ok(scope.delete_backend_key(&backend_key).await)
    }

    /// Delete matching keys across namespaces; returns the number removed
    ///
    /// Namespaces are processed concurrently and independently: a faulting
    /// backend contributes nothing and the rest still run.
    pub async fn invalidate_all(&self, filter: &BulkFilter) -> Result<u64> {
        let targets = self.bulk_targets(filter)?;

        let results = join_all(targets.iter().map(|ns| {
            let pattern = format!("{}:{}", ns.name, filter.pattern);
            async move { (ns, ns.backend.delete_keys(&pattern).await) }
        }))
        .await;

        let mut removed = 0;
        for (ns, result) in results {
            match result {
                Ok(count) => {
                    debug!("Evicted {} keys from namespace {}", count, ns.name);
                    removed += count;
                }
                Err(e) => warn!("Bulk eviction skipped namespace {}: {}", ns.name, e),
            }
        }
        Ok(removed)
    }

    /// List matching backend keys across namespaces
    pub async fn list_all(&self, filter: &BulkFilter) -> Result<Vec<String>> {
        let targets = self.bulk_targets(filter)?;

        let results = join_all(targets.iter().map(|ns| {
            let pattern = format!("{}:{}", ns.name, filter.pattern);
            async move { (ns, ns.backend.list_keys(&pattern).await) }
        }))
        .await;

        let mut keys = Vec::new();
        for (ns, result) in results {
            match result {
                Ok(found) => keys.extend(found),
                Err(e) => warn!("Listing skipped namespace {}: {}", ns.name, e),
            }
        }
        Ok(keys)
    }

    /// Toggle caching for every namespace of `kind`
    ///
    /// Disabling also evicts that kind's entries so nothing stale is served
    /// when it comes back; the eviction count is returned.
    pub async fn set_enabled(&self, kind: BackendKind, enabled: bool) -> Result<u64> {
        self.ensure_ready()?;
        let was_enabled = self.registry.set_enabled(kind, enabled);
        info!("{} backend caching {}", kind, if enabled { "enabled" } else { "disabled" });

        if enabled || !was_enabled {
            return Ok(0);
        }
        self.invalidate_all(&BulkFilter::all().backend(kind)).await
    }

    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        self.registry.is_enabled(kind)
    }

    pub fn backend_state(&self, kind: BackendKind) -> BackendState {
        self.registry.backend_state(kind)
    }

    pub fn is_ready(&self, kind: BackendKind) -> bool {
        self.backend_state(kind).is_ready()
    }

    pub fn stats(&self) -> FacadeStats {
        self.stats.read().clone()
    }

    /// Statistics of the in-process store, if one is provisioned
    pub fn local_stats(&self) -> Option<LocalStats> {
        self.registry
            .backend(BackendKind::Local)
            .and_then(|backend| backend.local_stats())
    }

    /// Release every backend; afterwards all operations fail with `NotReady`
    pub async fn shutdown(&self) {
        info!("Shutting down cache facade");
        self.registry.close_all().await;
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.registry.is_closed() {
            Err(CacheError::NotReady)
        } else {
            Ok(())
        }
    }

    fn bulk_targets(&self, filter: &BulkFilter) -> Result<Vec<ResolvedNamespace>> {
        self.ensure_ready()?;
        let namespace_matcher = GlobMatcher::compile(&filter.namespace);

        self.registry
            .namespaces()
            .into_iter()
            .filter(|ns| filter.backend.is_none_or(|kind| kind == ns.kind))
            .filter(|ns| namespace_matcher.test(&ns.name))
            .map(|ns| self.registry.resolve(&ns.name))
            .collect()
    }
}

/// Cache operations pinned to one namespace
pub struct NamespaceScope<'a> {
    facade: &'a CacheFacade,
    resolved: ResolvedNamespace,
}

impl NamespaceScope<'_> {
    pub fn name(&self) -> &str {
        &self.resolved.name
    }

    pub fn kind(&self) -> BackendKind {
        self.resolved.kind
    }

    /// Backend key for an application key in this namespace
    pub fn key(&self, key: &str) -> String {
        KeyCodec::normalize(key, &self.resolved.name)
    }

    pub async fn get_or_compute<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.read_through(self.key(key), compute).await
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.write(self.key(key), value, None).await
    }

    pub async fn put_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<()> {
        self.write(self.key(key), value, Some(ttl)).await
    }

    /// Remove one key; returns 0 or 1
    pub async fn invalidate(&self, key: &str) -> Result<u64> {
        self.facade.ensure_ready()?;
        Ok(self.delete_backend_key(&self.key(key)).await)
    }

    /// Backend keys in this namespace matching `pattern`
    pub async fn list(&self, pattern: &str) -> Result<Vec<String>> {
        self.facade.ensure_ready()?;
        let pattern = format!("{}:{}", self.resolved.name, pattern);
        match self.resolved.backend.list_keys(&pattern).await {
            Ok(keys) => Ok(keys),
            Err(e) => {
                warn!("Listing {} failed: {}", pattern, e);
                Ok(Vec::new())
            }
        }
    }

    async fn read_through<T, E, F, Fut>(
        &self,
        backend_key: String,
        compute: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        self.facade.ensure_ready()?;

        if !self.facade.registry.is_enabled(self.resolved.kind) {
            debug!("{} backend disabled; computing {}", self.resolved.kind, backend_key);
            self.facade.stats.write().bypasses += 1;
            return compute().await;
        }

        match self.resolved.backend.get(&backend_key).await {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    debug!("HIT {}", backend_key);
                    self.facade.stats.write().hits += 1;
                    return Ok(value);
                }
                Err(e) => {
                    warn!("Discarding undecodable entry {}: {}", backend_key, e);
                    self.facade.stats.write().fallbacks += 1;
                }
            },
            Ok(None) => {
                debug!("MISS {}", backend_key);
                self.facade.stats.write().misses += 1;
            }
            Err(e) => {
                warn!("Cache read failed for {}; computing directly: {}", backend_key, e);
                self.facade.stats.write().fallbacks += 1;
            }
        }

        let value = compute().await?;
        self.store(&backend_key, &value, None).await;
        Ok(value)
    }

    async fn write<T: Serialize>(
        &self,
        backend_key: String,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<()> {
        self.facade.ensure_ready()?;
        if !self.facade.registry.is_enabled(self.resolved.kind) {
            debug!("{} backend disabled; dropping write to {}", self.resolved.kind, backend_key);
            return Ok(());
        }
        // Encoding errors are the caller's; backend faults are not
        let bytes = serde_json::to_vec(value)?;
        self.store_bytes(&backend_key, bytes, ttl).await;
        Ok(())
    }

    async fn store<T: Serialize>(&self, backend_key: &str, value: &T, ttl: Option<Duration>) {
        match serde_json::to_vec(value) {
            Ok(bytes) => self.store_bytes(backend_key, bytes, ttl).await,
            Err(e) => {
                warn!("Not caching {}: {}", backend_key, e);
                self.facade.stats.write().write_failures += 1;
            }
        }
    }

    async fn store_bytes(&self, backend_key: &str, bytes: Vec<u8>, ttl: Option<Duration>) {
        match self.resolved.backend.set(backend_key, bytes, ttl).await {
            Ok(()) => self.facade.stats.write().writes += 1,
            Err(e) => {
                warn!("Cache write failed for {}: {}", backend_key, e);
                self.facade.stats.write().write_failures += 1;
            }
        }
    }

    async fn delete_backend_key(&self, backend_key: &str) -> u64 {
        match self.resolved.backend.delete(backend_key).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Cache delete failed for {}: {}", backend_key, e);
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn facade() -> CacheFacade {
        CacheFacade::builder(CacheConfig::default())
            .key_root("/srv/app")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let cache = facade();
        let calls = AtomicUsize::new(0);

        let first: String = cache
            .get_or_compute("newKey", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>("X".to_string())
            })
            .await
            .unwrap();
        let second: String = cache
            .get_or_compute("newKey", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>("Y".to_string())
            })
            .await
            .unwrap();

        assert_eq!(first, "X");
        assert_eq!(second, "X");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.writes, 1);
    }

    #[tokio::test]
    async fn test_compute_error_propagates_unchanged() {
        #[derive(Debug, PartialEq)]
        enum LoadError {
            Missing,
            Cache,
        }
        impl From<CacheError> for LoadError {
            fn from(_: CacheError) -> Self {
                LoadError::Cache
            }
        }

        let cache = facade();
        let result: std::result::Result<String, LoadError> = cache
            .get_or_compute("k", || async { Err(LoadError::Missing) })
            .await;
        assert_eq!(result, Err(LoadError::Missing));
        assert!(cache.list_all(&BulkFilter::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_keys() {
        let cache = facade();
        let value: Vec<u8> = cache
            .get_or_compute_file("/srv/app/data/report.csv", || async {
                Ok::<_, CacheError>(b"a,b".to_vec())
            })
            .await
            .unwrap();
        assert_eq!(value, b"a,b".to_vec());

        let keys = cache.list_all(&BulkFilter::all()).await.unwrap();
        assert_eq!(keys, vec!["default:data:report.csv".to_string()]);

        assert_eq!(cache.invalidate_file("/srv/app/data/report.csv").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_use_namespace_rejects_unknown() {
        let cache = facade();
        let err = cache.use_namespace("nope").unwrap_err();
        assert!(matches!(err, CacheError::UnknownNamespace(_)));
        assert_eq!(cache.current_namespace(), "default");
    }

    #[test]
    fn test_bulk_filter_builder() {
        let filter = BulkFilter::all()
            .backend(BackendKind::Remote)
            .namespace("B")
            .pattern("foo*");
        assert_eq!(filter.backend, Some(BackendKind::Remote));
        assert_eq!(filter.namespace, "B");
        assert_eq!(filter.pattern, "foo*");
    }

    #[test]
    fn test_hit_rate() {
        let stats = FacadeStats {
            hits: 3,
            misses: 1,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(FacadeStats::default().hit_rate(), 0.0);
    }
}
