use super::BackendAdapter;
use crate::core::{
    BackendKind, BackendState, CacheError, GlobMatcher, LocalStats, LocalStore, LocalStoreConfig,
    Result,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Adapter over the in-process [`LocalStore`]
///
/// Every `set` without an explicit TTL uses the default fixed at
/// construction. The store has no pattern queries, so `list_keys` filters
/// the full key set with a [`GlobMatcher`].
pub struct LocalAdapter {
    store: RwLock<Option<LocalStore>>,
    default_ttl: Option<Duration>,
    cleanup: RwLock<Option<JoinHandle<()>>>,
}

impl LocalAdapter {
    pub fn new(config: LocalStoreConfig, default_ttl: Option<Duration>) -> Self {
        info!("Provisioning local backend (default_ttl={:?})", default_ttl);
        Self {
            store: RwLock::new(Some(LocalStore::new(config))),
            default_ttl,
            cleanup: RwLock::new(None),
        }
    }

    /// Purge expired entries in the background
    ///
    /// Requires a running tokio runtime. Calling it twice is a no-op.
    pub fn start_ttl_cleanup(&self) {
        let mut cleanup = self.cleanup.write();
        if cleanup.is_some() {
            return;
        }
        if let Some(store) = self.store.read().as_ref() {
            *cleanup = Some(store.start_ttl_cleanup());
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    fn store(&self) -> Result<LocalStore> {
        self.store
            .read()
            .clone()
            .ok_or_else(|| CacheError::backend(BackendKind::Local, "backend closed"))
    }
}

impl Drop for LocalAdapter {
    fn drop(&mut self) {
        if let Some(handle) = self.cleanup.get_mut().take() {
            handle.abort();
        }
    }
}

#[async_trait]
impl BackendAdapter for LocalAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn state(&self) -> BackendState {
        if self.store.read().is_some() {
            BackendState::Ready
        } else {
            BackendState::Closed
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store()?.get(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.store()?.set(key, value, ttl.or(self.default_ttl))
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        Ok(u64::from(self.store()?.delete(key)))
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        let keys = self.store()?.keys();
        let matcher = GlobMatcher::compile(pattern);
        let matched = matcher.filter(keys);
        debug!("KEYS pattern={} matched={}", pattern, matched.len());
        Ok(matched)
    }

    fn local_stats(&self) -> Option<LocalStats> {
        self.store.read().as_ref().map(LocalStore::stats)
    }

    async fn close(&self) {
        if let Some(handle) = self.cleanup.write().take() {
            handle.abort();
        }
        if let Some(store) = self.store.write().take() {
            let dropped = store.clear();
            info!("Local backend closed ({} entries dropped)", dropped);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> LocalAdapter {
        LocalAdapter::new(LocalStoreConfig::default(), Some(Duration::from_secs(60)))
    }

    #[tokio::test]
    async fn test_get_set_delete() {
        let adapter = adapter();

        assert_eq!(adapter.get("ns:k").await.unwrap(), None);
        adapter.set("ns:k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(adapter.get("ns:k").await.unwrap(), Some(b"v".to_vec()));

        assert_eq!(adapter.delete("ns:k").await.unwrap(), 1);
        assert_eq!(adapter.delete("ns:k").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_default_ttl_applied() {
        let adapter =
            LocalAdapter::new(LocalStoreConfig::default(), Some(Duration::from_millis(30)));
        adapter.set("ns:short", b"v".to_vec(), None).await.unwrap();
        adapter
            .set("ns:long", b"v".to_vec(), Some(Duration::from_secs(60)))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(adapter.get("ns:short").await.unwrap(), None);
        assert_eq!(adapter.get("ns:long").await.unwrap(), Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_list_keys_filters_with_glob() {
        let adapter = adapter();
        for key in ["a:foo1", "a:foo2", "a:bar", "b:foo1"] {
            adapter.set(key, b"v".to_vec(), None).await.unwrap();
        }

        let mut keys = adapter.list_keys("a:foo*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a:foo1".to_string(), "a:foo2".to_string()]);

        assert_eq!(adapter.list_keys("a:fo?1").await.unwrap(), vec!["a:foo1".to_string()]);
    }

    #[tokio::test]
    async fn test_delete_keys() {
        let adapter = adapter();
        for key in ["a:foo1", "a:foo2", "a:bar"] {
            adapter.set(key, b"v".to_vec(), None).await.unwrap();
        }

        assert_eq!(adapter.delete_keys("a:foo*").await.unwrap(), 2);
        assert_eq!(adapter.list_keys("a:*").await.unwrap(), vec!["a:bar".to_string()]);
    }

    #[tokio::test]
    async fn test_close_is_terminal() {
        let adapter = adapter();
        adapter.start_ttl_cleanup();
        adapter.set("ns:k", b"v".to_vec(), None).await.unwrap();
        assert_eq!(adapter.state(), BackendState::Ready);

        adapter.close().await;

        assert_eq!(adapter.state(), BackendState::Closed);
        assert!(adapter.get("ns:k").await.is_err());
        assert!(adapter.local_stats().is_none());
    }
}
