//! Backend adapters
//!
//! Both engines expose the same contract:
//! - `Local`: in-process store, patterns filtered with [`GlobMatcher`]
//! - `Remote`: Redis-compatible server, patterns resolved natively by `KEYS`

pub mod local;
pub mod remote;

pub use local::LocalAdapter;
pub use remote::{ConnectionStatus, RemoteAdapter};

use crate::core::{BackendKind, BackendState, LocalStats, Result};
use async_trait::async_trait;
use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

/// Operations every cache backend provides
///
/// A plain miss is `Ok(None)`; `Err` is reserved for backend faults.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn kind(&self) -> BackendKind;

    fn state(&self) -> BackendState;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store a value; `None` applies the backend's default TTL (if any)
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Remove a key, returning 0 or 1
    async fn delete(&self, key: &str) -> Result<u64>;

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Delete every key matching `pattern`, concurrently
    ///
    /// Individual delete failures are logged and skipped; the count covers
    /// the keys actually removed.
    async fn delete_keys(&self, pattern: &str) -> Result<u64> {
        let keys = self.list_keys(pattern).await?;
        debug!("DELETE_KEYS pattern={} matched={}", pattern, keys.len());

        let results = join_all(keys.iter().map(|key| self.delete(key))).await;

        let mut removed = 0;
        for (key, result) in keys.iter().zip(results) {
            match result {
                Ok(count) => removed += count,
                Err(e) => warn!("Failed to delete {} from {} backend: {}", key, self.kind(), e),
            }
        }

        Ok(removed)
    }

    /// In-process store statistics; `None` for other engines or once closed
    fn local_stats(&self) -> Option<LocalStats> {
        None
    }

    /// Release resources; afterwards the adapter reports `Closed`
    async fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{CacheError, GlobMatcher};
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    /// Adapter whose deletes fail for keys containing "poison"
    struct FlakyAdapter {
        data: Mutex<BTreeMap<String, Vec<u8>>>,
    }

    #[async_trait]
    impl BackendAdapter for FlakyAdapter {
        fn kind(&self) -> BackendKind {
            BackendKind::Remote
        }

        fn state(&self) -> BackendState {
            BackendState::Ready
        }

        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> Result<()> {
            self.data.lock().insert(key.to_string(), value);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<u64> {
            if key.contains("poison") {
                return Err(CacheError::backend(BackendKind::Remote, "connection reset"));
            }
            Ok(self.data.lock().remove(key).map_or(0, |_| 1))
        }

        async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
            let matcher = GlobMatcher::compile(pattern);
            Ok(matcher.filter(self.data.lock().keys().cloned()))
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_delete_keys_continues_past_failures() {
        let adapter = FlakyAdapter {
            data: Mutex::new(BTreeMap::new()),
        };
        for key in ["ns:foo1", "ns:foo2", "ns:foo-poison", "ns:bar"] {
            adapter.set(key, b"v".to_vec(), None).await.unwrap();
        }

        let removed = adapter.delete_keys("ns:foo*").await.unwrap();
        assert_eq!(removed, 2);

        let remaining = adapter.list_keys("*").await.unwrap();
        assert_eq!(remaining, vec!["ns:bar".to_string(), "ns:foo-poison".to_string()]);
    }
}
