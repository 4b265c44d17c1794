use super::error::{CacheError, Result};
use super::types::{BackendKind, LocalStats, LocalStoreConfig, StoredValue};
use parking_lot::RwLock;
use radix_trie::{Trie, TrieCommon};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// In-process key-value store backed by a radix trie
///
/// Exact-match lookups only; `keys()` returns every live key and leaves
/// pattern filtering to the caller.
#[derive(Clone)]
pub struct LocalStore {
    data: Arc<RwLock<Trie<String, StoredValue>>>,
    stats: Arc<RwLock<LocalStats>>,
    config: LocalStoreConfig,
}

impl LocalStore {
    pub fn new(config: LocalStoreConfig) -> Self {
        info!(
            "Initializing local store with max_memory={}MB",
            config.max_memory_mb
        );

        Self {
            data: Arc::new(RwLock::new(Trie::new())),
            stats: Arc::new(RwLock::new(LocalStats::default())),
            config,
        }
    }

    /// Start background TTL cleanup task
    pub fn start_ttl_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let interval_ms = self.config.ttl_cleanup_interval_ms.max(1);
        info!("Starting TTL cleanup task (interval={}ms)", interval_ms);

        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));

            loop {
                interval.tick().await;
                store.cleanup_expired();
            }
        })
    }

    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        debug!("SET key={}, size={}, ttl={:?}", key, value.len(), ttl);

        let stored = StoredValue::new(value, ttl);
        let entry_size = Self::estimate_entry_size(key, &stored);

        let mut data = self.data.write();
        let mut stats = self.stats.write();

        let max_bytes = self.config.max_memory_mb * 1024 * 1024;
        let mut projected = Self::projected_size(&data, &stats, key, entry_size);
        if projected > max_bytes {
            // Dead entries still hold budget until the sweep reaches them
            let purged = Self::purge_expired(&mut data, &mut stats);
            if purged > 0 {
                projected = Self::projected_size(&data, &stats, key, entry_size);
            }
        }
        if projected > max_bytes {
            warn!(
                "Memory limit exceeded: {}/{}",
                stats.total_memory_bytes, max_bytes
            );
            return Err(CacheError::backend(
                BackendKind::Local,
                "memory limit exceeded",
            ));
        }

        let is_new = data.insert(key.to_string(), stored).is_none();
        stats.sets += 1;
        stats.total_memory_bytes = projected;
        if is_new {
            stats.total_keys += 1;
        }

        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        debug!("GET key={}", key);

        let mut data = self.data.write();
        let mut stats = self.stats.write();
        stats.gets += 1;

        let expired = data.get(key).map(StoredValue::is_expired);
        match expired {
            Some(true) => {
                debug!("Key expired: {}", key);
                if let Some(old) = data.remove(key) {
                    stats.total_memory_bytes = stats
                        .total_memory_bytes
                        .saturating_sub(Self::estimate_entry_size(key, &old));
                }
                stats.misses += 1;
                stats.total_keys = stats.total_keys.saturating_sub(1);
                None
            }
            Some(false) => {
                stats.hits += 1;
                data.get(key).map(|value| value.data.clone())
            }
            None => {
                stats.misses += 1;
                None
            }
        }
    }

    /// Delete a key, returning whether it was present
    pub fn delete(&self, key: &str) -> bool {
        debug!("DELETE key={}", key);

        let mut data = self.data.write();
        match data.remove(key) {
            Some(old) => {
                let mut stats = self.stats.write();
                stats.dels += 1;
                stats.total_keys = stats.total_keys.saturating_sub(1);
                stats.total_memory_bytes = stats
                    .total_memory_bytes
                    .saturating_sub(Self::estimate_entry_size(key, &old));
                // An expired entry counts as already gone
                !old.is_expired()
            }
            None => false,
        }
    }

    /// Every live key, in trie order
    pub fn keys(&self) -> Vec<String> {
        let data = self.data.read();
        data.iter()
            .filter(|(_, v)| !v.is_expired())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Remove all entries
    pub fn clear(&self) -> usize {
        let mut data = self.data.write();
        let count = data.len();
        *data = Trie::new();

        let mut stats = self.stats.write();
        stats.total_keys = 0;
        stats.total_memory_bytes = 0;
        count
    }

    pub fn stats(&self) -> LocalStats {
        self.stats.read().clone()
    }

    fn cleanup_expired(&self) {
        let mut data = self.data.write();
        let mut stats = self.stats.write();
        Self::purge_expired(&mut data, &mut stats);
    }

    /// Remove every expired entry, returning how many were dropped
    fn purge_expired(data: &mut Trie<String, StoredValue>, stats: &mut LocalStats) -> usize {
        let expired_keys: Vec<String> = data
            .iter()
            .filter(|(_, v)| v.is_expired())
            .map(|(k, _)| k.clone())
            .collect();

        let count = expired_keys.len();
        if count > 0 {
            debug!("Cleaning up {} expired keys", count);
            for key in expired_keys {
                if let Some(old) = data.remove(&key) {
                    stats.total_memory_bytes = stats
                        .total_memory_bytes
                        .saturating_sub(Self::estimate_entry_size(&key, &old));
                }
            }
            stats.total_keys = stats.total_keys.saturating_sub(count);
        }
        count
    }

    /// Memory in use once `key` holds an entry of `entry_size`
    fn projected_size(
        data: &Trie<String, StoredValue>,
        stats: &LocalStats,
        key: &str,
        entry_size: usize,
    ) -> usize {
        let previous_size = data
            .get(key)
            .map(|old| Self::estimate_entry_size(key, old))
            .unwrap_or(0);
        stats.total_memory_bytes.saturating_sub(previous_size) + entry_size
    }

    fn estimate_entry_size(key: &str, value: &StoredValue) -> usize {
        key.len() + value.data.len() + std::mem::size_of::<StoredValue>()
    }
}
