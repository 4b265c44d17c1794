use super::BackendAdapter;
use crate::config::BackendConfig;
use crate::core::{BackendKind, BackendState, CacheError, Result};
use async_trait::async_trait;
use parking_lot::RwLock;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Connection status of the shared Redis link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Not connected yet; the first command connects
    Pending,
    Connected,
    /// Last connect or command failed at transport level; the next
    /// command reconnects
    Errored,
}

/// Adapter over a Redis-compatible server
///
/// The connection is established lazily on first use and shared by every
/// namespace routed here. Pattern enumeration uses the server's native
/// `KEYS`.
pub struct RemoteAdapter {
    client: Client,
    connection: Mutex<Option<MultiplexedConnection>>,
    status: RwLock<ConnectionStatus>,
    closed: RwLock<bool>,
}

impl RemoteAdapter {
    /// Build the client without connecting
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let url = config.redis_url()?;
        let client = Client::open(url.as_str()).map_err(|e| {
            CacheError::InvalidNamespaceConfig(format!("invalid remote address: {}", e))
        })?;

        info!(
            "Provisioning remote backend at {}:{} (lazy connect)",
            config.host, config.port
        );

        Ok(Self {
            client,
            connection: Mutex::new(None),
            status: RwLock::new(ConnectionStatus::Pending),
            closed: RwLock::new(false),
        })
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.read()
    }

    /// Shared connection, connecting first if needed
    async fn connection(&self) -> Result<MultiplexedConnection> {
        let mut slot = self.connection.lock().await;
        if *self.closed.read() {
            return Err(CacheError::backend(BackendKind::Remote, "backend closed"));
        }
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        debug!("Connecting to remote backend");
        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                info!("Remote backend connected");
                *self.status.write() = ConnectionStatus::Connected;
                *slot = Some(conn.clone());
                Ok(conn)
            }
            Err(e) => {
                warn!("Remote backend connection failed: {}", e);
                *self.status.write() = ConnectionStatus::Errored;
                Err(e.into())
            }
        }
    }

    /// Drop a broken connection so the next command reconnects
    async fn record_fault(&self, err: RedisError) -> CacheError {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            warn!("Remote backend transport fault: {}", err);
            let mut slot = self.connection.lock().await;
            slot.take();
            if !*self.closed.read() {
                *self.status.write() = ConnectionStatus::Errored;
            }
        }
        err.into()
    }
}

#[async_trait]
impl BackendAdapter for RemoteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn state(&self) -> BackendState {
        if *self.closed.read() {
            return BackendState::Closed;
        }
        match self.status() {
            ConnectionStatus::Pending => BackendState::Provisioning,
            ConnectionStatus::Connected => BackendState::Ready,
            ConnectionStatus::Errored => BackendState::Error,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        debug!("GET key={}", key);
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Option<Vec<u8>>> =
            redis::cmd("GET").arg(key).query_async(&mut conn).await;
        match result {
            Ok(value) => Ok(value),
            Err(e) => Err(self.record_fault(e).await),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        debug!("SET key={}, size={}, ttl={:?}", key, value.len(), ttl);
        let mut conn = self.connection().await?;

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
            cmd.arg("PX").arg(millis);
        }

        let result: redis::RedisResult<()> = cmd.query_async(&mut conn).await;
        match result {
            Ok(()) => Ok(()),
            Err(e) => Err(self.record_fault(e).await),
        }
    }

    async fn delete(&self, key: &str) -> Result<u64> {
        debug!("DEL key={}", key);
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<u64> =
            redis::cmd("DEL").arg(key).query_async(&mut conn).await;
        match result {
            Ok(removed) => Ok(removed),
            Err(e) => Err(self.record_fault(e).await),
        }
    }

    async fn list_keys(&self, pattern: &str) -> Result<Vec<String>> {
        debug!("KEYS pattern={}", pattern);
        let mut conn = self.connection().await?;
        let result: redis::RedisResult<Vec<String>> =
            redis::cmd("KEYS").arg(pattern).query_async(&mut conn).await;
        match result {
            Ok(keys) => Ok(keys),
            Err(e) => Err(self.record_fault(e).await),
        }
    }

    async fn close(&self) {
        let mut slot = self.connection.lock().await;
        *self.closed.write() = true;

        if let Some(mut conn) = slot.take() {
            let quit: redis::RedisResult<()> = redis::cmd("QUIT").query_async(&mut conn).await;
            if let Err(e) = quit {
                debug!("QUIT failed while closing remote backend: {}", e);
            }
            info!("Remote backend connection released");
        }
    }
}
