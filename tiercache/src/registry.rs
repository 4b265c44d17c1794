//! Namespace -> backend routing

use crate::backend::{BackendAdapter, LocalAdapter, RemoteAdapter};
use crate::config::BackendConfig;
use crate::core::{BackendKind, BackendState, CacheError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Outcome of a namespace registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    /// New namespace recorded (backend provisioned if it was the first of its kind)
    Registered,
    /// Same name and kind already present; nothing changed
    AlreadyRegistered,
    /// Invalid name, conflicting kind, or backend could not be provisioned
    Rejected,
}

/// Public view of a registered namespace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Namespace {
    pub name: String,
    pub kind: BackendKind,
    pub enabled: bool,
}

/// A namespace resolved to its backend instance
#[derive(Clone)]
pub struct ResolvedNamespace {
    pub name: String,
    pub kind: BackendKind,
    pub backend: Arc<dyn BackendAdapter>,
}

/// Maps namespace names to backend kinds and owns one shared backend
/// instance per kind
pub struct NamespaceRegistry {
    namespaces: RwLock<BTreeMap<String, BackendKind>>,
    backends: RwLock<HashMap<BackendKind, Arc<dyn BackendAdapter>>>,
    enabled: [AtomicBool; 2],
    closed: AtomicBool,
}

impl Default for NamespaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(BTreeMap::new()),
            backends: RwLock::new(HashMap::new()),
            enabled: [AtomicBool::new(true), AtomicBool::new(true)],
            closed: AtomicBool::new(false),
        }
    }

    /// Install a ready-made backend for its kind
    ///
    /// Only fills an empty slot; returns false if that kind already has an
    /// instance.
    pub fn install_backend(&self, backend: Arc<dyn BackendAdapter>) -> Result<bool> {
        self.ensure_open()?;
        let kind = backend.kind();
        let mut backends = self.backends.write();
        if backends.contains_key(&kind) {
            warn!("{} backend already provisioned; keeping the existing instance", kind);
            return Ok(false);
        }
        info!("Installed {} backend", kind);
        backends.insert(kind, backend);
        Ok(true)
    }

    /// Register `name` under `kind`
    ///
    /// The first namespace of a kind provisions the shared backend from
    /// `config`; later registrations reuse it and ignore `config`.
    pub fn register(
        &self,
        name: &str,
        kind: BackendKind,
        config: &BackendConfig,
    ) -> Result<Registration> {
        self.ensure_open()?;

        if let Err(e) = Self::validate_name(name) {
            warn!("Ignoring namespace registration: {}", e);
            return Ok(Registration::Rejected);
        }

        let mut namespaces = self.namespaces.write();
        if let Some(existing) = namespaces.get(name) {
            if *existing == kind {
                debug!("Namespace {} already registered as {}", name, kind);
                return Ok(Registration::AlreadyRegistered);
            }
            warn!(
                "Namespace {} is bound to {} backend; rejecting re-registration as {}",
                name, existing, kind
            );
            return Ok(Registration::Rejected);
        }

        if let Err(e) = self.provision(kind, config) {
            warn!("Ignoring namespace {}: {}", name, e);
            return Ok(Registration::Rejected);
        }

        namespaces.insert(name.to_string(), kind);
        info!("Registered namespace {} ({} backend)", name, kind);
        Ok(Registration::Registered)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.namespaces.read().contains_key(name)
    }

    pub fn resolve(&self, name: &str) -> Result<ResolvedNamespace> {
        self.ensure_open()?;

        let kind = *self
            .namespaces
            .read()
            .get(name)
            .ok_or_else(|| CacheError::UnknownNamespace(name.to_string()))?;
        let backend = self
            .backends
            .read()
            .get(&kind)
            .cloned()
            .ok_or(CacheError::NotReady)?;

        Ok(ResolvedNamespace {
            name: name.to_string(),
            kind,
            backend,
        })
    }

    /// Snapshot of every registered namespace, ordered by name
    pub fn namespaces(&self) -> Vec<Namespace> {
        self.namespaces
            .read()
            .iter()
            .map(|(name, kind)| Namespace {
                name: name.clone(),
                kind: *kind,
                enabled: self.is_enabled(*kind),
            })
            .collect()
    }

    pub fn is_enabled(&self, kind: BackendKind) -> bool {
        self.enabled[Self::slot(kind)].load(Ordering::Acquire)
    }

    /// Flip the shared flag for every namespace of `kind`; returns the
    /// previous value
    pub fn set_enabled(&self, kind: BackendKind, enabled: bool) -> bool {
        self.enabled[Self::slot(kind)].swap(enabled, Ordering::AcqRel)
    }

    /// Shared backend instance for `kind`, if one has been provisioned
    pub fn backend(&self, kind: BackendKind) -> Option<Arc<dyn BackendAdapter>> {
        self.backends.read().get(&kind).cloned()
    }

    pub fn backend_state(&self, kind: BackendKind) -> BackendState {
        if self.closed.load(Ordering::Acquire) {
            return BackendState::Closed;
        }
        self.backends
            .read()
            .get(&kind)
            .map_or(BackendState::Uninitialized, |backend| backend.state())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Close every backend and drop the references; terminal
    pub async fn close_all(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let backends: Vec<Arc<dyn BackendAdapter>> =
            self.backends.write().drain().map(|(_, b)| b).collect();
        for backend in backends {
            info!("Closing {} backend", backend.kind());
            backend.close().await;
        }
    }

    fn provision(&self, kind: BackendKind, config: &BackendConfig) -> Result<()> {
        let mut backends = self.backends.write();
        if backends.contains_key(&kind) {
            return Ok(());
        }

        let backend: Arc<dyn BackendAdapter> = match kind {
            BackendKind::Local => {
                let local = LocalAdapter::new(config.local.clone(), config.default_ttl());
                // Outside a runtime expired entries are reclaimed by writes instead
                if tokio::runtime::Handle::try_current().is_ok() {
                    local.start_ttl_cleanup();
                } else {
                    debug!("No tokio runtime; local TTL sweep not started");
                }
                Arc::new(local)
            }
            BackendKind::Remote => Arc::new(RemoteAdapter::new(config)?),
        };
        backends.insert(kind, backend);
        Ok(())
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CacheError::InvalidNamespaceConfig(
                "namespace name is empty".to_string(),
            ));
        }
        if name.contains([':', '*', '?', '[', ']']) {
            return Err(CacheError::InvalidNamespaceConfig(format!(
                "namespace name '{}' contains a reserved character",
                name
            )));
        }
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(CacheError::NotReady)
        } else {
            Ok(())
        }
    }

    fn slot(kind: BackendKind) -> usize {
        match kind {
            BackendKind::Local => 0,
            BackendKind::Remote => 1,
        }
    }
}
