//! Backend registration table.

use super::{Backend, LocalBackend, MemoryBackend, Result, Store, StoreConfig, StoreError};
use crate::env;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Constructor for a backend, given the store configuration.
pub type BackendFactory =
    Box<dyn Fn(&StoreConfig) -> Result<Arc<dyn Backend>> + Send + Sync + 'static>;

/// Name → factory table.
///
/// Built once at process start and passed to whatever opens the store; there
/// is no process-wide table.
pub struct BackendRegistry {
    factories: HashMap<String, BackendFactory>,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl BackendRegistry {
    /// Registry with no backends.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registry with the built-in `local` and `memory` backends.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(env::store::DEFAULT_BACKEND, |config: &StoreConfig| {
            Ok(Arc::new(LocalBackend::open(config)?) as Arc<dyn Backend>)
        });
        registry.register(env::store::MEMORY_BACKEND, |config: &StoreConfig| {
            Ok(Arc::new(MemoryBackend::new(config)) as Arc<dyn Backend>)
        });
        registry
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&StoreConfig) -> Result<Arc<dyn Backend>> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!("Registering store backend: {}", name);
        self.factories.insert(name, Box::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered backend names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Construct the backend named by `config` and wrap it in a [`Store`].
    ///
    /// An empty backend name selects [`env::store::DEFAULT_BACKEND`].
    pub fn open(&self, config: &StoreConfig) -> Result<Store> {
        let name = if config.backend.is_empty() {
            env::store::DEFAULT_BACKEND
        } else {
            config.backend.as_str()
        };

        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| StoreError::UnknownBackend(name.to_string()))?;

        let backend = factory(config)?;
        info!(
            "Opened {} metadata store ({} buckets)",
            backend.name(),
            config.buckets.len()
        );
        Ok(Store::new(backend))
    }
}
