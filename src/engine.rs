//! # Engine assembly
//!
//! Wires the metadata store, the identity registry and the container manager
//! together from one [`EngineConfig`].
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                   Engine                     │
//! │  ┌────────────┐  ┌──────────┐  ┌───────────┐ │
//! │  │ Container  │─▶│ Registry │─▶│   Store   │ │
//! │  │  Manager   │  │ (cache)  │  │ (backend) │ │
//! │  └────────────┘  └──────────┘  └───────────┘ │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Startup opens the configured backend through a [`BackendRegistry`] and
//! restores the registry's cache and name index from the store.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use berth::{Engine, EngineConfig};
//! use berth::store::OpContext;
//! use berth::translate::RawSpec;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(EngineConfig::with_root("/tmp/berth")).await?;
//!     let ctx = OpContext::background();
//!
//!     let spec = RawSpec {
//!         image: "alpine".to_string(),
//!         ..Default::default()
//!     };
//!     let container = engine.manager().create(&ctx, &spec).await?;
//!     println!("created {}", container.name);
//!     Ok(())
//! }
//! ```

use crate::container::{ContainerManager, RuntimeSupervisor};
use crate::env;
use crate::registry::{Registry, RegistryConfig};
use crate::store::{BackendRegistry, OpContext, Store, StoreConfig};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Engine configuration, as read from `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default tracing filter, overridden by `RUST_LOG`
    pub log_filter: String,
    pub store: StoreConfig,
    pub registry: RegistryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_filter: env::DEFAULT_LOG_FILTER.to_string(),
            store: StoreConfig::default(),
            registry: RegistryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Default configuration with the store under `root`.
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        Self {
            store: StoreConfig::local(env::meta_dir_path(root.as_ref())),
            ..Default::default()
        }
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).context("Failed to read config file")?;
        Self::from_toml_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse TOML configuration")
    }

    /// Save configuration to a TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = self.to_toml_string()?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Convert configuration to a TOML string
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Assembled engine.
pub struct Engine {
    config: EngineConfig,
    store: Store,
    registry: Arc<Registry>,
    manager: ContainerManager,
}

impl Engine {
    /// Build the engine with the built-in backends.
    pub async fn new(config: EngineConfig) -> Result<Self> {
        Self::with_backends(config, &BackendRegistry::with_defaults()).await
    }

    /// Build the engine, opening the store through `backends`.
    pub async fn with_backends(config: EngineConfig, backends: &BackendRegistry) -> Result<Self> {
        let store = backends
            .open(&config.store)
            .with_context(|| format!("Failed to open {} store", config.store.backend))?;

        let registry = Arc::new(Registry::new(store.clone(), config.registry.clone()));
        let restored = registry
            .restore(&OpContext::background())
            .await
            .context("Failed to restore container registry")?;

        info!(
            "Engine ready: {} store, {} containers",
            store.backend_name(),
            restored
        );

        let manager = ContainerManager::new(Arc::clone(&registry));
        Ok(Self {
            config,
            store,
            registry,
            manager,
        })
    }

    /// Attach a runtime supervisor to the manager.
    pub fn with_supervisor(mut self, supervisor: Arc<dyn RuntimeSupervisor>) -> Self {
        self.manager = self.manager.with_supervisor(supervisor);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn manager(&self) -> &ContainerManager {
        &self.manager
    }
}
