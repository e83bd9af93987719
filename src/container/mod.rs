//! Containers: canonical configuration, persisted metadata and the manager.
//!
//! ## Architecture
//!
//! - [`config`]: strongly-typed create-time configuration ([`CreateConfig`])
//! - [`meta`]: the persisted record of one container ([`ContainerMeta`])
//! - [`manager`]: [`ContainerManager`], composing the translator and the
//!   identity registry, with an optional [`RuntimeSupervisor`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use berth::container::ContainerManager;
//! use berth::registry::{Registry, RegistryConfig};
//! use berth::store::{BackendRegistry, OpContext, StoreConfig};
//! use berth::translate::RawSpec;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = BackendRegistry::with_defaults().open(&StoreConfig::memory())?;
//!     let registry = Arc::new(Registry::new(store, RegistryConfig::default()));
//!     let manager = ContainerManager::new(registry);
//!     let ctx = OpContext::background();
//!
//!     let spec = RawSpec {
//!         name: "web".to_string(),
//!         image: "nginx:latest".to_string(),
//!         ports: vec!["8080:80".to_string()],
//!         ..Default::default()
//!     };
//!     let created = manager.create(&ctx, &spec).await?;
//!
//!     let found = manager.get(&ctx, &created.id[..6]).await?;
//!     println!("{} -> {}", found.name, found.short_id());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod manager;
pub mod meta;

pub use config::{
    ContainerConfig, CreateConfig, DeviceMapping, EndpointIpamConfig, EndpointSettings,
    HostConfig, NetworkMode, NetworkingConfig, PortBinding, PortKey, Protocol, Resources,
    RestartPolicy, RestartPolicyName, ThrottleDevice, WeightDevice,
};
pub use manager::{ContainerManager, RuntimeSupervisor};
pub use meta::{ContainerMeta, ContainerState, ContainerStatus};

use crate::error::ErrorKind;
use crate::registry::RegistryError;
use crate::translate::ValidationError;

/// Container manager errors.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Spec failed translation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Identity allocation, lookup or persistence failed
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Runtime supervisor refused the operation
    #[error("runtime failed to {op} container {id}: {reason}")]
    Runtime {
        id: String,
        op: &'static str,
        reason: String,
    },
}

impl ContainerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(e) => e.kind(),
            Self::Registry(e) => e.kind(),
            Self::Runtime { .. } => ErrorKind::Runtime,
        }
    }

    pub(crate) fn runtime(id: &str, op: &'static str, err: anyhow::Error) -> Self {
        Self::Runtime {
            id: crate::env::short_id(id).to_string(),
            op,
            reason: format!("{:#}", err),
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
