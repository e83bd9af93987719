//! # Berth
//!
//! The identity-and-configuration core of a container engine. Berth turns
//! loosely-typed container specifications into one validated canonical
//! configuration, and keeps the authoritative mapping between container names,
//! generated IDs and persisted metadata.
//!
//! ## Architecture Overview
//!
//! The system consists of several key components organized into modules:
//!
//! - **[`store`]**: Bucket/key metadata store contract with pluggable backends
//! - **[`translate`]**: Pure `RawSpec → CreateConfig` translation and validation
//! - **[`registry`]**: Name ↔ ID ↔ metadata registry with prefix resolution
//! - **[`container`]**: Container manager facade and the canonical config types
//! - **[`engine`]**: Assembly of store, registry and manager from configuration
//!
//! ## Features
//!
//! ### Spec Translation
//! - **Fail-fast validation**: the first malformed field is reported with its name
//! - **Port, network and device grammars**: ranges, IPv6 hosts, `container:<ref>`
//! - **Resource limits**: memory sizes, blkio throttles, swappiness, OOM scores
//!
//! ### Identity Registry
//! - **Collision-free IDs**: bounded generation with in-flight reservations
//! - **Unique names**: compare-and-swap reservation under concurrency
//! - **Prefix lookup**: unambiguous ID prefixes resolve, ambiguous ones are reported
//! - **Cache-aside**: misses always re-consult the persistent store
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use berth::{Engine, EngineConfig};
//! use berth::store::OpContext;
//! use berth::translate::RawSpec;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::new(EngineConfig::with_root("/var/lib/berth")).await?;
//!     let ctx = OpContext::background();
//!
//!     let spec = RawSpec {
//!         name: "web".to_string(),
//!         image: "nginx:latest".to_string(),
//!         ports: vec!["8080:80".to_string()],
//!         ..Default::default()
//!     };
//!     let container = engine.manager().create(&ctx, &spec).await?;
//!
//!     let found = engine.manager().get(&ctx, &container.id[..4]).await?;
//!     println!("{} {}", found.short_id(), found.name);
//!     Ok(())
//! }
//! ```

/// Persistent metadata store abstraction.
///
/// Defines the bucket/key backend contract, the backend registry and the
/// cancellation-aware operation context shared by every store call.
pub mod store;

/// Container specification translation.
///
/// Converts user-supplied [`translate::RawSpec`] values into the canonical
/// [`container::CreateConfig`], rejecting the first invalid field.
pub mod translate;

/// Container identity registry.
pub mod registry;

/// Container configuration types, metadata and the manager facade.
pub mod container;

/// Engine assembly from [`EngineConfig`].
pub mod engine;

/// Error classification shared by all layers.
pub mod error;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths, bucket names and limits used throughout
/// the crate for easier maintenance and consistency.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use container::{ContainerError, ContainerManager, ContainerMeta, CreateConfig, RuntimeSupervisor};
pub use engine::{Engine, EngineConfig};
pub use error::ErrorKind;
pub use registry::{Registry, RegistryConfig, RegistryError};
pub use store::{BackendRegistry, OpContext, Store, StoreConfig, StoreError};
pub use translate::{RawSpec, ValidationError, translate};
