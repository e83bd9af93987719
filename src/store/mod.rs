//! Pluggable bucket/key metadata store.
//!
//! The store is the single source of truth for persisted metadata objects. It
//! knows nothing about containers: objects are opaque byte strings partitioned
//! into named buckets and addressed by string keys.
//!
//! ## Components
//!
//! - [`Backend`]: the contract every persistence engine implements
//! - [`BackendRegistry`]: name → factory table, built once at startup
//! - [`Store`]: cloneable handle that runs backend calls under an [`OpContext`]
//! - [`LocalBackend`]: filesystem backend (the default)
//! - [`MemoryBackend`]: in-process backend for tests and embedding
//!
//! ## Usage
//!
//! ```rust,no_run
//! use berth::store::{BackendRegistry, OpContext, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = BackendRegistry::with_defaults();
//!     let store = registry.open(&StoreConfig::default())?;
//!     let ctx = OpContext::background();
//!
//!     store.put(&ctx, "containers", "abc", b"{}").await?;
//!     let bytes = store.get(&ctx, "containers", "abc").await?;
//!     assert_eq!(bytes, b"{}");
//!     Ok(())
//! }
//! ```

mod context;
mod local;
mod memory;
mod registry;

pub use context::OpContext;
pub use local::LocalBackend;
pub use memory::MemoryBackend;
pub use registry::{BackendFactory, BackendRegistry};

use crate::env;
use crate::error::ErrorKind;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Metadata store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Key does not exist in the bucket
    #[error("{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },

    /// Bucket is not configured on this store
    #[error("bucket {0} not found")]
    BucketNotFound(String),

    /// Create-only write hit an existing key
    #[error("{bucket}/{key} already exists")]
    Conflict { bucket: String, key: String },

    /// Backend I/O failure, tagged with the attempted operation
    #[error("failed to {op} {bucket}/{key}: {source}")]
    Io {
        op: &'static str,
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Object bytes could not be encoded or decoded
    #[error("invalid JSON object {bucket}/{key}: {source}")]
    Codec {
        bucket: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    /// Key cannot be used as an object address
    #[error("invalid key {0:?}")]
    InvalidKey(String),

    /// No backend registered under this name
    #[error("unknown store backend: {0}")]
    UnknownBackend(String),

    /// Caller cancelled the operation
    #[error("store operation cancelled")]
    Cancelled,

    /// Caller deadline expired before the operation finished
    #[error("store operation deadline exceeded")]
    DeadlineExceeded,
}

impl StoreError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::BucketNotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Io { .. }
            | Self::Codec { .. }
            | Self::InvalidKey(_)
            | Self::UnknownBackend(_) => ErrorKind::Storage,
            Self::Cancelled | Self::DeadlineExceeded => ErrorKind::Cancelled,
        }
    }

    /// Whether the key or bucket does not exist.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        Self::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn conflict(bucket: &str, key: &str) -> Self {
        Self::Conflict {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn codec(bucket: &str, key: &str, source: serde_json::Error) -> Self {
        Self::Codec {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }

    pub(crate) fn io(op: &'static str, bucket: &str, key: &str, source: std::io::Error) -> Self {
        Self::Io {
            op,
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store construction record handed to backend factories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Registered backend name; empty selects the default backend
    pub backend: String,
    /// Base directory for filesystem backends
    pub base_dir: PathBuf,
    /// Buckets the store accepts
    pub buckets: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: env::store::DEFAULT_BACKEND.to_string(),
            base_dir: env::meta_dir_path(std::path::Path::new(env::DEFAULT_ROOT_DIR)),
            buckets: vec![
                env::store::CONTAINERS_BUCKET.to_string(),
                env::store::VOLUMES_BUCKET.to_string(),
            ],
        }
    }
}

impl StoreConfig {
    /// In-memory store accepting the default buckets.
    pub fn memory() -> Self {
        Self {
            backend: env::store::MEMORY_BACKEND.to_string(),
            base_dir: PathBuf::new(),
            ..Default::default()
        }
    }

    /// Local filesystem store rooted at `base_dir`.
    pub fn local(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: env::store::DEFAULT_BACKEND.to_string(),
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }
}

/// Contract every persistence engine satisfies.
///
/// Missing buckets and keys are reported as [`StoreError::BucketNotFound`] and
/// [`StoreError::NotFound`], never as a generic failure.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name, for logging.
    fn name(&self) -> &'static str;

    /// Write `value` under `key`, replacing any previous object.
    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Write `value` under `key` only if the key is unused.
    ///
    /// Fails with [`StoreError::Conflict`] when the key already exists; the
    /// existence check and the write are a single atomic step.
    async fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Read the object stored under `key`.
    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// Delete the object stored under `key`.
    async fn remove(&self, bucket: &str, key: &str) -> Result<()>;

    /// Every object in the bucket, in unspecified order.
    async fn list(&self, bucket: &str) -> Result<Vec<Vec<u8>>>;

    /// Every key in the bucket, in unspecified order.
    async fn keys(&self, bucket: &str) -> Result<Vec<String>>;

    /// Backend-specific location for `key`; synthetic for non-filesystem backends.
    fn path(&self, key: &str) -> PathBuf;
}

/// Cloneable store handle.
///
/// Validates keys and runs every backend call under the caller's
/// [`OpContext`], so cancellation and deadlines surface as
/// [`ErrorKind::Cancelled`] regardless of the backend.
#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Store {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Name of the underlying backend.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn put(&self, ctx: &OpContext, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        check_key(key)?;
        ctx.run(self.backend.put(bucket, key, value)).await
    }

    pub async fn create(
        &self,
        ctx: &OpContext,
        bucket: &str,
        key: &str,
        value: &[u8],
    ) -> Result<()> {
        check_key(key)?;
        ctx.run(self.backend.create(bucket, key, value)).await
    }

    pub async fn get(&self, ctx: &OpContext, bucket: &str, key: &str) -> Result<Vec<u8>> {
        check_key(key)?;
        ctx.run(self.backend.get(bucket, key)).await
    }

    pub async fn remove(&self, ctx: &OpContext, bucket: &str, key: &str) -> Result<()> {
        check_key(key)?;
        ctx.run(self.backend.remove(bucket, key)).await
    }

    pub async fn list(&self, ctx: &OpContext, bucket: &str) -> Result<Vec<Vec<u8>>> {
        ctx.run(self.backend.list(bucket)).await
    }

    pub async fn keys(&self, ctx: &OpContext, bucket: &str) -> Result<Vec<String>> {
        ctx.run(self.backend.keys(bucket)).await
    }

    /// Whether `key` exists; not-found is `Ok(false)`, anything else propagates.
    pub async fn exists(&self, ctx: &OpContext, bucket: &str, key: &str) -> Result<bool> {
        match self.get(ctx, bucket, key).await {
            Ok(_) => Ok(true),
            Err(StoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.backend.path(key)
    }

    /// Serialize `value` as JSON and [`put`](Self::put) it.
    pub async fn put_json<T: Serialize>(
        &self,
        ctx: &OpContext,
        bucket: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::codec(bucket, key, e))?;
        self.put(ctx, bucket, key, &bytes).await
    }

    /// Serialize `value` as JSON and [`create`](Self::create) it.
    pub async fn create_json<T: Serialize>(
        &self,
        ctx: &OpContext,
        bucket: &str,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::codec(bucket, key, e))?;
        self.create(ctx, bucket, key, &bytes).await
    }

    /// [`get`](Self::get) and decode a JSON object.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &OpContext,
        bucket: &str,
        key: &str,
    ) -> Result<T> {
        let bytes = self.get(ctx, bucket, key).await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::codec(bucket, key, e))
    }
}

/// Keys double as directory names for filesystem backends.
fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key == "." || key == ".." || key.contains(['/', '\\', '\0']) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
