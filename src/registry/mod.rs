//! Container identity registry.
//!
//! Owns the mapping between container names, generated IDs and the persisted
//! [`ContainerMeta`] objects. The store is the source of truth; the registry
//! layers two in-memory structures over it:
//!
//! - a cache of metadata objects keyed by full ID (cache-aside: never
//!   authoritative, misses re-consult the store)
//! - a [`NameIndex`] from name to ID, checked against the backing object on
//!   every name lookup and evicted when the two disagree
//!
//! Identity records move through `Unregistered → Reserved → Persisted →
//! Removed`. [`Registry::allocate`] produces the `Reserved` state as a
//! [`ReservedId`] guard; [`Registry::register`] persists it with a
//! create-only write so a colliding ID fails instead of overwriting.
//!
//! Store writes happen before the cache and index are updated, so a reader
//! may briefly miss an object that was just persisted. Misses always fall
//! back to the store.
//!
//! Mutations of one container (register, rename, remove) run under a per-ID
//! lock and re-read the object from the store once they hold it.

mod id;
mod names;

pub use id::{ReservedId, random_id};
pub use names::{NameIndex, name_windows, validate_name};

use crate::container::{ContainerMeta, CreateConfig};
use crate::env::{self, identity, short_id};
use crate::error::ErrorKind;
use crate::store::{OpContext, Store, StoreError};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

/// Registry errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// No live container matches the name, ID or prefix
    #[error("no such container: {0}")]
    NotFound(String),

    /// Prefix matches several containers
    #[error("multiple containers ({matches}) match prefix {prefix}, please use a longer prefix")]
    Ambiguous { prefix: String, matches: usize },

    /// Name is held by another container
    #[error("container name {0} is already in use")]
    Conflict(String),

    #[error("invalid container name {0:?}, only [a-zA-Z0-9][a-zA-Z0-9_.-] are allowed")]
    InvalidName(String),

    /// Bounded generation ran out of candidates
    #[error("failed to generate a unique {what} after {attempts} attempts")]
    Exhausted { what: &'static str, attempts: u32 },

    /// Caller cancelled or the deadline passed
    #[error("registry operation cancelled: {0}")]
    Cancelled(#[source] StoreError),

    #[error("store error: {0}")]
    Store(#[source] StoreError),
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Ambiguous { .. } => ErrorKind::Ambiguous,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::InvalidName(_) => ErrorKind::Validation,
            Self::Exhausted { .. } => ErrorKind::Exhausted,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::Store(e) => e.kind(),
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { key, .. } => Self::NotFound(key),
            StoreError::Cancelled | StoreError::DeadlineExceeded => Self::Cancelled(err),
            other => Self::Store(other),
        }
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Attempts before ID allocation (or generated-name retry) gives up
    pub max_id_attempts: u32,
    /// Length of generated names
    pub name_length: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_id_attempts: identity::MAX_ID_ATTEMPTS,
            name_length: identity::GENERATED_NAME_LENGTH,
        }
    }
}

/// Name ↔ ID ↔ metadata registry over a [`Store`].
#[derive(Debug)]
pub struct Registry {
    store: Store,
    bucket: String,
    config: RegistryConfig,
    cache: DashMap<String, Arc<ContainerMeta>>,
    names: NameIndex,
    reservations: Arc<DashSet<String>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Registry {
    /// Registry over the `containers` bucket of `store`.
    pub fn new(store: Store, config: RegistryConfig) -> Self {
        Self {
            store,
            bucket: env::store::CONTAINERS_BUCKET.to_string(),
            config,
            cache: DashMap::new(),
            names: NameIndex::new(),
            reservations: Arc::new(DashSet::new()),
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Allocate an ID that is unused in the store and not reserved in-process.
    pub async fn allocate(&self, ctx: &OpContext) -> Result<ReservedId> {
        for attempt in 1..=self.config.max_id_attempts {
            ctx.check()?;

            let Some(reserved) = ReservedId::try_reserve(random_id(), &self.reservations) else {
                continue;
            };

            if !self.store.exists(ctx, &self.bucket, reserved.id()).await? {
                debug!("Allocated container id {} (attempt {})", short_id(reserved.id()), attempt);
                return Ok(reserved);
            }
            debug!("Container id {} already taken, retrying", short_id(reserved.id()));
        }

        Err(RegistryError::Exhausted {
            what: "container id",
            attempts: self.config.max_id_attempts,
        })
    }

    /// First name window of `id` not present in the name index.
    fn generate_name(&self, id: &str) -> Result<String> {
        name_windows(id, self.config.name_length)
            .find(|candidate| !self.names.contains(candidate))
            .map(str::to_string)
            .ok_or(RegistryError::Exhausted {
                what: "container name",
                attempts: id.len() as u32,
            })
    }

    /// Reserve a generated name, moving to the next window when a concurrent
    /// registration takes the candidate first.
    fn reserve_generated_name(&self, id: &str) -> Result<String> {
        for _ in 0..self.config.max_id_attempts {
            let candidate = self.generate_name(id)?;
            if self.names.reserve(&candidate, id) {
                return Ok(candidate);
            }
            debug!("Generated name {} taken concurrently, retrying", candidate);
        }

        Err(RegistryError::Exhausted {
            what: "container name",
            attempts: self.config.max_id_attempts,
        })
    }

    fn mutation_lock(&self, id: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(id.to_string()).or_default().value())
    }

    /// Wait for exclusive mutation rights over `id`.
    async fn lock_id(&self, ctx: &OpContext, id: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = self.mutation_lock(id);
        Ok(ctx.run(async move { Ok(lock.lock_owned().await) }).await?)
    }

    /// Reserve `name` for `id`, reclaiming the slot when its holder's
    /// persisted object no longer carries that name.
    async fn claim_name(&self, ctx: &OpContext, name: &str, id: &str) -> Result<()> {
        for _ in 0..3 {
            if self.names.reserve(name, id) {
                return Ok(());
            }
            let Some(holder) = self.names.get(name) else {
                continue;
            };
            if !self.evict_stale_name(ctx, name, &holder).await? {
                break;
            }
        }
        Err(RegistryError::Conflict(name.to_string()))
    }

    /// Drop the `name -> holder` entry if the holder's object disagrees.
    ///
    /// A holder that is mid-mutation keeps its entry. Returns whether the
    /// entry was evicted.
    async fn evict_stale_name(&self, ctx: &OpContext, name: &str, holder: &str) -> Result<bool> {
        let lock = self.mutation_lock(holder);
        let Ok(_guard) = lock.try_lock() else {
            debug!("Name {} held by busy container {}", name, short_id(holder));
            return Ok(false);
        };

        let backing = self.backing_name(ctx, holder).await?;
        if backing.as_deref() == Some(name) {
            return Ok(false);
        }

        warn!("Evicting stale name index entry {} -> {}", name, short_id(holder));
        self.names.release(name, holder);
        if backing.is_none() {
            self.locks.remove(holder);
        }
        Ok(true)
    }

    /// Persist a new container under `reserved`.
    ///
    /// `name` is validated and reserved first; with `None` a name is
    /// generated from the ID. The object is written create-only, and on any
    /// failure the name is released again.
    pub async fn register(
        &self,
        ctx: &OpContext,
        reserved: ReservedId,
        name: Option<&str>,
        config: CreateConfig,
    ) -> Result<Arc<ContainerMeta>> {
        let id = reserved.id().to_string();
        let _guard = self.lock_id(ctx, &id).await?;

        let name = match name {
            Some(name) => {
                let name = validate_name(name)?;
                self.claim_name(ctx, &name, &id).await?;
                name
            }
            None => self.reserve_generated_name(&id)?,
        };

        let meta = ContainerMeta::new(id.clone(), name.clone(), config, self.store.path(&id));
        if let Err(e) = self.store.create_json(ctx, &self.bucket, &id, &meta).await {
            self.names.release(&name, &id);
            warn!("Failed to persist container {}: {}", short_id(&id), e);
            return Err(e.into());
        }

        let meta = Arc::new(meta);
        self.cache.insert(id.clone(), Arc::clone(&meta));
        info!("Registered container {} as {}", short_id(&id), name);

        drop(reserved);
        Ok(meta)
    }

    /// Resolve a name, full ID or unambiguous ID prefix to a full ID.
    pub async fn resolve(&self, ctx: &OpContext, token: &str) -> Result<String> {
        ctx.check()?;
        if token.is_empty() {
            return Err(RegistryError::NotFound(token.to_string()));
        }

        let name = token.strip_prefix('/').unwrap_or(token);
        if let Some(id) = self.names.get(name) {
            if self.backing_name(ctx, &id).await?.as_deref() == Some(name) {
                return Ok(id);
            }

            self.evict_stale_name(ctx, name, &id).await?;
            return Err(RegistryError::NotFound(token.to_string()));
        }

        let keys = self.store.keys(ctx, &self.bucket).await?;
        let mut matches: Vec<String> = keys.into_iter().filter(|k| k.starts_with(token)).collect();

        match matches.len() {
            0 => Err(RegistryError::NotFound(token.to_string())),
            1 => Ok(matches.remove(0)),
            n => Err(RegistryError::Ambiguous {
                prefix: token.to_string(),
                matches: n,
            }),
        }
    }

    /// Name recorded on the object backing `id`, if it exists.
    async fn backing_name(&self, ctx: &OpContext, id: &str) -> Result<Option<String>> {
        if let Some(meta) = self.cached(id) {
            return Ok(Some(meta.name.clone()));
        }

        match self.store.get_json::<ContainerMeta>(ctx, &self.bucket, id).await {
            Ok(meta) => Ok(Some(meta.name)),
            Err(StoreError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Exact-ID cache hit; never touches the store.
    pub fn cached(&self, id: &str) -> Option<Arc<ContainerMeta>> {
        self.cache.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Read `id` from the store and refresh the cache.
    ///
    /// A missing object also drops any cached copy.
    pub async fn load(&self, ctx: &OpContext, id: &str) -> Result<Arc<ContainerMeta>> {
        let meta: ContainerMeta = match self.store.get_json(ctx, &self.bucket, id).await {
            Ok(meta) => meta,
            Err(e) => {
                if e.is_not_found() {
                    self.cache.remove(id);
                }
                return Err(e.into());
            }
        };
        let meta = Arc::new(meta);
        self.cache.insert(id.to_string(), Arc::clone(&meta));
        Ok(meta)
    }

    /// Delete the object, then evict the cache entry and the name.
    pub async fn remove(&self, ctx: &OpContext, id: &str) -> Result<Arc<ContainerMeta>> {
        let _guard = self.lock_id(ctx, id).await?;
        let meta = self.load(ctx, id).await?;

        self.store.remove(ctx, &self.bucket, id).await?;
        self.cache.remove(id);
        self.names.release(&meta.name, id);
        self.locks.remove(id);

        info!("Removed container {} ({})", short_id(id), meta.name);
        Ok(meta)
    }

    /// Give `id` a new name; the old one becomes free.
    pub async fn rename(
        &self,
        ctx: &OpContext,
        id: &str,
        new_name: &str,
    ) -> Result<Arc<ContainerMeta>> {
        let new_name = validate_name(new_name)?;
        let _guard = self.lock_id(ctx, id).await?;
        let current = self.load(ctx, id).await?;
        if current.name == new_name {
            return Ok(current);
        }

        self.claim_name(ctx, &new_name, id).await?;

        let mut updated = (*current).clone();
        updated.name = new_name.clone();
        if let Err(e) = self.store.put_json(ctx, &self.bucket, id, &updated).await {
            self.names.release(&new_name, id);
            return Err(e.into());
        }

        self.names.release(&current.name, id);
        let updated = Arc::new(updated);
        self.cache.insert(id.to_string(), Arc::clone(&updated));

        info!("Renamed container {} from {} to {}", short_id(id), current.name, new_name);
        Ok(updated)
    }

    /// Every persisted container, oldest first.
    ///
    /// Objects that fail to decode are logged and skipped.
    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<Arc<ContainerMeta>>> {
        let objects = self.store.list(ctx, &self.bucket).await?;

        let mut containers: Vec<Arc<ContainerMeta>> = objects
            .iter()
            .filter_map(|bytes| match serde_json::from_slice::<ContainerMeta>(bytes) {
                Ok(meta) => Some(Arc::new(meta)),
                Err(e) => {
                    warn!("Skipping undecodable container object: {}", e);
                    None
                }
            })
            .collect();

        containers.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.id.cmp(&b.id)));
        Ok(containers)
    }

    /// Rebuild the cache and name index from the store.
    ///
    /// A container whose name is already held by another is still cached
    /// (and reachable by ID) but left out of the name index. Returns the
    /// number of containers loaded.
    pub async fn restore(&self, ctx: &OpContext) -> Result<usize> {
        let containers = self.list(ctx).await?;

        self.cache.clear();
        self.names.clear();

        for meta in &containers {
            if !self.names.reserve(&meta.name, &meta.id) {
                warn!(
                    "Container {} shares name {} with another container, leaving it unnamed",
                    meta.short_id(),
                    meta.name
                );
            }
            self.cache.insert(meta.id.clone(), Arc::clone(meta));
        }

        info!("Restored {} containers from {} store", containers.len(), self.store.backend_name());
        Ok(containers.len())
    }

    /// Number of cached containers.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests;
