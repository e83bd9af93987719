//! Container manager facade.
//!
//! Composes the translator and the identity registry into the user-facing
//! create/lookup/rename/remove operations. Process lifecycle stays with an
//! optional [`RuntimeSupervisor`].

use super::{ContainerError, ContainerMeta, NetworkMode, Result};
use crate::registry::Registry;
use crate::store::OpContext;
use crate::translate::{RawSpec, translate};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Hooks into whatever actually runs containers.
#[async_trait]
pub trait RuntimeSupervisor: Send + Sync {
    /// Called after a container is registered; failing undoes the registration.
    async fn prepare(&self, ctx: &OpContext, meta: &ContainerMeta) -> anyhow::Result<()>;

    /// Called before a container is removed; failing keeps it registered.
    async fn destroy(&self, ctx: &OpContext, meta: &ContainerMeta) -> anyhow::Result<()>;
}

/// Create and look up containers.
pub struct ContainerManager {
    registry: Arc<Registry>,
    supervisor: Option<Arc<dyn RuntimeSupervisor>>,
}

impl ContainerManager {
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            supervisor: None,
        }
    }

    pub fn with_supervisor(mut self, supervisor: Arc<dyn RuntimeSupervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Translate `spec`, allocate an identity and persist the container.
    pub async fn create(&self, ctx: &OpContext, spec: &RawSpec) -> Result<Arc<ContainerMeta>> {
        let config = translate(spec)?;

        // container:<ref> must point at a live container
        if let NetworkMode::Container(target) = &config.host.network_mode {
            self.registry.resolve(ctx, target).await?;
        }

        let reserved = self.registry.allocate(ctx).await?;
        let name = (!spec.name.is_empty()).then_some(spec.name.as_str());
        let meta = self.registry.register(ctx, reserved, name, config).await?;

        if let Some(supervisor) = &self.supervisor
            && let Err(e) = supervisor.prepare(ctx, &meta).await
        {
            warn!("Runtime rejected container {}: {:#}", meta.short_id(), e);
            if let Err(rollback) = self.registry.remove(ctx, &meta.id).await {
                error!(
                    "Failed to roll back registration of {}: {}",
                    meta.short_id(),
                    rollback
                );
            }
            return Err(ContainerError::runtime(&meta.id, "prepare", e));
        }

        info!("Created container {} ({})", meta.short_id(), meta.name);
        Ok(meta)
    }

    /// Look up by name, full ID or unambiguous ID prefix.
    pub async fn get(&self, ctx: &OpContext, token: &str) -> Result<Arc<ContainerMeta>> {
        if let Some(meta) = self.registry.cached(token) {
            return Ok(meta);
        }

        let id = self.registry.resolve(ctx, token).await?;
        if let Some(meta) = self.registry.cached(&id) {
            return Ok(meta);
        }
        Ok(self.registry.load(ctx, &id).await?)
    }

    pub async fn list(&self, ctx: &OpContext) -> Result<Vec<Arc<ContainerMeta>>> {
        Ok(self.registry.list(ctx).await?)
    }

    pub async fn rename(
        &self,
        ctx: &OpContext,
        token: &str,
        new_name: &str,
    ) -> Result<Arc<ContainerMeta>> {
        let id = self.registry.resolve(ctx, token).await?;
        Ok(self.registry.rename(ctx, &id, new_name).await?)
    }

    /// Tear down through the supervisor, then drop the registration.
    pub async fn remove(&self, ctx: &OpContext, token: &str) -> Result<Arc<ContainerMeta>> {
        let meta = self.get(ctx, token).await?;

        if let Some(supervisor) = &self.supervisor {
            supervisor
                .destroy(ctx, &meta)
                .await
                .map_err(|e| ContainerError::runtime(&meta.id, "destroy", e))?;
        }

        Ok(self.registry.remove(ctx, &meta.id).await?)
    }
}
