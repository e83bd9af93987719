use super::*;
use crate::store::{Backend, BackendRegistry, MemoryBackend, Store, StoreConfig};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::{Notify, Semaphore};

/// Helper function to create a registry over a fresh in-memory store
fn create_test_registry() -> Registry {
    let store = BackendRegistry::with_defaults()
        .open(&StoreConfig::memory())
        .expect("Failed to open memory store");
    Registry::new(store, RegistryConfig::default())
}

fn fixed_id(prefix: &str) -> String {
    format!("{:0<64}", prefix)
}

/// Reserve a chosen ID, bypassing random generation.
fn reserve_fixed(registry: &Registry, id: &str) -> ReservedId {
    ReservedId::try_reserve(id.to_string(), &registry.reservations).expect("id already reserved")
}

async fn register_fixed(registry: &Registry, id: &str, name: Option<&str>) -> Arc<ContainerMeta> {
    let ctx = OpContext::background();
    let reserved = reserve_fixed(registry, id);
    registry
        .register(&ctx, reserved, name, CreateConfig::default())
        .await
        .expect("Failed to register container")
}

/// Backend claiming every key exists and answering slowly on scans.
struct CrowdedBackend;

#[async_trait]
impl Backend for CrowdedBackend {
    fn name(&self) -> &'static str {
        "crowded"
    }

    async fn put(&self, _bucket: &str, _key: &str, _value: &[u8]) -> crate::store::Result<()> {
        Ok(())
    }

    async fn create(&self, bucket: &str, key: &str, _value: &[u8]) -> crate::store::Result<()> {
        Err(StoreError::Conflict {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    async fn get(&self, _bucket: &str, _key: &str) -> crate::store::Result<Vec<u8>> {
        Ok(b"{}".to_vec())
    }

    async fn remove(&self, _bucket: &str, _key: &str) -> crate::store::Result<()> {
        Ok(())
    }

    async fn list(&self, _bucket: &str) -> crate::store::Result<Vec<Vec<u8>>> {
        Ok(Vec::new())
    }

    async fn keys(&self, _bucket: &str) -> crate::store::Result<Vec<String>> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(Vec::new())
    }

    fn path(&self, key: &str) -> PathBuf {
        PathBuf::from(key)
    }
}

fn create_crowded_registry() -> Registry {
    let mut backends = BackendRegistry::empty();
    backends.register("crowded", |_config: &StoreConfig| {
        Ok(Arc::new(CrowdedBackend) as Arc<dyn Backend>)
    });

    let config = StoreConfig {
        backend: "crowded".to_string(),
        ..StoreConfig::memory()
    };
    let store = backends.open(&config).expect("Failed to open crowded store");
    Registry::new(
        store,
        RegistryConfig {
            max_id_attempts: 4,
            ..Default::default()
        },
    )
}

/// Memory backend whose overwrites park until the test lets them through.
///
/// Create-only writes pass straight through, so registration is never held.
struct GatedBackend {
    inner: MemoryBackend,
    parked: Notify,
    gate: Semaphore,
}

impl GatedBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryBackend::new(&StoreConfig::memory()),
            parked: Notify::new(),
            gate: Semaphore::new(0),
        })
    }

    /// Let `writes` parked overwrites complete.
    fn open(&self, writes: usize) {
        self.gate.add_permits(writes);
    }
}

#[async_trait]
impl Backend for GatedBackend {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> crate::store::Result<()> {
        self.parked.notify_one();
        self.gate.acquire().await.expect("gate closed").forget();
        self.inner.put(bucket, key, value).await
    }

    async fn create(&self, bucket: &str, key: &str, value: &[u8]) -> crate::store::Result<()> {
        self.inner.create(bucket, key, value).await
    }

    async fn get(&self, bucket: &str, key: &str) -> crate::store::Result<Vec<u8>> {
        self.inner.get(bucket, key).await
    }

    async fn remove(&self, bucket: &str, key: &str) -> crate::store::Result<()> {
        self.inner.remove(bucket, key).await
    }

    async fn list(&self, bucket: &str) -> crate::store::Result<Vec<Vec<u8>>> {
        self.inner.list(bucket).await
    }

    async fn keys(&self, bucket: &str) -> crate::store::Result<Vec<String>> {
        self.inner.keys(bucket).await
    }

    fn path(&self, key: &str) -> PathBuf {
        self.inner.path(key)
    }
}

fn create_gated_registry(backend: &Arc<GatedBackend>) -> Arc<Registry> {
    let store = Store::new(Arc::clone(backend) as Arc<dyn Backend>);
    Arc::new(Registry::new(store, RegistryConfig::default()))
}

fn spawn_rename(
    registry: &Arc<Registry>,
    id: &str,
    new_name: &str,
) -> tokio::task::JoinHandle<Result<Arc<ContainerMeta>>> {
    let registry = Arc::clone(registry);
    let (id, new_name) = (id.to_string(), new_name.to_string());
    tokio::spawn(async move {
        registry
            .rename(&OpContext::background(), &id, &new_name)
            .await
    })
}

#[tokio::test]
async fn test_concurrent_allocations_are_distinct() {
    let registry = Arc::new(create_test_registry());
    let ctx = OpContext::background();

    let allocations = (0..1000).map(|_| {
        let registry = Arc::clone(&registry);
        let ctx = ctx.clone();
        async move { registry.allocate(&ctx).await }
    });
    let reserved: Vec<ReservedId> = futures::future::join_all(allocations)
        .await
        .into_iter()
        .collect::<Result<_>>()
        .unwrap();

    let ids: HashSet<&str> = reserved.iter().map(ReservedId::id).collect();
    assert_eq!(ids.len(), 1000);
    assert_eq!(registry.reservations.len(), 1000);

    drop(reserved);
    assert!(registry.reservations.is_empty());
}

#[tokio::test]
async fn test_allocation_exhausts_on_crowded_store() {
    let registry = create_crowded_registry();
    let err = registry.allocate(&OpContext::background()).await.unwrap_err();

    assert!(matches!(err, RegistryError::Exhausted { attempts: 4, .. }));
    assert_eq!(err.kind(), ErrorKind::Exhausted);
}

#[tokio::test]
async fn test_register_with_explicit_and_generated_names() {
    let registry = create_test_registry();
    let ctx = OpContext::background();

    let reserved = registry.allocate(&ctx).await.unwrap();
    let id = reserved.id().to_string();
    let named = registry
        .register(&ctx, reserved, Some("/web"), CreateConfig::default())
        .await
        .unwrap();
    assert_eq!(named.name, "web");
    assert_eq!(named.id, id);
    assert!(registry.reservations.is_empty());

    let reserved = registry.allocate(&ctx).await.unwrap();
    let generated_id = reserved.id().to_string();
    let generated = registry
        .register(&ctx, reserved, None, CreateConfig::default())
        .await
        .unwrap();
    assert_eq!(generated.name, &generated_id[..6]);

    // both are persisted and indexed
    assert!(registry.store().exists(&ctx, "containers", &id).await.unwrap());
    assert_eq!(registry.resolve(&ctx, "web").await.unwrap(), id);
    assert_eq!(registry.resolve(&ctx, &generated.name).await.unwrap(), generated_id);
}

#[tokio::test]
async fn test_register_rejects_taken_and_invalid_names() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    register_fixed(&registry, &fixed_id("aaa"), Some("web")).await;

    let reserved = registry.allocate(&ctx).await.unwrap();
    let err = registry
        .register(&ctx, reserved, Some("web"), CreateConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Conflict(ref name) if name == "web"));

    let reserved = registry.allocate(&ctx).await.unwrap();
    let err = registry
        .register(&ctx, reserved, Some("bad name"), CreateConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(registry.list(&ctx).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_registration_of_one_name() {
    let registry = Arc::new(create_test_registry());
    let ctx = OpContext::background();

    let attempts = (0..50).map(|_| {
        let registry = Arc::clone(&registry);
        let ctx = ctx.clone();
        async move {
            let reserved = registry.allocate(&ctx).await?;
            registry
                .register(&ctx, reserved, Some("singleton"), CreateConfig::default())
                .await
        }
    });
    let results = futures::future::join_all(attempts).await;

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(results.iter().filter_map(|r| r.as_ref().err()).all(|e| e.kind() == ErrorKind::Conflict));
    assert_eq!(registry.list(&ctx).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_persist_conflict_releases_name() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("first")).await;

    // same id again: the create-only write refuses to overwrite
    let err = registry
        .register(&ctx, reserve_fixed(&registry, &id), Some("second"), CreateConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(!registry.names.contains("second"));

    let stored = registry.load(&ctx, &id).await.unwrap();
    assert_eq!(stored.name, "first");
}

#[test]
fn test_generate_name_skips_taken_windows() {
    let registry = create_test_registry();
    let id = "abcdefgh";

    assert_eq!(registry.generate_name(id).unwrap(), "abcdef");
    registry.names.reserve("abcdef", "other");
    assert_eq!(registry.generate_name(id).unwrap(), "bcdefg");
    registry.names.reserve("bcdefg", "other");
    registry.names.reserve("cdefgh", "other");

    let err = registry.generate_name(id).unwrap_err();
    assert!(matches!(err, RegistryError::Exhausted { what: "container name", .. }));
}

#[tokio::test]
async fn test_prefix_resolution() {
    let registry = create_test_registry();
    let ctx = OpContext::background();

    let first = fixed_id("abc1");
    let second = fixed_id("abc2");
    register_fixed(&registry, &first, Some("one")).await;
    register_fixed(&registry, &second, Some("two")).await;

    assert_eq!(registry.resolve(&ctx, "abc1").await.unwrap(), first);
    assert_eq!(registry.resolve(&ctx, &second).await.unwrap(), second);

    let err = registry.resolve(&ctx, "abc").await.unwrap_err();
    assert!(matches!(err, RegistryError::Ambiguous { matches: 2, .. }));
    assert_eq!(err.kind(), ErrorKind::Ambiguous);

    let err = registry.resolve(&ctx, "fff").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(registry.resolve(&ctx, "").await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_name_wins_over_prefix() {
    let registry = create_test_registry();
    let ctx = OpContext::background();

    let named = fixed_id("111");
    let prefixed = fixed_id("abc");
    register_fixed(&registry, &named, Some("abc")).await;
    register_fixed(&registry, &prefixed, Some("other")).await;

    assert_eq!(registry.resolve(&ctx, "abc").await.unwrap(), named);
    assert_eq!(registry.resolve(&ctx, "/abc").await.unwrap(), named);
}

#[tokio::test]
async fn test_stale_name_index_resolves_not_found() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("dead");
    register_fixed(&registry, &id, Some("ghost")).await;

    // object removed behind the registry's back
    registry.store().remove(&ctx, "containers", &id).await.unwrap();
    registry.cache.remove(&id);

    let err = registry.resolve(&ctx, "ghost").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!registry.names.contains("ghost"));
}

#[tokio::test]
async fn test_index_disagreeing_with_object_is_stale() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("beef");
    let meta = register_fixed(&registry, &id, Some("before")).await;

    let mut renamed = (*meta).clone();
    renamed.name = "after".to_string();
    registry
        .store()
        .put_json(&ctx, "containers", &id, &renamed)
        .await
        .unwrap();
    registry.cache.remove(&id);

    assert_eq!(
        registry.resolve(&ctx, "before").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn test_cancelled_resolve_is_not_not_found() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    ctx.cancel();

    let err = registry.resolve(&ctx, "anything").await.unwrap_err();
    assert!(matches!(err, RegistryError::Cancelled(_)));
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_resolve_cancelled_mid_scan() {
    let registry = create_crowded_registry();
    let ctx = OpContext::background();

    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        canceller.cancel();
    });

    let err = registry.resolve(&ctx, "abc").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_deadline_during_scan() {
    let registry = create_crowded_registry();
    let ctx = OpContext::with_timeout(Duration::from_millis(10));

    let err = registry.resolve(&ctx, "abc").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_cache_aside_lookup() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("c0ffee");
    register_fixed(&registry, &id, Some("cached")).await;

    assert!(registry.cached(&id).is_some());
    assert!(registry.cached("c0ffee").is_none());

    registry.cache.remove(&id);
    assert!(registry.cached(&id).is_none());

    let loaded = registry.load(&ctx, &id).await.unwrap();
    assert_eq!(loaded.name, "cached");
    assert!(registry.cached(&id).is_some());

    let err = registry.load(&ctx, &fixed_id("missing")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_remove_clears_every_trace() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("doomed")).await;

    let removed = registry.remove(&ctx, &id).await.unwrap();
    assert_eq!(removed.name, "doomed");
    assert!(registry.cached(&id).is_none());
    assert!(!registry.names.contains("doomed"));
    assert_eq!(registry.resolve(&ctx, "doomed").await.unwrap_err().kind(), ErrorKind::NotFound);

    let err = registry.remove(&ctx, &id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // the name is free again
    register_fixed(&registry, &fixed_id("def"), Some("doomed")).await;
}

#[tokio::test]
async fn test_rename_frees_old_name() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    let other = fixed_id("def");
    register_fixed(&registry, &id, Some("old")).await;
    register_fixed(&registry, &other, Some("taken")).await;

    let err = registry.rename(&ctx, &id, "taken").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let renamed = registry.rename(&ctx, &id, "new").await.unwrap();
    assert_eq!(renamed.name, "new");
    assert_eq!(registry.resolve(&ctx, "new").await.unwrap(), id);
    assert_eq!(registry.resolve(&ctx, "old").await.unwrap_err().kind(), ErrorKind::NotFound);

    // persisted, not just cached
    registry.cache.remove(&id);
    assert_eq!(registry.load(&ctx, &id).await.unwrap().name, "new");

    register_fixed(&registry, &fixed_id("fed"), Some("old")).await;
}

#[tokio::test]
async fn test_list_and_restore() {
    let store = BackendRegistry::with_defaults()
        .open(&StoreConfig::memory())
        .unwrap();
    let ctx = OpContext::background();

    let first = Registry::new(store.clone(), RegistryConfig::default());
    register_fixed(&first, &fixed_id("a1"), Some("alpha")).await;
    register_fixed(&first, &fixed_id("b2"), Some("beta")).await;
    store.put(&ctx, "containers", "junk", b"not json").await.unwrap();

    let listed = first.list(&ctx).await.unwrap();
    let names: Vec<&str> = listed.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);

    let second = Registry::new(store, RegistryConfig::default());
    assert_eq!(second.restore(&ctx).await.unwrap(), 2);
    assert_eq!(second.cached_count(), 2);
    assert_eq!(second.resolve(&ctx, "beta").await.unwrap(), fixed_id("b2"));
}

#[tokio::test]
async fn test_restore_skips_duplicate_names() {
    let store = BackendRegistry::with_defaults()
        .open(&StoreConfig::memory())
        .unwrap();
    let ctx = OpContext::background();

    let original = ContainerMeta::new(
        fixed_id("a1"),
        "twin".to_string(),
        CreateConfig::default(),
        PathBuf::new(),
    );
    let mut copy = original.clone();
    copy.id = fixed_id("b2");
    store.put_json(&ctx, "containers", &original.id, &original).await.unwrap();
    store.put_json(&ctx, "containers", &copy.id, &copy).await.unwrap();

    let registry = Registry::new(store, RegistryConfig::default());
    assert_eq!(registry.restore(&ctx).await.unwrap(), 2);
    assert_eq!(registry.names.len(), 1);
    assert!(registry.cached(&copy.id).is_some());
}

#[tokio::test]
async fn test_remove_during_rename_stays_removed() {
    let backend = GatedBackend::new();
    let registry = create_gated_registry(&backend);
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("web")).await;

    let rename = spawn_rename(&registry, &id, "web2");
    backend.parked.notified().await;

    let remove = tokio::spawn({
        let registry = Arc::clone(&registry);
        let id = id.clone();
        async move { registry.remove(&OpContext::background(), &id).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!remove.is_finished(), "remove must wait for the rename in flight");

    backend.open(1);
    assert_eq!(rename.await.unwrap().unwrap().name, "web2");
    assert_eq!(remove.await.unwrap().unwrap().name, "web2");

    assert!(!registry.store().exists(&ctx, "containers", &id).await.unwrap());
    assert!(registry.list(&ctx).await.unwrap().is_empty());
    assert!(registry.cached(&id).is_none());
    assert!(registry.names.is_empty());

    // a rename arriving after the remove finds nothing to rewrite
    let err = registry.rename(&ctx, &id, "web3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!registry.store().exists(&ctx, "containers", &id).await.unwrap());
}

#[tokio::test]
async fn test_concurrent_renames_leave_no_orphan_name() {
    let backend = GatedBackend::new();
    let registry = create_gated_registry(&backend);
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("web")).await;

    let first = spawn_rename(&registry, &id, "alpha");
    backend.parked.notified().await;
    let second = spawn_rename(&registry, &id, "beta");
    tokio::time::sleep(Duration::from_millis(20)).await;

    backend.open(2);
    assert_eq!(first.await.unwrap().unwrap().name, "alpha");
    assert_eq!(second.await.unwrap().unwrap().name, "beta");

    registry.cache.remove(&id);
    assert_eq!(registry.load(&ctx, &id).await.unwrap().name, "beta");
    assert_eq!(registry.names.len(), 1);
    assert_eq!(registry.resolve(&ctx, "beta").await.unwrap(), id);

    // neither earlier name is held by anyone
    register_fixed(&registry, &fixed_id("def"), Some("alpha")).await;
    register_fixed(&registry, &fixed_id("fed"), Some("web")).await;
}

#[tokio::test]
async fn test_in_flight_rename_keeps_its_name() {
    let backend = GatedBackend::new();
    let registry = create_gated_registry(&backend);
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("web")).await;

    let rename = spawn_rename(&registry, &id, "alpha");
    backend.parked.notified().await;

    // the object still says "web", but the holder is mid-rename
    let err = registry
        .register(&ctx, reserve_fixed(&registry, &fixed_id("def")), Some("alpha"), CreateConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    backend.open(1);
    assert_eq!(rename.await.unwrap().unwrap().name, "alpha");
    assert_eq!(registry.resolve(&ctx, "alpha").await.unwrap(), id);
}

#[tokio::test]
async fn test_stale_name_slot_is_reclaimed() {
    let registry = create_test_registry();
    let ctx = OpContext::background();
    let id = fixed_id("abc");
    register_fixed(&registry, &id, Some("beta")).await;

    // leftover entries: one for a live container under another name, one
    // for a container that no longer exists
    assert!(registry.names.reserve("alpha", &id));
    assert!(registry.names.reserve("gone", &fixed_id("dead")));

    let fresh = register_fixed(&registry, &fixed_id("def"), Some("alpha")).await;
    assert_eq!(registry.resolve(&ctx, "alpha").await.unwrap(), fresh.id);

    let renamed = registry.rename(&ctx, &id, "gone").await.unwrap();
    assert_eq!(renamed.name, "gone");
    assert_eq!(registry.resolve(&ctx, "gone").await.unwrap(), id);

    // live holders still win
    let err = registry.rename(&ctx, &fresh.id, "gone").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}
