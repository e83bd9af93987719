//! In-process metadata backend.

use super::{Backend, Result, StoreConfig, StoreError};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

type Bucket = BTreeMap<String, Vec<u8>>;

/// Backend keeping every bucket in memory.
///
/// Buckets are fixed at construction from [`StoreConfig::buckets`]; nothing
/// survives the process.
#[derive(Debug)]
pub struct MemoryBackend {
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl MemoryBackend {
    pub fn new(config: &StoreConfig) -> Self {
        let buckets = config
            .buckets
            .iter()
            .map(|name| (name.clone(), Bucket::new()))
            .collect();
        Self {
            buckets: RwLock::new(buckets),
        }
    }

    fn read<T>(&self, bucket: &str, f: impl FnOnce(&Bucket) -> Result<T>) -> Result<T> {
        let buckets = self.buckets.read().unwrap_or_else(|e| e.into_inner());
        let objects = buckets
            .get(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        f(objects)
    }

    fn write<T>(&self, bucket: &str, f: impl FnOnce(&mut Bucket) -> Result<T>) -> Result<T> {
        let mut buckets = self.buckets.write().unwrap_or_else(|e| e.into_inner());
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StoreError::BucketNotFound(bucket.to_string()))?;
        f(objects)
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.write(bucket, |objects| {
            objects.insert(key.to_string(), value.to_vec());
            Ok(())
        })
    }

    async fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.write(bucket, |objects| {
            if objects.contains_key(key) {
                return Err(StoreError::conflict(bucket, key));
            }
            objects.insert(key.to_string(), value.to_vec());
            Ok(())
        })
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.read(bucket, |objects| {
            objects
                .get(key)
                .cloned()
                .ok_or_else(|| StoreError::not_found(bucket, key))
        })
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.write(bucket, |objects| {
            objects
                .remove(key)
                .map(|_| ())
                .ok_or_else(|| StoreError::not_found(bucket, key))
        })
    }

    async fn list(&self, bucket: &str) -> Result<Vec<Vec<u8>>> {
        self.read(bucket, |objects| Ok(objects.values().cloned().collect()))
    }

    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.read(bucket, |objects| Ok(objects.keys().cloned().collect()))
    }

    fn path(&self, key: &str) -> PathBuf {
        PathBuf::from(format!("memory://{}", key))
    }
}
