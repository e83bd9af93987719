//! Filesystem metadata backend.
//!
//! Layout: one directory per key under the base directory, one JSON file per
//! bucket inside it:
//!
//! ```text
//! <base_dir>/
//!   <key>/
//!     containers.json
//!     volumes.json
//! ```
//!
//! The per-key directory is what [`Backend::path`] exposes, so collaborators
//! can place container-scoped files next to the metadata.

use super::{Backend, Result, StoreConfig, StoreError};
use crate::env;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Maximum object files read concurrently by `list`.
const MAX_CONCURRENT_READS: usize = 16;

/// Backend persisting objects as files under a base directory.
#[derive(Debug)]
pub struct LocalBackend {
    base_dir: PathBuf,
    buckets: HashSet<String>,
}

impl LocalBackend {
    /// Open the store, creating the base directory if needed.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_dir)
            .map_err(|e| StoreError::io("create", "", &config.base_dir.display().to_string(), e))?;

        debug!("Local store opened at {}", config.base_dir.display());

        Ok(Self {
            base_dir: config.base_dir.clone(),
            buckets: config.buckets.iter().cloned().collect(),
        })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn check_bucket(&self, bucket: &str) -> Result<()> {
        if self.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(StoreError::BucketNotFound(bucket.to_string()))
        }
    }

    fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        self.base_dir
            .join(key)
            .join(format!("{}.{}", bucket, env::store::OBJECT_FILE_EXTENSION))
    }

    /// Write `value` to a fresh temp file next to the final object.
    async fn write_temp(&self, bucket: &str, key: &str, value: &[u8]) -> Result<PathBuf> {
        let key_dir = self.base_dir.join(key);
        async_fs::create_dir_all(&key_dir)
            .await
            .map_err(|e| StoreError::io("create", bucket, key, e))?;

        let temp_path = key_dir.join(format!(".{}.{}.tmp", bucket, uuid::Uuid::new_v4()));
        let write = async {
            let mut file = async_fs::File::create(&temp_path).await?;
            file.write_all(value).await?;
            file.sync_all().await
        };

        if let Err(e) = write.await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(StoreError::io("write", bucket, key, e));
        }
        Ok(temp_path)
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn put(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.check_bucket(bucket)?;
        let temp_path = self.write_temp(bucket, key, value).await?;

        if let Err(e) = async_fs::rename(&temp_path, self.object_path(bucket, key)).await {
            let _ = async_fs::remove_file(&temp_path).await;
            return Err(StoreError::io("put", bucket, key, e));
        }
        Ok(())
    }

    async fn create(&self, bucket: &str, key: &str, value: &[u8]) -> Result<()> {
        self.check_bucket(bucket)?;
        let temp_path = self.write_temp(bucket, key, value).await?;

        // hard_link refuses to replace an existing file, which makes the
        // existence check and the publish a single step.
        let linked = async_fs::hard_link(&temp_path, self.object_path(bucket, key)).await;
        let _ = async_fs::remove_file(&temp_path).await;

        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::AlreadyExists => {
                Err(StoreError::conflict(bucket, key))
            }
            Err(e) => Err(StoreError::io("create", bucket, key, e)),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.check_bucket(bucket)?;
        async_fs::read(self.object_path(bucket, key))
            .await
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => StoreError::not_found(bucket, key),
                _ => StoreError::io("get", bucket, key, e),
            })
    }

    async fn remove(&self, bucket: &str, key: &str) -> Result<()> {
        self.check_bucket(bucket)?;
        async_fs::remove_file(self.object_path(bucket, key))
            .await
            .map_err(|e| match e.kind() {
                IoErrorKind::NotFound => StoreError::not_found(bucket, key),
                _ => StoreError::io("remove", bucket, key, e),
            })?;

        // Other buckets may still hold objects under this key.
        if let Err(e) = async_fs::remove_dir(self.base_dir.join(key)).await
            && e.kind() != IoErrorKind::NotFound
        {
            debug!("Keeping key directory {}: {}", key, e);
        }
        Ok(())
    }

    async fn list(&self, bucket: &str) -> Result<Vec<Vec<u8>>> {
        let keys = self.keys(bucket).await?;

        let reads: Vec<Result<Option<Vec<u8>>>> = stream::iter(keys)
            .map(|key| async move {
                match async_fs::read(self.object_path(bucket, &key)).await {
                    Ok(bytes) => Ok(Some(bytes)),
                    // Removed between the scan and the read.
                    Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
                    Err(e) => Err(StoreError::io("list", bucket, &key, e)),
                }
            })
            .buffered(MAX_CONCURRENT_READS)
            .collect()
            .await;

        let mut objects = Vec::with_capacity(reads.len());
        for read in reads {
            if let Some(bytes) = read? {
                objects.push(bytes);
            }
        }
        Ok(objects)
    }

    async fn keys(&self, bucket: &str) -> Result<Vec<String>> {
        self.check_bucket(bucket)?;

        let mut entries = async_fs::read_dir(&self.base_dir)
            .await
            .map_err(|e| StoreError::io("scan", bucket, "", e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io("scan", bucket, "", e))?
        {
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                warn!("Skipping non UTF-8 entry in {}", self.base_dir.display());
                continue;
            };

            let file_type = entry
                .file_type()
                .await
                .map_err(|e| StoreError::io("scan", bucket, &key, e))?;
            if file_type.is_file() {
                continue;
            }

            if async_fs::try_exists(self.object_path(bucket, &key))
                .await
                .map_err(|e| StoreError::io("scan", bucket, &key, e))?
            {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    fn path(&self, key: &str) -> PathBuf {
        self.base_dir.join(key)
    }
}
