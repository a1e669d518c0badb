//! Object storage for images and their caption sidecars.
//!
//! The gallery only needs a flat key/value view of a bucket: put, get and a
//! full listing with creation timestamps. [`ObjectBlobStore`] provides that
//! on top of any `object_store` backend.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;

use crate::config::{Config, StorageBackend};
use crate::error::{GalleryError, Result};

/// A stored object as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub key: String,
    /// Last-modified time of the object. `object_store` does not expose a
    /// creation time, so an overwrite counts as a new upload.
    pub created_at: DateTime<Utc>,
}

/// Turns a listed location back into the key it was stored under.
///
/// `ObjectPath::from` percent-encodes reserved characters in each segment.
fn raw_key(location: &ObjectPath) -> String {
    location
        .parts()
        .map(|part| {
            let encoded = part.as_ref();
            urlencoding::decode(encoded)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| encoded.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Reads the whole object. Missing keys yield [`GalleryError::NotFound`].
    async fn get(&self, key: &str) -> Result<Bytes>;

    async fn list(&self) -> Result<Vec<BlobEntry>>;
}

pub struct ObjectBlobStore {
    inner: Arc<dyn ObjectStore>,
}

impl ObjectBlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>) -> Self {
        Self { inner }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()))
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let inner: Arc<dyn ObjectStore> = match config.backend {
            StorageBackend::Gcs => Arc::new(
                GoogleCloudStorageBuilder::from_env()
                    .with_bucket_name(&config.bucket)
                    .build()
                    .map_err(|e| anyhow::anyhow!("failed to build GCS store: {e}"))?,
            ),
            StorageBackend::S3 => Arc::new(
                AmazonS3Builder::from_env()
                    .with_bucket_name(&config.bucket)
                    .build()
                    .map_err(|e| anyhow::anyhow!("failed to build S3 store: {e}"))?,
            ),
            StorageBackend::Local => {
                let root = config.local_storage_root.join(&config.bucket);
                std::fs::create_dir_all(&root)?;
                Arc::new(
                    LocalFileSystem::new_with_prefix(&root)
                        .map_err(|e| anyhow::anyhow!("failed to open {}: {e}", root.display()))?,
                )
            }
            StorageBackend::Memory => Arc::new(InMemory::new()),
        };
        tracing::info!(backend = ?config.backend, bucket = %config.bucket, "object store ready");
        Ok(Self::new(inner))
    }
}

#[async_trait::async_trait]
impl BlobStore for ObjectBlobStore {
    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = ObjectPath::from(key);
        self.inner.put(&path, data.into()).await?;
        tracing::debug!(key, "stored object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes> {
        let path = ObjectPath::from(key);
        let result = self.inner.get(&path).await?;
        Ok(result.bytes().await?)
    }

    async fn list(&self) -> Result<Vec<BlobEntry>> {
        let objects: Vec<_> = self
            .inner
            .list(None)
            .try_collect()
            .await
            .map_err(GalleryError::from)?;
        Ok(objects
            .into_iter()
            .map(|meta| BlobEntry {
                key: raw_key(&meta.location),
                created_at: meta.last_modified,
            })
            .collect())
    }
}
