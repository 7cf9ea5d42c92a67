use crate::keys::KeyCodec;
use crate::traits::{ByteStream, IssuedUrl, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::Result as ObjectResult;
use panda_core::ImageUpload;
use std::sync::Arc;
use std::time::Duration;

/// The remote operations the object backend needs.
///
/// The production implementation is [`crate::S3Client`]; tests substitute
/// their own.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    /// Upload `data` under `key`, overwriting any existing object
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> ObjectResult<()>;

    /// Delete the object under `key`
    async fn delete(&self, key: &str) -> ObjectResult<()>;

    /// Sign a GET URL for `key` valid for `expires_in`
    async fn signed_get_url(&self, key: &str, expires_in: Duration) -> ObjectResult<String>;
}

/// Object storage implementation
///
/// Images are never streamed through the application: clients fetch them
/// through presigned URLs.
#[derive(Clone)]
pub struct ObjectStorage {
    client: Arc<dyn ObjectClient>,
    bucket: String,
    codec: KeyCodec,
    presign_ttl: Duration,
}

impl ObjectStorage {
    /// Create a new ObjectStorage instance
    ///
    /// # Arguments
    /// * `client` - Remote client, built once at startup
    /// * `bucket` - Bucket name (used for logging)
    /// * `key_prefix` - Namespace under which generated keys are created
    /// * `presign_ttl` - Lifetime of issued retrieval URLs
    pub fn new(
        client: Arc<dyn ObjectClient>,
        bucket: impl Into<String>,
        key_prefix: impl Into<String>,
        presign_ttl: Duration,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            codec: KeyCodec::namespaced(key_prefix),
            presign_ttl,
        }
    }

    pub fn key_prefix(&self) -> Option<&str> {
        self.codec.namespace()
    }

    pub fn presign_ttl(&self) -> Duration {
        self.presign_ttl
    }
}

impl std::fmt::Debug for ObjectStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStorage")
            .field("bucket", &self.bucket)
            .field("codec", &self.codec)
            .field("presign_ttl", &self.presign_ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn store(&self, upload: &ImageUpload) -> StorageResult<String> {
        let key = self.codec.generate_key(upload.original_filename.as_deref());
        let size = upload.size() as u64;
        let start = std::time::Instant::now();

        self.client
            .put(&key, upload.data.clone(), &upload.content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage upload failed"
                );
                StorageError::unavailable("store", key.as_str(), e)
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            content_type = %upload.content_type,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object storage upload successful"
        );

        Ok(key)
    }

    async fn load(&self, identifier: &str) -> StorageResult<ByteStream> {
        tracing::debug!(
            identifier = %identifier,
            "Object storage does not serve bytes directly; use a presigned URL"
        );
        Err(StorageError::NotFound(identifier.to_string()))
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        let keys = keys
            .iter()
            .map(|identifier| self.codec.normalize(identifier))
            .collect::<StorageResult<Vec<_>>>()?;

        // Fail fast: the first failed delete aborts the batch.
        for key in keys {
            let start = std::time::Instant::now();

            self.client.delete(&key).await.map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object storage delete failed"
                );
                StorageError::unavailable("delete", key.as_str(), e)
            })?;

            tracing::info!(
                bucket = %self.bucket,
                key = %key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Object storage delete successful"
            );
        }

        Ok(())
    }

    async fn issue_url(&self, identifier: &str) -> StorageResult<IssuedUrl> {
        let key = self.codec.normalize(identifier)?;

        let url = self
            .client
            .signed_get_url(&key, self.presign_ttl)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %self.bucket,
                    key = %key,
                    "Failed to presign image URL"
                );
                StorageError::unavailable("presign", key.as_str(), e)
            })?;

        Ok(IssuedUrl {
            key,
            url,
            expires_in: Some(self.presign_ttl),
        })
    }

    fn normalize(&self, identifier: &str) -> StorageResult<String> {
        self.codec.normalize(identifier)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Object
    }
}
