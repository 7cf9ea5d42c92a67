#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-object")]
use crate::{ObjectStorage, S3Client};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use panda_core::StorageConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
pub async fn create_storage(config: &StorageConfig) -> StorageResult<Arc<dyn Storage>> {
    config
        .validate()
        .map_err(|e| StorageError::ConfigError(e.to_string()))?;

    match config.backend {
        #[cfg(feature = "storage-object")]
        StorageBackend::Object => {
            let client = S3Client::new(config)?;
            let bucket = config.s3_bucket.clone().unwrap_or_default();
            let storage = ObjectStorage::new(
                Arc::new(client),
                bucket,
                config.s3_key_prefix.clone(),
                config.presign_ttl(),
            );
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-object"))]
        StorageBackend::Object => Err(StorageError::ConfigError(
            "Object storage backend not available (storage-object feature not enabled)"
                .to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(&config.local_storage_path).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}
