use crate::keys::{api_path, KeyCodec};
use crate::traits::{ByteStream, IssuedUrl, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use futures::StreamExt;
use panda_core::ImageUpload;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem storage implementation
///
/// Keys are file names relative to the base directory. Files are served by
/// the HTTP layer under `/api/images/{key}`.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    base_path: PathBuf,
    codec: KeyCodec,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// The base directory is created if missing and stored in canonical form
    /// so containment checks compare like with like.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create image upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_path = fs::canonicalize(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to canonicalize image upload directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage {
            base_path,
            codec: KeyCodec::flat(),
        })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a storage key to its canonical spelling and filesystem path
    ///
    /// The key is rebuilt from the plain components of its path below the
    /// base directory, so absolute paths into the base directory, `./` and
    /// repeated separators all collapse to the same key. The nearest
    /// existing ancestor of the target is then canonicalized, which resolves
    /// symlinks, and must lie inside the base directory. Whatever does not
    /// exist yet below it can only be plain names because the codec already
    /// refused `..`.
    fn key_to_path(&self, storage_key: &str) -> StorageResult<(String, PathBuf)> {
        let escapes = || {
            StorageError::InvalidIdentifier(format!(
                "Image identifier resolves outside storage directory: {}",
                storage_key
            ))
        };

        let joined = self.base_path.join(storage_key);
        let relative = joined.strip_prefix(&self.base_path).map_err(|_| escapes())?;

        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str().ok_or_else(escapes)?),
                _ => return Err(escapes()),
            }
        }
        if parts.is_empty() {
            return Err(escapes());
        }
        let key = parts.join("/");
        let path = self.base_path.join(&key);

        let mut probe = path.as_path();
        let resolved = loop {
            match probe.canonicalize() {
                Ok(resolved) => break resolved,
                Err(_) => probe = probe.parent().ok_or_else(escapes)?,
            }
        };

        if !resolved.starts_with(&self.base_path) {
            return Err(escapes());
        }
        if probe == path.as_path() && resolved == self.base_path {
            return Err(escapes());
        }

        Ok((key, path))
    }

    fn resolve(&self, identifier: &str) -> StorageResult<(String, PathBuf)> {
        let key = self.codec.normalize(identifier)?;
        self.key_to_path(&key)
    }

    /// Ensure parent directory exists
    async fn ensure_parent_dir(&self, key: &str, path: &Path) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::unavailable("store", key, e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn store(&self, upload: &ImageUpload) -> StorageResult<String> {
        let generated = self.codec.generate_key(upload.original_filename.as_deref());
        let (key, path) = self.key_to_path(&generated)?;
        let size = upload.size();

        self.ensure_parent_dir(&key, &path).await?;

        let start = std::time::Instant::now();

        let mut file = fs::File::create(&path).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to create image file");
            StorageError::unavailable("store", key.as_str(), e)
        })?;

        file.write_all(&upload.data).await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to write image file");
            StorageError::unavailable("store", key.as_str(), e)
        })?;

        file.sync_all().await.map_err(|e| {
            tracing::error!(error = %e, path = %path.display(), "Failed to sync image file");
            StorageError::unavailable("store", key.as_str(), e)
        })?;

        tracing::info!(
            path = %path.display(),
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage store successful"
        );

        Ok(key)
    }

    async fn load(&self, identifier: &str) -> StorageResult<ByteStream> {
        // An escaping identifier looks exactly like a missing file to the caller.
        let (key, path) = self.resolve(identifier).map_err(|e| match e {
            StorageError::InvalidIdentifier(reason) => {
                tracing::debug!(identifier = %identifier, reason = %reason, "Rejected image identifier");
                StorageError::NotFound(identifier.to_string())
            }
            other => other,
        })?;

        let is_file = fs::metadata(&path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(StorageError::NotFound(key));
        }

        let file = fs::File::open(&path).await.map_err(|e| {
            tracing::debug!(error = %e, key = %key, "Image file is not readable");
            StorageError::NotFound(key.clone())
        })?;

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(error = %e, path = %path_display, "Local storage stream read error");
                StorageError::unavailable("load", key.as_str(), e)
            })
        });

        Ok(Box::pin(stream))
    }

    async fn delete(&self, keys: &[String]) -> StorageResult<()> {
        let resolved = keys
            .iter()
            .map(|identifier| self.resolve(identifier))
            .collect::<StorageResult<Vec<_>>>()?;

        let mut failed = Vec::new();
        let mut last_error = None;

        for (key, path) in resolved {
            let start = std::time::Instant::now();
            match fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::info!(
                        path = %path.display(),
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "Local storage delete successful"
                    );
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    tracing::debug!(key = %key, "Image already absent, nothing to delete");
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        path = %path.display(),
                        key = %key,
                        "Local storage delete failed, continuing with remaining keys"
                    );
                    failed.push(key);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            None => Ok(()),
            Some(e) => Err(StorageError::unavailable("delete", failed.join(", "), e)),
        }
    }

    async fn issue_url(&self, identifier: &str) -> StorageResult<IssuedUrl> {
        let (key, _) = self.resolve(identifier)?;
        Ok(IssuedUrl {
            url: api_path(&key),
            key,
            expires_in: None,
        })
    }

    fn normalize(&self, identifier: &str) -> StorageResult<String> {
        self.resolve(identifier).map(|(key, _)| key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
